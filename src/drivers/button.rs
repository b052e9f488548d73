//! Debounced push buttons that request an `open`.
//!
//! ## Hardware
//!
//! Momentary switches to ground with the Pi's internal pull-ups. The
//! GPIO fires on the falling edge; the interrupt callback hands the edge
//! time to [`ButtonInput::on_press`], which runs the debounce and feeds the
//! command queue.
//!
//! | Button  | BCM | Location             |
//! |---------|-----|----------------------|
//! | outside | 27  | post outside the gate |
//! | inside  | 22  | post inside the gate  |
//! | box     | 17  | control box lid       |

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, log};

use crate::app::mode_watch::ModeWatch;
use crate::app::queue::CommandQueue;

/// Accepts one edge per window; edges inside the window are bounce.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Record an edge at `now`. Returns whether it counts as a press.
    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

pub struct ButtonInput {
    name: &'static str,
    debouncer: Debouncer,
    queue: Arc<CommandQueue>,
    mode: ModeWatch,
}

impl ButtonInput {
    pub fn new(
        name: &'static str,
        debounce: Duration,
        queue: Arc<CommandQueue>,
        mode: ModeWatch,
    ) -> Self {
        Self {
            name,
            debouncer: Debouncer::new(debounce),
            queue,
            mode,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Handle a falling edge. Returns whether an `open` was queued.
    pub fn on_press(&mut self, now: Instant) -> bool {
        if !self.debouncer.accept(now) {
            debug!("{} button bounce ignored", self.name);
            return false;
        }
        log!(self.mode.press_level(), "{} button pressed", self.name);
        self.queue.validate_and_put("open")
    }
}
