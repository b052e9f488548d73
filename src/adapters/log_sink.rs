//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured gate events through the
//! `log` facade (routed to stdout by the binary's subscriber). A history
//! database or a notification adapter would implement the same trait.

use log::{error, info, warn};

use crate::app::events::GateEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`GateEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &GateEvent) {
        match event {
            GateEvent::StateChanged { from, to } => {
                info!("STATE | {from} -> {to}");
            }
            GateEvent::ModeChanged { from, to } => {
                info!("MODE  | {from} -> {to}");
            }
            GateEvent::Obstruction { after } => {
                warn!("OBSTR | hit after {:.2}s, re-opening", after.as_secs_f32());
            }
            GateEvent::TravelTimeout(state) => {
                error!("TIMER | security timer elapsed, state={state}");
            }
            GateEvent::SensorUnavailable => {
                warn!("SENSE | shunt unavailable");
            }
            GateEvent::PersistenceFailed(e) => {
                error!("STORE | {e}");
            }
        }
    }
}
