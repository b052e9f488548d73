//! Shared read-only view of the current operating mode.
//!
//! Producers (buttons, the microcontroller bridge) never change the mode,
//! but they report presses louder while the owners are away. The
//! controller publishes every mode it applies; producers hold clones.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use log::Level;

use super::commands::OperatingMode;

#[derive(Debug, Clone, Default)]
pub struct ModeWatch(Arc<AtomicU8>);

impl ModeWatch {
    pub fn new(mode: OperatingMode) -> Self {
        let watch = Self::default();
        watch.publish(mode);
        watch
    }

    pub fn publish(&self, mode: OperatingMode) {
        let index = OperatingMode::ALL
            .iter()
            .position(|m| *m == mode)
            .unwrap_or_default();
        self.0.store(index as u8, Ordering::Release);
    }

    pub fn current(&self) -> OperatingMode {
        let index = self.0.load(Ordering::Acquire) as usize;
        OperatingMode::ALL.get(index).copied().unwrap_or_default()
    }

    /// Log level for a press or remote trigger: `Warn` in `normal_away`.
    pub fn press_level(&self) -> Level {
        match self.current() {
            OperatingMode::NormalAway => Level::Warn,
            _ => Level::Info,
        }
    }
}
