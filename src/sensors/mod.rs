//! Analog acquisition: the [`AnalogSource`] implementations.
//!
//! | Source         | Backing                                   |
//! |----------------|-------------------------------------------|
//! | `SerialAnalog` | microcontroller over a serial line         |
//! | `MockAnalog`   | shared in-memory voltages (host / fallback) |
//!
//! One of them is chosen in `main` at start-up and handed to the
//! controller; nothing switches sources at runtime.

pub mod serial_analog;

use std::sync::{Arc, Mutex, PoisonError};

use crate::app::ports::AnalogSource;
use crate::error::SensorError;
use crate::pins::ANALOG_CHANNELS;

#[derive(Debug, Default)]
struct MockState {
    volts: [f32; ANALOG_CHANNELS],
    unavailable: bool,
}

/// In-memory analog source. Clones share the same voltages so a test or
/// a simulator can drive the shunt while the controller owns the source.
#[derive(Debug, Clone, Default)]
pub struct MockAnalog {
    state: Arc<Mutex<MockState>>,
}

impl MockAnalog {
    /// All channels at 0 V.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the voltage on `channel`. Out-of-range channels are ignored.
    pub fn set(&self, channel: u8, volts: f32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = state.volts.get_mut(usize::from(channel)) {
            *slot = volts;
        }
    }

    /// Make every read fail with [`SensorError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }
}

impl AnalogSource for MockAnalog {
    fn read(&mut self, channel: u8) -> Result<f32, SensorError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.unavailable {
            return Err(SensorError::Unavailable);
        }
        state
            .volts
            .get(usize::from(channel))
            .copied()
            .ok_or(SensorError::InvalidChannel(channel))
    }
}
