//! Simulated digital output for host builds.
//!
//! Clones share the same level, so a test (or the simulator log) can keep a
//! probe while the motor driver owns the pin.

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin};
use log::trace;

#[derive(Debug, Clone)]
pub struct SimPin {
    name: &'static str,
    level: Arc<AtomicBool>,
}

impl SimPin {
    /// New pin, initially low.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        trace!("{} low", self.name);
        self.level.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        trace!("{} high", self.name);
        self.level.store(true, Ordering::Release);
        Ok(())
    }
}
