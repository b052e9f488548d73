//! Gate motor driver (two relay outputs, no speed control).
//!
//! Direction is selected by which of the two outputs is energised:
//!
//! | Motion  | pin0 | pin1 |
//! |---------|------|------|
//! | stopped | off  | off  |
//! | forward | off  | on   |
//! | reverse | on   | off  |
//!
//! The opposing output is always released before the other one is
//! energised, so both relays are never on together.
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal::digital::OutputPin`: `rppal` output pins on
//! the Pi, [`SimPin`](super::sim_pin::SimPin)s on a host build.

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::app::ports::MotorPort;
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Forward,
    Reverse,
}

pub struct MotorDriver<P0, P1> {
    pin0: P0,
    pin1: P1,
    /// Relay boards on the gate switch on a low level.
    active_high: bool,
    state: MotorState,
}

impl<P0: OutputPin, P1: OutputPin> MotorDriver<P0, P1> {
    /// Take both outputs and release them immediately.
    pub fn new(pin0: P0, pin1: P1, active_high: bool) -> Result<Self, ActuatorError> {
        let mut driver = Self {
            pin0,
            pin1,
            active_high,
            state: MotorState::Stopped,
        };
        driver.release_both()?;
        Ok(driver)
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != MotorState::Stopped
    }

    /// Give the pins back, e.g. to inspect simulated levels.
    pub fn release(self) -> (P0, P1) {
        (self.pin0, self.pin1)
    }

    fn release_both(&mut self) -> Result<(), ActuatorError> {
        let r0 = drive(&mut self.pin0, false, self.active_high);
        let r1 = drive(&mut self.pin1, false, self.active_high);
        r0.and(r1)
    }
}

impl<P0: OutputPin, P1: OutputPin> MotorPort for MotorDriver<P0, P1> {
    fn forward(&mut self) -> Result<(), ActuatorError> {
        drive(&mut self.pin0, false, self.active_high)?;
        drive(&mut self.pin1, true, self.active_high)?;
        self.state = MotorState::Forward;
        debug!("motor forward");
        Ok(())
    }

    fn reverse(&mut self) -> Result<(), ActuatorError> {
        drive(&mut self.pin1, false, self.active_high)?;
        drive(&mut self.pin0, true, self.active_high)?;
        self.state = MotorState::Reverse;
        debug!("motor reverse");
        Ok(())
    }

    /// Both outputs are attempted even if the first write fails.
    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.state = MotorState::Stopped;
        self.release_both()
    }
}

fn drive<P: OutputPin>(pin: &mut P, on: bool, active_high: bool) -> Result<(), ActuatorError> {
    let result = if on == active_high {
        pin.set_high()
    } else {
        pin.set_low()
    };
    result.map_err(|_| ActuatorError::GpioWriteFailed)
}
