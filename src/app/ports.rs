//! Port traits: the boundary between gate logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GateController (domain)
//! ```
//!
//! Driven adapters (analog acquisition, motor relays, mode file, event
//! sinks) implement these traits. The controller consumes them via
//! generics, so the state machine never touches hardware directly and
//! every implementation is chosen once, at construction.

use crate::error::{ActuatorError, PersistenceError, SensorError};

// ───────────────────────────────────────────────────────────────
// Analog source (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for analog voltages (shunt, battery).
pub trait AnalogSource {
    /// Current voltage on `channel`, in volts.
    fn read(&mut self, channel: u8) -> Result<f32, SensorError>;
}

impl<A: AnalogSource + ?Sized> AnalogSource for Box<A> {
    fn read(&mut self, channel: u8) -> Result<f32, SensorError> {
        (**self).read(channel)
    }
}

// ───────────────────────────────────────────────────────────────
// Motor port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Two-output motor actuator. No speed control.
pub trait MotorPort {
    /// Drive the gate towards open.
    fn forward(&mut self) -> Result<(), ActuatorError>;

    /// Drive the gate towards closed.
    fn reverse(&mut self) -> Result<(), ActuatorError>;

    /// De-energise both outputs.
    fn stop(&mut self) -> Result<(), ActuatorError>;
}

impl<M: MotorPort + ?Sized> MotorPort for Box<M> {
    fn forward(&mut self) -> Result<(), ActuatorError> {
        (**self).forward()
    }

    fn reverse(&mut self) -> Result<(), ActuatorError> {
        (**self).reverse()
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        (**self).stop()
    }
}

// ───────────────────────────────────────────────────────────────
// Mode store (driven adapter: domain ↔ persistent storage)
// ───────────────────────────────────────────────────────────────

/// Persists the operating-mode token.
///
/// The store deals in raw text only; validating the token is the
/// controller's job so that a corrupt file always degrades to the default
/// mode rather than an error.
pub trait ModeStore {
    /// Raw persisted token, `Ok(None)` if nothing was ever saved.
    fn load(&self) -> Result<Option<String>, PersistenceError>;

    /// Replace the persisted token. Must not return before the write is durable.
    fn save(&mut self, token: &str) -> Result<(), PersistenceError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / history)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`GateEvent`](super::events::GateEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::GateEvent);
}
