//! Outbound gate events.
//!
//! The [`GateController`](super::controller::GateController) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them, e.g. log them or record a history.

use std::time::Duration;

use super::commands::OperatingMode;
use crate::error::PersistenceError;
use crate::fsm::GateState;

/// Structured events emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum GateEvent {
    /// The gate moved between states.
    StateChanged { from: GateState, to: GateState },

    /// An accepted mode change.
    ModeChanged { from: OperatingMode, to: OperatingMode },

    /// The shunt tripped early while closing; a re-open was queued.
    Obstruction { after: Duration },

    /// A security timer elapsed; the motor was stopped.
    TravelTimeout(GateState),

    /// The shunt channel could not be read during a traversal.
    SensorUnavailable,

    /// The new mode is active but could not be written to disk.
    PersistenceFailed(PersistenceError),
}
