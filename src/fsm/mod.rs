//! Gate position state.
//!
//! Unlike a tick-driven FSM, the gate's transitions happen inside the
//! blocking `open` / `close` / `hold` operations of the
//! [`GateController`](crate::app::controller::GateController). This module
//! only names the states and their properties.
//!
//! ```text
//!  UNKNOWN ──open──▶ OPENING ──[shunt]──▶ OPENED ──▶ HOLDING ──▶ CLOSING
//!                      │  │                            ▲  ▲        │ │ │
//!                      │  └──[close cmd]───────────────┘  │        │ │ │
//!                      │                                  │ [shunt ≥ min]
//!                [timer]                                  │        ▼ │ │
//!                      ▼                                  │     CLOSED │
//!               OPEN_TIME_ERROR                           │          │ │
//!                                       STOPPED ◀──[shunt < min | open cmd]
//!                                                                      │
//!                                                 CLOSE_TIME_ERROR ◀[timer]
//! ```

use core::fmt;

/// Enumeration of all gate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    Unknown,
    Opening,
    Opened,
    Holding,
    Closing,
    Closed,
    OpenTimeError,
    CloseTimeError,
    /// Motor halted mid-travel; a re-open has been queued.
    Stopped,
}

impl GateState {
    /// Human-readable name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Opening => "opening",
            Self::Opened => "opened",
            Self::Holding => "holding",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::OpenTimeError => "open time error",
            Self::CloseTimeError => "close time error",
            Self::Stopped => "stopped",
        }
    }

    /// The motor is (or should be) energised in this state.
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    /// A security timer expired during the last traversal.
    pub const fn is_fault(self) -> bool {
        matches!(self, Self::OpenTimeError | Self::CloseTimeError)
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
