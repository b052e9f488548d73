//! Travel supervisor.
//!
//! Every open or close traversal is bounded by two guards evaluated on each
//! poll of the controller loop:
//!
//! 1. **Shunt threshold**: motor current above `shunt_threshold_volts`
//!    means the leaf has stopped moving (end-stop or obstruction).
//! 2. **Security timer**: `1.2 ×` the expected travel time. Exceeding it
//!    means a stalled motor, a mechanical failure, or a dead sensor.
//!
//! While closing, a shunt trip earlier than `0.8 ×` the expected travel
//! time cannot be the closed end-stop, so it is classified as an
//! obstruction and the gate re-opens.

use std::time::{Duration, Instant};

use crate::config::GateConfig;

/// Timing parameters shared by every traversal, derived once from config.
#[derive(Debug, Clone, Copy)]
pub struct TravelTiming {
    pub shunt_threshold_volts: f32,
    pub shunt_read_delay: Duration,
    pub max_travel: Duration,
    pub min_close: Duration,
    pub travel_poll: Duration,
    pub hold_open: Duration,
    pub hold_poll: Duration,
}

impl TravelTiming {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            shunt_threshold_volts: config.shunt_threshold_volts,
            shunt_read_delay: config.shunt_read_delay(),
            max_travel: config.max_time_to_open_close(),
            min_close: config.min_time_to_open_close(),
            travel_poll: config.travel_poll_interval(),
            hold_open: config.hold_open_time(),
            hold_poll: config.hold_poll_interval(),
        }
    }
}

/// What a shunt trip during closing means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrip {
    /// Tripped before the minimum travel time: something is in the way.
    Obstruction,
    /// Tripped at or after the minimum travel time: gate is shut.
    EndStop,
}

/// Guard for a single traversal, armed when the motor is energised.
#[derive(Debug, Clone, Copy)]
pub struct TravelGuard {
    started: Instant,
    deadline: Instant,
    min_close: Instant,
    threshold: f32,
}

impl TravelGuard {
    pub fn arm(timing: &TravelTiming, now: Instant) -> Self {
        Self {
            started: now,
            deadline: now + timing.max_travel,
            min_close: now + timing.min_close,
            threshold: timing.shunt_threshold_volts,
        }
    }

    /// Shunt voltage indicates the motor has stalled.
    pub fn tripped(&self, volts: f32) -> bool {
        volts > self.threshold
    }

    /// Security timer has elapsed.
    pub fn expired(&self, now: Instant) -> bool {
        now > self.deadline
    }

    pub fn classify_close_trip(&self, now: Instant) -> CloseTrip {
        if now < self.min_close {
            CloseTrip::Obstruction
        } else {
            CloseTrip::EndStop
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Time left on the security timer.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}
