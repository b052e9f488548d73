//! System configuration parameters
//!
//! All tunable parameters for the gate. Values are loaded from a JSON file
//! at start-up; any field missing from the file keeps its default.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Security-timer multiplier applied to the expected travel time.
pub const MAX_TRAVEL_FACTOR: f32 = 1.2;
/// Fraction of the expected travel time before which a shunt trip while
/// closing counts as an obstruction.
pub const MIN_TRAVEL_FACTOR: f32 = 0.8;

/// Upper bound for any derived duration; keeps `Instant` arithmetic in range.
const MAX_DERIVED: Duration = Duration::from_secs(86_400);

/// Core gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    // --- Shunt ---
    /// Shunt voltage (V) above which the motor is considered stalled.
    pub shunt_threshold_volts: f32,
    /// Delay after energising the motor before the shunt is trusted (seconds).
    pub shunt_read_delay_secs: f32,

    // --- Travel ---
    /// Nominal time for a full open or close traversal (seconds).
    pub expected_time_to_open_close_secs: f32,
    /// How long the gate stays open before auto-closing (seconds).
    pub hold_open_time_secs: f32,
    /// Queue poll interval while the motor runs (milliseconds).
    pub travel_poll_interval_ms: u32,
    /// Queue poll interval while holding open (milliseconds).
    pub hold_poll_interval_ms: u32,

    // --- Hardware ---
    /// Motor relays energise on a HIGH output.
    pub motor_active_high: bool,
    /// Minimum spacing between accepted presses of one button (milliseconds).
    pub button_debounce_ms: u32,
    /// Serial device of the analog microcontroller.
    pub serial_port: String,
    pub serial_baud: u32,
    /// 8-character key shared with the 433 MHz receiver.
    pub radio_key: Option<String>,

    // --- Files ---
    /// Persisted operating mode.
    pub mode_file: String,
    /// Named pipe accepting command lines.
    pub fifo_file: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            // Shunt is 0.01R
            shunt_threshold_volts: 0.04,
            shunt_read_delay_secs: 0.5,

            // Travel
            expected_time_to_open_close_secs: 25.0,
            hold_open_time_secs: 10.0,
            travel_poll_interval_ms: 20,
            hold_poll_interval_ms: 250,

            // Hardware
            motor_active_high: false,
            button_debounce_ms: 200,
            serial_port: "/dev/ttyUSB0".into(),
            serial_baud: 115_200,
            radio_key: None,

            // Files
            mode_file: "saved_mode.txt".into(),
            fifo_file: "pipe".into(),
        }
    }
}

impl GateConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound,
            kind => ConfigError::Io(kind),
        })?;
        serde_json::from_str(&raw).map_err(|_| ConfigError::Corrupted)
    }

    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.shunt_threshold_volts > 0.0 && self.shunt_threshold_volts < 5.0) {
            return Err(ConfigError::ValidationFailed(
                "shunt_threshold_volts must be in (0, 5) V",
            ));
        }
        if !(0.0..=5.0).contains(&self.shunt_read_delay_secs) {
            return Err(ConfigError::ValidationFailed(
                "shunt_read_delay_secs must be in [0, 5] s",
            ));
        }
        if !(self.expected_time_to_open_close_secs > 0.0
            && self.expected_time_to_open_close_secs <= 300.0)
        {
            return Err(ConfigError::ValidationFailed(
                "expected_time_to_open_close_secs must be in (0, 300] s",
            ));
        }
        if self.shunt_read_delay_secs >= self.max_time_to_open_close().as_secs_f32() {
            return Err(ConfigError::ValidationFailed(
                "shunt_read_delay_secs must be shorter than the security timer",
            ));
        }
        if !(self.hold_open_time_secs > 0.0 && self.hold_open_time_secs <= 3600.0) {
            return Err(ConfigError::ValidationFailed(
                "hold_open_time_secs must be in (0, 3600] s",
            ));
        }
        if !(1..=100).contains(&self.travel_poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "travel_poll_interval_ms must be in [1, 100]",
            ));
        }
        if !(1..=250).contains(&self.hold_poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "hold_poll_interval_ms must be in [1, 250]",
            ));
        }
        if let Some(key) = &self.radio_key {
            if key.trim().len() != 8 {
                return Err(ConfigError::ValidationFailed(
                    "radio_key must be exactly 8 characters",
                ));
            }
        }
        if self.mode_file.is_empty() || self.fifo_file.is_empty() {
            return Err(ConfigError::ValidationFailed("file paths must not be empty"));
        }
        Ok(())
    }

    // ── Derived timings ───────────────────────────────────────

    /// Security timer for one traversal.
    pub fn max_time_to_open_close(&self) -> Duration {
        seconds(self.expected_time_to_open_close_secs * MAX_TRAVEL_FACTOR)
    }

    /// Earliest time a shunt trip while closing means "closed".
    pub fn min_time_to_open_close(&self) -> Duration {
        seconds(self.expected_time_to_open_close_secs * MIN_TRAVEL_FACTOR)
    }

    pub fn shunt_read_delay(&self) -> Duration {
        seconds(self.shunt_read_delay_secs)
    }

    pub fn hold_open_time(&self) -> Duration {
        seconds(self.hold_open_time_secs)
    }

    pub fn travel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.travel_poll_interval_ms.into())
    }

    pub fn hold_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hold_poll_interval_ms.into())
    }

    pub fn button_debounce(&self) -> Duration {
        Duration::from_millis(self.button_debounce_ms.into())
    }
}

/// Negative and non-finite seconds become zero, so an unvalidated config
/// yields an immediately expiring timer instead of a panic.
fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs)
        .unwrap_or(Duration::ZERO)
        .min(MAX_DERIVED)
}
