//! GPIO pin assignments (BCM numbering) and analog channel map for the
//! gate controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Motor relays
// ---------------------------------------------------------------------------

/// Relay 0: energised while closing.
pub const MOTOR_PIN0: u8 = 23;
/// Relay 1: energised while opening.
pub const MOTOR_PIN1: u8 = 24;

// ---------------------------------------------------------------------------
// Push buttons (active-low, internal pull-up)
// ---------------------------------------------------------------------------

pub const BUTTON_OUTSIDE_PIN: u8 = 27;
pub const BUTTON_INSIDE_PIN: u8 = 22;
pub const BUTTON_BOX_PIN: u8 = 17;

/// All buttons with the label used in log output.
pub const BUTTONS: [(u8, &str); 3] = [
    (BUTTON_OUTSIDE_PIN, "outside"),
    (BUTTON_INSIDE_PIN, "inside"),
    (BUTTON_BOX_PIN, "box"),
];

/// Label for a button pin, `None` if the pin is not a gate button.
pub fn button_name(pin: u8) -> Option<&'static str> {
    BUTTONS.iter().find(|(p, _)| *p == pin).map(|(_, name)| *name)
}

// ---------------------------------------------------------------------------
// Analog microcontroller channels
// ---------------------------------------------------------------------------

/// Number of analog inputs reported in every voltage frame.
pub const ANALOG_CHANNELS: usize = 6;

/// Motor current shunt (0.01 Ω).
pub const SHUNT_CHANNEL: u8 = 0;
/// Battery voltage through a 10k/1k divider.
pub const BATTERY_CHANNEL: u8 = 5;
