//! Actuator and input drivers.

pub mod button;
pub mod motor;
pub mod sim_pin;
