//! SmartGate controller library.
//!
//! Exposes the gate logic and its adapters for the binary and for
//! integration testing. Raspberry Pi specific code is guarded by the
//! `rpi` feature; the default build runs against simulated hardware.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod safety;

pub mod adapters;
pub mod drivers;
pub mod sensors;
