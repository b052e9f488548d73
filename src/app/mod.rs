//! Application core: gate logic behind port traits.
//!
//! This module contains the rules of the gate: the command vocabulary, the
//! bounded command queue, the controller state machine and the dispatch
//! loop. All interaction with hardware happens through **port traits**
//! defined in [`ports`], keeping this layer testable without a motor, a
//! microcontroller or a filesystem.

pub mod commands;
pub mod controller;
pub mod dispatcher;
pub mod events;
pub mod mode_watch;
pub mod ports;
pub mod queue;
