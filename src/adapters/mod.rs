//! Adapters: concrete implementations of the port traits and the
//! producer-side channels.
//!
//! | Adapter     | Implements | Connects to                 |
//! |-------------|------------|-----------------------------|
//! | `log_sink`  | EventSink  | `log` facade / stdout       |
//! | `mode_file` | ModeStore  | mode token file / in-memory |
//! | `pipe`      | (producer) | named FIFO → CommandQueue   |
//! | `signals`   | (producer) | SIGINT/SIGTERM → shutdown   |

pub mod log_sink;
pub mod mode_file;
pub mod pipe;
pub mod signals;
