//! Process signals to cooperative shutdown.
//!
//! A terminating signal shuts the [`CommandQueue`] down instead of killing
//! the process, so the dispatcher leaves any traversal through
//! `GateController::stop` and the relays are released before `main` returns.

use std::ffi::c_int;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::app::queue::CommandQueue;

/// Ctrl-C, `systemctl stop` and a closed controlling terminal.
pub const SHUTDOWN_SIGNALS: [c_int; 3] = [SIGINT, SIGTERM, SIGHUP];

/// Install handlers for `signals` and start the watcher thread.
///
/// The handlers stay installed for the life of the process; repeated
/// signals during shutdown are logged and otherwise ignored.
pub fn spawn_signal_watcher(
    signals: &[c_int],
    queue: Arc<CommandQueue>,
) -> io::Result<JoinHandle<()>> {
    let mut signals = Signals::new(signals)?;
    thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || {
            for signal in signals.forever() {
                if queue.is_shutdown() {
                    warn!("Signal {signal} ignored, already shutting down");
                    continue;
                }
                info!("Signal {signal} received, stopping the gate");
                queue.shutdown();
            }
        })
}
