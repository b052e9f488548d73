//! Named-pipe command channel.
//!
//! Local scripts (cron jobs, the web front end) write command lines into a
//! FIFO; a reader thread feeds each line to the command queue. Opening a
//! FIFO for reading blocks until a writer appears, so the reader reopens
//! it after every writer closes instead of spinning on end-of-file.
//!
//! The line `kill` is not a gate command: it shuts the queue down, which
//! stops the dispatcher and ends the reader.

use std::ffi::CString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::app::queue::CommandQueue;

/// Line that shuts the controller down.
pub const KILL_LINE: &str = "kill";

const FIFO_MODE: libc::mode_t = 0o660;

/// How a batch of pipe input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeControl {
    /// The writer closed its end; reopen and keep listening.
    Eof,
    /// A `kill` line was read and the queue was shut down.
    Kill,
}

/// Feed every line of `reader` to the queue until end of input or `kill`.
pub fn pump_lines<R: BufRead>(reader: R, queue: &CommandQueue) -> PipeControl {
    for line in reader.lines() {
        match line {
            Ok(line) if line.trim() == KILL_LINE => {
                info!("Kill received on command pipe, shutting down");
                queue.shutdown();
                return PipeControl::Kill;
            }
            Ok(line) => {
                debug!("Pipe: {:?}", line.trim());
                queue.validate_and_put(&line);
            }
            Err(e) => {
                warn!("Command pipe read failed: {e}");
                break;
            }
        }
    }
    PipeControl::Eof
}

/// Create a FIFO at `path`, replacing whatever stale file is there.
pub fn create_fifo(path: &Path) -> io::Result<()> {
    remove_fifo(path)?;
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    debug!("Created command pipe {}", path.display());
    Ok(())
}

/// Delete the FIFO. A missing file is not an error.
pub fn remove_fifo(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Create the FIFO and start the reader thread.
pub fn spawn_fifo_reader(path: &Path, queue: Arc<CommandQueue>) -> io::Result<JoinHandle<()>> {
    create_fifo(path)?;
    let path: PathBuf = path.to_path_buf();
    thread::Builder::new()
        .name("fifo-reader".into())
        .spawn(move || read_fifo(&path, &queue))
}

fn read_fifo(path: &Path, queue: &CommandQueue) {
    info!("Listening for commands on {}", path.display());
    while !queue.is_shutdown() {
        let fifo = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("Cannot open command pipe {}: {e}", path.display());
                return;
            }
        };
        if pump_lines(BufReader::new(fifo), queue) == PipeControl::Kill {
            return;
        }
    }
}
