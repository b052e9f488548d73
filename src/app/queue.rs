//! Bounded command queue shared by every producer and the dispatcher.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ Buttons     │────▶│                  │     │              │
//! │ Named pipe  │────▶│  CommandQueue    │────▶│  Dispatcher  │
//! │ Radio / MCU │────▶│  (Mutex+Condvar) │     │  (consumer)  │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! Storage is a fixed-capacity `heapless::Deque`; a mutex and two condition
//! variables give blocking `put`/`get` with prompt wake-ups. Only validated
//! [`Command`]s can be stored, raw text goes through [`CommandQueue::validate_and_put`].

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use heapless::Deque;
use log::{debug, warn};

use super::commands::Command;

/// Maximum number of pending commands.
pub const QUEUE_CAPACITY: usize = 10;

/// Returned by blocking operations once [`CommandQueue::shutdown`] was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

struct Inner {
    jobs: Deque<Command, QUEUE_CAPACITY>,
    closed: bool,
}

pub struct CommandQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: Deque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    // ── Producers ─────────────────────────────────────────────

    /// Append a command, blocking while the queue is full.
    pub fn put(&self, cmd: Command) -> Result<(), QueueClosed> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return Err(QueueClosed);
            }
            if !inner.jobs.is_full() {
                break;
            }
            inner = self
                .not_full
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let _ = inner.jobs.push_back(cmd);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append without blocking. Hands the command back if the queue is
    /// full or shut down.
    pub fn try_put(&self, cmd: Command) -> Result<(), Command> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(cmd);
        }
        inner.jobs.push_back(cmd)?;
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Parse raw producer input and enqueue it if it is a valid command.
    ///
    /// Invalid input is logged and dropped; it never reaches the caller as
    /// an error. Returns whether a command was enqueued.
    pub fn validate_and_put(&self, raw: &str) -> bool {
        let Some(cmd) = Command::parse(raw) else {
            warn!("{:?} is not a valid command for queue", raw.trim());
            return false;
        };
        match self.put(cmd) {
            Ok(()) => true,
            Err(QueueClosed) => {
                debug!("queue shut down, dropping {cmd}");
                false
            }
        }
    }

    // ── Consumer ──────────────────────────────────────────────

    /// Pop the oldest command, blocking until one arrives.
    /// Returns `None` once the queue has been shut down.
    pub fn get(&self) -> Option<Command> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(cmd) = inner.jobs.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(cmd);
            }
            inner = self
                .not_empty
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Pop the oldest command if there is one. Never blocks.
    pub fn try_get(&self) -> Option<Command> {
        let cmd = self.lock().jobs.pop_front();
        if cmd.is_some() {
            self.not_full.notify_one();
        }
        cmd
    }

    /// Pop the oldest command, waiting at most `timeout` for one to arrive.
    ///
    /// This is the poll primitive of the travel and hold loops: it returns
    /// as soon as a command is available and otherwise bounds the wait.
    pub fn get_timeout(&self, timeout: Duration) -> Option<Command> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if let Some(cmd) = inner.jobs.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(cmd);
            }
            if inner.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            inner = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // ── Bulk operations ───────────────────────────────────────

    /// Atomically drop every pending command. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.jobs.len();
        inner.jobs.clear();
        drop(inner);
        self.not_full.notify_all();
        dropped
    }

    /// Atomically replace the whole backlog with a single command.
    ///
    /// Used by the controller for synthetic re-opens: it runs on the
    /// consumer thread, so it must never block on a full queue.
    pub fn supersede(&self, cmd: Command) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.jobs.clear();
        let _ = inner.jobs.push_back(cmd);
        drop(inner);
        self.not_empty.notify_one();
        self.not_full.notify_all();
    }

    /// Put commands back at the head of the queue, preserving their order.
    /// Commands that no longer fit are dropped with a warning.
    pub fn requeue_front(&self, cmds: &[Command]) {
        if cmds.is_empty() {
            return;
        }
        let mut inner = self.lock();
        for cmd in cmds.iter().rev() {
            if inner.jobs.push_front(*cmd).is_err() {
                warn!("queue full, dropping deferred {cmd}");
            }
        }
        drop(inner);
        self.not_empty.notify_one();
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Close the queue: wakes every blocked producer and consumer, after
    /// which `get` returns `None` and `put` fails.
    pub fn shutdown(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().closed
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    /// Copy of the pending commands, oldest first.
    pub fn snapshot(&self) -> Vec<Command> {
        self.lock().jobs.iter().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
