//! Dispatcher: the single consumer of the command queue.
//!
//! Chooses which controller operation runs next from the current mode and
//! the queue content. In the normal modes one `open` drives a full cycle
//! (open, hold, close); the lock modes drive the gate once and then only
//! listen for the next mode token.

use std::ops::ControlFlow;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::commands::{Command, OperatingMode};
use super::controller::GateController;
use super::ports::{AnalogSource, EventSink, ModeStore, MotorPort};
use super::queue::CommandQueue;
use crate::fsm::GateState;

pub struct Dispatcher<M, A, S, E> {
    controller: GateController<M, A, S, E>,
    queue: Arc<CommandQueue>,
}

impl<M, A, S, E> Dispatcher<M, A, S, E>
where
    M: MotorPort,
    A: AnalogSource,
    S: ModeStore,
    E: EventSink,
{
    pub fn new(controller: GateController<M, A, S, E>) -> Self {
        let queue = Arc::clone(controller.queue());
        Self { controller, queue }
    }

    /// Run until the queue is shut down. The motor is stopped on exit.
    pub fn run(&mut self) {
        info!("Dispatcher running, mode={}", self.controller.mode());
        while self.step().is_continue() {}
        self.controller.stop();
        info!("Dispatcher stopped");
    }

    /// One pass of the dispatch loop. `Break` means the queue was shut down.
    pub fn step(&mut self) -> ControlFlow<()> {
        match self.controller.mode() {
            OperatingMode::NormalHome | OperatingMode::NormalAway => self.normal_cycle(),
            OperatingMode::LockClosed => self.lock_closed(),
            OperatingMode::LockOpen => self.lock_open(),
        }
    }

    pub fn controller(&self) -> &GateController<M, A, S, E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut GateController<M, A, S, E> {
        &mut self.controller
    }

    pub fn into_controller(self) -> GateController<M, A, S, E> {
        self.controller
    }

    fn normal_cycle(&mut self) -> ControlFlow<()> {
        let Some(job) = self.queue.get() else {
            return ControlFlow::Break(());
        };
        if let Command::Mode(mode) = job {
            self.change_mode(mode);
            return ControlFlow::Continue(());
        }

        if job == Command::Open {
            self.controller.begin_cycle();
            let dropped = self.queue.clear();
            if dropped > 0 {
                debug!("Dropped {dropped} queued commands for fresh cycle");
            }
        }
        if self.controller.state() == GateState::Opening {
            self.controller.open();
        }
        if self.controller.state() == GateState::Opened {
            self.controller.hold();
        }
        if self.controller.state() == GateState::Holding {
            self.controller.close();
        }
        ControlFlow::Continue(())
    }

    fn lock_closed(&mut self) -> ControlFlow<()> {
        self.controller.close();
        while self.controller.mode() == OperatingMode::LockClosed {
            let Some(job) = self.queue.get() else {
                return ControlFlow::Break(());
            };
            match job {
                Command::Mode(mode) => self.change_mode(mode),
                other => debug!("Ignoring {other} while locked closed"),
            }
        }
        ControlFlow::Continue(())
    }

    fn lock_open(&mut self) -> ControlFlow<()> {
        self.controller.open();
        while self.controller.mode() == OperatingMode::LockOpen {
            let Some(job) = self.queue.get() else {
                return ControlFlow::Break(());
            };
            match job {
                Command::Mode(mode) => {
                    // Leaving the lock through a normal mode runs a full
                    // cycle so the gate ends up closed.
                    if mode.is_normal() {
                        self.queue_open();
                    }
                    self.change_mode(mode);
                }
                other => debug!("Ignoring {other} while locked open"),
            }
        }
        ControlFlow::Continue(())
    }

    /// Enqueue `open` from the consumer thread without risking a block on
    /// a full queue.
    fn queue_open(&self) {
        if let Err(cmd) = self.queue.try_put(Command::Open) {
            warn!("Queue full, replacing backlog with {cmd}");
            self.queue.supersede(cmd);
        }
    }

    fn change_mode(&mut self, mode: OperatingMode) {
        if let Err(e) = self.controller.set_mode(mode) {
            error!("Mode {mode} is active but was not saved: {e}");
        }
    }
}
