//! Gate controller: the state machine.
//!
//! [`GateController`] owns the motor, the shunt source, the mode store and
//! a handle to the shared [`CommandQueue`]. Its operations block for the
//! duration of a traversal or hold and return with [`GateState`] describing
//! the outcome; nothing is ever propagated to the caller as an error except
//! a failed mode write.
//!
//! ```text
//!  MotorPort ◀──┐   ┌─────────────────────────┐
//!               ├── │     GateController      │ ──▶ EventSink
//! AnalogSource ─┘   │ open · close · hold     │
//!   ModeStore ◀───▶ │ mode_change             │ ◀── CommandQueue (poll)
//!                   └─────────────────────────┘
//! ```
//!
//! Only the dispatcher thread may call the mutating operations; producers
//! interact with the controller exclusively through the queue.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::commands::{Command, OperatingMode};
use super::events::GateEvent;
use super::mode_watch::ModeWatch;
use super::ports::{AnalogSource, EventSink, ModeStore, MotorPort};
use super::queue::CommandQueue;
use crate::config::GateConfig;
use crate::error::PersistenceError;
use crate::fsm::GateState;
use crate::pins;
use crate::safety::{CloseTrip, TravelGuard, TravelTiming};

/// Result of a textual mode change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    /// The mode is now active and persisted.
    Applied(OperatingMode),
    /// The token was not a valid mode; nothing changed.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Travel {
    Open,
    Close,
}

/// What one bounded poll of the queue produced during a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Poll {
    Idle,
    Preempted,
    Shutdown,
}

pub struct GateController<M, A, S, E> {
    motor: M,
    analog: A,
    store: S,
    sink: E,
    queue: Arc<CommandQueue>,
    timing: TravelTiming,
    shunt_channel: u8,
    state: GateState,
    mode: OperatingMode,
    mode_watch: ModeWatch,
    /// Mode tokens seen mid-operation, handed back to the queue afterwards.
    deferred: Vec<Command>,
}

impl<M, A, S, E> GateController<M, A, S, E>
where
    M: MotorPort,
    A: AnalogSource,
    S: ModeStore,
    E: EventSink,
{
    /// Build the controller and restore the persisted operating mode.
    ///
    /// The motor is left untouched and the state is `Unknown` until the
    /// first operation runs. An invalid `config` is reported but not
    /// refused; its out-of-range timings collapse to zero, so every
    /// traversal ends at the security timer.
    pub fn new(
        config: &GateConfig,
        motor: M,
        analog: A,
        store: S,
        sink: E,
        queue: Arc<CommandQueue>,
    ) -> Self {
        if let Err(e) = config.validate() {
            warn!("Gate config rejected by validation ({e}), running anyway");
        }
        let mode = restore_mode(&store);
        info!("Gate controller ready, mode={mode}");
        Self {
            motor,
            analog,
            store,
            sink,
            queue,
            timing: TravelTiming::from_config(config),
            shunt_channel: pins::SHUNT_CHANNEL,
            state: GateState::Unknown,
            mode,
            mode_watch: ModeWatch::new(mode),
            deferred: Vec::new(),
        }
    }

    /// Publish the current mode through `watch` from now on.
    pub fn with_mode_watch(mut self, watch: ModeWatch) -> Self {
        watch.publish(self.mode);
        self.mode_watch = watch;
        self
    }

    // ── Operations ────────────────────────────────────────────

    /// Drive the gate open until the shunt trips, the security timer
    /// elapses, or a `close` command pre-empts the traversal.
    ///
    /// | Outcome          | Motor   | State           |
    /// |------------------|---------|-----------------|
    /// | shunt tripped    | stopped | `Opened`        |
    /// | timer elapsed    | stopped | `OpenTimeError` |
    /// | `close` received | stopped | `Holding`       |
    /// | queue shut down  | stopped | `Stopped`       |
    pub fn open(&mut self) {
        let guard = TravelGuard::arm(&self.timing, Instant::now());
        self.set_state(GateState::Opening);
        self.drive(Travel::Open);
        thread::sleep(self.timing.shunt_read_delay);

        let mut sensor_ok = true;
        loop {
            // Open end-stop and an obstruction while opening look the same.
            if let Some(volts) = self.sample_shunt(&mut sensor_ok) {
                if guard.tripped(volts) {
                    debug!("Shunt threshold exceeded: {volts:.4} V");
                    self.halt();
                    self.set_state(GateState::Opened);
                    break;
                }
            }

            let now = Instant::now();
            if guard.expired(now) {
                self.halt();
                error!("Open security timer has elapsed");
                self.set_state(GateState::OpenTimeError);
                self.sink
                    .emit(&GateEvent::TravelTimeout(GateState::OpenTimeError));
                break;
            }

            // `Holding` sends the dispatcher straight on to close().
            match self.poll_for(Command::Close, self.poll_window(&guard, now)) {
                Poll::Idle => {}
                Poll::Preempted => {
                    info!("Close requested while opening");
                    self.halt();
                    self.set_state(GateState::Holding);
                    break;
                }
                Poll::Shutdown => {
                    self.halt();
                    self.set_state(GateState::Stopped);
                    break;
                }
            }
        }
        self.restore_deferred();
    }

    /// Drive the gate closed.
    ///
    /// A shunt trip before the minimum travel time is an obstruction: the
    /// motor stops, a synthetic `open` joins the back of the queue and the
    /// state becomes `Stopped`. An `open` command received while closing
    /// does the same.
    pub fn close(&mut self) {
        let guard = TravelGuard::arm(&self.timing, Instant::now());
        self.set_state(GateState::Closing);
        self.drive(Travel::Close);
        thread::sleep(self.timing.shunt_read_delay);

        let mut sensor_ok = true;
        loop {
            if let Some(volts) = self.sample_shunt(&mut sensor_ok) {
                if guard.tripped(volts) {
                    debug!("Shunt threshold exceeded: {volts:.4} V");
                    self.halt();
                    let now = Instant::now();
                    match guard.classify_close_trip(now) {
                        CloseTrip::Obstruction => {
                            warn!("Gate has hit something whilst closing");
                            debug!("Reopening gate due to hit");
                            self.sink.emit(&GateEvent::Obstruction {
                                after: guard.elapsed(now),
                            });
                            self.reopen();
                            self.set_state(GateState::Stopped);
                        }
                        CloseTrip::EndStop => {
                            self.set_state(GateState::Closed);
                            debug!("Gate closed");
                        }
                    }
                    break;
                }
            }

            let now = Instant::now();
            if guard.expired(now) {
                self.halt();
                error!("Close security timer has elapsed");
                self.set_state(GateState::CloseTimeError);
                self.sink
                    .emit(&GateEvent::TravelTimeout(GateState::CloseTimeError));
                break;
            }

            match self.poll_for(Command::Open, self.poll_window(&guard, now)) {
                Poll::Idle => {}
                Poll::Preempted => {
                    info!("Open requested while closing");
                    self.halt();
                    self.reopen();
                    self.set_state(GateState::Stopped);
                    break;
                }
                Poll::Shutdown => {
                    self.halt();
                    self.set_state(GateState::Stopped);
                    break;
                }
            }
        }
        self.restore_deferred();
    }

    /// Keep the gate open for the hold time.
    ///
    /// Every `open` seen restarts the full hold window; a `close` ends the
    /// hold at once. The state stays `Holding` on return so the dispatcher
    /// closes the gate next.
    pub fn hold(&mut self) {
        self.set_state(GateState::Holding);
        let mut until = Instant::now() + self.timing.hold_open;
        loop {
            let now = Instant::now();
            if now >= until {
                break;
            }
            match self.queue.get_timeout(self.timing.hold_poll.min(until - now)) {
                Some(Command::Open) => {
                    debug!("Hold extended by open request");
                    until = Instant::now() + self.timing.hold_open;
                }
                Some(Command::Close) => {
                    debug!("Close requested, ending hold early");
                    break;
                }
                Some(cmd) => self.defer(cmd),
                None if self.queue.is_shutdown() => break,
                None => {}
            }
        }
        self.restore_deferred();
    }

    /// Apply a textual mode change request.
    ///
    /// Invalid tokens are logged and rejected without touching the current
    /// mode. A valid token always changes the in-memory mode; the error case
    /// means the change was not persisted.
    pub fn mode_change(&mut self, token: &str) -> Result<ModeChange, PersistenceError> {
        match OperatingMode::from_token(token.trim()) {
            Some(mode) => self.set_mode(mode).map(|()| ModeChange::Applied(mode)),
            None => {
                warn!("Invalid mode_change attempted: {:?}", token);
                Ok(ModeChange::Rejected)
            }
        }
    }

    /// Make `mode` current and persist it before returning.
    pub fn set_mode(&mut self, mode: OperatingMode) -> Result<(), PersistenceError> {
        let previous = self.mode;
        self.mode = mode;
        self.mode_watch.publish(mode);
        if previous != mode {
            self.sink.emit(&GateEvent::ModeChanged {
                from: previous,
                to: mode,
            });
        }
        info!("Changed gate mode to: {mode}");
        self.store.save(mode.token()).map_err(|e| {
            self.sink.emit(&GateEvent::PersistenceFailed(e));
            e
        })
    }

    /// De-energise the motor outside of a traversal (shutdown path).
    pub fn stop(&mut self) {
        self.halt();
        if self.state.is_moving() {
            self.set_state(GateState::Stopped);
        }
    }

    /// Mark the start of a fresh top-level open cycle.
    pub(crate) fn begin_cycle(&mut self) {
        self.set_state(GateState::Opening);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn mode_watch(&self) -> &ModeWatch {
        &self.mode_watch
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn analog_mut(&mut self) -> &mut A {
        &mut self.analog
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    // ── Internal ──────────────────────────────────────────────

    fn set_state(&mut self, to: GateState) {
        let from = self.state;
        if from != to {
            debug!("Gate state {from} -> {to}");
            self.state = to;
            self.sink.emit(&GateEvent::StateChanged { from, to });
        }
    }

    fn drive(&mut self, towards: Travel) {
        let result = match towards {
            Travel::Open => {
                debug!("opening gate motor");
                self.motor.forward()
            }
            Travel::Close => {
                debug!("closing gate motor");
                self.motor.reverse()
            }
        };
        if let Err(e) = result {
            error!("Motor drive failed ({e}), security timer will stop the traversal");
        }
    }

    fn halt(&mut self) {
        debug!("stopping gate motor");
        if let Err(e) = self.motor.stop() {
            error!("Motor stop failed: {e}");
        }
    }

    /// Read the shunt. A failed read counts as "not tripped"; the first
    /// failure of an outage is reported, later ones are silent.
    fn sample_shunt(&mut self, sensor_ok: &mut bool) -> Option<f32> {
        match self.analog.read(self.shunt_channel) {
            Ok(volts) => {
                *sensor_ok = true;
                Some(volts)
            }
            Err(e) => {
                if *sensor_ok {
                    warn!("Shunt read failed ({e}), relying on security timer");
                    self.sink.emit(&GateEvent::SensorUnavailable);
                    *sensor_ok = false;
                }
                None
            }
        }
    }

    /// Poll interval, shortened so the wait never overruns the security timer.
    fn poll_window(&self, guard: &TravelGuard, now: Instant) -> Duration {
        self.timing.travel_poll.min(guard.remaining(now))
    }

    fn poll_for(&mut self, wanted: Command, timeout: Duration) -> Poll {
        match self.queue.get_timeout(timeout) {
            Some(cmd) if cmd == wanted => Poll::Preempted,
            Some(cmd) => {
                self.defer(cmd);
                Poll::Idle
            }
            None if self.queue.is_shutdown() => Poll::Shutdown,
            None => Poll::Idle,
        }
    }

    /// Queue the synthetic `open` behind whatever producers already queued.
    /// Only a full queue loses its backlog.
    fn reopen(&self) {
        if let Err(cmd) = self.queue.try_put(Command::Open) {
            warn!("Queue full, replacing backlog with {cmd}");
            self.queue.supersede(cmd);
        }
    }

    /// Mode tokens survive an operation; repeated open/close presses do not.
    fn defer(&mut self, cmd: Command) {
        if cmd.is_mode() {
            debug!("Deferring {cmd} until the gate is idle");
            self.deferred.push(cmd);
        } else {
            debug!("Ignoring {cmd} while {}", self.state);
        }
    }

    fn restore_deferred(&mut self) {
        if !self.deferred.is_empty() {
            self.queue.requeue_front(&self.deferred);
            self.deferred.clear();
        }
    }
}

/// Read the persisted mode, falling back to the default on any problem.
fn restore_mode(store: &impl ModeStore) -> OperatingMode {
    let fallback = OperatingMode::default();
    match store.load() {
        Ok(Some(raw)) => match OperatingMode::from_token(raw.trim()) {
            Some(mode) => mode,
            None => {
                warn!("Invalid saved mode value: {:?}", raw.trim());
                warn!("Setting mode to the default: {fallback}");
                fallback
            }
        },
        Ok(None) => {
            warn!("Saved mode file not found, using {fallback}");
            fallback
        }
        Err(e) => {
            warn!("Saved mode unreadable ({e}), using {fallback}");
            fallback
        }
    }
}
