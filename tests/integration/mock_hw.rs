//! Mock gate hardware for integration tests.
//!
//! [`MockGate`] is a tiny physical model shared by a [`RecordingMotor`] and
//! a [`ScriptedAnalog`]: the shunt reads high once the motor has been
//! running in one direction for the configured travel time (the gate hit
//! its end-stop) or for the obstruction time while closing. Every motor
//! call is recorded so tests can assert on the full history.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use smartgate::app::controller::GateController;
use smartgate::app::dispatcher::Dispatcher;
use smartgate::app::events::GateEvent;
use smartgate::app::ports::{AnalogSource, EventSink, ModeStore, MotorPort};
use smartgate::app::queue::CommandQueue;
use smartgate::config::GateConfig;
use smartgate::error::{ActuatorError, PersistenceError, SensorError};
use smartgate::fsm::GateState;

/// Shunt voltage reported at an end-stop, well above the 0.04 V threshold.
pub const STALL_VOLTS: f32 = 0.5;

// ── Motor call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCall {
    Forward,
    Reverse,
    Stop,
}

// ── Shared gate model ─────────────────────────────────────────

#[derive(Debug)]
struct GateModel {
    calls: Vec<MotorCall>,
    running: Option<(MotorCall, Instant)>,
    travel: Duration,
    obstruct_close_after: Option<Duration>,
    stuck: bool,
    sensor_down: bool,
    motor_fails: bool,
}

#[derive(Debug, Clone)]
pub struct MockGate {
    model: Arc<Mutex<GateModel>>,
}

#[allow(dead_code)]
impl MockGate {
    /// Gate that reaches either end-stop after `travel` of motor time.
    pub fn new(travel: Duration) -> Self {
        Self {
            model: Arc::new(Mutex::new(GateModel {
                calls: Vec::new(),
                running: None,
                travel,
                obstruct_close_after: None,
                stuck: false,
                sensor_down: false,
                motor_fails: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateModel> {
        self.model.lock().unwrap()
    }

    /// Something blocks the gate `after` into every close.
    pub fn obstruct_close_after(&self, after: Duration) {
        self.lock().obstruct_close_after = Some(after);
    }

    /// The shunt never trips (broken end-stop, slipping clutch).
    pub fn set_stuck(&self, stuck: bool) {
        self.lock().stuck = stuck;
    }

    pub fn set_sensor_down(&self, down: bool) {
        self.lock().sensor_down = down;
    }

    /// Every forward/reverse write fails; stop still works.
    pub fn set_motor_fails(&self, fails: bool) {
        self.lock().motor_fails = fails;
    }

    pub fn calls(&self) -> Vec<MotorCall> {
        self.lock().calls.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running.is_some()
    }

    pub fn motor(&self) -> RecordingMotor {
        RecordingMotor(self.clone())
    }

    pub fn analog(&self) -> ScriptedAnalog {
        ScriptedAnalog(self.clone())
    }

    fn start(&self, direction: MotorCall) -> Result<(), ActuatorError> {
        let mut m = self.lock();
        m.calls.push(direction);
        if m.motor_fails {
            return Err(ActuatorError::GpioWriteFailed);
        }
        m.running = Some((direction, Instant::now()));
        Ok(())
    }
}

// ── MotorPort ─────────────────────────────────────────────────

pub struct RecordingMotor(MockGate);

impl MotorPort for RecordingMotor {
    fn forward(&mut self) -> Result<(), ActuatorError> {
        self.0.start(MotorCall::Forward)
    }

    fn reverse(&mut self) -> Result<(), ActuatorError> {
        self.0.start(MotorCall::Reverse)
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        let mut m = self.0.lock();
        m.calls.push(MotorCall::Stop);
        m.running = None;
        Ok(())
    }
}

// ── AnalogSource ──────────────────────────────────────────────

pub struct ScriptedAnalog(MockGate);

impl AnalogSource for ScriptedAnalog {
    fn read(&mut self, _channel: u8) -> Result<f32, SensorError> {
        let m = self.0.lock();
        if m.sensor_down {
            return Err(SensorError::Unavailable);
        }
        let Some((direction, since)) = m.running else {
            return Ok(0.0);
        };
        if m.stuck {
            return Ok(0.01);
        }
        let limit = match (direction, m.obstruct_close_after) {
            (MotorCall::Reverse, Some(after)) => after.min(m.travel),
            _ => m.travel,
        };
        Ok(if since.elapsed() >= limit { STALL_VOLTS } else { 0.01 })
    }
}

// ── ModeStore ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<(Option<String>, bool)>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn with(token: Option<&str>) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().0 = token.map(String::from);
        store
    }

    pub fn token(&self) -> Option<String> {
        self.inner.lock().unwrap().0.clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().1 = failing;
    }
}

impl ModeStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.token())
    }

    fn save(&mut self, token: &str) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.1 {
            return Err(PersistenceError::Io(std::io::ErrorKind::PermissionDenied));
        }
        inner.0 = Some(token.to_owned());
        Ok(())
    }
}

// ── EventSink ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<GateEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<GateEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &GateEvent) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == wanted).count()
    }

    pub fn reached(&self, state: GateState) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, GateEvent::StateChanged { to, .. } if *to == state))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &GateEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type TestController = GateController<RecordingMotor, ScriptedAnalog, MemoryStore, RecordingSink>;
#[allow(dead_code)]
pub type TestDispatcher = Dispatcher<RecordingMotor, ScriptedAnalog, MemoryStore, RecordingSink>;

/// Probes kept by the test while the controller owns the adapters.
pub struct Probes {
    pub gate: MockGate,
    pub store: MemoryStore,
    pub sink: RecordingSink,
    pub queue: Arc<CommandQueue>,
}

/// Short timings: 20 ms read delay, 5 ms travel poll, 10 ms hold poll.
pub fn fast_config(expected_secs: f32, hold_secs: f32) -> GateConfig {
    GateConfig {
        shunt_read_delay_secs: 0.02,
        expected_time_to_open_close_secs: expected_secs,
        hold_open_time_secs: hold_secs,
        travel_poll_interval_ms: 5,
        hold_poll_interval_ms: 10,
        ..GateConfig::default()
    }
}

pub fn controller(config: &GateConfig, travel: Duration, saved: Option<&str>) -> (TestController, Probes) {
    let gate = MockGate::new(travel);
    let store = MemoryStore::with(saved);
    let sink = RecordingSink::default();
    let queue = Arc::new(CommandQueue::new());
    let ctl = GateController::new(
        config,
        gate.motor(),
        gate.analog(),
        store.clone(),
        sink.clone(),
        Arc::clone(&queue),
    );
    (
        ctl,
        Probes {
            gate,
            store,
            sink,
            queue,
        },
    )
}

/// Poll `cond` until it holds or `timeout` passes.
#[allow(dead_code)]
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
