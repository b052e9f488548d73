//! Dispatcher loop: normal cycles, lock modes and shutdown.

use std::thread;
use std::time::Duration;

use smartgate::app::commands::OperatingMode;
use smartgate::app::events::GateEvent;
use smartgate::fsm::GateState;

use crate::mock_hw::{
    MotorCall, Probes, TestController, TestDispatcher, controller, fast_config, wait_for,
};

const TRAVEL: Duration = Duration::from_millis(200);
const PATIENCE: Duration = Duration::from_secs(5);

/// Expected travel 0.24 s: the 0.2 s travel lands inside [0.192 s, 0.288 s].
fn dispatcher(saved: Option<&str>) -> (TestDispatcher, Probes) {
    let (ctl, probes) = controller(&fast_config(0.24, 0.1), TRAVEL, saved);
    (TestDispatcher::new(ctl), probes)
}

fn spawn(mut d: TestDispatcher) -> thread::JoinHandle<TestController> {
    thread::spawn(move || {
        d.run();
        d.into_controller()
    })
}

#[test]
fn open_runs_a_full_cycle() {
    let (mut d, probes) = dispatcher(None);
    probes.queue.validate_and_put("open");
    assert!(d.step().is_continue());
    assert_eq!(d.controller().state(), GateState::Closed);
    assert_eq!(
        probes.gate.calls(),
        vec![
            MotorCall::Forward,
            MotorCall::Stop,
            MotorCall::Reverse,
            MotorCall::Stop
        ]
    );
}

#[test]
fn backlog_is_dropped_when_a_cycle_starts() {
    let (mut d, probes) = dispatcher(None);
    for raw in ["open", "open", "close", "open"] {
        probes.queue.validate_and_put(raw);
    }
    let _ = d.step();
    assert!(probes.queue.is_empty());
    assert_eq!(probes.gate.calls().len(), 4);
}

#[test]
fn lone_close_does_nothing_when_idle() {
    let (mut d, probes) = dispatcher(None);
    probes.queue.validate_and_put("close");
    let _ = d.step();
    assert!(probes.gate.calls().is_empty());
    assert_eq!(d.controller().state(), GateState::Unknown);
}

#[test]
fn mode_token_changes_and_persists_mode() {
    let (mut d, probes) = dispatcher(None);
    probes.queue.validate_and_put("normal_away");
    let _ = d.step();
    assert_eq!(d.controller().mode(), OperatingMode::NormalAway);
    assert_eq!(probes.store.token().as_deref(), Some("normal_away"));
    assert!(probes.gate.calls().is_empty());
}

#[test]
fn persistence_failure_does_not_stop_the_loop() {
    let (mut d, probes) = dispatcher(None);
    probes.store.set_failing(true);
    probes.queue.validate_and_put("normal_away");
    assert!(d.step().is_continue());
    assert_eq!(d.controller().mode(), OperatingMode::NormalAway);
    assert!(
        probes
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, GateEvent::PersistenceFailed(_)))
    );
}

#[test]
fn lock_closed_ignores_open_until_unlocked() {
    let (d, probes) = dispatcher(Some("lock_closed"));
    let handle = spawn(d);

    assert!(wait_for(PATIENCE, || probes.sink.reached(GateState::Closed)));
    probes.queue.validate_and_put("open");
    probes.queue.validate_and_put("normal_home");
    assert!(wait_for(PATIENCE, || probes.store.token().as_deref()
        == Some("normal_home")));
    probes.queue.shutdown();

    let ctl = handle.join().unwrap();
    assert_eq!(ctl.mode(), OperatingMode::NormalHome);
    assert_eq!(
        probes.gate.calls()[..2],
        [MotorCall::Reverse, MotorCall::Stop]
    );
    assert!(!probes.gate.calls().contains(&MotorCall::Forward));
}

#[test]
fn leaving_lock_open_closes_the_gate() {
    let (d, probes) = dispatcher(Some("lock_open"));
    let handle = spawn(d);

    assert!(wait_for(PATIENCE, || probes.sink.reached(GateState::Opened)));
    probes.queue.validate_and_put("normal_away");
    assert!(wait_for(PATIENCE, || probes.sink.reached(GateState::Closed)));
    probes.queue.shutdown();

    let ctl = handle.join().unwrap();
    assert_eq!(ctl.mode(), OperatingMode::NormalAway);
    assert_eq!(ctl.state(), GateState::Closed);
    assert_eq!(probes.store.token().as_deref(), Some("normal_away"));
    // The trailing stop comes from the dispatcher exiting.
    assert_eq!(
        probes.gate.calls()[..6],
        [
            MotorCall::Forward,
            MotorCall::Stop,
            MotorCall::Forward,
            MotorCall::Stop,
            MotorCall::Reverse,
            MotorCall::Stop
        ]
    );
}

#[test]
fn shutdown_exits_with_motor_stopped() {
    let (d, probes) = dispatcher(None);
    let handle = spawn(d);
    thread::sleep(Duration::from_millis(50));
    probes.queue.shutdown();
    handle.join().unwrap();
    assert_eq!(probes.gate.calls(), vec![MotorCall::Stop]);
    assert!(!probes.gate.is_running());
}
