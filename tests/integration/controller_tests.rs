//! GateController against the mock gate: traversal outcomes, pre-emption,
//! hold behaviour and mode persistence.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use smartgate::app::commands::{Command, OperatingMode};
use smartgate::app::controller::ModeChange;
use smartgate::app::events::GateEvent;
use smartgate::app::queue::CommandQueue;
use smartgate::error::PersistenceError;
use smartgate::fsm::GateState;

use crate::mock_hw::{MotorCall, controller, fast_config};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn put_after(queue: &Arc<CommandQueue>, delay: Duration, raw: &'static str) -> thread::JoinHandle<()> {
    let queue = Arc::clone(queue);
    thread::spawn(move || {
        thread::sleep(delay);
        queue.validate_and_put(raw);
    })
}

// ── open() ────────────────────────────────────────────────────

#[test]
fn open_stops_at_end_stop() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(100), None);
    let t0 = Instant::now();
    ctl.open();
    assert!(t0.elapsed() >= ms(100));
    assert_eq!(ctl.state(), GateState::Opened);
    assert_eq!(probes.gate.calls(), vec![MotorCall::Forward, MotorCall::Stop]);
    assert!(!probes.gate.is_running());
}

#[test]
fn open_without_trip_hits_security_timer() {
    let (mut ctl, probes) = controller(&fast_config(0.25, 0.1), ms(100), None);
    probes.gate.set_stuck(true);
    let t0 = Instant::now();
    ctl.open();
    let elapsed = t0.elapsed();
    assert!(elapsed >= ms(300), "returned after {elapsed:?}");
    assert!(elapsed < ms(500), "returned after {elapsed:?}");
    assert_eq!(ctl.state(), GateState::OpenTimeError);
    assert!(!probes.gate.is_running());
    assert_eq!(
        probes.sink.count(&GateEvent::TravelTimeout(GateState::OpenTimeError)),
        1
    );
}

#[test]
fn close_request_preempts_opening() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(800), None);
    let producer = put_after(&probes.queue, ms(100), "close");
    let t0 = Instant::now();
    ctl.open();
    producer.join().unwrap();
    assert!(t0.elapsed() < ms(400));
    assert_eq!(ctl.state(), GateState::Holding);
    assert_eq!(probes.gate.calls(), vec![MotorCall::Forward, MotorCall::Stop]);
    assert!(probes.queue.is_empty());
}

#[test]
fn repeated_open_while_opening_is_discarded() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(100), None);
    probes.queue.validate_and_put("open");
    ctl.open();
    assert_eq!(ctl.state(), GateState::Opened);
    assert!(probes.queue.is_empty());
}

// ── close() ───────────────────────────────────────────────────

#[test]
fn close_reaches_end_stop_after_min_time() {
    // min = 0.2 s, max = 0.3 s
    let (mut ctl, probes) = controller(&fast_config(0.25, 0.1), ms(220), None);
    ctl.close();
    assert_eq!(ctl.state(), GateState::Closed);
    assert_eq!(probes.gate.calls(), vec![MotorCall::Reverse, MotorCall::Stop]);
    assert!(probes.queue.is_empty());
}

#[test]
fn early_trip_while_closing_reopens() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(900), None);
    probes.gate.obstruct_close_after(ms(100));
    let t0 = Instant::now();
    ctl.close();
    assert!(t0.elapsed() < ms(400));
    assert_eq!(ctl.state(), GateState::Stopped);
    assert_eq!(probes.queue.snapshot(), vec![Command::Open]);
    assert!(
        probes
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, GateEvent::Obstruction { after } if *after >= ms(100)))
    );
    assert!(!probes.sink.reached(GateState::Closed));
}

#[test]
fn open_request_preempts_closing() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(900), None);
    let producer = put_after(&probes.queue, ms(100), "open");
    ctl.close();
    producer.join().unwrap();
    assert_eq!(ctl.state(), GateState::Stopped);
    assert_eq!(probes.gate.calls(), vec![MotorCall::Reverse, MotorCall::Stop]);
    assert_eq!(probes.queue.snapshot(), vec![Command::Open]);
}

#[test]
fn reopen_after_preemption_keeps_queued_mode_change() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(900), None);
    probes.queue.validate_and_put("open");
    probes.queue.validate_and_put("lock_closed");
    ctl.close();
    assert_eq!(ctl.state(), GateState::Stopped);
    assert_eq!(
        probes.queue.snapshot(),
        vec![Command::Mode(OperatingMode::LockClosed), Command::Open]
    );
}

#[test]
fn mode_change_queued_during_close_is_not_lost() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(900), None);
    let producer = {
        let queue = Arc::clone(&probes.queue);
        thread::spawn(move || {
            thread::sleep(ms(100));
            queue.validate_and_put("open");
            queue.validate_and_put("lock_closed");
        })
    };
    ctl.close();
    producer.join().unwrap();
    let queued = probes.queue.snapshot();
    assert!(queued.contains(&Command::Mode(OperatingMode::LockClosed)), "{queued:?}");
    assert!(queued.contains(&Command::Open), "{queued:?}");
}

#[test]
fn obstruction_reopen_keeps_unpolled_backlog() {
    // The trip lands on the first sample, before the queue is ever polled.
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(900), None);
    probes.gate.obstruct_close_after(ms(5));
    probes.queue.validate_and_put("close");
    probes.queue.validate_and_put("normal_away");
    ctl.close();
    assert_eq!(ctl.state(), GateState::Stopped);
    assert_eq!(
        probes.queue.snapshot(),
        vec![
            Command::Close,
            Command::Mode(OperatingMode::NormalAway),
            Command::Open
        ]
    );
}

#[test]
fn obstruction_keeps_deferred_mode_tokens_first() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(900), None);
    probes.gate.obstruct_close_after(ms(100));
    probes.queue.validate_and_put("normal_away");
    ctl.close();
    assert_eq!(
        probes.queue.snapshot(),
        vec![Command::Mode(OperatingMode::NormalAway), Command::Open]
    );
}

#[test]
fn sensor_outage_falls_back_to_timer() {
    let (mut ctl, probes) = controller(&fast_config(0.2, 0.1), ms(100), None);
    probes.gate.set_sensor_down(true);
    ctl.close();
    assert_eq!(ctl.state(), GateState::CloseTimeError);
    assert!(!probes.gate.is_running());
    assert_eq!(probes.sink.count(&GateEvent::SensorUnavailable), 1);
}

#[test]
fn motor_write_failure_still_ends_in_stop() {
    let (mut ctl, probes) = controller(&fast_config(0.2, 0.1), ms(100), None);
    probes.gate.set_motor_fails(true);
    ctl.open();
    assert_eq!(ctl.state(), GateState::OpenTimeError);
    assert_eq!(probes.gate.calls().last(), Some(&MotorCall::Stop));
}

// ── hold() ────────────────────────────────────────────────────

#[test]
fn hold_waits_full_window() {
    let (mut ctl, _probes) = controller(&fast_config(1.0, 0.2), ms(100), None);
    let t0 = Instant::now();
    ctl.hold();
    let elapsed = t0.elapsed();
    assert!(elapsed >= ms(200));
    assert!(elapsed < ms(400));
    assert_eq!(ctl.state(), GateState::Holding);
}

#[test]
fn open_during_hold_restarts_window() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.2), ms(100), None);
    let producer = put_after(&probes.queue, ms(150), "open");
    let t0 = Instant::now();
    ctl.hold();
    producer.join().unwrap();
    assert!(t0.elapsed() >= ms(350));
}

#[test]
fn close_during_hold_ends_it() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 2.0), ms(100), None);
    let producer = put_after(&probes.queue, ms(50), "close");
    let t0 = Instant::now();
    ctl.hold();
    producer.join().unwrap();
    assert!(t0.elapsed() < ms(500));
    assert!(probes.queue.is_empty());
}

// ── modes ─────────────────────────────────────────────────────

#[test]
fn mode_survives_a_new_controller() {
    let config = fast_config(1.0, 0.1);
    for mode in OperatingMode::ALL {
        let (mut ctl, probes) = controller(&config, ms(100), None);
        assert_eq!(ctl.mode_change(mode.token()), Ok(ModeChange::Applied(mode)));
        let saved = probes.store.token();
        let (fresh, _) = controller(&config, ms(100), saved.as_deref());
        assert_eq!(fresh.mode(), mode);
    }
}

#[test]
fn corrupt_saved_mode_defaults_to_normal_home() {
    let (ctl, _) = controller(&fast_config(1.0, 0.1), ms(100), Some("garbage"));
    assert_eq!(ctl.mode(), OperatingMode::NormalHome);
}

#[test]
fn failed_save_is_reported_but_mode_changes() {
    let (mut ctl, probes) = controller(&fast_config(1.0, 0.1), ms(100), Some("normal_home"));
    probes.store.set_failing(true);
    let result = ctl.mode_change("lock_closed");
    assert!(matches!(result, Err(PersistenceError::Io(_))));
    assert_eq!(ctl.mode(), OperatingMode::LockClosed);
    assert_eq!(probes.store.token().as_deref(), Some("normal_home"));
    assert!(
        probes
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, GateEvent::PersistenceFailed(_)))
    );
}
