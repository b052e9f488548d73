//! Signal watcher: a terminating signal ends the dispatcher with the motor
//! released.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use signal_hook::consts::SIGUSR1;
use signal_hook::low_level::raise;
use smartgate::adapters::signals::spawn_signal_watcher;
use smartgate::fsm::GateState;

use crate::mock_hw::{MotorCall, TestDispatcher, controller, fast_config, wait_for};

#[test]
fn signal_mid_travel_stops_motor_and_dispatcher() {
    // The gate never reaches an end-stop inside this test.
    let (ctl, probes) = controller(&fast_config(5.0, 0.1), Duration::from_secs(30), None);
    spawn_signal_watcher(&[SIGUSR1], Arc::clone(&probes.queue)).unwrap();

    let mut dispatcher = TestDispatcher::new(ctl);
    let handle = thread::spawn(move || {
        dispatcher.run();
        dispatcher.into_controller()
    });

    probes.queue.validate_and_put("open");
    assert!(wait_for(Duration::from_secs(5), || probes.gate.is_running()));

    raise(SIGUSR1).unwrap();
    let ctl = handle.join().unwrap();

    assert!(probes.queue.is_shutdown());
    assert!(!probes.gate.is_running());
    assert_eq!(ctl.state(), GateState::Stopped);
    assert_eq!(probes.gate.calls()[..2], [MotorCall::Forward, MotorCall::Stop]);
}
