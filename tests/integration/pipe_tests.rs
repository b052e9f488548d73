//! Named-pipe reader thread against a real FIFO.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use smartgate::adapters::pipe::{remove_fifo, spawn_fifo_reader};
use smartgate::app::commands::{Command, OperatingMode};
use smartgate::app::queue::CommandQueue;

use crate::mock_hw::wait_for;

fn write_to(path: &std::path::Path, text: &str) {
    // Opening for write blocks until the reader thread has the FIFO open.
    let mut fifo = OpenOptions::new().write(true).open(path).unwrap();
    fifo.write_all(text.as_bytes()).unwrap();
    drop(fifo);
    // Let the reader see end-of-file and block in open() again.
    thread::sleep(Duration::from_millis(100));
}

#[test]
fn lines_from_successive_writers_reach_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipe");
    let queue = Arc::new(CommandQueue::new());
    let reader = spawn_fifo_reader(&path, Arc::clone(&queue)).unwrap();

    write_to(&path, "open\nnot_a_command\n");
    assert!(wait_for(Duration::from_secs(5), || queue.len() == 1));
    write_to(&path, "lock_open\n");
    assert!(wait_for(Duration::from_secs(5), || queue.len() == 2));
    assert_eq!(
        queue.snapshot(),
        vec![Command::Open, Command::Mode(OperatingMode::LockOpen)]
    );

    write_to(&path, "kill\n");
    reader.join().unwrap();
    assert!(queue.is_shutdown());
    assert_eq!(queue.get(), None);

    remove_fifo(&path).unwrap();
    assert!(!path.exists());
}
