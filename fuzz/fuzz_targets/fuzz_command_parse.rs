//! Fuzz target: `Command::parse` and `CommandQueue::validate_and_put`
//!
//! Arbitrary producer input must never panic, and whatever is accepted
//! must be a vocabulary token that re-parses to itself.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use smartgate::app::commands::Command;
use smartgate::app::queue::CommandQueue;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let parsed = Command::parse(raw);
    if let Some(cmd) = parsed {
        assert_eq!(cmd.token(), raw.trim(), "accepted input must be an exact token");
        assert_eq!(Command::parse(cmd.token()), Some(cmd));
    }

    let queue = CommandQueue::new();
    assert_eq!(queue.validate_and_put(raw), parsed.is_some());
    assert_eq!(queue.try_get(), parsed);
});
