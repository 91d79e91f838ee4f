use std::{
    thread,
    time::{Duration, Instant},
};

use beast_net::Engine;

/// Drives the engine for up to `deadline`, sleeping briefly between ticks —
/// mirrors the manual poll loops the teacher's integration tests use instead
/// of waiting on a condition variable.
pub fn pump(engine: &mut Engine, deadline: Duration) {
    let start = Instant::now();
    while start.elapsed() < deadline {
        engine.tick().expect("tick");
        thread::sleep(Duration::from_millis(5));
    }
}

pub const HEARTBEAT: [u8; 11] = [0x1A, b'1', 0, 0, 0, 0, 0, 0, 0, 0, 0];
