//! Polling helpers shared by the integration tests.

#![allow(dead_code)]

use objsync::{Thread, ThreadStatus};
use std::time::{Duration, Instant};

/// Upper bound for any condition a test waits on.
pub const PATIENCE: Duration = Duration::from_secs(10);

/// Polls `condition` until it holds or [`PATIENCE`] runs out.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Polls until `thread` reports `status`.
pub fn wait_for_status(thread: &Thread, status: ThreadStatus) -> bool {
    wait_until(|| thread.status() == status)
}
