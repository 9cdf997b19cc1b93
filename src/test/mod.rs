use std::time::{Duration, Instant};

use crate::thread::{Thread, ThreadStatus};

/// Polls `condition` until it holds or `timeout` elapses.
///
/// Returns whether the condition was observed.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Polls until `thread` reports `status`, for at most `timeout`.
pub fn wait_for_status(thread: &Thread, status: ThreadStatus, timeout: Duration) -> bool {
    wait_until(timeout, || thread.status() == status)
}
