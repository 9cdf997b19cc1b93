//! # Timed and Untimed Waits
//!
//! **What this example teaches:**
//! - Using any monitor as a lock target for `wait`
//! - Timed waits that simply run out
//! - An indefinite wait released by `notify_all` from another thread
//! - Joining threads in sequence
//!
//! **When to use this pattern:**
//! - Pausing a thread while holding a monitor without busy-waiting
//! - Handing a signal from one thread to an arbitrary number of waiters

use objsync::prelude::*;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Waits on `lock` for `timeout`, then prints `message` while still holding it.
fn wait_and_print(lock: Arc<Monitor>, timeout: Duration, message: &'static str) -> Thread {
    Thread::new(move || {
        let guard = lock.lock();
        guard.wait_timeout(timeout)?;
        println!("{message}");
        Ok(())
    })
}

fn main() -> Result<()> {
    let lock = Arc::new(Monitor::new());

    let first = wait_and_print(lock.clone(), Duration::from_millis(1000), "First Message");
    let second = wait_and_print(lock.clone(), Duration::from_millis(1000), "Second Message");

    first.start()?;
    first.join()?;
    second.start()?;
    second.join()?;

    // Set by the waiter while it holds the lock, so the notifier cannot get the lock
    // before the waiter is in the wait set
    let waiting = Arc::new(AtomicBool::new(false));
    let notified = Arc::new(AtomicBool::new(false));

    let (l, w, n) = (lock.clone(), waiting.clone(), notified.clone());
    let waiter = Thread::builder().name("waiter").build(move || {
        let guard = l.lock();
        println!("Waiting for notify");
        w.store(true, Ordering::SeqCst);
        while !n.load(Ordering::SeqCst) {
            guard.wait()?;
        }
        println!("Notified!");
        Ok(())
    });

    let (l, w, n) = (lock.clone(), waiting.clone(), notified.clone());
    let notifier = Thread::builder().name("notifier").build(move || {
        while !w.load(Ordering::SeqCst) {
            Thread::sleep(Duration::from_millis(10))?;
        }
        synchronized!(l, guard => {
            n.store(true, Ordering::SeqCst);
            guard.notify_all()?;
        });
        Ok(())
    });

    waiter.start()?;
    notifier.start()?;
    waiter.join()?;
    notifier.join()?;

    Ok(())
}
