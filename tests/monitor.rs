//! Integration tests for monitor semantics across real threads.
//!
//! Every test drives the public API only: payloads run on started `Thread`s while the test
//! harness thread (attached on first use) plays the other side.

mod common;

use common::wait_until;
use objsync::{prelude::*, Result};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

/// A waits on L; B takes L, calls notify_all and leaves. A resumes normally.
#[test]
fn test_notify_all_resumes_waiter() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let released = Arc::new(AtomicBool::new(false));
    let outcome = Arc::new(Mutex::new(None));

    let (l, r, o) = (lock.clone(), released.clone(), outcome.clone());
    let a = Thread::builder().name("A").build(move || {
        let guard = l.lock();
        while !r.load(Ordering::SeqCst) {
            let result = guard.wait()?;
            *o.lock().unwrap() = Some(result);
        }
        if !l.is_held_by_current_thread() {
            return Err(Error::Failed("monitor not re-acquired".into()));
        }
        Ok(())
    });
    a.start()?;
    assert!(wait_until(|| lock.wait_set_len() == 1));
    assert_eq!(a.status(), ThreadStatus::Waiting);

    let (l, r) = (lock.clone(), released.clone());
    let b = Thread::builder().name("B").build(move || {
        l.enter();
        r.store(true, Ordering::SeqCst);
        l.notify_all()?;
        l.exit()
    });
    b.start()?;

    b.join()?;
    a.join()?;
    assert_eq!(a.termination(), Some(Termination::Completed));
    assert_eq!(b.termination(), Some(Termination::Completed));
    assert_eq!(*outcome.lock().unwrap(), Some(WaitOutcome::Notified));
    assert!(!lock.is_locked());
    Ok(())
}

/// Sleeping while holding L keeps a contender blocked for the whole sleep.
#[test]
fn test_sleep_does_not_release_monitor() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let acquired_a = Arc::new(Mutex::new(None));
    let acquired_b = Arc::new(Mutex::new(None));

    let (l, t) = (lock.clone(), acquired_a.clone());
    let a = Thread::new(move || {
        let _guard = l.lock();
        *t.lock().unwrap() = Some(Instant::now());
        Thread::sleep(Duration::from_millis(1000))
    });
    a.start()?;
    assert!(wait_until(|| lock.is_locked()));

    let (l, t) = (lock.clone(), acquired_b.clone());
    let b = Thread::new(move || {
        let _guard = l.lock();
        *t.lock().unwrap() = Some(Instant::now());
        Ok(())
    });
    b.start()?;

    assert!(wait_until(|| b.status() == ThreadStatus::Blocked));
    assert!(wait_until(|| a.status() == ThreadStatus::TimedWaiting));
    assert_eq!(lock.owner(), Some(a.id()));
    assert_eq!(lock.entry_queue_len(), 1);

    a.join()?;
    b.join()?;

    let a_at = acquired_a.lock().unwrap().expect("A acquired the monitor");
    let b_at = acquired_b.lock().unwrap().expect("B acquired the monitor");
    assert!(b_at.duration_since(a_at) >= Duration::from_millis(1000));
    Ok(())
}

/// Calling wait without owning the monitor fails and leaves the monitor untouched.
#[test]
fn test_wait_without_ownership() -> Result<()> {
    let lock = Arc::new(Monitor::new());

    assert!(matches!(lock.wait(), Err(Error::IllegalMonitorState)));
    assert!(matches!(
        lock.wait_timeout(Duration::from_millis(1)),
        Err(Error::IllegalMonitorState)
    ));
    assert!(matches!(lock.notify(), Err(Error::IllegalMonitorState)));
    assert!(matches!(lock.notify_all(), Err(Error::IllegalMonitorState)));
    assert!(!lock.is_locked());

    // Owned by another thread: still illegal, owner unchanged
    let (l, release) = (lock.clone(), Arc::new(AtomicBool::new(false)));
    let r = release.clone();
    let holder = Thread::new(move || {
        let _guard = l.lock();
        while !r.load(Ordering::SeqCst) {
            Thread::sleep(Duration::from_millis(1))?;
        }
        Ok(())
    });
    holder.start()?;
    assert!(wait_until(|| lock.is_locked()));

    assert!(matches!(lock.wait(), Err(Error::IllegalMonitorState)));
    assert_eq!(lock.owner(), Some(holder.id()));
    assert_eq!(lock.recursion_count(), 1);
    assert_eq!(lock.wait_set_len(), 0);

    release.store(true, Ordering::SeqCst);
    holder.join()?;
    assert!(!lock.is_locked());
    Ok(())
}

/// notify_all moves every waiter out of the wait set; they queue for the monitor until the
/// notifier leaves.
#[test]
fn test_notify_all_moves_waiters_to_entry_queue() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let go = Arc::new(AtomicBool::new(false));
    let resumed = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<Thread> = (0..3)
        .map(|_| {
            let (l, g, n) = (lock.clone(), go.clone(), resumed.clone());
            Thread::new(move || {
                let guard = l.lock();
                while !g.load(Ordering::SeqCst) {
                    guard.wait()?;
                }
                n.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();
    for waiter in &waiters {
        waiter.start()?;
    }
    assert!(wait_until(|| lock.wait_set_len() == 3));

    synchronized!(lock, guard => {
        go.store(true, Ordering::SeqCst);
        guard.notify_all()?;
        assert_eq!(lock.wait_set_len(), 0);
        assert_eq!(lock.entry_queue_len(), 3);
        assert_eq!(resumed.load(Ordering::SeqCst), 0);
    });

    for waiter in &waiters {
        waiter.join()?;
    }
    assert_eq!(resumed.load(Ordering::SeqCst), 3);
    assert_eq!(lock.entry_queue_len(), 0);
    Ok(())
}

/// notify with nobody waiting changes no thread's status.
#[test]
fn test_notify_without_waiters() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let other = Arc::new(Monitor::new());
    let stop = Arc::new(AtomicBool::new(false));

    let (o, s) = (other.clone(), stop.clone());
    let bystander = Thread::new(move || {
        let guard = o.lock();
        while !s.load(Ordering::SeqCst) {
            guard.wait()?;
        }
        Ok(())
    });
    bystander.start()?;
    assert!(wait_until(|| bystander.status() == ThreadStatus::Waiting));

    synchronized!(lock, guard => {
        guard.notify()?;
        guard.notify_all()?;
        assert_eq!(lock.wait_set_len(), 0);
        assert_eq!(lock.entry_queue_len(), 0);
    });
    assert_eq!(bystander.status(), ThreadStatus::Waiting);
    assert_eq!(other.wait_set_len(), 1);

    stop.store(true, Ordering::SeqCst);
    synchronized!(other, guard => {
        guard.notify_all()?;
    });
    bystander.join()?;
    Ok(())
}

/// At most one thread ever observes itself as owner.
#[test]
fn test_owner_is_exclusive() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));

    let threads: Vec<Thread> = (0..6)
        .map(|_| {
            let (l, i, v) = (lock.clone(), inside.clone(), violations.clone());
            Thread::new(move || {
                for _ in 0..200 {
                    let _guard = l.lock();
                    if i.fetch_add(1, Ordering::SeqCst) != 0 {
                        v.fetch_add(1, Ordering::SeqCst);
                    }
                    if l.owner() != Some(Thread::current().id()) {
                        v.fetch_add(1, Ordering::SeqCst);
                    }
                    i.fetch_sub(1, Ordering::SeqCst);
                }
                Ok(())
            })
        })
        .collect();

    for thread in &threads {
        thread.start()?;
    }
    for thread in &threads {
        thread.join()?;
    }
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert!(!lock.is_locked());
    Ok(())
}

/// A notified waiter competing with a long-running owner re-acquires the monitor with its
/// original recursion count.
#[test]
fn test_reentrant_wait_restores_count_after_notify() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let counts = Arc::new(Mutex::new(Vec::new()));

    let (l, c) = (lock.clone(), counts.clone());
    let waiter = Thread::new(move || {
        l.enter();
        l.enter();
        l.enter();
        let outcome = l.wait()?;
        c.lock().unwrap().push((outcome, l.recursion_count()));
        l.exit()?;
        l.exit()?;
        l.exit()
    });
    waiter.start()?;
    assert!(wait_until(|| lock.wait_set_len() == 1));

    synchronized!(lock, guard => {
        guard.notify()?;
        // Hold on long enough for the waiter to queue behind us
        assert!(wait_until(|| waiter.status() == ThreadStatus::Blocked));
    });

    waiter.join()?;
    assert_eq!(waiter.termination(), Some(Termination::Completed));
    assert_eq!(
        counts.lock().unwrap().as_slice(),
        &[(WaitOutcome::Notified, 3)]
    );
    Ok(())
}

/// Monitors are usable from statics and through the macro.
#[test]
fn test_static_monitor_with_macro() -> Result<()> {
    static LOCK: Monitor = Monitor::new();
    static HITS: AtomicUsize = AtomicUsize::new(0);

    let threads: Vec<Thread> = (0..4)
        .map(|_| {
            Thread::new(|| {
                synchronized!(LOCK => {
                    synchronized!(LOCK => {
                        assert_eq!(LOCK.recursion_count(), 2);
                        HITS.fetch_add(1, Ordering::SeqCst);
                    });
                });
                Ok(())
            })
        })
        .collect();
    for thread in &threads {
        thread.start()?;
    }
    for thread in &threads {
        thread.join()?;
        assert_eq!(thread.termination(), Some(Termination::Completed));
    }
    assert_eq!(HITS.load(Ordering::SeqCst), 4);
    Ok(())
}

/// A waiter notified and then interrupted before it regains L wakes as notified and keeps
/// its interrupt flag for the next interruptible call.
#[test]
fn test_notified_then_interrupted_waiter_returns_normally() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let observed = Arc::new(Mutex::new(None));

    let (l, o) = (lock.clone(), observed.clone());
    let waiter = Thread::new(move || {
        let guard = l.lock();
        let result = guard.wait();
        *o.lock().unwrap() = Some((result.ok(), Thread::interrupted()));
        Ok(())
    });
    waiter.start()?;
    assert!(wait_until(|| lock.wait_set_len() == 1));

    {
        let guard = lock.lock();
        guard.notify()?;
        waiter.interrupt();
        assert_eq!(lock.wait_set_len(), 0);
    }
    waiter.join()?;

    assert_eq!(
        *observed.lock().unwrap(),
        Some((Some(WaitOutcome::Notified), true))
    );
    Ok(())
}

/// Interrupting a thread blocked on entry leaves it blocked; it acquires L once released
/// and finds the interrupt still pending.
#[test]
fn test_interrupt_does_not_break_blocked_enter() -> Result<()> {
    let lock = Arc::new(Monitor::new());
    let observed = Arc::new(Mutex::new(None));
    let held = lock.lock();

    let (l, o) = (lock.clone(), observed.clone());
    let b = Thread::new(move || {
        let _guard = l.lock();
        *o.lock().unwrap() = Some((l.is_held_by_current_thread(), Thread::interrupted()));
        Ok(())
    });
    b.start()?;
    assert!(wait_until(|| {
        b.status() == ThreadStatus::Blocked && lock.entry_queue_len() == 1
    }));

    b.interrupt();
    assert_eq!(b.status(), ThreadStatus::Blocked);
    assert!(lock.is_held_by_current_thread());

    drop(held);
    b.join()?;

    // (acquired, flag still pending)
    assert_eq!(*observed.lock().unwrap(), Some((true, true)));
    assert!(!lock.is_locked());
    Ok(())
}
