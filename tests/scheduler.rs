//! Integration tests for an explicitly configured scheduler.
//!
//! The scheduler is process-wide and can only be configured before first use, so this file
//! holds a single test.

use objsync::{prelude::*, Result};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

#[test]
fn test_bounded_scheduler() -> Result<()> {
    let config = SchedulerConfig::bounded(2)
        .with_stack_size(512 * 1024)
        .with_name_prefix("worker-");
    let scheduler = Scheduler::init(config.clone())?;
    assert_eq!(scheduler.config(), &config);
    assert!(matches!(
        Scheduler::init(SchedulerConfig::unbounded()),
        Err(Error::AlreadyInitialized)
    ));

    let release = Arc::new(AtomicBool::new(false));
    let spawn_blocker = || {
        let r = release.clone();
        Thread::new(move || {
            while !r.load(Ordering::SeqCst) {
                Thread::sleep(Duration::from_millis(1))?;
            }
            Ok(())
        })
    };

    let first = spawn_blocker();
    let second = spawn_blocker();
    let third = spawn_blocker();
    assert_eq!(first.name(), format!("worker-{}", first.id()));

    first.start()?;
    second.start()?;
    assert_eq!(scheduler.live_count(), 2);
    assert_eq!(scheduler.threads(), vec![first.clone(), second.clone()]);

    // Over the limit: the thread stays New and can be started later
    assert!(matches!(third.start(), Err(Error::ThreadLimit(2))));
    assert_eq!(third.status(), ThreadStatus::New);
    assert!(scheduler.get(third.id()).is_none());

    release.store(true, Ordering::SeqCst);
    first.join()?;
    second.join()?;
    assert_eq!(scheduler.live_count(), 0);

    third.start()?;
    third.join()?;
    assert_eq!(third.termination(), Some(Termination::Completed));
    assert!(scheduler.threads().is_empty());
    Ok(())
}
