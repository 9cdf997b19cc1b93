//! The process-wide thread scheduler.
//!
//! The [`Scheduler`] turns started [`Thread`]s into OS threads and keeps a registry of the
//! threads that are currently alive. It holds no run queue of its own: once a thread is
//! spawned the operating system decides when it runs.
//!
//! There is exactly one scheduler per process. It is created with the default
//! [`SchedulerConfig`] the first time it is needed, or explicitly with [`Scheduler::init`]
//! before any thread is created.
//!
//! # Example
//!
//! ```rust
//! use objsync::{Scheduler, Thread};
//!
//! let worker = Thread::builder().name("indexer").build(|| Ok(()));
//! worker.start()?;
//!
//! // Alive threads can be looked up until they terminate
//! let _ = Scheduler::global().find_by_name("indexer");
//!
//! worker.join()?;
//! assert!(Scheduler::global().get(worker.id()).is_none());
//! # Ok::<(), objsync::Error>(())
//! ```

use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering},
        OnceLock,
    },
};

use dashmap::DashMap;
use log::debug;

use crate::{
    thread::{SchedulerConfig, Thread, ThreadId},
    Error, Result,
};

static SCHEDULER: OnceLock<Scheduler> = OnceLock::new();

/// Creates execution contexts for started threads and tracks the live ones.
pub struct Scheduler {
    config: SchedulerConfig,
    /// Threads that have been started and not yet terminated.
    threads: DashMap<ThreadId, Thread>,
    /// Reserved execution slots, checked against `config.max_threads`.
    live: AtomicUsize,
}

impl Scheduler {
    fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            threads: DashMap::new(),
            live: AtomicUsize::new(0),
        }
    }

    /// Installs the process-wide scheduler with the given configuration.
    ///
    /// Must run before anything else touches the scheduler. Creating a thread, or attaching
    /// an OS thread through [`Thread::current()`], initializes it with the default
    /// configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Limits and defaults for spawned threads
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] if the scheduler already exists.
    pub fn init(config: SchedulerConfig) -> Result<&'static Scheduler> {
        let mut installed = false;
        let scheduler = SCHEDULER.get_or_init(|| {
            installed = true;
            debug!("scheduler initialized with {:?}", config);
            Scheduler::new(config)
        });

        if installed {
            Ok(scheduler)
        } else {
            Err(Error::AlreadyInitialized)
        }
    }

    /// Returns the process-wide scheduler, creating it with the default configuration if
    /// necessary.
    pub fn global() -> &'static Scheduler {
        SCHEDULER.get_or_init(|| Scheduler::new(SchedulerConfig::default()))
    }

    /// Returns the configuration the scheduler was created with.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of started threads that have not terminated yet.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Looks up a live thread by identifier.
    #[must_use]
    pub fn get(&self, id: ThreadId) -> Option<Thread> {
        self.threads.get(&id).map(|entry| entry.value().clone())
    }

    /// Looks up a live thread by name.
    ///
    /// Names need not be unique; if several live threads share the name any one of them is
    /// returned.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Thread> {
        self.threads
            .iter()
            .find(|entry| entry.value().name() == name)
            .map(|entry| entry.value().clone())
    }

    /// Snapshot of all live threads, ordered by identifier.
    #[must_use]
    pub fn threads(&self) -> Vec<Thread> {
        let mut threads: Vec<Thread> = self
            .threads
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        threads.sort_by_key(Thread::id);
        threads
    }

    /// Number of threads the platform can run in parallel, falling back to 1 when unknown.
    #[must_use]
    pub fn available_parallelism() -> usize {
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    /// Spawns the OS thread that runs `thread`.
    ///
    /// The caller has already moved `thread` to `Runnable`. On error nothing was spawned and
    /// the registry is unchanged.
    pub(crate) fn spawn(&'static self, thread: &Thread) -> Result<()> {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                self.config.allows(live).then_some(live + 1)
            })
            .map_err(|_| Error::ThreadLimit(self.config.max_threads))?;

        let mut builder = std::thread::Builder::new().name(thread.name().to_string());
        if let Some(size) = thread.stack_size().or(self.config.stack_size) {
            builder = builder.stack_size(size);
        }

        self.threads.insert(thread.id(), thread.clone());

        let runner = thread.clone();
        match builder.spawn(move || runner.run(self)) {
            Ok(_) => {
                debug!("spawned thread '{}' ({})", thread.name(), thread.id());
                Ok(())
            }
            Err(e) => {
                self.threads.remove(&thread.id());
                self.live.fetch_sub(1, Ordering::AcqRel);
                Err(Error::SpawnFailed(e))
            }
        }
    }

    /// Removes a finished thread from the registry and frees its slot.
    pub(crate) fn retire(&self, id: ThreadId) {
        if self.threads.remove(&id).is_some() {
            self.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("live", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc};

    #[test]
    fn test_global_is_singleton() {
        let a = Scheduler::global() as *const Scheduler;
        let b = Scheduler::global() as *const Scheduler;
        assert_eq!(a, b);
    }

    #[test]
    fn test_init_after_global_fails() {
        let _ = Scheduler::global();
        assert!(matches!(
            Scheduler::init(SchedulerConfig::bounded(1)),
            Err(Error::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_registry_tracks_live_threads() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(std::sync::Mutex::new(release_rx));

        let rx = release_rx.clone();
        let thread = Thread::builder()
            .name("registry-probe")
            .build(move || {
                let _ = rx.lock().unwrap().recv();
                Ok(())
            });
        thread.start().unwrap();

        let scheduler = Scheduler::global();
        assert_eq!(scheduler.get(thread.id()), Some(thread.clone()));
        assert_eq!(
            scheduler.find_by_name("registry-probe").map(|t| t.id()),
            Some(thread.id())
        );
        assert!(scheduler.threads().contains(&thread));
        assert!(scheduler.live_count() >= 1);

        release_tx.send(()).unwrap();
        thread.join().unwrap();
        assert!(scheduler.get(thread.id()).is_none());
        assert!(scheduler.find_by_name("registry-probe").is_none());
    }

    #[test]
    fn test_available_parallelism() {
        assert!(Scheduler::available_parallelism() >= 1);
    }

    #[test]
    fn test_retire_unknown_is_noop() {
        let scheduler = Scheduler::global();
        scheduler.retire(ThreadId::new(u64::MAX));
    }
}
