//! Managed threads.
//!
//! A [`Thread`] is a schedulable unit of execution with an identity, a name, a lifecycle
//! status and an interrupt flag. It is built from any [`Runnable`] payload (closures
//! included) and runs it on its own OS thread once started.
//!
//! `Thread` is a cheap handle: clones refer to the same thread, and equality compares
//! identities.
//!
//! # Suspension Points
//!
//! A thread only ever suspends in monitor `enter`, `wait`, [`Thread::join`] and
//! [`Thread::sleep`]. The last three are interruptible: [`Thread::interrupt`] wakes them early
//! and they fail with [`Error::Interrupted`], clearing the flag as they do. An interrupt that
//! arrives while the thread is not suspended stays pending until the next interruptible
//! suspension point or until it is polled with [`Thread::interrupted`].
//!
//! # Attached Threads
//!
//! OS threads not created through this crate (the process main thread, test harness
//! threads, threads from other pools) are attached the first time they call
//! [`Thread::current()`]: they get an identity, take the OS thread's name when it has one, and
//! start out `Runnable`. They can use monitors, sleep and be interrupted, but they can neither
//! be started nor joined.
//!
//! # Example
//!
//! ```rust
//! use objsync::{Thread, ThreadStatus};
//! use std::time::Duration;
//!
//! let worker = Thread::builder()
//!     .name("worker")
//!     .build(|| {
//!         Thread::sleep(Duration::from_millis(10))?;
//!         Ok(())
//!     });
//! assert_eq!(worker.status(), ThreadStatus::New);
//!
//! worker.start()?;
//! worker.join()?;
//! assert_eq!(worker.status(), ThreadStatus::Terminated);
//! # Ok::<(), objsync::Error>(())
//! ```

use std::{
    any::Any,
    cell::{Cell, OnceCell},
    fmt,
    hash::{Hash, Hasher},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc, Mutex, OnceLock,
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use log::{debug, trace, warn};

use crate::{
    thread::{Monitor, Scheduler, ThreadId, ThreadStatus, Termination},
    Error, Result,
};

thread_local! {
    /// The managed thread bound to the running OS thread.
    static CURRENT: OnceCell<Thread> = const { OnceCell::new() };

    /// Key into [`TORN_DOWN`], assigned on first use. Has no destructor, so it stays
    /// readable while the thread's other thread-locals are destroyed.
    static TEARDOWN_KEY: Cell<u64> = const { Cell::new(0) };
}

/// Identities for OS threads that asked for the current thread after `CURRENT` was destroyed.
static TORN_DOWN: OnceLock<DashMap<u64, Thread>> = OnceLock::new();

static NEXT_TEARDOWN_KEY: AtomicU64 = AtomicU64::new(1);

/// The logic a [`Thread`] runs once started.
///
/// Implemented for every `FnOnce() -> Result<()> + Send + 'static`, so closures can be passed
/// directly. An `Err` return or a panic is an unhandled failure: it is logged and recorded
/// in the thread's [`Termination`], and the thread terminates either way.
pub trait Runnable: Send + 'static {
    /// Executes the payload on the started thread.
    ///
    /// # Errors
    ///
    /// Any error returned here is recorded as [`Termination::Failed`].
    fn run(self: Box<Self>) -> Result<()>;
}

impl<F> Runnable for F
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    fn run(self: Box<Self>) -> Result<()> {
        (*self)()
    }
}

/// Shared state behind every [`Thread`] handle.
struct ThreadInner {
    id: ThreadId,
    name: String,
    /// A [`ThreadStatus`] discriminant.
    status: AtomicU8,
    interrupted: AtomicBool,
    /// Attached threads were not created by this crate and are never started.
    attached: bool,
    stack_size: Option<usize>,
    /// Taken exactly once by the OS thread running it.
    payload: Mutex<Option<Box<dyn Runnable>>>,
    termination: Mutex<Option<Termination>>,
    /// Handle used to unpark the thread, set once it runs.
    os_thread: OnceLock<std::thread::Thread>,
    /// The thread's own monitor. Termination is published under it, and joiners wait on it.
    monitor: Monitor,
}

/// A managed thread.
///
/// See the [module documentation](self) for the lifecycle and suspension model.
#[derive(Clone)]
pub struct Thread {
    inner: Arc<ThreadInner>,
}

impl Thread {
    /// Creates a new, not yet started thread with a generated name (`"Thread-<id>"`).
    ///
    /// # Arguments
    ///
    /// * `payload` - The logic to run once the thread is started
    pub fn new(payload: impl Runnable) -> Self {
        ThreadBuilder::new().build(payload)
    }

    /// Returns a builder for configuring name and stack size.
    #[must_use]
    pub fn builder() -> ThreadBuilder {
        ThreadBuilder::new()
    }

    /// Returns the thread that is currently executing.
    ///
    /// Inside a started thread's payload this is that thread. Any other OS thread is attached
    /// on its first call and keeps the same identity afterwards.
    ///
    /// Code running in a thread-local destructor may find the binding already destroyed. The
    /// OS thread is then attached once more under a fresh identity, which every later call
    /// from that thread shares. Monitors entered under the earlier identity cannot be released
    /// under the new one, so guards should not outlive the thread-locals they are stored in.
    #[must_use]
    pub fn current() -> Thread {
        CURRENT
            .try_with(|current| current.get_or_init(Thread::attach).clone())
            .unwrap_or_else(|_| Thread::torn_down())
    }

    /// Suspends the current thread for at least `duration`.
    ///
    /// Monitors held by the current thread stay held: other threads that need them remain
    /// blocked for the whole sleep. The thread's status is [`ThreadStatus::TimedWaiting`] while
    /// it sleeps.
    ///
    /// # Errors
    ///
    /// [`Error::Interrupted`] if the thread is interrupted before or during the sleep; the
    /// flag is cleared and the time actually slept is unspecified.
    pub fn sleep(duration: Duration) -> Result<()> {
        Thread::current().sleep_current(duration)
    }

    /// Tests and clears the current thread's interrupt flag.
    ///
    /// # Returns
    ///
    /// `true` if the flag was set.
    #[must_use]
    pub fn interrupted() -> bool {
        Thread::current().take_interrupt()
    }

    /// Returns the thread's unique identifier.
    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.inner.id
    }

    /// Returns the thread's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the thread's current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ThreadStatus {
        ThreadStatus::from_repr(self.inner.status.load(Ordering::Acquire))
            .unwrap_or(ThreadStatus::Terminated)
    }

    /// Checks if the thread has been started and has not terminated yet.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !matches!(
            self.status(),
            ThreadStatus::New | ThreadStatus::Terminated
        )
    }

    /// Checks if this is an attached thread (one not created through this crate).
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.attached
    }

    /// Returns how the payload finished, or `None` while the thread has not terminated.
    #[must_use]
    pub fn termination(&self) -> Option<Termination> {
        lock!(self.inner.termination).clone()
    }

    /// Returns the thread's own monitor.
    ///
    /// Like any other monitor it can be used as a lock target. The thread publishes its
    /// termination under this monitor and notifies all of its waiters when it terminates.
    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &self.inner.monitor
    }

    /// Starts the thread.
    ///
    /// Moves the thread from `New` to `Runnable` and hands it to the process-wide
    /// [`Scheduler`], which runs the payload on a new OS thread. The transition is atomic:
    /// when several callers race to start the same thread exactly one succeeds and the payload
    /// runs once.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalThreadState`] if the thread is not `New` (already started,
    ///   terminated, or attached). The state is left unchanged.
    /// - [`Error::ThreadLimit`] / [`Error::SpawnFailed`] if the scheduler could not create an
    ///   execution context. The thread is back in `New` and may be started again. Threads
    ///   already blocked in [`join`](Self::join) on it wake up and fail with
    ///   [`Error::IllegalThreadState`].
    pub fn start(&self) -> Result<()> {
        if self.inner.attached {
            return Err(Error::IllegalThreadState {
                status: self.status(),
            });
        }

        if let Err(actual) = self.inner.status.compare_exchange(
            ThreadStatus::New as u8,
            ThreadStatus::Runnable as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(Error::IllegalThreadState {
                status: ThreadStatus::from_repr(actual).unwrap_or(ThreadStatus::Terminated),
            });
        }

        if let Err(e) = Scheduler::global().spawn(self) {
            // Joiners may have seen Runnable and be parked on the monitor
            let guard = self.inner.monitor.lock();
            self.inner
                .status
                .store(ThreadStatus::New as u8, Ordering::Release);
            guard.notify_all()?;
            return Err(e);
        }
        Ok(())
    }

    /// Waits for the thread to terminate.
    ///
    /// Returns immediately if the thread has already terminated.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalThreadState`] if the thread was never started (or is attached), as it
    ///   could never terminate.
    /// - [`Error::Interrupted`] if the calling thread is interrupted while waiting.
    pub fn join(&self) -> Result<()> {
        self.join_for(None)
    }

    /// Waits at most `timeout` for the thread to terminate.
    ///
    /// Returns normally when the timeout elapses, whether or not the thread has terminated;
    /// check [`status`](Self::status) to tell the two apart. A zero timeout only checks.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    pub fn join_timeout(&self, timeout: Duration) -> Result<()> {
        self.join_for(Some(timeout))
    }

    /// Sets the thread's interrupt flag.
    ///
    /// If the thread is suspended in `wait`, `join` or `sleep` it wakes up and that call fails
    /// with [`Error::Interrupted`]. Otherwise the flag stays set for later observation.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        trace!("thread {} interrupted", self.inner.id);
        self.unpark();
    }

    /// Checks the interrupt flag without clearing it.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Clears the interrupt flag, returning whether it was set.
    pub(crate) fn take_interrupt(&self) -> bool {
        self.inner.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Records a status change. Only the thread itself changes its status after `start`.
    pub(crate) fn set_status(&self, next: ThreadStatus) {
        let previous = self.inner.status.swap(next as u8, Ordering::AcqRel);
        debug_assert!(
            ThreadStatus::from_repr(previous).is_some_and(|p| p.can_transition_to(next)),
            "illegal thread status transition {:?} -> {}",
            ThreadStatus::from_repr(previous),
            next
        );
    }

    /// Wakes the thread if it is parked at a suspension point.
    pub(crate) fn unpark(&self) {
        if let Some(os_thread) = self.inner.os_thread.get() {
            os_thread.unpark();
        }
    }

    pub(crate) fn stack_size(&self) -> Option<usize> {
        self.inner.stack_size
    }

    /// Runs the payload on the calling OS thread, then publishes termination.
    ///
    /// Called exactly once, by the OS thread the scheduler spawned for this thread.
    pub(crate) fn run(self, scheduler: &Scheduler) {
        // Fails only if the thread-local is being torn down, which cannot happen this early
        let _ = CURRENT.try_with(|current| current.set(self.clone()));
        let _ = self.inner.os_thread.set(std::thread::current());

        debug!("thread '{}' ({}) running", self.inner.name, self.inner.id);

        let payload = lock!(self.inner.payload).take();
        let termination = match payload {
            Some(payload) => match panic::catch_unwind(AssertUnwindSafe(|| payload.run())) {
                Ok(Ok(())) => Termination::Completed,
                Ok(Err(e)) => Termination::Failed(e.to_string()),
                Err(panic) => Termination::Panicked(panic_message(panic.as_ref())),
            },
            None => Termination::Completed,
        };

        if termination.is_success() {
            debug!("thread '{}' ({}) completed", self.inner.name, self.inner.id);
        } else {
            warn!(
                "thread '{}' ({}) ended with an unhandled failure: {}",
                self.inner.name, self.inner.id, termination
            );
        }

        scheduler.retire(self.id());

        let guard = self.inner.monitor.lock();
        *lock!(self.inner.termination) = Some(termination);
        self.set_status(ThreadStatus::Terminated);
        if let Err(e) = guard.notify_all() {
            warn!("thread {} failed to notify joiners: {}", self.inner.id, e);
        }
    }

    /// Binds a managed identity to an OS thread that was not created by this crate.
    /// Returns the identity cached for this OS thread once `CURRENT` is gone.
    fn torn_down() -> Thread {
        let Ok(key) = TEARDOWN_KEY.try_with(|key| {
            if key.get() == 0 {
                key.set(NEXT_TEARDOWN_KEY.fetch_add(1, Ordering::Relaxed));
            }
            key.get()
        }) else {
            return Thread::attach();
        };

        TORN_DOWN
            .get_or_init(DashMap::new)
            .entry(key)
            .or_insert_with(Thread::attach)
            .clone()
    }

    fn attach() -> Thread {
        let os_thread = std::thread::current();
        let id = ThreadId::next();
        let name = os_thread
            .name()
            .map_or_else(|| default_name(id), str::to_string);

        let thread = Thread::from_parts(id, name, None, None, true);
        let _ = thread.inner.os_thread.set(os_thread);
        debug!("attached OS thread as '{}' ({})", thread.inner.name, id);
        thread
    }

    fn from_parts(
        id: ThreadId,
        name: String,
        stack_size: Option<usize>,
        payload: Option<Box<dyn Runnable>>,
        attached: bool,
    ) -> Thread {
        let status = if attached {
            ThreadStatus::Runnable
        } else {
            ThreadStatus::New
        };

        Thread {
            inner: Arc::new(ThreadInner {
                id,
                name,
                status: AtomicU8::new(status as u8),
                interrupted: AtomicBool::new(false),
                attached,
                stack_size,
                payload: Mutex::new(payload),
                termination: Mutex::new(None),
                os_thread: OnceLock::new(),
                monitor: Monitor::new(),
            }),
        }
    }

    fn join_for(&self, timeout: Option<Duration>) -> Result<()> {
        if self.inner.attached {
            return Err(Error::IllegalThreadState {
                status: self.status(),
            });
        }

        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let guard = self.inner.monitor.lock();
        loop {
            match self.status() {
                ThreadStatus::Terminated => return Ok(()),
                ThreadStatus::New => {
                    return Err(Error::IllegalThreadState {
                        status: ThreadStatus::New,
                    })
                }
                _ => {}
            }

            let remaining = match (timeout, deadline) {
                (None, _) | (Some(_), None) => None,
                (Some(_), Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    Some(deadline - now)
                }
            };
            guard.wait_for(remaining)?;
        }
    }

    /// Sleeps on behalf of `self`, which must be the current thread.
    fn sleep_current(&self, duration: Duration) -> Result<()> {
        if self.take_interrupt() {
            return Err(Error::Interrupted);
        }

        let deadline = Instant::now().checked_add(duration);
        self.set_status(ThreadStatus::TimedWaiting);
        let result = loop {
            if self.take_interrupt() {
                break Err(Error::Interrupted);
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Ok(());
                    }
                    std::thread::park_timeout(deadline - now);
                }
                None => std::thread::park(),
            }
        };
        self.set_status(ThreadStatus::Runnable);
        result
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Thread {}

impl Hash for Thread {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .field("interrupted", &self.is_interrupted())
            .field("attached", &self.inner.attached)
            .finish()
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Thread[{},{},{}]",
            self.inner.name,
            self.inner.id,
            self.status()
        )
    }
}

/// Builder for [`Thread`]s.
///
/// ```rust
/// use objsync::Thread;
///
/// let thread = Thread::builder()
///     .name("io-worker")
///     .stack_size(512 * 1024)
///     .build(|| Ok(()));
/// assert_eq!(thread.name(), "io-worker");
/// ```
#[derive(Clone, Debug, Default)]
pub struct ThreadBuilder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl ThreadBuilder {
    /// Creates a builder with a generated name and the scheduler's stack size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the thread name. Also used as the OS thread name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the stack size of the OS thread, overriding the scheduler configuration.
    #[must_use]
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Creates the thread in status `New`.
    ///
    /// # Arguments
    ///
    /// * `payload` - The logic to run once the thread is started
    pub fn build(self, payload: impl Runnable) -> Thread {
        let id = ThreadId::next();
        let name = self.name.unwrap_or_else(|| default_name(id));
        Thread::from_parts(id, name, self.stack_size, Some(Box::new(payload)), false)
    }
}

/// Generates `"<prefix><id>"` using the scheduler's configured prefix.
fn default_name(id: ThreadId) -> String {
    format!("{}{}", Scheduler::global().config().name_prefix, id)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
