//! Object monitors.
//!
//! This module provides the monitor used for every synchronizable object: a reentrant
//! mutual-exclusion lock combined with a wait set for condition-style `wait` / `notify`.
//! It implements the semantics of a `synchronized` block together with `Object.wait`,
//! `Object.notify` and `Object.notifyAll`.
//!
//! # Monitor State
//!
//! Each [`Monitor`] tracks:
//!
//! - the owning thread and its recursion count (reentrant acquisition is counted, not
//!   flagged, so nested scoped blocks on the same object unwind correctly),
//! - the **entry queue**: threads suspended while trying to become the owner, including
//!   woken waiters competing to re-acquire,
//! - the **wait set**: threads suspended inside `wait`.
//!
//! A thread is in at most one of these positions at a time.
//!
//! # Fairness
//!
//! None. When the monitor is released any queued thread may win, including one that has
//! not queued at all. `notify` picks one member of the wait set without any promise about
//! which one. Code built on top must not assume FIFO order.
//!
//! # Spurious Wakeups
//!
//! A return from `wait` only means the thread was notified, timed out, or woke up for no
//! reason at all, and then re-acquired the monitor. The predicate that justified the wait may
//! no longer hold, so callers always wait in a loop:
//!
//! ```rust
//! use objsync::{Monitor, Thread};
//! use std::sync::{atomic::{AtomicBool, Ordering}, Arc};
//!
//! let monitor = Arc::new(Monitor::new());
//! let ready = Arc::new(AtomicBool::new(false));
//!
//! let (m, r) = (monitor.clone(), ready.clone());
//! let producer = Thread::new(move || {
//!     let guard = m.lock();
//!     r.store(true, Ordering::Relaxed);
//!     guard.notify_all()
//! });
//! producer.start()?;
//!
//! let guard = monitor.lock();
//! while !ready.load(Ordering::Relaxed) {
//!     guard.wait()?;
//! }
//! drop(guard);
//! producer.join()?;
//! # Ok::<(), objsync::Error>(())
//! ```
//!
//! # Memory Visibility
//!
//! All transitions of a monitor happen under its internal mutex, so everything a thread wrote
//! before releasing the monitor is visible to the next thread that acquires it.
//!
//! # Deadlocks
//!
//! Monitors do not detect deadlocks. Two threads acquiring two monitors in opposite order, or
//! a thread sleeping while holding a monitor others need, behave exactly as they would with
//! any other lock.

use std::{
    collections::VecDeque,
    fmt,
    marker::PhantomData,
    ops::Deref,
    sync::{Condvar, Mutex, OnceLock, PoisonError},
    time::{Duration, Instant},
};

use log::{trace, warn};

use crate::{
    thread::{Thread, ThreadId, ThreadStatus},
    Error, Result,
};

/// How a `wait` call ended when it returned normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The thread was selected by `notify` / `notify_all` (or woke spuriously).
    Notified,
    /// The timeout elapsed before a notification arrived.
    TimedOut,
}

impl WaitOutcome {
    /// Returns `true` if the wait ended because its timeout elapsed.
    #[must_use]
    pub fn timed_out(self) -> bool {
        self == WaitOutcome::TimedOut
    }
}

/// Why a waiting thread left the wait set.
enum Wakeup {
    Notified,
    TimedOut,
    Interrupted,
}

/// Ownership and queue state of a monitor.
///
/// Only ever accessed under the monitor's internal mutex.
struct MonitorState {
    /// The thread that currently owns this monitor, or `None` if unlocked.
    owner: Option<ThreadId>,
    /// Number of times the owner has acquired this monitor.
    ///
    /// The monitor is fully released only when this count reaches zero.
    recursion_count: u32,
    /// Threads suspended while trying to acquire this monitor.
    entry_queue: Vec<ThreadId>,
    /// Threads suspended in `wait`, pending notification, timeout or interrupt.
    wait_set: VecDeque<Thread>,
}

impl MonitorState {
    const fn new() -> Self {
        Self {
            owner: None,
            recursion_count: 0,
            entry_queue: Vec::new(),
            wait_set: VecDeque::new(),
        }
    }

    fn is_owner(&self, thread_id: ThreadId) -> bool {
        self.owner == Some(thread_id)
    }

    /// Non-blocking acquisition: succeeds when the monitor is free or already owned by the
    /// requesting thread.
    fn try_enter(&mut self, thread_id: ThreadId) -> bool {
        match self.owner {
            None => {
                self.owner = Some(thread_id);
                self.recursion_count = 1;
                true
            }
            Some(owner) if owner == thread_id => {
                self.recursion_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Releases one level of ownership. Returns `true` once the monitor is fully released.
    fn release(&mut self, thread_id: ThreadId) -> Result<bool> {
        if !self.is_owner(thread_id) {
            return Err(Error::IllegalMonitorState);
        }

        self.recursion_count -= 1;
        if self.recursion_count == 0 {
            self.owner = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Gives up every level of ownership and returns the count to restore later.
    fn release_all(&mut self) -> u32 {
        let saved = self.recursion_count;
        self.owner = None;
        self.recursion_count = 0;
        saved
    }

    fn leave_entry_queue(&mut self, thread_id: ThreadId) {
        if let Some(pos) = self.entry_queue.iter().position(|&id| id == thread_id) {
            self.entry_queue.swap_remove(pos);
        }
    }

    fn in_wait_set(&self, thread_id: ThreadId) -> bool {
        self.wait_set.iter().any(|t| t.id() == thread_id)
    }

    /// Moves a waiter out of the wait set and into the entry queue.
    fn wake_waiter(&mut self, waiter: &Thread) {
        self.entry_queue.push(waiter.id());
        waiter.unpark();
    }

    /// Moves the calling waiter from the wait set to the entry queue on its own behalf.
    fn leave_wait_set(&mut self, thread_id: ThreadId) {
        self.wait_set.retain(|t| t.id() != thread_id);
        self.entry_queue.push(thread_id);
    }
}

/// A reentrant monitor: mutual exclusion plus a wait set.
///
/// Every operation acts on behalf of [`Thread::current()`], so a monitor can be used from any
/// thread. OS threads not created through this crate are attached on first use.
///
/// Monitors carry no data. Pair data with its own monitor through [`Synchronized`], or guard
/// shared state that is itself thread-safe (atomics, other monitors) with a free-standing
/// monitor. `Monitor::new` is a `const fn`, so monitors may live in statics.
///
/// # Example
///
/// ```rust
/// use objsync::Monitor;
///
/// let monitor = Monitor::new();
///
/// monitor.enter();
/// monitor.enter(); // reentrant
/// assert_eq!(monitor.recursion_count(), 2);
///
/// monitor.exit()?;
/// monitor.exit()?;
/// assert!(!monitor.is_locked());
/// # Ok::<(), objsync::Error>(())
/// ```
pub struct Monitor {
    state: Mutex<MonitorState>,
    /// Signalled when the monitor becomes free while threads are queued for it.
    available: Condvar,
}

impl Monitor {
    /// Creates an unlocked monitor with empty queues.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState::new()),
            available: Condvar::new(),
        }
    }

    /// Acquires the monitor for the current thread.
    ///
    /// Returns immediately if the monitor is free or already owned by the current thread
    /// (the recursion count is incremented). Otherwise the thread joins the entry queue, its
    /// status becomes [`ThreadStatus::Blocked`], and it suspends until it wins ownership.
    ///
    /// Acquisition is not interruptible; an interrupt arriving meanwhile stays pending.
    pub fn enter(&self) {
        let current = Thread::current();
        let thread_id = current.id();

        let mut state = lock!(self.state);
        if state.try_enter(thread_id) {
            return;
        }

        trace!(
            "thread {} blocked on monitor owned by {:?}",
            thread_id,
            state.owner
        );
        state.entry_queue.push(thread_id);
        current.set_status(ThreadStatus::Blocked);

        drop(self.acquire_queued(state, thread_id, 1));
        current.set_status(ThreadStatus::Runnable);
    }

    /// Attempts to acquire the monitor without blocking.
    ///
    /// # Returns
    ///
    /// `true` if the monitor was acquired (or re-entered), `false` if another thread owns it.
    pub fn try_enter(&self) -> bool {
        let thread_id = Thread::current().id();
        lock!(self.state).try_enter(thread_id)
    }

    /// Releases one level of ownership held by the current thread.
    ///
    /// When the recursion count reaches zero the monitor becomes free and one thread from the
    /// entry queue, if any, is woken to compete for it.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalMonitorState`] if the current thread does not own the monitor.
    pub fn exit(&self) -> Result<()> {
        let thread_id = Thread::current().id();

        let mut state = lock!(self.state);
        if state.release(thread_id)? && !state.entry_queue.is_empty() {
            self.available.notify_one();
        }
        Ok(())
    }

    /// Acquires the monitor and returns a guard that releases it when dropped.
    ///
    /// This is the scoped form of [`enter`](Self::enter) / [`exit`](Self::exit): the release
    /// runs on every exit path, including early returns, `?` and panics.
    pub fn lock(&self) -> MonitorGuard<'_> {
        self.enter();
        MonitorGuard {
            monitor: self,
            _not_send: PhantomData,
        }
    }

    /// Waits until notified or interrupted.
    ///
    /// Equivalent to [`wait_for(None)`](Self::wait_for).
    ///
    /// # Errors
    ///
    /// See [`wait_for`](Self::wait_for).
    pub fn wait(&self) -> Result<WaitOutcome> {
        self.wait_for(None)
    }

    /// Waits until notified, interrupted, or `timeout` has elapsed.
    ///
    /// Equivalent to [`wait_for(Some(timeout))`](Self::wait_for).
    ///
    /// # Errors
    ///
    /// See [`wait_for`](Self::wait_for).
    pub fn wait_timeout(&self, timeout: Duration) -> Result<WaitOutcome> {
        self.wait_for(Some(timeout))
    }

    /// Releases the monitor and suspends the current thread in the wait set.
    ///
    /// The release is complete regardless of the recursion count, and the count is restored
    /// when the thread re-acquires the monitor. The thread's status is
    /// [`ThreadStatus::Waiting`], or [`ThreadStatus::TimedWaiting`] with a timeout. It wakes when
    ///
    /// - another thread's `notify` / `notify_all` selects it,
    /// - `timeout` elapses (a zero timeout elapses immediately),
    /// - the thread is interrupted,
    ///
    /// or spuriously. It then queues for the monitor like any other entrant and returns only
    /// once it owns the monitor again.
    ///
    /// # Returns
    ///
    /// [`WaitOutcome::TimedOut`] if the timeout elapsed, [`WaitOutcome::Notified`] otherwise.
    /// Timing out is a normal return, not an error. The timeout is a lower bound: the thread
    /// may resume later than requested, never earlier (absent a notification or interrupt).
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalMonitorState`] if the current thread does not own the monitor; the
    ///   monitor is left unchanged.
    /// - [`Error::Interrupted`] if the thread was interrupted before or during the wait. A flag
    ///   that was already set at call time fails the call without releasing the monitor; an
    ///   interrupt during the wait is reported after the monitor has been re-acquired. The
    ///   interrupt flag is cleared in both cases.
    pub fn wait_for(&self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        let current = Thread::current();
        let thread_id = current.id();
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        let mut state = lock!(self.state);
        if !state.is_owner(thread_id) {
            return Err(Error::IllegalMonitorState);
        }
        if current.take_interrupt() {
            return Err(Error::Interrupted);
        }

        let saved_count = state.release_all();
        state.wait_set.push_back(current.clone());
        if !state.entry_queue.is_empty() {
            self.available.notify_one();
        }
        current.set_status(if timeout.is_some() {
            ThreadStatus::TimedWaiting
        } else {
            ThreadStatus::Waiting
        });
        drop(state);

        trace!("thread {} waiting (timeout {:?})", thread_id, timeout);

        let wakeup = loop {
            {
                let mut state = lock!(self.state);
                if !state.in_wait_set(thread_id) {
                    break Wakeup::Notified;
                }

                let interrupted = current.is_interrupted();
                let timed_out = deadline.is_some_and(|d| Instant::now() >= d);
                if interrupted || timed_out {
                    state.leave_wait_set(thread_id);
                    break if interrupted {
                        Wakeup::Interrupted
                    } else {
                        Wakeup::TimedOut
                    };
                }
            }

            // Notify and interrupt both unpark after updating state, so a wakeup racing with
            // the check above leaves a token and this returns immediately.
            match deadline {
                Some(deadline) => {
                    std::thread::park_timeout(deadline.saturating_duration_since(Instant::now()));
                }
                None => std::thread::park(),
            }
        };

        current.set_status(ThreadStatus::Blocked);
        let state = lock!(self.state);
        drop(self.acquire_queued(state, thread_id, saved_count));
        current.set_status(ThreadStatus::Runnable);

        match wakeup {
            Wakeup::Notified => Ok(WaitOutcome::Notified),
            Wakeup::TimedOut => Ok(WaitOutcome::TimedOut),
            Wakeup::Interrupted => {
                current.take_interrupt();
                Err(Error::Interrupted)
            }
        }
    }

    /// Wakes one thread from the wait set, if any.
    ///
    /// The selected thread moves to the entry queue; it still has to re-acquire the monitor,
    /// which cannot happen before the caller releases it. Which waiter is selected is
    /// unspecified. With an empty wait set this is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalMonitorState`] if the current thread does not own the monitor.
    pub fn notify(&self) -> Result<()> {
        let thread_id = Thread::current().id();

        let mut state = lock!(self.state);
        if !state.is_owner(thread_id) {
            return Err(Error::IllegalMonitorState);
        }

        if let Some(waiter) = state.wait_set.pop_front() {
            trace!("thread {} notifies thread {}", thread_id, waiter.id());
            state.wake_waiter(&waiter);
        }
        Ok(())
    }

    /// Wakes every thread in the wait set.
    ///
    /// Afterwards the wait set is empty; the woken threads compete to re-acquire the monitor
    /// once the caller releases it.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalMonitorState`] if the current thread does not own the monitor.
    pub fn notify_all(&self) -> Result<()> {
        let thread_id = Thread::current().id();

        let mut state = lock!(self.state);
        if !state.is_owner(thread_id) {
            return Err(Error::IllegalMonitorState);
        }

        let waiters = std::mem::take(&mut state.wait_set);
        if !waiters.is_empty() {
            trace!("thread {} notifies {} waiters", thread_id, waiters.len());
        }
        for waiter in &waiters {
            state.wake_waiter(waiter);
        }
        Ok(())
    }

    /// Returns the owning thread, or `None` if the monitor is free.
    #[must_use]
    pub fn owner(&self) -> Option<ThreadId> {
        lock!(self.state).owner
    }

    /// Returns how many times the owner currently holds the monitor (0 when free).
    #[must_use]
    pub fn recursion_count(&self) -> u32 {
        lock!(self.state).recursion_count
    }

    /// Checks if any thread owns the monitor.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        lock!(self.state).owner.is_some()
    }

    /// Checks if the current thread owns the monitor.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        let thread_id = Thread::current().id();
        lock!(self.state).is_owner(thread_id)
    }

    /// Number of threads queued to acquire the monitor, including woken waiters.
    #[must_use]
    pub fn entry_queue_len(&self) -> usize {
        lock!(self.state).entry_queue.len()
    }

    /// Number of threads suspended in `wait` on this monitor.
    #[must_use]
    pub fn wait_set_len(&self) -> usize {
        lock!(self.state).wait_set.len()
    }

    /// Suspends a queued thread until the monitor is free, then makes it the owner with the
    /// given recursion count.
    fn acquire_queued<'a>(
        &'a self,
        state: std::sync::MutexGuard<'a, MonitorState>,
        thread_id: ThreadId,
        recursion_count: u32,
    ) -> std::sync::MutexGuard<'a, MonitorState> {
        let mut state = self
            .available
            .wait_while(state, |s| s.owner.is_some())
            .unwrap_or_else(PoisonError::into_inner);

        state.leave_entry_queue(thread_id);
        state.owner = Some(thread_id);
        state.recursion_count = recursion_count;
        state
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock!(self.state);
        f.debug_struct("Monitor")
            .field("owner", &state.owner)
            .field("recursion_count", &state.recursion_count)
            .field("entry_queue", &state.entry_queue)
            .field("wait_set", &state.wait_set.len())
            .finish()
    }
}

/// Scoped ownership of a [`Monitor`].
///
/// Created by [`Monitor::lock`]. Dropping the guard releases one level of ownership. The
/// guard is tied to the thread that created it and can neither be sent nor shared.
#[must_use = "the monitor is released as soon as the guard is dropped"]
pub struct MonitorGuard<'a> {
    monitor: &'a Monitor,
    _not_send: PhantomData<*const ()>,
}

impl MonitorGuard<'_> {
    /// Returns the guarded monitor.
    pub fn monitor(&self) -> &Monitor {
        self.monitor
    }

    /// See [`Monitor::wait`].
    ///
    /// # Errors
    ///
    /// [`Error::Interrupted`] if the thread was interrupted.
    pub fn wait(&self) -> Result<WaitOutcome> {
        self.monitor.wait_for(None)
    }

    /// See [`Monitor::wait_timeout`].
    ///
    /// # Errors
    ///
    /// [`Error::Interrupted`] if the thread was interrupted.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<WaitOutcome> {
        self.monitor.wait_for(Some(timeout))
    }

    /// See [`Monitor::wait_for`].
    ///
    /// # Errors
    ///
    /// [`Error::Interrupted`] if the thread was interrupted.
    pub fn wait_for(&self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.monitor.wait_for(timeout)
    }

    /// See [`Monitor::notify`].
    ///
    /// # Errors
    ///
    /// [`Error::IllegalMonitorState`] if the monitor was released through [`Monitor::exit`]
    /// while the guard was alive.
    pub fn notify(&self) -> Result<()> {
        self.monitor.notify()
    }

    /// See [`Monitor::notify_all`].
    ///
    /// # Errors
    ///
    /// [`Error::IllegalMonitorState`] if the monitor was released through [`Monitor::exit`]
    /// while the guard was alive.
    pub fn notify_all(&self) -> Result<()> {
        self.monitor.notify_all()
    }
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.monitor.exit() {
            warn!("monitor guard dropped without ownership: {}", e);
        }
    }
}

impl fmt::Debug for MonitorGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorGuard")
            .field("monitor", self.monitor)
            .finish()
    }
}

/// A value paired with its own monitor.
///
/// The monitor is created the first time the value is used as a lock target. The value is
/// only reachable through [`lock`](Self::lock), whose guard dereferences to `&T`; mutation
/// goes through interior mutability of the caller's choosing (`Cell`, `RefCell`, ...).
///
/// Because monitors are reentrant, one thread may hold several guards for the same value, so
/// the guard can only hand out shared references.
///
/// # Example
///
/// ```rust
/// use objsync::{CharBuffer, Synchronized};
/// use std::cell::RefCell;
///
/// let shared = Synchronized::new(RefCell::new(CharBuffer::new()));
/// {
///     let guard = shared.lock();
///     guard.borrow_mut().append_str("hello");
/// }
/// assert_eq!(shared.into_inner().into_inner().to_string(), "hello");
/// ```
pub struct Synchronized<T: ?Sized> {
    monitor: OnceLock<Monitor>,
    value: T,
}

// SAFETY: `value` is only reachable through a `SynchronizedGuard`, which exists only on the
// thread owning the monitor and is neither `Send` nor `Sync`. A thread holding such a reference
// can only run while it owns the monitor: the one way to give up ownership with a guard alive
// is `wait`, which suspends the thread until it owns the monitor again. Every access to `value`
// is therefore ordered by the monitor's acquire/release, which makes sharing sound for any
// `T: Send`, exactly like a mutex.
unsafe impl<T: ?Sized + Send> Sync for Synchronized<T> {}

impl<T> Synchronized<T> {
    /// Wraps a value. No monitor is created until the value is first locked.
    pub const fn new(value: T) -> Self {
        Self {
            monitor: OnceLock::new(),
            value,
        }
    }

    /// Consumes the wrapper and returns the value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: ?Sized> Synchronized<T> {
    /// Acquires the value's monitor and returns a guard giving access to the value.
    pub fn lock(&self) -> SynchronizedGuard<'_, T> {
        SynchronizedGuard {
            guard: self.monitor().lock(),
            value: &self.value,
        }
    }

    /// Returns a mutable reference to the value.
    ///
    /// The exclusive borrow statically guarantees that no other thread holds the monitor.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Checks if any thread currently owns the value's monitor.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.monitor.get().is_some_and(Monitor::is_locked)
    }

    /// Checks if the current thread owns the value's monitor.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.monitor
            .get()
            .is_some_and(Monitor::is_held_by_current_thread)
    }

    /// Number of threads waiting on the value's monitor.
    #[must_use]
    pub fn wait_set_len(&self) -> usize {
        self.monitor.get().map_or(0, Monitor::wait_set_len)
    }

    /// Returns the value's monitor, creating it on first use.
    pub fn monitor(&self) -> &Monitor {
        self.monitor.get_or_init(Monitor::new)
    }
}

impl<T: Default> Default for Synchronized<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for Synchronized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronized")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Scoped access to the value of a [`Synchronized`].
///
/// Dereferences to the value. Waiting requires `&mut self`, so no reference obtained through
/// this guard can be held across a `wait`.
#[must_use = "the monitor is released as soon as the guard is dropped"]
pub struct SynchronizedGuard<'a, T: ?Sized> {
    guard: MonitorGuard<'a>,
    value: &'a T,
}

impl<T: ?Sized> SynchronizedGuard<'_, T> {
    /// See [`Monitor::wait`].
    ///
    /// # Errors
    ///
    /// [`Error::Interrupted`] if the thread was interrupted.
    pub fn wait(&mut self) -> Result<WaitOutcome> {
        self.guard.wait()
    }

    /// See [`Monitor::wait_timeout`].
    ///
    /// # Errors
    ///
    /// [`Error::Interrupted`] if the thread was interrupted.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<WaitOutcome> {
        self.guard.wait_timeout(timeout)
    }

    /// See [`Monitor::notify`].
    ///
    /// # Errors
    ///
    /// Never fails while the guard is alive.
    pub fn notify(&self) -> Result<()> {
        self.guard.notify()
    }

    /// See [`Monitor::notify_all`].
    ///
    /// # Errors
    ///
    /// Never fails while the guard is alive.
    pub fn notify_all(&self) -> Result<()> {
        self.guard.notify_all()
    }
}

impl<T: ?Sized> Deref for SynchronizedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}
