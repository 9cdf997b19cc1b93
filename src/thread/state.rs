//! Thread identity, status and termination records.
//!
//! This module holds the plain data types describing a managed thread: its process-wide
//! unique [`ThreadId`], the [`ThreadStatus`] state machine and the [`Termination`] record
//! captured once the payload has finished.
//!
//! # State Transitions
//!
//! ```text
//! New --start--> Runnable <------------------+
//!                   |                        |
//!                   +--enter (contended)--> Blocked
//!                   |                        ^
//!                   +--wait/join/sleep--> Waiting / TimedWaiting
//!                   |
//!                   +--payload returns--> Terminated
//! ```
//!
//! `Blocked`, `Waiting` and `TimedWaiting` always return to `Runnable` (a woken waiter passes
//! through `Blocked` while it re-acquires its monitor). `Terminated` is absorbing.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Source of thread identities. Starts at 1 so that no thread ever carries id 0.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a managed thread.
///
/// Identifiers are assigned from a process-wide monotonically increasing counter and are
/// never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    /// Allocates the next identifier from the process-wide counter.
    pub(crate) fn next() -> Self {
        Self(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a thread ID with the given value.
    ///
    /// Only meaningful for comparisons against identifiers handed out by this crate.
    ///
    /// # Arguments
    ///
    /// * `id` - The numeric thread identifier
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a managed thread.
///
/// Stored as a single byte inside the thread so that it can be read without locking.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumCount, EnumIter, FromRepr,
)]
#[repr(u8)]
pub enum ThreadStatus {
    /// Created but not yet started.
    #[default]
    New = 0,

    /// Started and executing (or eligible to execute).
    Runnable = 1,

    /// Suspended while trying to acquire a monitor owned by another thread.
    Blocked = 2,

    /// Suspended without a deadline in `wait` or `join`.
    Waiting = 3,

    /// Suspended with a deadline in `wait`, `join` or `sleep`.
    TimedWaiting = 4,

    /// The payload has returned or failed. Absorbing.
    Terminated = 5,
}

impl ThreadStatus {
    /// Returns `true` for the suspended states (`Blocked`, `Waiting`, `TimedWaiting`).
    #[must_use]
    pub fn is_suspended(self) -> bool {
        matches!(
            self,
            ThreadStatus::Blocked | ThreadStatus::Waiting | ThreadStatus::TimedWaiting
        )
    }

    /// Returns `true` once the thread has terminated.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == ThreadStatus::Terminated
    }

    /// Checks whether moving from `self` to `next` is a legal lifecycle transition.
    ///
    /// Transitions are monotonic except for the suspended states, which may go back to
    /// `Runnable` any number of times. A waiter that has been woken moves from
    /// `Waiting`/`TimedWaiting` to `Blocked` while it re-acquires its monitor.
    ///
    /// # Arguments
    ///
    /// * `next` - The status the thread is about to move to
    #[must_use]
    pub fn can_transition_to(self, next: ThreadStatus) -> bool {
        use ThreadStatus::{Blocked, New, Runnable, Terminated, TimedWaiting, Waiting};

        match (self, next) {
            (New, Runnable) => true,
            (Runnable, Blocked | Waiting | TimedWaiting | Terminated) => true,
            (Blocked, Runnable) => true,
            (Waiting | TimedWaiting, Runnable | Blocked) => true,
            (a, b) => a == b && a != Terminated,
        }
    }
}

/// How a started thread's payload finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The payload returned `Ok(())`.
    Completed,

    /// The payload returned an error. Contains its rendered message.
    Failed(String),

    /// The payload panicked. Contains the panic message when it was a string.
    Panicked(String),
}

impl Termination {
    /// Returns `true` if the payload finished without an unhandled failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Completed)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Failed(msg) => write!(f, "failed: {msg}"),
            Termination::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}
