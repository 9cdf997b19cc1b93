use thiserror::Error;

use crate::thread::ThreadStatus;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Three of the variants mirror the failures a monitor-based threading model surfaces to its
/// callers. None of them is ever retried internally: re-checking a wait predicate or re-issuing
/// an interrupted operation is always the caller's responsibility.
///
/// # Error Categories
///
/// ## Monitor Errors
/// - [`Error::IllegalMonitorState`] - exit/wait/notify without owning the monitor
///
/// ## Thread Lifecycle Errors
/// - [`Error::IllegalThreadState`] - start on a thread that is not `New`, join on a thread
///   that was never started
/// - [`Error::Interrupted`] - a blocking `wait`, `join` or `sleep` was interrupted
///
/// ## Scheduler Errors
/// - [`Error::ThreadLimit`] - the configured limit of live threads was reached
/// - [`Error::SpawnFailed`] - the operating system refused to create a thread
/// - [`Error::AlreadyInitialized`] - the process-wide scheduler was configured twice
///
/// # Examples
///
/// ```rust
/// use objsync::{Error, Monitor};
///
/// let monitor = Monitor::new();
/// match monitor.exit() {
///     Err(Error::IllegalMonitorState) => println!("not the owner"),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The calling thread does not own the monitor it operated on.
    ///
    /// Raised by `exit`, `wait`, `notify` and `notify_all`. The monitor state is left
    /// untouched.
    #[error("Current thread is not the owner of the monitor")]
    IllegalMonitorState,

    /// The thread was in a state that does not permit the requested transition.
    ///
    /// Raised by `start` on a thread that has already been started and by `join` on a thread
    /// that was never started. The thread's state is left unchanged.
    #[error("Illegal thread state - {status}")]
    IllegalThreadState {
        /// The status the thread was in when the operation was attempted
        status: ThreadStatus,
    },

    /// A blocking operation was interrupted.
    ///
    /// The interrupt flag of the affected thread has been cleared as part of delivering this
    /// error. For `wait` the monitor has been re-acquired before the error is returned.
    #[error("Thread was interrupted")]
    Interrupted,

    /// Starting another thread would exceed the configured number of live threads.
    ///
    /// The associated value is the configured limit.
    #[error("Reached the maximum number of live threads allowed - {0}")]
    ThreadLimit(usize),

    /// The operating system failed to create an execution context for a started thread.
    #[error("Failed to spawn thread - {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// The process-wide scheduler has already been set up.
    #[error("The scheduler has already been initialized")]
    AlreadyInitialized,

    /// Generic error for payload failures.
    ///
    /// Payloads can use this to report failures that have no dedicated variant; the message
    /// ends up in the thread's [`crate::Termination`].
    #[error("{0}")]
    Failed(String),
}

/// The result type used throughout objsync.
pub type Result<T> = std::result::Result<T, Error>;
