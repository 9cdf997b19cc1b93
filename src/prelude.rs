//! # objsync Prelude
//!
//! This module provides a convenient prelude for the most commonly used types, traits and
//! macros of the objsync library. Import it to get everything needed for monitor-based
//! synchronization in one line.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all objsync operations
pub use crate::Error;

/// The result type used throughout objsync
pub use crate::Result;

// ================================================================================================
// Monitors
// ================================================================================================

/// Reentrant monitors and their scoped guards
pub use crate::thread::{Monitor, MonitorGuard, WaitOutcome};

/// Values paired with their own monitor
pub use crate::thread::{Synchronized, SynchronizedGuard};

/// Scoped acquisition
pub use crate::synchronized;

// ================================================================================================
// Threads
// ================================================================================================

/// Managed threads and their payloads
pub use crate::thread::{Runnable, Thread, ThreadBuilder};

/// Thread identity and lifecycle
pub use crate::thread::{Termination, ThreadId, ThreadStatus};

/// Scheduler and its configuration
pub use crate::thread::{Scheduler, SchedulerConfig};

// ================================================================================================
// Buffers
// ================================================================================================

/// Growable character buffer
pub use crate::buffer::CharBuffer;
