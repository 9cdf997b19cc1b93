//! Monitors and managed threads.
//!
//! This module implements monitor-based synchronization the way a managed runtime offers it
//! on every object, together with the thread lifecycle that the monitor operations depend on.
//!
//! # Architecture
//!
//! - [`Monitor`] - reentrant lock with an entry queue and a wait set
//! - [`Synchronized`] - a value paired with its own monitor
//! - [`Thread`] - a schedulable unit of execution with status and interrupt flag
//! - [`Scheduler`] - turns started threads into OS threads and tracks the live ones
//!
//! The data types shared by all of these ([`ThreadId`], [`ThreadStatus`], [`Termination`])
//! live in a separate module, as does the [`SchedulerConfig`].
//!
//! # Thread Identity
//!
//! Monitor operations act on behalf of the calling thread, obtained with
//! [`Thread::current()`]. Code running inside a started [`Thread`] sees that thread; any other
//! OS thread is attached on first use and keeps its identity for the rest of its life.
//!
//! # Usage Examples
//!
//! ```rust
//! use objsync::{Synchronized, Thread};
//! use std::{cell::Cell, sync::Arc, time::Duration};
//!
//! let counter = Arc::new(Synchronized::new(Cell::new(0u32)));
//!
//! let c = counter.clone();
//! let incrementer = Thread::new(move || {
//!     for _ in 0..100 {
//!         let guard = c.lock();
//!         guard.set(guard.get() + 1);
//!     }
//!     Ok(())
//! });
//!
//! incrementer.start()?;
//! incrementer.join_timeout(Duration::from_secs(10))?;
//! assert_eq!(counter.lock().get(), 100);
//! # Ok::<(), objsync::Error>(())
//! ```

mod config;
mod handle;
mod scheduler;
mod state;
mod sync;

pub use config::{SchedulerConfig, DEFAULT_NAME_PREFIX};
pub use handle::{Runnable, Thread, ThreadBuilder};
pub use scheduler::Scheduler;
pub use state::{Termination, ThreadId, ThreadStatus};
pub use sync::{Monitor, MonitorGuard, Synchronized, SynchronizedGuard, WaitOutcome};
