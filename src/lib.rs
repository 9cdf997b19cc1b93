// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'thread/sync.rs' implements `Sync` for `Synchronized<T>` by hand

//! # objsync
//!
//! Per-object monitors and a managed thread lifecycle, modelled on the synchronization
//! primitives of managed runtimes: every object can act as a reentrant lock, threads can
//! `wait` on it until another thread calls `notify`, and threads move through an explicit
//! lifecycle with `start`, `join`, `sleep` and cooperative `interrupt`.
//!
//! ## Features
//!
//! - **Reentrant monitors** - recursion is counted, so nested scoped blocks on the same object unwind correctly
//! - **Wait / notify** - with optional timeouts, interrupt delivery and the usual spurious-wakeup contract
//! - **Scoped acquisition** - guards and the [`synchronized!`] macro release on every exit path
//! - **Managed threads** - identity, names, an observable status and a termination record
//! - **Real parallelism** - every started thread runs on its own OS thread
//!
//! ## Quick Start
//!
//! ### Using the Prelude
//!
//! ```rust
//! use objsync::prelude::*;
//!
//! let worker = Thread::new(|| {
//!     println!("running as {}", Thread::current().name());
//!     Ok(())
//! });
//! worker.start()?;
//! worker.join()?;
//! assert_eq!(worker.status(), ThreadStatus::Terminated);
//! # Ok::<(), objsync::Error>(())
//! ```
//!
//! ### Wait and Notify
//!
//! ```rust
//! use objsync::{Synchronized, Thread};
//! use std::{cell::Cell, sync::Arc};
//!
//! let ready = Arc::new(Synchronized::new(Cell::new(false)));
//!
//! let r = ready.clone();
//! let signaller = Thread::new(move || {
//!     let guard = r.lock();
//!     guard.set(true);
//!     guard.notify_all()
//! });
//! signaller.start()?;
//!
//! let mut guard = ready.lock();
//! while !guard.get() {
//!     guard.wait()?;
//! }
//! drop(guard);
//! signaller.join()?;
//! # Ok::<(), objsync::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`thread`] - Monitors, threads and the scheduler
//! - [`buffer`] - A growable character buffer without internal synchronization
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). None of the errors is retried
//! internally:
//!
//! ```rust
//! use objsync::{Error, Thread};
//!
//! let thread = Thread::new(|| Ok(()));
//! match thread.join() {
//!     Err(Error::IllegalThreadState { status }) => println!("cannot join a {} thread", status),
//!     other => println!("unexpected: {:?}", other),
//! }
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: thread lifecycle events at
//! `debug`, monitor contention at `trace`, and payloads that end with an unhandled failure at
//! `warn`. Install any logger implementation to see them.
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run char_buffer --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```
#[macro_use]
pub(crate) mod macros;

pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use objsync::prelude::*;
///
/// let monitor = Monitor::new();
/// synchronized!(monitor => {
///     assert_eq!(monitor.owner(), Some(Thread::current().id()));
/// });
/// ```
pub mod prelude;

/// Monitors, managed threads and the scheduler.
///
/// # Key Types
///
/// - [`thread::Monitor`] - Reentrant lock with wait set
/// - [`thread::Synchronized`] - A value guarded by its own monitor
/// - [`thread::Thread`] - A managed thread
/// - [`thread::Scheduler`] - Process-wide executor and thread registry
pub mod thread;

/// Growable character buffer.
///
/// See [`buffer::CharBuffer`].
pub mod buffer;

/// `objsync` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub use error::Result;

/// `objsync` Error type.
///
/// See [`Error`] for all variants.
pub use error::Error;

pub use buffer::CharBuffer;
pub use thread::{
    Monitor, MonitorGuard, Runnable, Scheduler, SchedulerConfig, Synchronized,
    SynchronizedGuard, Termination, Thread, ThreadBuilder, ThreadId, ThreadStatus, WaitOutcome,
};
