//! Scheduler configuration types.
//!
//! [`SchedulerConfig`] controls how the process-wide [`Scheduler`](super::Scheduler) creates
//! execution contexts for started threads: how many may be alive at once, the stack size of
//! the underlying OS threads and the prefix used for generated thread names.
//!
//! # Configuration Presets
//!
//! - [`SchedulerConfig::unbounded()`] - No limit on live threads (the default)
//! - [`SchedulerConfig::bounded()`] - At most `n` started threads alive at once
//!
//! # Example
//!
//! ```rust,no_run
//! use objsync::{Scheduler, SchedulerConfig};
//!
//! // Use a preset
//! let config = SchedulerConfig::bounded(64);
//!
//! // Or customize
//! let config = SchedulerConfig {
//!     stack_size: Some(256 * 1024),
//!     ..SchedulerConfig::bounded(64)
//! }
//! .with_name_prefix("worker-");
//!
//! Scheduler::init(config)?;
//! # Ok::<(), objsync::Error>(())
//! ```

/// Default prefix for generated thread names (`"Thread-<id>"`).
pub const DEFAULT_NAME_PREFIX: &str = "Thread-";

/// Configuration of the process-wide scheduler.
///
/// # Default Values
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `max_threads` | 0 (unlimited) |
/// | `stack_size` | `None` (platform default) |
/// | `name_prefix` | `"Thread-"` |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of started threads that may be alive at the same time.
    ///
    /// Set to 0 for no limit. Starting a thread beyond the limit fails with
    /// [`Error::ThreadLimit`](crate::Error::ThreadLimit) and leaves the thread in `New`.
    pub max_threads: usize,

    /// Stack size in bytes for spawned OS threads.
    ///
    /// `None` uses the platform default. A thread built with an explicit stack size
    /// overrides this value.
    pub stack_size: Option<usize>,

    /// Prefix of generated thread names.
    ///
    /// Threads created without a name are called `"<prefix><id>"`.
    pub name_prefix: String,
}

impl SchedulerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset without a limit on live threads.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Preset allowing at most `max_threads` started threads to be alive at once.
    ///
    /// # Arguments
    ///
    /// * `max_threads` - Upper bound on live threads, 0 meaning unlimited
    #[must_use]
    pub fn bounded(max_threads: usize) -> Self {
        Self {
            max_threads,
            ..Self::default()
        }
    }

    /// Sets the maximum number of live threads.
    #[must_use]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Sets the stack size for spawned OS threads.
    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Sets the prefix of generated thread names.
    #[must_use]
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Returns `true` if starting one more thread is allowed with `live` threads running.
    #[must_use]
    pub fn allows(&self, live: usize) -> bool {
        self.max_threads == 0 || live < self.max_threads
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            stack_size: None,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_threads, 0);
        assert_eq!(config.stack_size, None);
        assert_eq!(config.name_prefix, "Thread-");
        assert!(config.allows(usize::MAX - 1));
    }

    #[test]
    fn test_bounded_preset() {
        let config = SchedulerConfig::bounded(2);
        assert!(config.allows(0));
        assert!(config.allows(1));
        assert!(!config.allows(2));
    }

    #[test]
    fn test_builder_methods() {
        let config = SchedulerConfig::new()
            .with_max_threads(8)
            .with_stack_size(64 * 1024)
            .with_name_prefix("worker-");
        assert_eq!(config.max_threads, 8);
        assert_eq!(config.stack_size, Some(64 * 1024));
        assert_eq!(config.name_prefix, "worker-");
    }
}
