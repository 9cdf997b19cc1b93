#![allow(unused_macros)]

/// Helper macro for locking the internal state mutexes
///
/// Internal mutexes never run user code while held, so a poisoned lock still guards
/// consistent state and is recovered instead of propagated.
///
/// ```rust, ignore
///  let mut state = lock!(self.state);
///  state.recursion_count += 1;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}

/// Runs a block while holding a monitor.
///
/// The first argument is anything with a `lock()` method returning a scoped guard: a
/// [`Monitor`](crate::Monitor), a [`Synchronized`](crate::Synchronized) value, or the
/// monitor of a [`Thread`](crate::Thread). The guard is bound to the given name (or `_guard`)
/// and released on every exit path of the block, including `?`, `return` and panics.
///
/// ```rust
/// use objsync::{synchronized, Monitor};
///
/// static LOCK: Monitor = Monitor::new();
///
/// let value = synchronized!(LOCK => {
///     assert!(LOCK.is_held_by_current_thread());
///     42
/// });
/// assert_eq!(value, 42);
/// assert!(!LOCK.is_locked());
/// ```
///
/// Binding the guard gives access to `wait` / `notify`:
///
/// ```rust
/// use objsync::{synchronized, Monitor};
/// use std::time::Duration;
///
/// let monitor = Monitor::new();
/// synchronized!(monitor, guard => {
///     guard.notify_all()?;
///     guard.wait_timeout(Duration::from_millis(1))?;
/// });
/// # Ok::<(), objsync::Error>(())
/// ```
#[macro_export]
macro_rules! synchronized {
    ($target:expr, $guard:ident => $body:block) => {{
        #[allow(unused_mut)]
        let mut $guard = $target.lock();
        $body
    }};
    ($target:expr => $body:block) => {{
        let _guard = $target.lock();
        $body
    }};
}
