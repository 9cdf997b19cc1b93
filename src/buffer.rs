//! Growable character storage.
//!
//! [`CharBuffer`] is the append-only character buffer that string building is based on. It
//! keeps a contiguous block of storage and a logical length, and grows the storage whenever an
//! append would not fit.
//!
//! # Growth Policy
//!
//! When an append needs more room than the current capacity, the storage is reallocated to
//! `max(required, 2 * capacity)` and the existing prefix is copied over. Appends therefore run
//! in amortized constant time per character.
//!
//! # Thread Safety
//!
//! A `CharBuffer` has no internal synchronization. Mutation requires `&mut self`, so sharing
//! one between threads has to go through a lock. With the monitors of this crate that is a
//! [`Synchronized`](crate::Synchronized) wrapping a `RefCell`:
//!
//! ```rust
//! use objsync::{CharBuffer, Synchronized, Thread};
//! use std::{cell::RefCell, sync::Arc};
//!
//! let shared = Arc::new(Synchronized::new(RefCell::new(CharBuffer::new())));
//!
//! let workers: Vec<Thread> = (0..4)
//!     .map(|_| {
//!         let shared = shared.clone();
//!         Thread::new(move || {
//!             for _ in 0..25 {
//!                 shared.lock().borrow_mut().append_str("ab");
//!             }
//!             Ok(())
//!         })
//!     })
//!     .collect();
//!
//! for worker in &workers {
//!     worker.start()?;
//! }
//! for worker in &workers {
//!     worker.join()?;
//! }
//! assert_eq!(shared.lock().borrow().len(), 200);
//! # Ok::<(), objsync::Error>(())
//! ```

use std::fmt;

/// An append-only, growable buffer of characters.
///
/// Invariant: `len() <= capacity()`.
#[derive(Clone, Default)]
pub struct CharBuffer {
    /// Backing storage. Its length is the capacity; slots past `count` are filler.
    storage: Vec<char>,
    /// Number of meaningful characters at the front of `storage`.
    count: usize,
}

impl CharBuffer {
    /// Creates an empty buffer without allocating.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` characters.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of characters that can be appended before the first reallocation
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec!['\0'; capacity],
            count: 0,
        }
    }

    /// Copies `chars` after the current logical end, growing the storage if needed.
    ///
    /// # Returns
    ///
    /// The new logical length.
    pub fn append(&mut self, chars: &[char]) -> usize {
        let required = self.count + chars.len();
        if required > self.storage.len() {
            self.grow(required);
        }

        self.storage[self.count..required].copy_from_slice(chars);
        self.count = required;
        self.count
    }

    /// Appends every character of `s`.
    ///
    /// # Returns
    ///
    /// The new logical length.
    pub fn append_str(&mut self, s: &str) -> usize {
        let chars: Vec<char> = s.chars().collect();
        self.append(&chars)
    }

    /// Number of characters in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if nothing has been appended since creation or the last [`clear`](Self::clear).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of characters the buffer can hold without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The logical contents.
    #[must_use]
    pub fn as_slice(&self) -> &[char] {
        &self.storage[..self.count]
    }

    /// Resets the logical length to zero. The capacity is kept.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    fn grow(&mut self, required: usize) {
        let new_capacity = required.max(self.storage.len().saturating_mul(2));
        self.storage.resize(new_capacity, '\0');
    }
}

impl fmt::Display for CharBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_slice().iter().try_for_each(|c| fmt::Write::write_char(f, *c))
    }
}

impl fmt::Debug for CharBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharBuffer")
            .field("contents", &self.to_string())
            .field("len", &self.count)
            .field("capacity", &self.storage.len())
            .finish()
    }
}

impl From<&str> for CharBuffer {
    fn from(s: &str) -> Self {
        let mut buffer = CharBuffer::new();
        buffer.append_str(s);
        buffer
    }
}
