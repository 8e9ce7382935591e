//! Strong/weak ownership accounting.
//!
//! Every control block owns exactly one [`OwnershipCounter`]. Handles never
//! touch the managed value's lifetime directly; they only bump these counts
//! and let the block react when one of them reaches zero.

use std::cell::Cell;

/// Upper bound for either count. Going past it aborts the process,
/// as `std::rc` does.
const MAX_COUNT: usize = isize::MAX as usize;

/// The `(strong, weak)` pair tracked by a control block.
///
/// Counts are plain `Cell`s, so every handle sharing one counter must stay on
/// one thread. The handle types are `!Send` and `!Sync` for that reason.
///
/// # Example
///
/// ```
/// use shared_ptr::OwnershipCounter;
///
/// let counter = OwnershipCounter::new(1, 0);
/// counter.add_weak();
/// assert_eq!(counter.remove_strong(), 0);
/// assert!(counter.expired());
/// assert_eq!(counter.weak(), 1);
/// ```
#[derive(Debug, Default)]
pub struct OwnershipCounter {
    strong: Cell<usize>,
    weak: Cell<usize>,
}

impl OwnershipCounter {
    /// Create a counter with the given initial counts.
    #[inline]
    pub const fn new(strong: usize, weak: usize) -> Self {
        Self {
            strong: Cell::new(strong),
            weak: Cell::new(weak),
        }
    }

    /// Current number of strong owners.
    #[inline]
    pub fn strong(&self) -> usize {
        self.strong.get()
    }

    /// Current number of weak observers.
    #[inline]
    pub fn weak(&self) -> usize {
        self.weak.get()
    }

    /// True once the last strong owner is gone.
    #[inline]
    pub fn expired(&self) -> bool {
        self.strong() == 0
    }

    /// Increment the strong count, returning the new value.
    #[inline]
    pub fn add_strong(&self) -> usize {
        increment(&self.strong, "strong")
    }

    /// Decrement the strong count, returning the new value.
    ///
    /// Decrementing a zero count is a contract violation and aborts.
    #[inline]
    pub fn remove_strong(&self) -> usize {
        decrement(&self.strong, "strong")
    }

    /// Increment the weak count, returning the new value.
    #[inline]
    pub fn add_weak(&self) -> usize {
        increment(&self.weak, "weak")
    }

    /// Decrement the weak count, returning the new value.
    ///
    /// Decrementing a zero count is a contract violation and aborts.
    #[inline]
    pub fn remove_weak(&self) -> usize {
        decrement(&self.weak, "weak")
    }

    /// True when neither strong owners nor weak observers remain.
    #[inline]
    pub fn is_unreferenced(&self) -> bool {
        self.strong() == 0 && self.weak() == 0
    }
}

#[inline]
fn increment(count: &Cell<usize>, which: &'static str) -> usize {
    let val = count.get();
    if val >= MAX_COUNT {
        abort_on(which, "overflow");
    }
    count.set(val + 1);
    val + 1
}

#[inline]
fn decrement(count: &Cell<usize>, which: &'static str) -> usize {
    let val = count.get();
    if val == 0 {
        abort_on(which, "underflow");
    }
    count.set(val - 1);
    val - 1
}

#[cold]
#[inline(never)]
fn abort_on(which: &'static str, what: &'static str) -> ! {
    log::error!("{which} reference count {what}, aborting");
    std::process::abort()
}
