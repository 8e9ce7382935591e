//! Weak (observing) handles.

use crate::block::RawParts;
use crate::shared::SharedPtr;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A non-owning observer of a shared value.
///
/// A weak handle keeps the control block alive but never the value. It can
/// report whether the value is gone and temporarily regain ownership through
/// [`lock`](Self::lock).
///
/// # Example
///
/// ```
/// use shared_ptr::{make_shared, WeakPtr};
///
/// let strong = make_shared(42);
/// let weak = WeakPtr::from(&strong);
///
/// assert!(!weak.expired());
/// assert_eq!(*weak.lock(), 42);
///
/// drop(strong);
///
/// assert!(weak.expired());
/// assert!(weak.lock().is_empty());
/// ```
pub struct WeakPtr<T: ?Sized> {
    raw: Option<RawParts<T>>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// A weak handle observing nothing. It is always expired.
    #[inline]
    pub const fn new() -> Self {
        Self {
            raw: None,
            _marker: PhantomData,
        }
    }

    /// Wrap parts whose weak unit has already been counted.
    ///
    /// # Safety
    ///
    /// The caller transfers exactly one weak unit on `raw.block`.
    #[inline]
    pub(crate) unsafe fn from_parts(raw: RawParts<T>) -> Self {
        Self {
            raw: Some(raw),
            _marker: PhantomData,
        }
    }

    /// True if the observed value has been destroyed, or nothing is observed.
    #[inline]
    pub fn expired(&self) -> bool {
        self.raw.map_or(true, |raw| raw.block.counter().expired())
    }

    /// Number of strong handles on the observed block; zero if empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.counter().strong())
    }

    /// Number of weak handles on the observed block; zero if empty.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.counter().weak())
    }

    /// Obtain a strong handle if the value is still alive.
    ///
    /// The strong count is only incremented after the liveness check, so
    /// locking an expired handle mutates nothing and returns an empty
    /// [`SharedPtr`].
    pub fn lock(&self) -> SharedPtr<T> {
        match self.raw {
            Some(raw) if !raw.block.counter().expired() => {
                raw.block.counter().add_strong();
                // SAFETY: the strong unit was just added for this handle.
                unsafe { SharedPtr::from_parts(raw) }
            }
            _ => SharedPtr::empty(),
        }
    }

    /// Stop observing, leaving this handle empty.
    #[inline]
    pub fn reset(&mut self) {
        Self::new().swap(self);
    }

    /// Exchange the contents of two handles. Counts are untouched.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Observe `shared` instead, releasing the previous observation.
    #[inline]
    pub fn assign(&mut self, shared: &SharedPtr<T>) {
        *self = Self::from(shared);
    }

    /// True if both observe the same value address (both empty counts).
    ///
    /// The value may already be gone, so its size is unknown here: distinct
    /// zero-sized values can share an address. Use
    /// [`owner_eq`](Self::owner_eq) to tell observers of different blocks
    /// apart.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.raw.map(|raw| raw.addr()) == other.raw.map(|raw| raw.addr())
    }

    /// True if both observe one control block, whatever they point at.
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        self.raw.map(|raw| raw.block) == other.raw.map(|raw| raw.block)
    }

    /// Convert to an observer of another type on the same block.
    ///
    /// `f` maps the cached value pointer without dereferencing it, so this
    /// works on expired handles too. The usual use is an unsizing cast:
    ///
    /// ```
    /// use shared_ptr::{make_shared, WeakPtr};
    /// use std::fmt::Display;
    /// use std::ptr::NonNull;
    ///
    /// let strong = make_shared(5u8);
    /// let weak = strong.downgrade();
    /// let shown: WeakPtr<dyn Display> =
    ///     unsafe { WeakPtr::map_ptr(weak, |p| -> NonNull<dyn Display> { p }) };
    /// assert_eq!(shown.lock().to_string(), "5");
    /// ```
    ///
    /// # Safety
    ///
    /// `f` must not read through its argument. Whenever the value is alive
    /// the returned pointer must be valid for reads as a `U` for as long as
    /// the value is. If the value may already be destroyed, `f` may only
    /// change the pointer's type or metadata (`cast`, an unsizing coercion);
    /// projecting into a freed value is not allowed.
    pub unsafe fn map_ptr<U, F>(this: Self, f: F) -> WeakPtr<U>
    where
        U: ?Sized,
        F: FnOnce(NonNull<T>) -> NonNull<U>,
    {
        let Some(raw) = this.raw else {
            return WeakPtr::new();
        };
        let ptr = f(raw.ptr);
        std::mem::forget(this);
        WeakPtr::from_parts(RawParts {
            ptr,
            block: raw.block,
        })
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    #[inline]
    fn from(shared: &SharedPtr<T>) -> Self {
        match shared.parts() {
            Some(raw) => {
                raw.block.counter().add_weak();
                // SAFETY: the weak unit was just added for this handle.
                unsafe { Self::from_parts(raw) }
            }
            None => Self::new(),
        }
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.block.counter().add_weak();
        }
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: we owned this weak unit.
            unsafe { raw.block.release_weak() };
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(WeakPtr)")
    }
}
