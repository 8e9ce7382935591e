//! Strong (owning) handle.

use crate::alloc::{or_handle_alloc_error, Global, MemorySource};
use crate::block::{BlockKind, RawParts};
use crate::error::{Error, Result};
use crate::policy::{DefaultDelete, Deleter, Policy, SourceDelete};
use crate::separate::SeparateBlock;
use crate::weak::WeakPtr;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

/// A shared owning handle.
///
/// Every non-empty `SharedPtr` holds one strong unit on its control block.
/// The value is destroyed exactly when the last strong unit is released;
/// the block itself lingers while [`WeakPtr`]s still observe it.
///
/// `Clone` shares ownership (strong + 1). Moving a handle transfers its unit
/// without touching the count. An empty handle owns nothing and reports a
/// `use_count` of zero.
///
/// # Example
///
/// ```
/// use shared_ptr::SharedPtr;
///
/// let a = SharedPtr::from_box(Box::new(vec![1, 2, 3]));
/// let b = a.clone();
/// assert_eq!(a.use_count(), 2);
/// assert_eq!(*b, vec![1, 2, 3]);
///
/// drop(a);
/// assert_eq!(b.use_count(), 1);
/// ```
pub struct SharedPtr<T: ?Sized> {
    raw: Option<RawParts<T>>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> SharedPtr<T> {
    /// A handle that owns nothing.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            raw: None,
            _marker: PhantomData,
        }
    }

    /// Wrap parts whose strong unit has already been counted.
    ///
    /// # Safety
    ///
    /// The caller transfers exactly one strong unit on `raw.block`.
    #[inline]
    pub(crate) unsafe fn from_parts(raw: RawParts<T>) -> Self {
        Self {
            raw: Some(raw),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn parts(&self) -> Option<RawParts<T>> {
        self.raw
    }

    /// Take ownership of a boxed value through a separate block.
    ///
    /// Works for unsized values too, so `Box<dyn Trait>` becomes
    /// `SharedPtr<dyn Trait>`.
    pub fn from_box(value: Box<T>) -> Self {
        // SAFETY: `Box::into_raw` never returns null, and the default
        // deleter rebuilds the box.
        unsafe {
            let ptr = NonNull::new_unchecked(Box::into_raw(value));
            let block = or_handle_alloc_error(SeparateBlock::adopt(ptr, DefaultDelete, Global));
            Self::from_parts(RawParts { ptr, block })
        }
    }

    /// Take ownership of a pointer obtained from `Box::into_raw`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::into_raw` and be owned by nothing else.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self::from_box(Box::from_raw(ptr.as_ptr()))
    }

    /// Take ownership of `ptr` with an explicit destruction policy and
    /// block source.
    ///
    /// If the block cannot be allocated, the deleter is applied to `ptr`
    /// and the allocation error is returned.
    ///
    /// # Safety
    ///
    /// `ptr` must be live, valid for `policy`'s deleter, and owned by nothing
    /// else.
    pub unsafe fn try_from_raw_in<D, A>(ptr: NonNull<T>, policy: Policy<D, A>) -> Result<Self>
    where
        D: Deleter<T> + 'static,
        A: MemorySource + 'static,
    {
        let (deleter, source) = policy.into_parts();
        let block = SeparateBlock::adopt(ptr, deleter, source)?;
        Ok(Self::from_parts(RawParts { ptr, block }))
    }

    /// True if this handle owns nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// Borrow the value, or `None` for an empty handle.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: our strong unit keeps the value alive.
        self.raw.map(|raw| unsafe { &*raw.ptr.as_ptr() })
    }

    /// The cached value pointer. Ownership is not transferred.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.raw.map(|raw| raw.ptr)
    }

    /// Mutable access while this is the only handle of any kind.
    ///
    /// Returns `None` when other strong or weak handles exist.
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let raw = self.raw?;
        let counter = raw.block.counter();
        if counter.strong() == 1 && counter.weak() == 0 {
            // SAFETY: no other handle can reach the value.
            Some(unsafe { &mut *raw.ptr.as_ptr() })
        } else {
            None
        }
    }

    /// Number of strong handles sharing this block; zero if empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.counter().strong())
    }

    /// Number of weak handles observing this block; zero if empty.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.counter().weak())
    }

    /// Which block strategy backs this handle.
    #[inline]
    pub fn block_kind(&self) -> Option<BlockKind> {
        self.raw.map(|raw| raw.block.kind())
    }

    /// Create a weak observer of this handle's block.
    #[inline]
    pub fn downgrade(&self) -> WeakPtr<T> {
        WeakPtr::from(self)
    }

    /// Release ownership, leaving this handle empty.
    #[inline]
    pub fn reset(&mut self) {
        Self::empty().swap(self);
    }

    /// Release ownership and take ownership of `value` instead.
    #[inline]
    pub fn reset_to(&mut self, value: Box<T>) {
        Self::from_box(value).swap(self);
    }

    /// Exchange the contents of two handles. Counts are untouched.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.raw, &mut other.raw);
    }

    /// True if both handles point at the same value (both empty counts).
    ///
    /// Distinct zero-sized values can share an address, so for them the
    /// handles must also share a control block.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.raw, other.raw) {
            (Some(a), Some(b)) if a.addr() == b.addr() => {
                // SAFETY: our strong unit keeps the value alive.
                let size = std::mem::size_of_val(unsafe { a.ptr.as_ref() });
                size != 0 || a.block == b.block
            }
            (None, None) => true,
            _ => false,
        }
    }

    /// True if both handles share one control block, whatever they point at.
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool {
        self.raw.map(|raw| raw.block) == other.raw.map(|raw| raw.block)
    }

    /// Convert to a handle on something reachable from the value, sharing
    /// this handle's block.
    ///
    /// This is how a handle changes its static type: project to a field,
    /// or coerce to a trait object.
    ///
    /// ```
    /// use shared_ptr::{make_shared, SharedPtr};
    /// use std::fmt::Display;
    ///
    /// let owner = make_shared(42u32);
    /// let shown: SharedPtr<dyn Display> = SharedPtr::map(owner.clone(), |v| v as &dyn Display);
    /// assert_eq!(shown.to_string(), "42");
    /// assert_eq!(owner.use_count(), 2);
    /// assert!(shown.owner_eq(&owner));
    /// ```
    pub fn map<U, F>(this: Self, f: F) -> SharedPtr<U>
    where
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        let Some(raw) = this.raw else {
            return SharedPtr::empty();
        };
        // SAFETY: `this` still holds its unit while `f` runs.
        let target = NonNull::from(f(unsafe { &*raw.ptr.as_ptr() }));
        std::mem::forget(this);
        // SAFETY: the unit moves from `this` to the new handle.
        unsafe {
            SharedPtr::from_parts(RawParts {
                ptr: target,
                block: raw.block,
            })
        }
    }
}

impl<T> SharedPtr<T> {
    /// Allocate `value` from `source` and manage it through a separate block
    /// allocated from the same source.
    ///
    /// Two allocations are made; the value is returned to `source` by a
    /// [`SourceDelete`] when the last strong handle goes.
    pub fn new_in<A: MemorySource + 'static>(value: T, source: A) -> Result<Self> {
        let slot = source.allocate_for::<T>()?;
        // SAFETY: the slot is freshly allocated for a `T`.
        unsafe {
            source.construct(slot, value);
            let policy = Policy::new()
                .with_deleter(SourceDelete::new(source.clone()))
                .with_source(source);
            Self::try_from_raw_in(slot, policy)
        }
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.block.counter().add_strong();
        }
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: we owned this strong unit.
            unsafe { raw.block.release_strong() };
        }
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    /// # Panics
    ///
    /// Dereferencing an empty handle is a contract violation and panics.
    #[inline]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty SharedPtr"),
        }
    }
}

impl<T: ?Sized> AsRef<T> for SharedPtr<T> {
    #[inline]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    #[inline]
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

/// The checked weak-to-strong conversion: fails instead of minting an owner
/// over a destroyed value.
impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = Error;

    fn try_from(weak: &WeakPtr<T>) -> Result<Self> {
        let shared = weak.lock();
        if shared.is_empty() {
            Err(Error::Expired)
        } else {
            Ok(shared)
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f
                .debug_struct("SharedPtr")
                .field("value", &value)
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("SharedPtr(empty)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.raw.map_or(std::ptr::null(), |raw| raw.addr());
        fmt::Pointer::fmt(&addr, f)
    }
}
