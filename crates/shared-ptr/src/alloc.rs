//! Memory sources.
//!
//! A [`MemorySource`] supplies the storage for control blocks and, for
//! separately allocated values, for the values themselves. The library never
//! reaches for an ambient allocator: every constructor is handed a source,
//! and the convenience constructors hand it [`Global`].

use crate::error::AllocError;
use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

/// An allocator capability: allocate, deallocate, construct and destroy.
///
/// Sources are cloned into every block they allocate, so that the block can
/// return its own storage when the last handle goes away. Cheap `Clone` (a
/// unit struct or an `Rc` to shared state) is expected.
///
/// # Safety
///
/// Safe handles dereference whatever this trait hands back, so implementors
/// must uphold the usual allocator contract:
///
/// - a successful [`allocate`](Self::allocate) returns storage valid for
///   reads and writes of `layout.size()` bytes, aligned to `layout.align()`,
///   and not aliased by any other live allocation;
/// - storage stays valid until it is passed to
///   [`deallocate`](Self::deallocate) on this source or one of its clones,
///   and clones share that storage pool;
/// - [`construct`](Self::construct) leaves a valid `U` at `slot`, and
///   [`destroy`](Self::destroy) drops the value at `slot` at most once;
/// - overrides of [`allocate_for`](Self::allocate_for) and
///   [`deallocate_for`](Self::deallocate_for) keep to `Layout::new::<U>()`.
///
/// A safe `impl` is rejected:
///
/// ```compile_fail
/// use shared_ptr::{AllocError, Global, MemorySource};
/// use std::alloc::Layout;
/// use std::ptr::NonNull;
///
/// #[derive(Clone)]
/// struct Lazy;
///
/// impl MemorySource for Lazy {
///     fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
///         Global.allocate(layout)
///     }
///
///     unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
///         Global.deallocate(ptr, layout)
///     }
/// }
/// ```
pub unsafe trait MemorySource: Clone {
    /// Allocate uninitialized storage for `layout`.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Return storage to this source.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`allocate`](Self::allocate) on this source (or a
    /// clone of it) with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Move `value` into uninitialized storage.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for writes and aligned for `U`.
    #[inline]
    unsafe fn construct<U>(&self, slot: NonNull<U>, value: U) {
        slot.as_ptr().write(value);
    }

    /// Run the destructor of the value at `slot` without freeing its storage.
    ///
    /// # Safety
    ///
    /// `slot` must point to a live value that is never used again.
    #[inline]
    unsafe fn destroy<U: ?Sized>(&self, slot: NonNull<U>) {
        std::ptr::drop_in_place(slot.as_ptr());
    }

    /// Allocate storage for one `U`; the typed ("rebound") form of `allocate`.
    #[inline]
    fn allocate_for<U>(&self) -> Result<NonNull<U>, AllocError> {
        self.allocate(Layout::new::<U>()).map(NonNull::cast)
    }

    /// Return storage obtained from [`allocate_for`](Self::allocate_for).
    ///
    /// # Safety
    ///
    /// Same contract as [`deallocate`](Self::deallocate) with `Layout::new::<U>()`.
    #[inline]
    unsafe fn deallocate_for<U>(&self, ptr: NonNull<U>) {
        self.deallocate(ptr.cast(), Layout::new::<U>());
    }
}

/// The process heap, through `std::alloc`.
///
/// # Example
///
/// ```
/// use shared_ptr::{Global, MemorySource};
///
/// let slot = Global.allocate_for::<u64>().unwrap();
/// unsafe {
///     Global.construct(slot, 7u64);
///     assert_eq!(*slot.as_ptr(), 7);
///     Global.destroy(slot);
///     Global.deallocate_for(slot);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: forwards to the global allocator; zero-sized requests get an
// aligned dangling pointer and are never freed.
unsafe impl MemorySource for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::new(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // Zero-sized requests never reached the heap.
        if layout.size() != 0 {
            dealloc(ptr.as_ptr(), layout);
        }
    }
}

/// A well-aligned, non-null address for zero-sized storage.
#[inline]
fn dangling(layout: Layout) -> NonNull<u8> {
    // SAFETY: alignments are never zero.
    unsafe { NonNull::new_unchecked(layout.align() as *mut u8) }
}

/// Unwrap an allocation result the way `Box` and `Rc` do.
#[inline]
pub(crate) fn or_handle_alloc_error<T>(result: Result<T, AllocError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => handle_alloc_error(err.layout()),
    }
}
