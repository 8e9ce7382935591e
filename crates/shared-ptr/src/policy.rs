//! Destruction policies and the construction configuration.
//!
//! A separately allocated value is torn down by a [`Deleter`]; the block that
//! tracks it is allocated from a [`MemorySource`](crate::MemorySource). The
//! pair is handed to constructors as one explicit [`Policy`] value instead
//! of being picked up from defaults behind the caller's back.

use crate::alloc::{Global, MemorySource};
use std::ptr::NonNull;

/// Tears down a managed value given its raw pointer.
///
/// Any `FnMut(NonNull<T>)` closure is a deleter.
pub trait Deleter<T: ?Sized> {
    /// Destroy the value at `ptr` and release its storage.
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer this deleter was configured for, and it is
    /// called at most once.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Ordinary single-object destruction: the pointer came from `Box::into_raw`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

/// Destroys in place, then returns the value's memory to a source.
///
/// Pairs with values placed in storage from
/// [`MemorySource::allocate_for`].
#[derive(Debug, Clone, Default)]
pub struct SourceDelete<A> {
    source: A,
}

impl<A: MemorySource> SourceDelete<A> {
    #[inline]
    pub fn new(source: A) -> Self {
        Self { source }
    }

    #[inline]
    pub fn source(&self) -> &A {
        &self.source
    }
}

impl<T, A: MemorySource> Deleter<T> for SourceDelete<A> {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        // Storage goes back even if the destructor unwinds.
        struct Dealloc<'a, T, A: MemorySource>(&'a A, NonNull<T>);
        impl<T, A: MemorySource> Drop for Dealloc<'_, T, A> {
            fn drop(&mut self) {
                unsafe { self.0.deallocate_for(self.1) };
            }
        }

        let _dealloc = Dealloc(&self.source, ptr);
        self.source.destroy(ptr);
    }
}

impl<T: ?Sized, F: FnMut(NonNull<T>)> Deleter<T> for F {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        self(ptr)
    }
}

/// Construction configuration: `{deleter, source}`.
///
/// `Policy::new()` is `{DefaultDelete, Global}`.
///
/// # Example
///
/// ```
/// use shared_ptr::{Global, Policy, SharedPtr};
/// use std::ptr::NonNull;
///
/// let policy = Policy::new()
///     .with_deleter(|ptr: NonNull<i32>| unsafe { drop(Box::from_raw(ptr.as_ptr())) })
///     .with_source(Global);
///
/// let raw = NonNull::from(Box::leak(Box::new(5)));
/// let shared = unsafe { SharedPtr::try_from_raw_in(raw, policy) }.unwrap();
/// assert_eq!(*shared, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Policy<D = DefaultDelete, A = Global> {
    deleter: D,
    source: A,
}

impl Policy {
    /// The default heap policy.
    #[inline]
    pub fn new() -> Self {
        Self {
            deleter: DefaultDelete,
            source: Global,
        }
    }
}

impl<D, A> Policy<D, A> {
    /// Replace the destruction policy.
    #[inline]
    pub fn with_deleter<D2>(self, deleter: D2) -> Policy<D2, A> {
        Policy {
            deleter,
            source: self.source,
        }
    }

    /// Replace the memory source used for the control block.
    #[inline]
    pub fn with_source<A2: MemorySource>(self, source: A2) -> Policy<D, A2> {
        Policy {
            deleter: self.deleter,
            source,
        }
    }

    #[inline]
    pub fn deleter(&self) -> &D {
        &self.deleter
    }

    #[inline]
    pub fn source(&self) -> &A {
        &self.source
    }

    #[inline]
    pub(crate) fn into_parts(self) -> (D, A) {
        (self.deleter, self.source)
    }
}
