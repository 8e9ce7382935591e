//! Control blocks.
//!
//! A control block owns the [`OwnershipCounter`] for one managed value and is
//! the only party allowed to destroy that value or free its own storage.
//! Two strategies implement [`ControlBlock`]:
//!
//! - [`SeparateBlock`](crate::separate::SeparateBlock) points at a value
//!   allocated elsewhere and tears it down with a deleter.
//! - [`CombinedBlock`](crate::combined::CombinedBlock) embeds the value.
//!
//! Handles store an erased [`BlockRef`]. The dispatch table behind it is
//! generated from the `ControlBlock` implementation when the block is built,
//! so both strategies look the same to the handles.

use crate::counter::OwnershipCounter;
use std::alloc::Layout;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Which allocation strategy backs a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Value and block allocated independently.
    Separate,
    /// Value embedded in the block, one allocation.
    Combined,
}

/// The capability set every block strategy provides.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` with a [`BlockHeader`] built by
/// [`BlockHeader::new::<Self>`] as their first field.
pub(crate) unsafe trait ControlBlock: Sized {
    const KIND: BlockKind;

    /// Destroy the managed value. Called once, when strong drops to zero.
    ///
    /// # Safety
    ///
    /// `this` is a live block whose strong count just reached zero.
    unsafe fn destroy_value(this: NonNull<Self>);

    /// Return the block's storage to its source. Called once, when both
    /// counts are zero. The block is gone afterwards.
    ///
    /// # Safety
    ///
    /// `this` is a live block with no strong or weak units left.
    unsafe fn release_storage(this: NonNull<Self>);
}

/// Leading field of every block.
#[repr(C)]
pub(crate) struct BlockHeader {
    counter: OwnershipCounter,
    vtable: &'static BlockVTable,
}

impl BlockHeader {
    #[inline]
    pub(crate) fn new<B: ControlBlock>(strong: usize, weak: usize) -> Self {
        Self {
            counter: OwnershipCounter::new(strong, weak),
            vtable: VTableOf::<B>::VTABLE,
        }
    }
}

struct BlockVTable {
    kind: BlockKind,
    layout: Layout,
    destroy_value: unsafe fn(NonNull<BlockHeader>),
    release_storage: unsafe fn(NonNull<BlockHeader>),
}

struct VTableOf<B>(PhantomData<B>);

impl<B: ControlBlock> VTableOf<B> {
    const VTABLE: &'static BlockVTable = &BlockVTable {
        kind: B::KIND,
        layout: Layout::new::<B>(),
        destroy_value: destroy_value_erased::<B>,
        release_storage: release_storage_erased::<B>,
    };
}

unsafe fn destroy_value_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    B::destroy_value(header.cast());
}

unsafe fn release_storage_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    B::release_storage(header.cast());
}

/// Type-erased pointer to a live control block.
///
/// `BlockRef` is `Copy` and carries no count of its own; the handle holding
/// it owns one strong or weak unit, and every method assumes that unit is
/// still held.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockRef(NonNull<BlockHeader>);

impl BlockRef {
    /// # Safety
    ///
    /// `block` points to an initialized block.
    #[inline]
    pub(crate) unsafe fn from_block<B: ControlBlock>(block: NonNull<B>) -> Self {
        Self(block.cast())
    }

    #[inline]
    fn header(&self) -> &BlockHeader {
        // SAFETY: the caller's unit keeps the storage alive.
        unsafe { self.0.as_ref() }
    }

    #[inline]
    pub(crate) fn counter(&self) -> &OwnershipCounter {
        &self.header().counter
    }

    #[inline]
    pub(crate) fn kind(&self) -> BlockKind {
        self.header().vtable.kind
    }

    /// Layout of the concrete block, value slot included for combined blocks.
    #[inline]
    pub(crate) fn layout(&self) -> Layout {
        self.header().vtable.layout
    }

    /// Give up one strong unit, destroying the value if it was the last.
    ///
    /// # Safety
    ///
    /// The caller owns a strong unit and never uses this reference again.
    pub(crate) unsafe fn release_strong(self) {
        if self.counter().remove_strong() != 0 {
            return;
        }

        // The value may own weak handles to its own block. Holding a weak
        // unit across teardown keeps the storage alive until the value is
        // gone, and the guard releases it even if the deleter unwinds.
        self.counter().add_weak();
        let _unit = WeakUnit(self);

        log::trace!("destroying {:?} block value at {:p}", self.kind(), self.0);
        let destroy_value = self.header().vtable.destroy_value;
        destroy_value(self.0);
    }

    /// Give up one weak unit, freeing the block if nothing references it.
    ///
    /// # Safety
    ///
    /// The caller owns a weak unit and never uses this reference again.
    pub(crate) unsafe fn release_weak(self) {
        if self.counter().remove_weak() != 0 || !self.counter().expired() {
            return;
        }

        log::trace!(
            "releasing {:?} block storage at {:p} ({} bytes)",
            self.kind(),
            self.0,
            self.layout().size()
        );
        let release_storage = self.header().vtable.release_storage;
        release_storage(self.0);
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const () {
        self.0.as_ptr() as *const ()
    }
}

impl std::fmt::Debug for BlockRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BlockRef").field(&self.0).finish()
    }
}

/// Releases one weak unit on drop.
struct WeakUnit(BlockRef);

impl Drop for WeakUnit {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the guard owns the temporary weak unit added before teardown.
        unsafe { self.0.release_weak() };
    }
}

/// The `(cached value pointer, block)` pair held by non-empty handles.
pub(crate) struct RawParts<T: ?Sized> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) block: BlockRef,
}

// Manual impls: the pair is copyable whatever `T` is.
impl<T: ?Sized> Clone for RawParts<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for RawParts<T> {}

impl<T: ?Sized> RawParts<T> {
    /// Address of the value, metadata stripped.
    #[inline]
    pub(crate) fn addr(&self) -> *const () {
        self.ptr.as_ptr() as *const ()
    }
}
