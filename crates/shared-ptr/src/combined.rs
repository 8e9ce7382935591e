//! Control block with the value embedded in it.

use crate::alloc::MemorySource;
use crate::block::{BlockHeader, BlockKind, BlockRef, ControlBlock, RawParts};
use crate::error::AllocError;
use crate::weak::WeakPtr;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ptr::{addr_of, addr_of_mut, NonNull};

/// One allocation holding the counts, the source and the value.
///
/// The value slot is initialized once construction succeeds and torn down in
/// place when the last strong handle goes; the slot itself is only returned
/// with the whole block.
#[repr(C)]
pub(crate) struct CombinedBlock<T, A> {
    header: BlockHeader,
    source: ManuallyDrop<A>,
    value: MaybeUninit<T>,
}

impl<T, A: MemorySource + 'static> CombinedBlock<T, A> {
    /// Allocate a block, then build the value straight into it.
    ///
    /// `init` sees a weak handle to the block being built; it stays expired
    /// until `init` returns. If `init` unwinds, that weak handle is the last
    /// unit and its drop returns the block to the source, value slot never
    /// touched.
    pub(crate) fn allocate_cyclic<F>(source: A, init: F) -> Result<RawParts<T>, AllocError>
    where
        F: FnOnce(&WeakPtr<T>) -> T,
    {
        let block = source.allocate_for::<Self>()?;
        let raw = unsafe {
            let ptr = block.as_ptr();
            addr_of_mut!((*ptr).header).write(BlockHeader::new::<Self>(0, 1));
            addr_of_mut!((*ptr).source).write(ManuallyDrop::new(source));
            RawParts {
                ptr: NonNull::new_unchecked(addr_of_mut!((*ptr).value).cast::<T>()),
                block: BlockRef::from_block(block),
            }
        };
        log::trace!("created combined block at {:p}", block);

        // Owns the initial weak unit.
        let weak = unsafe { WeakPtr::from_parts(raw) };
        let value = init(&weak);

        unsafe {
            let source = &*addr_of!((*block.as_ptr()).source);
            source.construct(raw.ptr, value);
        }
        raw.block.counter().add_strong();
        drop(weak);

        Ok(raw)
    }
}

unsafe impl<T, A: MemorySource + 'static> ControlBlock for CombinedBlock<T, A> {
    const KIND: BlockKind = BlockKind::Combined;

    unsafe fn destroy_value(this: NonNull<Self>) {
        let block = this.as_ptr();
        let value = NonNull::new_unchecked(addr_of_mut!((*block).value).cast::<T>());
        let source = &*addr_of!((*block).source);
        source.destroy(value);
    }

    unsafe fn release_storage(this: NonNull<Self>) {
        let source = ManuallyDrop::take(&mut (*this.as_ptr()).source);
        source.deallocate_for(this);
    }
}
