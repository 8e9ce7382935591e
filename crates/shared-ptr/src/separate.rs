//! Control block for a separately allocated value.

use crate::alloc::MemorySource;
use crate::block::{BlockHeader, BlockKind, BlockRef, ControlBlock};
use crate::error::AllocError;
use crate::policy::Deleter;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

/// Block holding a raw pointer to a value that lives in its own allocation.
///
/// The value pointer is cleared once the deleter has run. The deleter and
/// the source stay in the block until its storage is released.
#[repr(C)]
pub(crate) struct SeparateBlock<T: ?Sized, D, A> {
    header: BlockHeader,
    value: Option<NonNull<T>>,
    deleter: ManuallyDrop<D>,
    source: ManuallyDrop<A>,
}

impl<T, D, A> SeparateBlock<T, D, A>
where
    T: ?Sized,
    D: Deleter<T> + 'static,
    A: MemorySource + 'static,
{
    /// Allocate a block taking ownership of `value`, with strong = 1.
    ///
    /// If the source cannot supply the block, the deleter is applied to
    /// `value` before the error is returned.
    ///
    /// # Safety
    ///
    /// `value` must be live and valid for `deleter`, and owned by nothing else.
    pub(crate) unsafe fn adopt(
        value: NonNull<T>,
        mut deleter: D,
        source: A,
    ) -> Result<BlockRef, AllocError> {
        let block = match source.allocate_for::<Self>() {
            Ok(block) => block,
            Err(err) => {
                log::trace!("separate block allocation failed: {err}");
                deleter.delete(value);
                return Err(err);
            }
        };

        let init = Self {
            header: BlockHeader::new::<Self>(1, 0),
            value: Some(value),
            deleter: ManuallyDrop::new(deleter),
            source: ManuallyDrop::new(source.clone()),
        };
        source.construct(block, init);

        log::trace!("created separate block at {:p}", block);
        Ok(BlockRef::from_block(block))
    }
}

unsafe impl<T, D, A> ControlBlock for SeparateBlock<T, D, A>
where
    T: ?Sized,
    D: Deleter<T> + 'static,
    A: MemorySource + 'static,
{
    const KIND: BlockKind = BlockKind::Separate;

    unsafe fn destroy_value(this: NonNull<Self>) {
        let block = this.as_ptr();
        if let Some(value) = (*block).value.take() {
            Deleter::<T>::delete(&mut *(*block).deleter, value);
        }
    }

    unsafe fn release_storage(this: NonNull<Self>) {
        let block = this.as_ptr();
        debug_assert!((*block).value.is_none(), "storage released before value");

        let deleter = ManuallyDrop::take(&mut (*block).deleter);
        let source = ManuallyDrop::take(&mut (*block).source);
        source.deallocate_for(this);
        drop(deleter);
    }
}
