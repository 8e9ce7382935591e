//! Construction factories.
//!
//! Wrapping an existing allocation goes through [`SharedPtr::from_box`] or
//! [`SharedPtr::try_from_raw_in`] and a separate block. The functions here
//! build the value directly into a combined block: one allocation carries
//! the counts, the source and the value.

use crate::alloc::{or_handle_alloc_error, Global, MemorySource};
use crate::combined::CombinedBlock;
use crate::error::Result;
use crate::from_this::EnableSharedFromThis;
use crate::shared::SharedPtr;
use crate::weak::WeakPtr;

/// Move `value` into a combined block on the process heap.
///
/// ```
/// use shared_ptr::{make_shared, BlockKind};
///
/// let shared = make_shared(String::from("hello"));
/// assert_eq!(shared.len(), 5);
/// assert_eq!(shared.block_kind(), Some(BlockKind::Combined));
/// ```
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    make_shared_with(move || value)
}

/// Build the value with `init` straight into a combined block.
///
/// If `init` panics, the block is returned to the heap before the panic
/// continues.
pub fn make_shared_with<T, F>(init: F) -> SharedPtr<T>
where
    F: FnOnce() -> T,
{
    make_shared_cyclic(|_| init())
}

/// Build a value that holds weak handles to itself.
///
/// `init` receives a weak handle to the block under construction. It stays
/// expired until `init` returns, so locking it yields an empty handle, but
/// clones stored in the value become live observers afterwards.
///
/// ```
/// use shared_ptr::{make_shared_cyclic, WeakPtr};
///
/// struct Gadget {
///     me: WeakPtr<Gadget>,
/// }
///
/// let gadget = make_shared_cyclic(|me: &WeakPtr<Gadget>| Gadget { me: me.clone() });
/// assert!(gadget.me.lock().ptr_eq(&gadget));
/// assert_eq!(gadget.use_count(), 1);
/// assert_eq!(gadget.weak_count(), 1);
/// ```
pub fn make_shared_cyclic<T, F>(init: F) -> SharedPtr<T>
where
    F: FnOnce(&WeakPtr<T>) -> T,
{
    let raw = or_handle_alloc_error(CombinedBlock::allocate_cyclic(Global, init));
    // SAFETY: a freshly built combined block carries one strong unit.
    unsafe { SharedPtr::from_parts(raw) }
}

/// Move `value` into a combined block allocated from `source`.
///
/// On allocation failure `value` is dropped and the error returned.
pub fn allocate_shared<T, A>(source: A, value: T) -> Result<SharedPtr<T>>
where
    A: MemorySource + 'static,
{
    allocate_shared_with(source, move || value)
}

/// Build the value with `init` straight into a combined block allocated
/// from `source`.
///
/// `init` is not called when the block cannot be allocated.
pub fn allocate_shared_with<T, A, F>(source: A, init: F) -> Result<SharedPtr<T>>
where
    A: MemorySource + 'static,
    F: FnOnce() -> T,
{
    allocate_shared_cyclic(source, |_| init())
}

/// [`make_shared_cyclic`] with an explicit memory source.
pub fn allocate_shared_cyclic<T, A, F>(source: A, init: F) -> Result<SharedPtr<T>>
where
    A: MemorySource + 'static,
    F: FnOnce(&WeakPtr<T>) -> T,
{
    let raw = CombinedBlock::allocate_cyclic(source, init)?;
    // SAFETY: a freshly built combined block carries one strong unit.
    Ok(unsafe { SharedPtr::from_parts(raw) })
}

/// [`make_shared`] for a value with the self-reference capability; the
/// returned handle is already bound into it.
pub fn make_shared_enabled<T: EnableSharedFromThis>(value: T) -> SharedPtr<T> {
    let shared = make_shared(value);
    shared.bind_this();
    shared
}

/// [`allocate_shared`] for a value with the self-reference capability.
pub fn allocate_shared_enabled<T, A>(source: A, value: T) -> Result<SharedPtr<T>>
where
    T: EnableSharedFromThis,
    A: MemorySource + 'static,
{
    let shared = allocate_shared(source, value)?;
    shared.bind_this();
    Ok(shared)
}

/// [`make_shared_cyclic`] for a value with the self-reference capability.
///
/// `init` sees the expired weak handle as usual; the self-reference is bound
/// once the value is in place.
pub fn make_shared_cyclic_enabled<T, F>(init: F) -> SharedPtr<T>
where
    T: EnableSharedFromThis,
    F: FnOnce(&WeakPtr<T>) -> T,
{
    let shared = make_shared_cyclic(init);
    shared.bind_this();
    shared
}

/// [`allocate_shared_cyclic`] for a value with the self-reference capability.
pub fn allocate_shared_cyclic_enabled<T, A, F>(source: A, init: F) -> Result<SharedPtr<T>>
where
    T: EnableSharedFromThis,
    A: MemorySource + 'static,
    F: FnOnce(&WeakPtr<T>) -> T,
{
    let shared = allocate_shared_cyclic(source, init)?;
    shared.bind_this();
    Ok(shared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;
    use crate::from_this::WeakThis;
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    struct Tracker(Rc<Cell<u32>>);

    impl Drop for Tracker {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_make_shared_is_combined() {
        let shared = make_shared(5u32);
        assert_eq!(*shared, 5);
        assert_eq!(shared.use_count(), 1);
        assert_eq!(shared.weak_count(), 0);
        assert_eq!(shared.block_kind(), Some(BlockKind::Combined));
    }

    #[test]
    fn test_make_shared_destroys_once() {
        let drops = Rc::new(Cell::new(0));
        let a = make_shared(Tracker(drops.clone()));
        let b = a.clone();
        let w = b.downgrade();

        drop(a);
        assert_eq!(drops.get(), 0);
        drop(b);
        assert_eq!(drops.get(), 1);
        assert!(w.expired());
        drop(w);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_make_shared_with_builds_in_place() {
        let shared = make_shared_with(|| vec![0u8; 16]);
        assert_eq!(shared.len(), 16);
    }

    #[test]
    fn test_make_shared_zero_sized() {
        let unit = make_shared(());
        let copy = unit.clone();
        assert_eq!(copy.use_count(), 2);
    }

    #[test]
    fn test_cyclic_self_weak() {
        struct Gadget {
            me: WeakPtr<Gadget>,
            drops: Rc<Cell<u32>>,
        }

        impl Drop for Gadget {
            fn drop(&mut self) {
                assert!(self.me.expired());
                self.drops.set(self.drops.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let gadget = make_shared_cyclic(|me: &WeakPtr<Gadget>| Gadget {
            me: me.clone(),
            drops: drops.clone(),
        });

        assert_eq!(gadget.weak_count(), 1);
        assert!(gadget.me.lock().ptr_eq(&gadget));

        drop(gadget);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_panicking_init_leaves_nothing() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            make_shared_with::<String, _>(|| panic!("init failed"))
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_allocate_shared_global() {
        let shared = allocate_shared(Global, 'x').unwrap();
        assert_eq!(*shared, 'x');
        assert_eq!(shared.block_kind(), Some(BlockKind::Combined));
    }

    #[test]
    fn test_enabled_factories_bind() {
        struct Node {
            this: WeakThis<Node>,
        }

        impl EnableSharedFromThis for Node {
            fn weak_this(&self) -> &WeakThis<Self> {
                &self.this
            }
        }

        let a = make_shared_enabled(Node {
            this: WeakThis::new(),
        });
        assert!(a.this.is_bound());
        assert!(a.shared_from_this().unwrap().owner_eq(&a));

        let b = allocate_shared_enabled(
            Global,
            Node {
                this: WeakThis::new(),
            },
        )
        .unwrap();
        assert_eq!(b.shared_from_this().unwrap().use_count(), 2);

        let c = make_shared_cyclic_enabled(|_| Node {
            this: WeakThis::new(),
        });
        assert!(c.shared_from_this().unwrap().ptr_eq(&c));

        let d = allocate_shared_cyclic_enabled(Global, |_| Node {
            this: WeakThis::new(),
        })
        .unwrap();
        assert!(d.this.is_bound());
    }
}
