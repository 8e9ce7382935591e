//! Self-reference capability.
//!
//! A value that embeds a [`WeakThis`] and implements
//! [`EnableSharedFromThis`] can mint new owning handles to itself. The
//! embedded state starts *unbound* and is bound exactly once, by the
//! constructor that first hands the value to a [`SharedPtr`]:
//! [`SharedPtr::from_box_enabled`], [`SharedPtr::try_from_raw_in_enabled`],
//! [`SharedPtr::new_in_enabled`], [`make_shared_enabled`],
//! [`make_shared_cyclic_enabled`] or [`allocate_shared_enabled`].
//!
//! The cached handle is weak, so the value never keeps itself alive.
//!
//! [`make_shared_enabled`]: crate::make_shared_enabled
//! [`make_shared_cyclic_enabled`]: crate::make_shared_cyclic_enabled
//! [`allocate_shared_enabled`]: crate::allocate_shared_enabled
//!
//! # Example
//!
//! ```
//! use shared_ptr::{make_shared_enabled, EnableSharedFromThis, WeakThis};
//!
//! struct Node {
//!     name: String,
//!     this: WeakThis<Node>,
//! }
//!
//! impl EnableSharedFromThis for Node {
//!     fn weak_this(&self) -> &WeakThis<Self> {
//!         &self.this
//!     }
//! }
//!
//! let node = make_shared_enabled(Node {
//!     name: "root".into(),
//!     this: WeakThis::new(),
//! });
//!
//! let again = node.shared_from_this().unwrap();
//! assert_eq!(again.name, "root");
//! assert_eq!(node.use_count(), 2);
//! assert!(again.owner_eq(&node));
//! ```

use crate::alloc::MemorySource;
use crate::error::{Error, Result};
use crate::policy::{Deleter, Policy};
use crate::shared::SharedPtr;
use crate::weak::WeakPtr;
use std::cell::OnceCell;
use std::fmt;
use std::ptr::NonNull;

/// Embedded self-reference state: one weak handle, set once.
pub struct WeakThis<T> {
    slot: OnceCell<WeakPtr<T>>,
}

impl<T> WeakThis<T> {
    /// Unbound state.
    #[inline]
    pub const fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// True once a [`SharedPtr`] has taken ownership of the enclosing value.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Cache a weak handle to `owner`. Only the first call has any effect.
    pub(crate) fn bind(&self, owner: &SharedPtr<T>) {
        if self.slot.set(owner.downgrade()).is_err() {
            log::warn!("self-reference already bound, ignoring second owner");
        }
    }

    pub(crate) fn lock(&self) -> Result<SharedPtr<T>> {
        let weak = self.slot.get().ok_or(Error::Unbound)?;
        let shared = weak.lock();
        if shared.is_empty() {
            Err(Error::Expired)
        } else {
            Ok(shared)
        }
    }

    pub(crate) fn weak(&self) -> WeakPtr<T> {
        self.slot.get().cloned().unwrap_or_default()
    }
}

/// A copied value is a different value: its state starts unbound.
impl<T> Clone for WeakThis<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Default for WeakThis<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WeakThis<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakThis")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Opt-in capability for values that need owning handles to themselves.
///
/// A value using it must only ever be owned by one control block. Never
/// place it under two independent `SharedPtr` constructors; the second bind
/// is ignored and the second owner cannot be reached through
/// [`shared_from_this`](Self::shared_from_this).
pub trait EnableSharedFromThis: Sized {
    /// The embedded state.
    fn weak_this(&self) -> &WeakThis<Self>;

    /// A new owning handle to `self`, sharing its existing control block.
    ///
    /// Fails with [`Error::Unbound`] if no `SharedPtr` owns the value, and
    /// with [`Error::Expired`] while the value is being torn down.
    fn shared_from_this(&self) -> Result<SharedPtr<Self>> {
        self.weak_this().lock()
    }

    /// A weak handle to `self`; empty while unbound.
    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.weak_this().weak()
    }
}

impl<T: EnableSharedFromThis> SharedPtr<T> {
    /// [`from_box`](Self::from_box), then bind the value's self-reference.
    pub fn from_box_enabled(value: Box<T>) -> Self {
        let shared = Self::from_box(value);
        shared.bind_this();
        shared
    }

    /// [`try_from_raw_in`](Self::try_from_raw_in), then bind the value's
    /// self-reference.
    ///
    /// # Safety
    ///
    /// Same contract as [`try_from_raw_in`](Self::try_from_raw_in).
    pub unsafe fn try_from_raw_in_enabled<D, A>(
        ptr: NonNull<T>,
        policy: Policy<D, A>,
    ) -> Result<Self>
    where
        D: Deleter<T> + 'static,
        A: MemorySource + 'static,
    {
        let shared = Self::try_from_raw_in(ptr, policy)?;
        shared.bind_this();
        Ok(shared)
    }

    /// [`new_in`](Self::new_in), then bind the value's self-reference.
    pub fn new_in_enabled<A: MemorySource + 'static>(value: T, source: A) -> Result<Self> {
        let shared = Self::new_in(value, source)?;
        shared.bind_this();
        Ok(shared)
    }

    pub(crate) fn bind_this(&self) {
        if let Some(value) = self.get() {
            value.weak_this().bind(self);
        }
    }
}
