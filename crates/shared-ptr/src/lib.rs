//! # Shared-Ptr
//!
//! Reference-counted shared ownership with weak observers, for single-threaded
//! code that needs deterministic release.
//!
//! A [`SharedPtr`] owns a value together with any number of clones; the value
//! is destroyed the instant the last one goes. A [`WeakPtr`] observes without
//! owning and can tell when the value is gone. Every handle points at a
//! control block holding the counts.
//!
//! ## Features
//!
//! - **Two block strategies**: adopt an existing allocation (separate block),
//!   or build the value inside the block (combined block, one allocation)
//! - **Pluggable destruction**: deleters, including any `FnMut(NonNull<T>)`
//! - **Pluggable memory sources**: blocks and values come from a
//!   [`MemorySource`], [`Global`] by default
//! - **Self-reference**: values can mint owning handles to themselves via
//!   [`EnableSharedFromThis`]
//! - **Unsized values**: `SharedPtr<dyn Trait>` and `SharedPtr<[T]>`
//!
//! Counts are plain `Cell`s. Handles are neither `Send` nor `Sync`.
//!
//! ## Quick Start
//!
//! ```rust
//! use shared_ptr::{make_shared, SharedPtr, WeakPtr};
//!
//! let a = make_shared(String::from("hello"));
//! let b = SharedPtr::clone(&a);
//! assert_eq!(a.use_count(), 2);
//!
//! let w = WeakPtr::from(&b);
//! drop(a);
//! drop(b); // Value destroyed here
//!
//! assert!(w.expired());
//! assert!(w.lock().is_empty());
//! ```

mod alloc;
mod block;
mod combined;
mod counter;
mod error;
mod factory;
mod from_this;
mod policy;
mod separate;
mod shared;
mod weak;

pub use alloc::{Global, MemorySource};
pub use block::BlockKind;
pub use counter::OwnershipCounter;
pub use error::{AllocError, Error, Result};
pub use factory::{
    allocate_shared, allocate_shared_cyclic, allocate_shared_cyclic_enabled,
    allocate_shared_enabled, allocate_shared_with, make_shared, make_shared_cyclic,
    make_shared_cyclic_enabled, make_shared_enabled, make_shared_with,
};
pub use from_this::{EnableSharedFromThis, WeakThis};
pub use policy::{DefaultDelete, Deleter, Policy, SourceDelete};
pub use shared::SharedPtr;
pub use weak::WeakPtr;
