//! Error types.

use std::alloc::Layout;

/// A memory source could not supply storage for the requested layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("memory source failed to allocate {} bytes (align {})", .layout.size(), .layout.align())]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    /// Create an error for a failed request of `layout`.
    #[inline]
    pub const fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The layout that could not be served.
    #[inline]
    pub const fn layout(&self) -> Layout {
        self.layout
    }
}

/// Recoverable failures of the handle constructors and conversions.
///
/// Contract violations (counter underflow, dereferencing an empty handle)
/// are not represented here: they abort or panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A memory source could not supply storage.
    #[error(transparent)]
    Alloc(#[from] AllocError),

    /// `shared_from_this` was called on a value no `SharedPtr` ever owned.
    #[error("value is not owned by any SharedPtr")]
    Unbound,

    /// A checked weak-to-strong conversion found the value destroyed.
    #[error("managed value has already been destroyed")]
    Expired,
}

pub type Result<T> = std::result::Result<T, Error>;
