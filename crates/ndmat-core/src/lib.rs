//! Dense 2D matrix type with reference-counted, pluggable backing storage.
//!
//! The central type is [`Mat`]: rows × cols of a fixed element type
//! ([`MatType`]: scalar depth plus channel count), backed by a shared
//! storage descriptor ([`BufferDesc`]). Storage comes from one of two
//! places:
//!
//! - the standard heap, via [`StdAllocator`] (or any other
//!   [`MatAllocator`]), for matrices created on the native side, or
//! - a buffer borrowed from a foreign runtime, kept alive by a
//!   [`ForeignGuard`] that bridges into that runtime's reference counting.
//!
//! Cloning a `Mat` is a shallow, refcount-bumping copy. Mutation goes
//! through [`Mat::make_writable`], which deep-copies when the storage is
//! shared or cannot be written in place.
//!
//! This crate contains the workspace's bounded `unsafe`: raw-pointer row
//! slices over the descriptor's buffer. Callers are single-threaded by
//! contract ([`SharedBuffer`] is `Rc`-based and not `Sync`).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod mat;
pub mod storage;
pub mod types;

// Public re-exports for the primary API surface.
pub use error::MatError;
pub use mat::Mat;
pub use storage::{
    Access, BufferDesc, BufferOwner, ForeignGuard, MatAllocator, SharedBuffer, StdAllocator,
};
pub use types::{Depth, MatType};
