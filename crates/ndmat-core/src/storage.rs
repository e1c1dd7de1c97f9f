//! Shared backing storage and the allocator seam.
//!
//! A matrix's bytes live behind a [`BufferDesc`], reference-counted
//! through [`SharedBuffer`]. The descriptor records who owns the bytes:
//!
//! - [`BufferOwner::Standard`] — a heap allocation this side owns, or
//! - [`BufferOwner::Foreign`] — a buffer belonging to a foreign runtime,
//!   kept alive by a [`ForeignGuard`].
//!
//! The guard is the single ownership-bridging object between the two
//! reference-counting domains: constructing one takes exactly one
//! reference on the foreign owner, dropping it releases exactly that
//! reference. Dropping the last [`SharedBuffer`] clone drops the
//! descriptor, which drops the owner — so the underlying buffer is freed
//! (or its foreign reference returned) exactly once, and only after every
//! matrix referencing it is gone.

use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;

/// How the native side intends to use a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Read the bytes in place.
    Read,
    /// Mutate the bytes in place.
    Write,
}

/// Keepalive for a buffer owned by a foreign runtime.
///
/// Implementations must take one reference on the foreign owner at
/// construction and release it on drop. The buffer pointer recorded in
/// the owning [`BufferDesc`] must stay valid for the guard's lifetime.
pub trait ForeignGuard: fmt::Debug {}

/// Who owns the bytes behind a [`BufferDesc`].
pub enum BufferOwner {
    /// Heap storage allocated on this side.
    Standard(Box<[u8]>),
    /// Storage borrowed from a foreign runtime.
    Foreign(Box<dyn ForeignGuard>),
}

impl fmt::Debug for BufferOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(bytes) => write!(f, "Standard({} bytes)", bytes.len()),
            Self::Foreign(guard) => write!(f, "Foreign({guard:?})"),
        }
    }
}

/// Backing storage descriptor: a byte span plus the owner keeping it alive.
///
/// Owner release happens in `Drop`, once, regardless of how many matrices
/// shared the descriptor in between.
#[derive(Debug)]
pub struct BufferDesc {
    data: NonNull<u8>,
    len: usize,
    owner: BufferOwner,
}

impl BufferDesc {
    /// Take ownership of heap bytes.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let mut bytes = bytes.into_boxed_slice();
        // Dangling-but-aligned for the empty case, matching slice rules.
        let data = NonNull::new(bytes.as_mut_ptr()).unwrap_or(NonNull::dangling());
        let len = bytes.len();
        Self {
            data,
            len,
            owner: BufferOwner::Standard(bytes),
        }
    }

    /// Wrap a foreign buffer without copying.
    ///
    /// # Safety
    ///
    /// `data..data + len` must remain valid, and must not be freed by the
    /// foreign runtime, for as long as `guard` is alive.
    pub unsafe fn from_foreign(data: NonNull<u8>, len: usize, guard: Box<dyn ForeignGuard>) -> Self {
        Self {
            data,
            len,
            owner: BufferOwner::Foreign(guard),
        }
    }

    /// Pointer to the first byte.
    pub fn data(&self) -> NonNull<u8> {
        self.data
    }

    /// Length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is zero-length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the bytes belong to a foreign runtime.
    pub fn is_foreign(&self) -> bool {
        matches!(self.owner, BufferOwner::Foreign(_))
    }
}

/// Reference-counted handle to a [`BufferDesc`].
///
/// Cloning bumps the count; dropping the last clone releases the
/// descriptor and its owner. `Rc`-based: callers are single-threaded by
/// contract, all refcount traffic happens on one thread.
#[derive(Clone, Debug)]
pub struct SharedBuffer {
    desc: Rc<BufferDesc>,
}

impl SharedBuffer {
    /// Wrap a descriptor in a fresh refcount of one.
    pub fn new(desc: BufferDesc) -> Self {
        Self { desc: Rc::new(desc) }
    }

    /// Pointer to the first byte.
    pub fn data(&self) -> NonNull<u8> {
        self.desc.data()
    }

    /// Length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.desc.len()
    }

    /// Whether the bytes belong to a foreign runtime.
    pub fn is_foreign(&self) -> bool {
        self.desc.is_foreign()
    }

    /// Number of live handles to this descriptor.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.desc)
    }

    /// Whether this is the only live handle.
    pub fn is_unique(&self) -> bool {
        self.ref_count() == 1
    }

    /// Whether the buffer can satisfy `access` in place, without copying.
    ///
    /// Reads are always in place. Writes require storage this side owns:
    /// foreign buffers refuse in-place mutation, telling the caller to
    /// copy into fresh storage first.
    pub fn can_access(&self, access: Access) -> bool {
        match access {
            Access::Read => true,
            Access::Write => !self.is_foreign(),
        }
    }
}

/// Allocation seam for matrix backing storage.
///
/// Covers the internal path: fresh storage for matrices created on the
/// native side. The foreign-backed path (wrapping an existing foreign
/// buffer) is constructed by the bridge crate that can talk to the
/// foreign runtime, not through this trait.
pub trait MatAllocator {
    /// Allocate zero-initialised storage of `len` bytes.
    ///
    /// Out-of-memory is abrupt (allocation aborts), matching the
    /// convention that matrix allocation failure is not a recoverable
    /// return.
    fn allocate(&self, len: usize) -> BufferDesc;
}

/// Standard heap allocator, used for matrices created on the native side
/// and as the fallback for every other allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdAllocator;

impl MatAllocator for StdAllocator {
    fn allocate(&self, len: usize) -> BufferDesc {
        BufferDesc::from_vec(vec![0u8; len])
    }
}

/// Test-only foreign guard with an observable "foreign refcount".
#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::cell::Cell;

    /// Foreign guard over a Vec it owns, with an external "foreign
    /// refcount" it increments on construction and decrements on drop.
    #[derive(Debug)]
    pub(crate) struct CountingGuard {
        bytes: Vec<u8>,
        count: Rc<Cell<usize>>,
    }

    impl CountingGuard {
        pub(crate) fn new(bytes: Vec<u8>, count: &Rc<Cell<usize>>) -> Self {
            count.set(count.get() + 1);
            Self {
                bytes,
                count: Rc::clone(count),
            }
        }

        pub(crate) fn into_buffer(self) -> SharedBuffer {
            let data = NonNull::new(self.bytes.as_ptr() as *mut u8).expect("non-empty buffer");
            let len = self.bytes.len();
            // The Vec's heap block does not move when the guard is boxed.
            let desc = unsafe { BufferDesc::from_foreign(data, len, Box::new(self)) };
            SharedBuffer::new(desc)
        }
    }

    impl Drop for CountingGuard {
        fn drop(&mut self) {
            self.count.set(self.count.get() - 1);
        }
    }

    impl ForeignGuard for CountingGuard {}
}

#[cfg(test)]
mod tests {
    use super::testutil::CountingGuard;
    use super::*;
    use std::cell::Cell;

    #[test]
    fn std_allocation_is_zeroed_and_owned() {
        let buf = SharedBuffer::new(StdAllocator.allocate(16));
        assert_eq!(buf.len(), 16);
        assert!(!buf.is_foreign());
        let bytes = unsafe { std::slice::from_raw_parts(buf.data().as_ptr(), buf.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_allocation_is_valid() {
        let buf = SharedBuffer::new(StdAllocator.allocate(0));
        assert_eq!(buf.len(), 0);
        assert!(buf.can_access(Access::Write));
    }

    #[test]
    fn foreign_guard_released_exactly_once() {
        let count = Rc::new(Cell::new(0usize));
        let buf = CountingGuard::new(vec![7u8; 8], &count).into_buffer();
        assert_eq!(count.get(), 1);

        let clone_a = buf.clone();
        let clone_b = clone_a.clone();
        assert_eq!(buf.ref_count(), 3);
        assert_eq!(count.get(), 1, "clones must not touch the foreign count");

        drop(clone_a);
        drop(buf);
        assert_eq!(count.get(), 1, "foreign reference held while handles live");
        drop(clone_b);
        assert_eq!(count.get(), 0, "last handle returns the foreign reference");
    }

    #[test]
    fn foreign_buffers_refuse_in_place_writes() {
        let count = Rc::new(Cell::new(0usize));
        let buf = CountingGuard::new(vec![1u8; 4], &count).into_buffer();
        assert!(buf.is_foreign());
        assert!(buf.can_access(Access::Read));
        assert!(!buf.can_access(Access::Write));

        let std_buf = SharedBuffer::new(StdAllocator.allocate(4));
        assert!(std_buf.can_access(Access::Write));
    }

    #[test]
    fn foreign_bytes_readable_through_the_handle() {
        let count = Rc::new(Cell::new(0usize));
        let buf = CountingGuard::new(vec![1, 2, 3, 4], &count).into_buffer();
        let bytes = unsafe { std::slice::from_raw_parts(buf.data().as_ptr(), buf.len()) };
        assert_eq!(bytes, &[1, 2, 3, 4]);
    }
}
