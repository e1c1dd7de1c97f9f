//! NumPy-backed allocator: matrix storage that borrows ndarray buffers.

use std::fmt;
use std::ptr::NonNull;

use numpy::{PyUntypedArray, PyUntypedArrayMethods};
use pyo3::prelude::*;

use ndmat_core::{BufferDesc, MatAllocator, SharedBuffer, StdAllocator};

use crate::error::ConvertError;

/// Keeps an ndarray alive while a matrix references its buffer.
///
/// Construction takes one strong reference on the array; dropping the
/// guard releases it (PyO3 defers the decref to the next GIL acquisition
/// if the guard is dropped without the GIL held).
struct NdArrayGuard {
    _array: Py<PyUntypedArray>,
}

impl fmt::Debug for NdArrayGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NdArrayGuard")
    }
}

impl ndmat_core::ForeignGuard for NdArrayGuard {}

/// Allocator for matrices that cross the Python boundary.
///
/// Existing ndarray buffers are adopted without copying via
/// [`NumpyAllocator::wrap_array`]; fresh allocations (matrices the native
/// side creates for itself) delegate to [`StdAllocator`].
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NumpyAllocator;

impl NumpyAllocator {
    /// Wrap `arr`'s buffer without copying.
    ///
    /// Takes one reference on `arr`, held until the returned storage is
    /// released. Fails without side effects if the array's buffer cannot
    /// back `required` bytes (null data pointer on a non-empty array).
    pub(crate) fn wrap_array(
        &self,
        arr: &Bound<'_, PyUntypedArray>,
        required: usize,
    ) -> Result<SharedBuffer, ConvertError> {
        let raw = unsafe { (*arr.as_array_ptr()).data } as *mut u8;
        let data = NonNull::new(raw).ok_or(ConvertError::NullData)?;
        let guard = NdArrayGuard {
            _array: arr.clone().unbind(),
        };
        // NumPy owns the buffer; the guard's reference keeps the array
        // (and with it the buffer) alive for the descriptor's lifetime.
        let desc = unsafe { BufferDesc::from_foreign(data, required, Box::new(guard)) };
        Ok(SharedBuffer::new(desc))
    }
}

impl MatAllocator for NumpyAllocator {
    fn allocate(&self, len: usize) -> BufferDesc {
        StdAllocator.allocate(len)
    }
}
