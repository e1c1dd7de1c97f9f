//! NumPy ndarray ↔ matrix conversion.
//!
//! `to_mat` shares the ndarray's buffer with the matrix (zero copy, one
//! Python reference held for the storage's lifetime). `to_ndarray` always
//! copies into a fresh array: the native side may drop or rewrite its
//! matrix at any point after returning, so the Python side gets bytes it
//! owns outright.

use numpy::{
    dtype, Element, PyArrayDescr, PyArrayDescrMethods, PyArrayDyn, PyArrayMethods, PyUntypedArray,
    PyUntypedArrayMethods,
};
use pyo3::prelude::*;
use pyo3::sync::GILOnceCell;
use smallvec::SmallVec;

use ndmat_core::{Depth, Mat, MatError, MatType};

use crate::allocator::NumpyAllocator;
use crate::error::ConvertError;

static NUMPY: GILOnceCell<Py<PyModule>> = GILOnceCell::new();

/// Load the NumPy runtime once per process.
///
/// Every conversion requires NumPy's C API table; calling this (or
/// importing the `_ndmat` module, which calls it) before the first
/// conversion is a precondition, not something the converters re-check.
pub(crate) fn init_numpy(py: Python<'_>) -> PyResult<()> {
    NUMPY.get_or_try_init(py, || PyModule::import(py, "numpy").map(Bound::unbind))?;
    Ok(())
}

fn dtype_of(py: Python<'_>, depth: Depth) -> Bound<'_, PyArrayDescr> {
    match depth {
        Depth::U8 => dtype::<u8>(py),
        Depth::I8 => dtype::<i8>(py),
        Depth::U16 => dtype::<u16>(py),
        Depth::I16 => dtype::<i16>(py),
        Depth::I32 => dtype::<i32>(py),
        Depth::F32 => dtype::<f32>(py),
        Depth::F64 => dtype::<f64>(py),
    }
}

fn depth_from_dtype<'py>(py: Python<'py>, descr: &Bound<'py, PyArrayDescr>) -> Option<Depth> {
    Depth::ALL
        .into_iter()
        .find(|&depth| descr.is_equiv_to(&dtype_of(py, depth)))
}

/// Convert an ndarray to a matrix sharing its buffer.
///
/// Accepts 2-D arrays and 3-D arrays whose last axis is the channel
/// count. The innermost axes must be packed; the row stride may exceed
/// the packed row width (row-sliced and padded arrays convert zero-copy).
/// On any validation failure returns an error without partial effects.
pub(crate) fn to_mat(src: &Bound<'_, PyAny>) -> Result<Mat, ConvertError> {
    let arr = src
        .downcast::<PyUntypedArray>()
        .map_err(|_| ConvertError::NotAnArray {
            type_name: src.get_type().to_string(),
        })?;
    let py = src.py();

    let descr = arr.dtype();
    let depth = depth_from_dtype(py, &descr).ok_or_else(|| ConvertError::UnsupportedDtype {
        dtype: descr.to_string(),
    })?;

    let ndim = arr.ndim();
    if ndim != 2 && ndim != 3 {
        return Err(ConvertError::UnsupportedDims { ndim });
    }
    let shape = arr.shape();
    let strides = arr.strides();
    let elem = depth.elem_size();

    let (rows, cols, channels) = if ndim == 2 {
        (shape[0], shape[1], 1u32)
    } else {
        // The channel axis maps to the matrix element type, which has no
        // zero-channel representation; reject it before the zero-size
        // shortcut below.
        let ch = u32::try_from(shape[2])
            .ok()
            .filter(|&ch| ch >= 1 && ch <= MatType::MAX_CHANNELS)
            .ok_or(ConvertError::UnsupportedChannels { channels: shape[2] })?;
        (shape[0], shape[1], ch)
    };
    let typ = MatType::new(depth, channels)?;

    // Zero-sized arrays carry no bytes worth sharing; fall back to the
    // allocator's internal (standard-delegating) path.
    if rows == 0 || cols == 0 {
        return Ok(Mat::new_in(&NumpyAllocator, rows, cols, typ)?);
    }

    // The matrix models interleaved channels and a single row stride, so
    // the channel and column axes must be packed.
    if ndim == 3 && strides[2] != elem as isize {
        return Err(ConvertError::UnsupportedLayout {
            reason: format!("channel axis stride {} != element size {elem}", strides[2]),
        });
    }
    let col_stride = strides[1];
    if col_stride != typ.elem_size() as isize {
        return Err(ConvertError::UnsupportedLayout {
            reason: format!(
                "column stride {col_stride} != element size {}",
                typ.elem_size()
            ),
        });
    }
    let row_stride = strides[0];
    if row_stride <= 0 {
        return Err(ConvertError::UnsupportedLayout {
            reason: format!("non-positive row stride {row_stride}"),
        });
    }
    let step = row_stride as usize;

    let row_bytes = cols
        .checked_mul(typ.elem_size())
        .ok_or(MatError::SizeOverflow)?;
    let required = (rows - 1)
        .checked_mul(step)
        .and_then(|n| n.checked_add(row_bytes))
        .ok_or(MatError::SizeOverflow)?;

    let buf = NumpyAllocator.wrap_array(arr, required)?;
    Ok(Mat::from_shared(buf, rows, cols, typ, step)?)
}

/// Convert a matrix to a fresh ndarray copying its bytes.
///
/// The result is `(rows, cols)` for a 1-channel matrix and
/// `(rows, cols, channels)` otherwise, with the matching dtype. The copy
/// walks rows, so padded (non-continuous) matrices are packed on the way
/// out.
pub(crate) fn to_ndarray(py: Python<'_>, mat: &Mat) -> PyResult<Py<PyAny>> {
    match mat.depth() {
        Depth::U8 => copy_rows::<u8>(py, mat),
        Depth::I8 => copy_rows::<i8>(py, mat),
        Depth::U16 => copy_rows::<u16>(py, mat),
        Depth::I16 => copy_rows::<i16>(py, mat),
        Depth::I32 => copy_rows::<i32>(py, mat),
        Depth::F32 => copy_rows::<f32>(py, mat),
        Depth::F64 => copy_rows::<f64>(py, mat),
    }
}

fn copy_rows<T: Element>(py: Python<'_>, mat: &Mat) -> PyResult<Py<PyAny>> {
    let channels = mat.channels() as usize;
    let mut shape: SmallVec<[usize; 3]> = SmallVec::new();
    shape.push(mat.rows());
    shape.push(mat.cols());
    if channels > 1 {
        shape.push(channels);
    }

    // Fresh C-order allocation, fully overwritten below.
    let arr = unsafe { PyArrayDyn::<T>::new(py, shape.as_slice(), false) };
    let row_bytes = mat.row_bytes();
    if row_bytes > 0 {
        let dst = arr.data() as *mut u8;
        for r in 0..mat.rows() {
            let src = mat.row(r);
            unsafe {
                std::ptr::copy_nonoverlapping(src.as_ptr(), dst.add(r * row_bytes), row_bytes);
            }
        }
    }
    Ok(arr.into_any().unbind())
}
