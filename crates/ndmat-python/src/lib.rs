//! Python bindings bridging NumPy ndarrays and ndmat matrices.
//!
//! This crate provides the PyO3 extension module `_ndmat`. Arguments and
//! return values typed [`adapter::PyMat`] cross the boundary as
//! `numpy.ndarray`: the argument path wraps the ndarray's buffer without
//! copying (the matrix keeps a reference on the array), the return path
//! materialises a fresh ndarray from the matrix bytes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(unsafe_code)]

use pyo3::prelude::*;

mod adapter;
mod allocator;
mod convert;
mod error;

use adapter::PyMat;

/// Pass a matrix through the bridge and back.
///
/// The argument is converted to a native matrix (zero copy), the return
/// value back to a fresh ndarray. Exercises both converter directions;
/// used by the Python test suite.
#[pyfunction]
fn roundtrip(mat: PyMat) -> PyMat {
    mat
}

/// Shape and type of an ndarray as seen by the native side.
///
/// Returns:
///     Tuple of (rows, cols, channels, depth, continuous).
#[pyfunction]
fn describe(mat: PyMat) -> (usize, usize, u32, String, bool) {
    (
        mat.rows(),
        mat.cols(),
        mat.channels(),
        mat.depth().to_string(),
        mat.is_continuous(),
    )
}

/// The native `_ndmat` extension module.
#[pymodule]
fn _ndmat(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // The converters require the NumPy C API table; load it up front so
    // importing the module satisfies the precondition for every caller.
    convert::init_numpy(m.py())?;

    m.add_function(wrap_pyfunction!(roundtrip, m)?)?;
    m.add_function(wrap_pyfunction!(describe, m)?)?;

    Ok(())
}
