//! Transparent `numpy.ndarray` adapter for function signatures.

use std::ops::{Deref, DerefMut};

use pyo3::prelude::*;

use ndmat_core::Mat;

use crate::convert;

/// A matrix crossing the call boundary as `numpy.ndarray`.
///
/// `#[pyfunction]`s that take or return `PyMat` convert transparently:
/// the argument path runs [`convert::to_mat`] (zero copy, the matrix
/// keeps a reference on the array), the return path runs
/// [`convert::to_ndarray`] (fresh copy owned by Python). A failed
/// argument conversion raises `TypeError` at the call site.
pub(crate) struct PyMat(pub(crate) Mat);

impl Deref for PyMat {
    type Target = Mat;

    fn deref(&self) -> &Mat {
        &self.0
    }
}

impl DerefMut for PyMat {
    fn deref_mut(&mut self) -> &mut Mat {
        &mut self.0
    }
}

impl From<Mat> for PyMat {
    fn from(mat: Mat) -> Self {
        Self(mat)
    }
}

impl<'py> FromPyObject<'py> for PyMat {
    fn extract_bound(ob: &Bound<'py, PyAny>) -> PyResult<Self> {
        convert::to_mat(ob).map(PyMat).map_err(PyErr::from)
    }
}

impl<'py> IntoPyObject<'py> for PyMat {
    type Target = PyAny;
    type Output = Bound<'py, PyAny>;
    type Error = PyErr;

    fn into_pyobject(self, py: Python<'py>) -> Result<Self::Output, Self::Error> {
        Ok(convert::to_ndarray(py, &self.0)?.into_bound(py))
    }
}
