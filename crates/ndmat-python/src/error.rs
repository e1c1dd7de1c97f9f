//! Conversion errors and their Python exception mapping.

use std::error::Error;
use std::fmt;

use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::PyErr;

use ndmat_core::MatError;

/// Why an ndarray could not be converted to a matrix (or back).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ConvertError {
    /// The object is not a NumPy ndarray.
    NotAnArray {
        /// Python type name of the rejected object.
        type_name: String,
    },
    /// The array's dtype has no matrix depth equivalent.
    UnsupportedDtype {
        /// String form of the rejected dtype.
        dtype: String,
    },
    /// The array is not 2- or 3-dimensional.
    UnsupportedDims {
        /// Number of dimensions of the rejected array.
        ndim: usize,
    },
    /// The trailing (channel) axis is outside what the matrix type models.
    UnsupportedChannels {
        /// Extent of the rejected channel axis.
        channels: usize,
    },
    /// The array's strides don't fit the matrix layout model.
    UnsupportedLayout {
        /// Which stride rule was violated.
        reason: String,
    },
    /// The array reports a null data pointer for a non-empty shape.
    NullData,
    /// Matrix construction rejected the translated layout.
    Mat(MatError),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnArray { type_name } => {
                write!(f, "expected numpy.ndarray, got {type_name}")
            }
            Self::UnsupportedDtype { dtype } => {
                write!(f, "unsupported dtype {dtype} (expected u8/i8/u16/i16/i32/f32/f64)")
            }
            Self::UnsupportedDims { ndim } => {
                write!(f, "unsupported number of dimensions {ndim} (expected 2 or 3)")
            }
            Self::UnsupportedChannels { channels } => {
                write!(f, "unsupported channel axis of {channels} (expected 1..=512)")
            }
            Self::UnsupportedLayout { reason } => write!(f, "unsupported layout: {reason}"),
            Self::NullData => write!(f, "array reports a null data pointer"),
            Self::Mat(e) => write!(f, "matrix construction failed: {e}"),
        }
    }
}

impl Error for ConvertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mat(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MatError> for ConvertError {
    fn from(e: MatError) -> Self {
        Self::Mat(e)
    }
}

/// A failed argument conversion surfaces as a type-error-like failure in
/// Python; internal layout/size failures become ValueError.
impl From<ConvertError> for PyErr {
    fn from(e: ConvertError) -> Self {
        let msg = e.to_string();
        match e {
            ConvertError::NotAnArray { .. }
            | ConvertError::UnsupportedDtype { .. }
            | ConvertError::UnsupportedDims { .. }
            | ConvertError::UnsupportedChannels { .. }
            | ConvertError::UnsupportedLayout { .. } => PyTypeError::new_err(msg),
            ConvertError::NullData | ConvertError::Mat(_) => PyValueError::new_err(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offender() {
        let e = ConvertError::NotAnArray {
            type_name: "str".into(),
        };
        assert_eq!(e.to_string(), "expected numpy.ndarray, got str");

        let e = ConvertError::UnsupportedDims { ndim: 4 };
        assert!(e.to_string().contains("4"));
        assert!(e.to_string().contains("2 or 3"));

        let e = ConvertError::UnsupportedChannels { channels: 0 };
        assert!(e.to_string().contains("0"));
        assert!(e.to_string().contains("1..=512"));
    }

    #[test]
    fn mat_errors_are_chained() {
        let e = ConvertError::from(MatError::SizeOverflow);
        assert!(e.source().is_some());
        assert!(e.to_string().contains("overflows"));
    }
}
