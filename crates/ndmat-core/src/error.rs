//! Error type for matrix construction and storage adoption.

use std::error::Error;
use std::fmt;

/// Errors from [`Mat`](crate::Mat) construction and buffer adoption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatError {
    /// Channel count outside `1..=MatType::MAX_CHANNELS`.
    InvalidChannels {
        /// The rejected channel count.
        channels: u32,
    },
    /// Byte-span arithmetic (`rows * step`, `cols * elem_size`) overflowed.
    SizeOverflow,
    /// A provided row step is smaller than the packed row width.
    StepTooSmall {
        /// The rejected step, in bytes.
        step: usize,
        /// Minimum step for the requested shape, in bytes.
        min: usize,
    },
    /// A provided buffer is shorter than the span the matrix addresses.
    BufferTooSmall {
        /// Length of the provided buffer, in bytes.
        len: usize,
        /// Bytes the requested shape addresses.
        required: usize,
    },
}

impl fmt::Display for MatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannels { channels } => {
                write!(f, "invalid channel count {channels} (expected 1..=512)")
            }
            Self::SizeOverflow => write!(f, "matrix byte span overflows usize"),
            Self::StepTooSmall { step, min } => {
                write!(f, "row step {step} smaller than packed row width {min}")
            }
            Self::BufferTooSmall { len, required } => {
                write!(f, "buffer of {len} bytes too small for matrix spanning {required} bytes")
            }
        }
    }
}

impl Error for MatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_numbers() {
        let e = MatError::StepTooSmall { step: 8, min: 12 };
        assert_eq!(e.to_string(), "row step 8 smaller than packed row width 12");

        let e = MatError::BufferTooSmall { len: 4, required: 16 };
        assert!(e.to_string().contains("4 bytes"));
        assert!(e.to_string().contains("16 bytes"));
    }
}
