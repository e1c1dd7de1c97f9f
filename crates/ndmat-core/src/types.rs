//! Element depth and combined matrix type tags.

use std::fmt;

use crate::error::MatError;

/// Per-channel scalar type of a matrix element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Depth {
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl Depth {
    /// All supported depths, in tag order.
    pub const ALL: [Depth; 7] = [
        Depth::U8,
        Depth::I8,
        Depth::U16,
        Depth::I16,
        Depth::I32,
        Depth::F32,
        Depth::F64,
    ];

    /// Size of one scalar of this depth, in bytes.
    pub fn elem_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Combined element type tag: scalar depth plus channel count.
///
/// Mirrors the dense-matrix convention where an interleaved trailing
/// dimension (e.g. BGR pixels) is carried as channels rather than as a
/// third axis of the matrix itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatType {
    depth: Depth,
    channels: u32,
}

impl MatType {
    /// Largest representable channel count.
    pub const MAX_CHANNELS: u32 = 512;

    /// Build a type tag, rejecting channel counts outside `1..=512`.
    pub fn new(depth: Depth, channels: u32) -> Result<Self, MatError> {
        if channels == 0 || channels > Self::MAX_CHANNELS {
            return Err(MatError::InvalidChannels { channels });
        }
        Ok(Self { depth, channels })
    }

    /// Scalar depth of each channel.
    pub fn depth(self) -> Depth {
        self.depth
    }

    /// Number of interleaved channels per element.
    pub fn channels(self) -> u32 {
        self.channels
    }

    /// Size of one full (all-channel) element, in bytes.
    pub fn elem_size(self) -> usize {
        self.depth.elem_size() * self.channels as usize
    }
}

impl Default for MatType {
    /// Single-channel `u8`, the conventional default element type.
    fn default() -> Self {
        Self {
            depth: Depth::U8,
            channels: 1,
        }
    }
}

impl fmt::Display for MatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}C{}", self.depth, self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elem_sizes_match_scalar_widths() {
        assert_eq!(Depth::U8.elem_size(), 1);
        assert_eq!(Depth::I8.elem_size(), 1);
        assert_eq!(Depth::U16.elem_size(), 2);
        assert_eq!(Depth::I16.elem_size(), 2);
        assert_eq!(Depth::I32.elem_size(), 4);
        assert_eq!(Depth::F32.elem_size(), 4);
        assert_eq!(Depth::F64.elem_size(), 8);
    }

    #[test]
    fn mat_type_scales_by_channels() {
        let t = MatType::new(Depth::U8, 3).unwrap();
        assert_eq!(t.elem_size(), 3);
        let t = MatType::new(Depth::F64, 4).unwrap();
        assert_eq!(t.elem_size(), 32);
    }

    #[test]
    fn mat_type_rejects_bad_channel_counts() {
        assert_eq!(
            MatType::new(Depth::U8, 0),
            Err(MatError::InvalidChannels { channels: 0 })
        );
        assert_eq!(
            MatType::new(Depth::U8, 513),
            Err(MatError::InvalidChannels { channels: 513 })
        );
        assert!(MatType::new(Depth::U8, 512).is_ok());
    }

    #[test]
    fn display_is_depth_then_channels() {
        let t = MatType::new(Depth::F32, 2).unwrap();
        assert_eq!(t.to_string(), "f32C2");
    }
}
