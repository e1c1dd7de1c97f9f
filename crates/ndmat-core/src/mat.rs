//! The [`Mat`] dense matrix type.

use std::fmt;

use crate::error::MatError;
use crate::storage::{Access, MatAllocator, SharedBuffer, StdAllocator};
use crate::types::{Depth, MatType};

/// A dense 2D matrix over reference-counted backing storage.
///
/// Rows are `step` bytes apart; `step` may exceed the packed row width
/// (`cols * elem_size`) to model padded or row-sliced layouts. `Clone` is
/// shallow: both matrices share the same storage descriptor until one of
/// them needs write access ([`Mat::make_writable`]).
#[derive(Clone, Debug)]
pub struct Mat {
    rows: usize,
    cols: usize,
    typ: MatType,
    step: usize,
    buf: Option<SharedBuffer>,
}

impl Default for Mat {
    /// The empty matrix: no storage, zero extent.
    fn default() -> Self {
        Self {
            rows: 0,
            cols: 0,
            typ: MatType::default(),
            step: 0,
            buf: None,
        }
    }
}

impl Mat {
    /// Allocate a zero-initialised `rows × cols` matrix on the heap.
    pub fn new(rows: usize, cols: usize, typ: MatType) -> Result<Self, MatError> {
        Self::new_in(&StdAllocator, rows, cols, typ)
    }

    /// Allocate a zero-initialised matrix through `alloc`.
    pub fn new_in(
        alloc: &dyn MatAllocator,
        rows: usize,
        cols: usize,
        typ: MatType,
    ) -> Result<Self, MatError> {
        let step = cols.checked_mul(typ.elem_size()).ok_or(MatError::SizeOverflow)?;
        let len = rows.checked_mul(step).ok_or(MatError::SizeOverflow)?;
        Ok(Self {
            rows,
            cols,
            typ,
            step,
            buf: Some(SharedBuffer::new(alloc.allocate(len))),
        })
    }

    /// Adopt existing shared storage.
    ///
    /// `step` is the byte distance between row starts. Fails if `step` is
    /// smaller than the packed row width or if `buf` is shorter than the
    /// span the matrix would address; on failure nothing is adopted.
    pub fn from_shared(
        buf: SharedBuffer,
        rows: usize,
        cols: usize,
        typ: MatType,
        step: usize,
    ) -> Result<Self, MatError> {
        let row_bytes = cols.checked_mul(typ.elem_size()).ok_or(MatError::SizeOverflow)?;
        if step < row_bytes {
            return Err(MatError::StepTooSmall { step, min: row_bytes });
        }
        let required = Self::span(rows, step, row_bytes)?;
        if buf.len() < required {
            return Err(MatError::BufferTooSmall {
                len: buf.len(),
                required,
            });
        }
        Ok(Self {
            rows,
            cols,
            typ,
            step,
            buf: Some(buf),
        })
    }

    /// Bytes addressed by `rows` rows of `row_bytes`, `step` apart:
    /// `(rows - 1) * step + row_bytes`, or zero for an empty extent.
    fn span(rows: usize, step: usize, row_bytes: usize) -> Result<usize, MatError> {
        if rows == 0 || row_bytes == 0 {
            return Ok(0);
        }
        (rows - 1)
            .checked_mul(step)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or(MatError::SizeOverflow)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element type tag.
    pub fn mat_type(&self) -> MatType {
        self.typ
    }

    /// Scalar depth of each channel.
    pub fn depth(&self) -> Depth {
        self.typ.depth()
    }

    /// Number of interleaved channels per element.
    pub fn channels(&self) -> u32 {
        self.typ.channels()
    }

    /// Byte distance between row starts.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Size of one full element in bytes.
    pub fn elem_size(&self) -> usize {
        self.typ.elem_size()
    }

    /// Width of one packed row in bytes.
    pub fn row_bytes(&self) -> usize {
        self.cols * self.typ.elem_size()
    }

    /// Whether the matrix holds no addressable elements.
    pub fn is_empty(&self) -> bool {
        self.buf.is_none() || self.rows == 0 || self.cols == 0
    }

    /// Whether rows are packed back to back (no inter-row padding).
    pub fn is_continuous(&self) -> bool {
        self.rows <= 1 || self.step == self.row_bytes()
    }

    /// The backing storage handle, if any.
    pub fn buffer(&self) -> Option<&SharedBuffer> {
        self.buf.as_ref()
    }

    /// Read one row. Panics if `r` is out of range or the matrix is empty.
    pub fn row(&self, r: usize) -> &[u8] {
        assert!(r < self.rows, "row {r} out of range (rows = {})", self.rows);
        if self.row_bytes() == 0 {
            return &[];
        }
        let buf = self.buf.as_ref().expect("non-empty matrix has storage");
        // In range: from_shared/new validated that every row lies inside
        // the buffer.
        unsafe { std::slice::from_raw_parts(buf.data().as_ptr().add(r * self.step), self.row_bytes()) }
    }

    /// All bytes as one slice, when rows are packed. `None` otherwise.
    pub fn contiguous_bytes(&self) -> Option<&[u8]> {
        if self.is_empty() {
            return Some(&[]);
        }
        if !self.is_continuous() {
            return None;
        }
        let buf = self.buf.as_ref()?;
        let len = self.rows * self.row_bytes();
        Some(unsafe { std::slice::from_raw_parts(buf.data().as_ptr(), len) })
    }

    /// Deep-copy into fresh, packed heap storage.
    pub fn to_contiguous(&self) -> Result<Self, MatError> {
        let mut out = Self::new(self.rows, self.cols, self.typ)?;
        if !self.is_empty() {
            let row_bytes = self.row_bytes();
            let dst = out
                .buf
                .as_ref()
                .expect("fresh matrix has storage")
                .data()
                .as_ptr();
            for r in 0..self.rows {
                let src = self.row(r);
                // Freshly allocated, uniquely owned, packed destination.
                unsafe {
                    std::ptr::copy_nonoverlapping(src.as_ptr(), dst.add(r * row_bytes), row_bytes);
                }
            }
        }
        Ok(out)
    }

    /// Ensure the storage can be mutated in place.
    ///
    /// Deep-copies (packed, heap-backed) when the storage is shared with
    /// another matrix or refuses in-place writes (foreign-backed). After
    /// this returns, the matrix uniquely owns writable storage.
    pub fn make_writable(&mut self) -> Result<(), MatError> {
        let needs_copy = match &self.buf {
            None => false,
            Some(b) => !(b.is_unique() && b.can_access(Access::Write)),
        };
        if needs_copy {
            *self = self.to_contiguous()?;
        }
        Ok(())
    }

    /// Mutate one row, copying shared or foreign storage first.
    /// Panics if `r` is out of range.
    pub fn row_mut(&mut self, r: usize) -> Result<&mut [u8], MatError> {
        assert!(r < self.rows, "row {r} out of range (rows = {})", self.rows);
        self.make_writable()?;
        let step = self.step;
        let row_bytes = self.row_bytes();
        if row_bytes == 0 {
            return Ok(&mut []);
        }
        let buf = self.buf.as_ref().expect("non-empty matrix has storage");
        // Unique and writable after make_writable; no other handle can
        // observe these bytes.
        Ok(unsafe { std::slice::from_raw_parts_mut(buf.data().as_ptr().add(r * step), row_bytes) })
    }
}

impl fmt::Display for Mat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mat({}x{} {})", self.rows, self.cols, self.typ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testutil::CountingGuard;
    use crate::storage::{BufferDesc, StdAllocator};
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn u8c(channels: u32) -> MatType {
        MatType::new(Depth::U8, channels).unwrap()
    }

    fn fill_pattern(mat: &mut Mat) {
        for r in 0..mat.rows() {
            let row = mat.row_mut(r).unwrap();
            for (c, b) in row.iter_mut().enumerate() {
                *b = (r.wrapping_mul(31).wrapping_add(c) & 0xff) as u8;
            }
        }
    }

    #[test]
    fn default_is_empty() {
        let m = Mat::default();
        assert!(m.is_empty());
        assert_eq!(m.rows(), 0);
        assert!(m.buffer().is_none());
        assert_eq!(m.contiguous_bytes(), Some(&[][..]));
    }

    #[test]
    fn new_is_zeroed_and_continuous() {
        let m = Mat::new(4, 5, u8c(3)).unwrap();
        assert!(m.is_continuous());
        assert_eq!(m.step(), 15);
        assert_eq!(m.contiguous_bytes().unwrap().len(), 60);
        assert!(m.contiguous_bytes().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn clone_shares_storage_until_written() {
        let mut a = Mat::new(3, 3, u8c(1)).unwrap();
        fill_pattern(&mut a);
        let mut b = a.clone();
        assert_eq!(a.buffer().unwrap().ref_count(), 2);

        b.row_mut(0).unwrap()[0] = 0xee;
        assert_eq!(a.buffer().unwrap().ref_count(), 1, "write detached the clone");
        assert_ne!(a.row(0)[0], 0xee, "original bytes untouched");
        assert_eq!(b.row(0)[0], 0xee);
        assert_eq!(a.row(1), b.row(1), "unwritten rows still equal");
    }

    #[test]
    fn from_shared_accepts_padded_steps() {
        // 3 rows of 4 bytes, 6 bytes apart.
        let mut bytes = vec![0u8; 2 * 6 + 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let buf = SharedBuffer::new(BufferDesc::from_vec(bytes));
        let m = Mat::from_shared(buf, 3, 4, u8c(1), 6).unwrap();
        assert!(!m.is_continuous());
        assert_eq!(m.row(0), &[0, 1, 2, 3]);
        assert_eq!(m.row(1), &[6, 7, 8, 9]);
        assert_eq!(m.row(2), &[12, 13, 14, 15]);
        assert!(m.contiguous_bytes().is_none());

        let packed = m.to_contiguous().unwrap();
        assert!(packed.is_continuous());
        assert_eq!(
            packed.contiguous_bytes().unwrap(),
            &[0, 1, 2, 3, 6, 7, 8, 9, 12, 13, 14, 15]
        );
    }

    #[test]
    fn from_shared_rejects_bad_layouts() {
        let buf = SharedBuffer::new(StdAllocator.allocate(8));
        assert!(matches!(
            Mat::from_shared(buf.clone(), 2, 4, u8c(1), 3),
            Err(MatError::StepTooSmall { step: 3, min: 4 })
        ));
        assert!(matches!(
            Mat::from_shared(buf, 4, 4, u8c(1), 4),
            Err(MatError::BufferTooSmall { len: 8, required: 16 })
        ));
    }

    #[test]
    fn foreign_reference_returned_when_last_mat_drops() {
        let count = Rc::new(Cell::new(0usize));
        let buf = CountingGuard::new((0u8..12).collect(), &count).into_buffer();
        let m = Mat::from_shared(buf, 3, 4, u8c(1), 4).unwrap();
        assert_eq!(count.get(), 1);

        let m2 = m.clone();
        drop(m);
        assert_eq!(count.get(), 1);
        drop(m2);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn writing_a_foreign_mat_copies_and_releases() {
        let count = Rc::new(Cell::new(0usize));
        let buf = CountingGuard::new(vec![9u8; 8], &count).into_buffer();
        let mut m = Mat::from_shared(buf, 2, 4, u8c(1), 4).unwrap();

        m.row_mut(0).unwrap()[0] = 1;
        assert_eq!(count.get(), 0, "copy-on-write released the foreign buffer");
        assert!(!m.buffer().unwrap().is_foreign());
        assert_eq!(m.row(0), &[1, 9, 9, 9]);
        assert_eq!(m.row(1), &[9, 9, 9, 9]);
    }

    #[test]
    fn size_overflow_is_reported() {
        assert_eq!(
            Mat::new(usize::MAX, 2, u8c(1)).unwrap_err(),
            MatError::SizeOverflow
        );
    }

    fn arb_depth() -> impl Strategy<Value = Depth> {
        prop::sample::select(Depth::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn contiguous_copy_preserves_rows(
            rows in 0usize..12,
            cols in 0usize..12,
            depth in arb_depth(),
            channels in 1u32..=4,
        ) {
            let typ = MatType::new(depth, channels).unwrap();
            let mut m = Mat::new(rows, cols, typ).unwrap();
            fill_pattern(&mut m);
            let copy = m.to_contiguous().unwrap();
            prop_assert_eq!(copy.rows(), rows);
            prop_assert_eq!(copy.cols(), cols);
            prop_assert_eq!(copy.mat_type(), typ);
            for r in 0..rows {
                if cols > 0 {
                    prop_assert_eq!(m.row(r), copy.row(r));
                }
            }
        }

        #[test]
        fn cow_never_leaks_writes_to_clones(
            rows in 1usize..8,
            cols in 1usize..8,
            depth in arb_depth(),
        ) {
            let typ = MatType::new(depth, 1).unwrap();
            let mut a = Mat::new(rows, cols, typ).unwrap();
            fill_pattern(&mut a);
            let snapshot: Vec<Vec<u8>> = (0..rows).map(|r| a.row(r).to_vec()).collect();

            let mut b = a.clone();
            for r in 0..rows {
                for byte in b.row_mut(r).unwrap() {
                    *byte ^= 0xff;
                }
            }
            for r in 0..rows {
                prop_assert_eq!(a.row(r), snapshot[r].as_slice());
                prop_assert_ne!(b.row(r), snapshot[r].as_slice());
            }
        }
    }
}
