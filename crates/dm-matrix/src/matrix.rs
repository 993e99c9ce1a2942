use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};

use crate::alloc::{TrackedBuffer, TrackingAllocator};
use crate::error::{MatrixError, Result};
use crate::shape::Shape;

/// A dense matrix of `f64` stored contiguously in row-major order.
///
/// Element `(i, j)` lives at offset `i * cols + j`. Storage comes from a
/// [`TrackingAllocator`], so every matrix that is created, cloned or dropped
/// shows up in that allocator's counters.
///
/// All element access is bounds checked. The fallible accessors return
/// [`MatrixError::IndexOutOfRange`]; the `(row, col)` index operators panic
/// with the same message.
#[derive(Clone)]
pub struct Matrix {
    shape: Shape,
    buffer: TrackedBuffer<f64>,
}

impl Matrix {
    /// Create a zero-filled `rows x cols` matrix backed by the global allocator.
    ///
    /// # Errors
    /// Returns [`MatrixError::Allocation`] if storage cannot be obtained.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        Self::new_in(rows, cols, TrackingAllocator::global().clone())
    }

    /// Create a zero-filled `rows x cols` matrix backed by `alloc`.
    pub fn new_in(rows: usize, cols: usize, alloc: TrackingAllocator) -> Result<Self> {
        let shape = Shape::new(rows, cols);
        let buffer = allocate_for(&alloc, shape)?;
        Ok(Matrix { shape, buffer })
    }

    /// Create a matrix from row-major data, backed by the global allocator.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        Self::from_slice_in(rows, cols, &data, TrackingAllocator::global().clone())
    }

    /// Create a matrix from row-major data, backed by `alloc`.
    ///
    /// # Errors
    /// Returns [`MatrixError::DataLength`] if `data.len() != rows * cols`.
    pub fn from_slice_in(
        rows: usize,
        cols: usize,
        data: &[f64],
        alloc: TrackingAllocator,
    ) -> Result<Self> {
        let expected = rows.saturating_mul(cols);
        if data.len() != expected {
            return Err(MatrixError::DataLength {
                expected,
                got: data.len(),
            });
        }
        let mut m = Self::new_in(rows, cols, alloc)?;
        m.buffer.copy_from_slice(data);
        Ok(m)
    }

    /// Create a matrix from a list of equally sized rows.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        Self::from_rows_in(rows, TrackingAllocator::global().clone())
    }

    pub fn from_rows_in(rows: &[&[f64]], alloc: TrackingAllocator) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut m = Self::new_in(rows.len(), cols, alloc)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(MatrixError::DataLength {
                    expected: cols,
                    got: row.len(),
                });
            }
            m.row_mut(i).copy_from_slice(row);
        }
        Ok(m)
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Result<Self> {
        Self::identity_in(n, TrackingAllocator::global().clone())
    }

    pub fn identity_in(n: usize, alloc: TrackingAllocator) -> Result<Self> {
        let mut m = Self::new_in(n, n, alloc)?;
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        Ok(m)
    }

    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    pub fn cols(&self) -> usize {
        self.shape.cols
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The allocator backing this matrix.
    pub fn allocator(&self) -> &TrackingAllocator {
        self.buffer.allocator()
    }

    /// The row-major element buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.buffer
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.buffer
    }

    /// Row `i` as a slice.
    ///
    /// # Panics
    /// Panics if `i >= rows()`.
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.shape.cols;
        &self.buffer[start..start + self.shape.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        let start = i * self.shape.cols;
        let cols = self.shape.cols;
        &mut self.buffer[start..start + cols]
    }

    fn checked_offset(&self, row: usize, col: usize) -> Result<usize> {
        if self.shape.contains(row, col) {
            Ok(self.shape.offset(row, col))
        } else {
            Err(MatrixError::IndexOutOfRange {
                row,
                col,
                rows: self.shape.rows,
                cols: self.shape.cols,
            })
        }
    }

    /// Read element `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        let offset = self.checked_offset(row, col)?;
        Ok(self.buffer[offset])
    }

    /// Write element `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let offset = self.checked_offset(row, col)?;
        self.buffer[offset] = value;
        Ok(())
    }

    /// Reallocate for a new shape. All elements are reset to zero.
    ///
    /// On failure the matrix keeps its previous shape and contents.
    pub fn reset(&mut self, rows: usize, cols: usize) -> Result<()> {
        let shape = Shape::new(rows, cols);
        let buffer = allocate_for(self.allocator(), shape)?;
        self.buffer = buffer;
        self.shape = shape;
        Ok(())
    }

    /// Move the contents out, leaving `self` as an empty `0 x 0` matrix on
    /// the same allocator.
    pub fn take(&mut self) -> Matrix {
        let empty = Matrix {
            shape: Shape::default(),
            buffer: TrackedBuffer::empty(self.allocator().clone()),
        };
        mem::replace(self, empty)
    }
}

fn allocate_for(alloc: &TrackingAllocator, shape: Shape) -> Result<TrackedBuffer<f64>> {
    let n = shape.checked_numel().ok_or(MatrixError::Allocation {
        elements: usize::MAX,
        elem_size: mem::size_of::<f64>(),
    })?;
    alloc.allocate(n)
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        match self.checked_offset(row, col) {
            Ok(offset) => &self.buffer[offset],
            Err(e) => panic!("{}", e),
        }
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        match self.checked_offset(row, col) {
            Ok(offset) => &mut self.buffer[offset],
            Err(e) => panic!("{}", e),
        }
    }
}

/// Shapes must match and every element must compare equal. There is no
/// floating-point tolerance.
impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.as_slice() == other.as_slice()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for i in 0..self.rows() {
            if i > 0 {
                writeln!(f)?;
            }
            for &v in self.row(i) {
                write!(f, " {}", format_general(v))?;
            }
        }
        write!(f, " ]")
    }
}

/// Formats `v` the way a `%g` conversion with six significant digits does:
/// fixed notation for exponents in `-4..6`, scientific otherwise, trailing
/// zeros removed.
fn format_general(v: f64) -> String {
    const PRECISION: i32 = 6;

    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // The exponent after rounding to PRECISION significant digits.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return v.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return v.to_string();
    };

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let fixed = format!("{:.*}", (PRECISION - 1 - exp) as usize, v);
        trim_fraction(&fixed).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("shape", &self.shape)
            .field("data", &self.buffer)
            .finish()
    }
}
