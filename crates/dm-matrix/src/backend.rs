use std::fmt::Debug;

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;

/// A matrix multiplication algorithm.
///
/// Every implementation computes the standard product `C = A * B` and is a
/// drop-in substitute for the others; they differ only in loop structure and
/// therefore in floating-point summation order.
///
/// Implementations must:
/// - reject `a.cols() != b.rows()` with [`MatrixError::MatmulMismatch`]
///   before doing any work,
/// - leave `a` and `b` untouched,
/// - allocate exactly one result matrix of shape `a.rows() x b.cols()` from
///   `a`'s allocator.
pub trait MultiplyStrategy: Send + Sync + Debug {
    /// Returns the name of this strategy (e.g., "naive", "tile", "fast").
    fn name(&self) -> &str;

    /// Compute `a * b`.
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix>;
}

/// Checks that `a * b` is defined and returns `(m, k, n)`.
pub fn check_matmul_shapes(a: &Matrix, b: &Matrix) -> Result<(usize, usize, usize)> {
    let (lhs, rhs) = (a.shape(), b.shape());
    if !lhs.can_multiply(&rhs) {
        return Err(MatrixError::MatmulMismatch {
            m: lhs.rows,
            k: lhs.cols,
            k2: rhs.rows,
            n: rhs.cols,
        });
    }
    Ok((lhs.rows, lhs.cols, rhs.cols))
}

/// Allocates the zeroed `m x n` result for `a * b` from `a`'s allocator.
pub(crate) fn output_for(a: &Matrix, m: usize, n: usize) -> Result<Matrix> {
    Matrix::new_in(m, n, a.allocator().clone())
}
