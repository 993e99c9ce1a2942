use std::fmt::Debug;

use faer::mat::{MatMut, MatRef};
use faer::{Accum, Par};
use tracing::debug;

use crate::backend::{check_matmul_shapes, output_for, MultiplyStrategy};
use crate::error::Result;
use crate::matrix::Matrix;

/// An optimized dense matrix-multiply routine.
///
/// Computes `c = 1.0 * a * b + 0.0 * c` for row-major operands without
/// transposition:
///
/// * `a` is `m x k` with leading dimension (row stride) `lda`,
/// * `b` is `k x n` with leading dimension `ldb`,
/// * `c` is `m x n` with leading dimension `ldc` and is overwritten.
///
/// Callers guarantee `m`, `n` and `k` are all non-zero and that each slice
/// covers its matrix under the given stride.
pub trait Gemm: Send + Sync + Debug {
    /// Returns the name of this implementation (e.g., "faer", "reference").
    fn name(&self) -> &str;

    #[allow(clippy::too_many_arguments)]
    fn row_major_multiply(
        &self,
        a: &[f64],
        lda: usize,
        b: &[f64],
        ldb: usize,
        c: &mut [f64],
        ldc: usize,
        m: usize,
        n: usize,
        k: usize,
    );
}

/// Delegates to `faer`'s blocked matmul, pinned to a single thread so results
/// are reproducible run to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerGemm;

impl Gemm for FaerGemm {
    fn name(&self) -> &str {
        "faer"
    }

    fn row_major_multiply(
        &self,
        a: &[f64],
        lda: usize,
        b: &[f64],
        ldb: usize,
        c: &mut [f64],
        ldc: usize,
        m: usize,
        n: usize,
        k: usize,
    ) {
        // A row-major r x c view is the transpose of a column-major c x r one.
        let a = MatRef::from_column_major_slice_with_stride(a, k, m, lda).transpose();
        let b = MatRef::from_column_major_slice_with_stride(b, n, k, ldb).transpose();
        let c = MatMut::from_column_major_slice_with_stride_mut(c, n, m, ldc).transpose_mut();

        faer::linalg::matmul::matmul(c, Accum::Replace, a, b, 1.0, Par::Seq)
    }
}

/// Plain-loop implementation of the [`Gemm`] contract.
///
/// Useful for checking that operands are marshaled correctly when the
/// optimized path is swapped out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceGemm;

impl Gemm for ReferenceGemm {
    fn name(&self) -> &str {
        "reference"
    }

    fn row_major_multiply(
        &self,
        a: &[f64],
        lda: usize,
        b: &[f64],
        ldb: usize,
        c: &mut [f64],
        ldc: usize,
        m: usize,
        n: usize,
        k: usize,
    ) {
        for i in 0..m {
            for j in 0..n {
                let mut temp = 0.0;
                for l in 0..k {
                    temp += a[i * lda + l] * b[l * ldb + j];
                }
                c[i * ldc + j] = temp;
            }
        }
    }
}

/// Multiplication through an external [`Gemm`] routine.
#[derive(Debug, Clone, Default)]
pub struct Fast<G = FaerGemm> {
    gemm: G,
}

impl Fast {
    pub fn new() -> Self {
        Fast { gemm: FaerGemm }
    }
}

impl<G: Gemm> Fast<G> {
    /// Use `gemm` instead of the default routine.
    pub fn with_gemm(gemm: G) -> Self {
        Fast { gemm }
    }

    pub fn gemm(&self) -> &G {
        &self.gemm
    }
}

impl<G: Gemm> MultiplyStrategy for Fast<G> {
    fn name(&self) -> &str {
        "fast"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let (m, k, n) = check_matmul_shapes(a, b)?;
        debug!(strategy = self.name(), gemm = self.gemm.name(), m, k, n, "multiply");

        let mut c = output_for(a, m, n)?;
        if m == 0 || n == 0 || k == 0 {
            // The zeroed output is already the product.
            return Ok(c);
        }
        self.gemm.row_major_multiply(
            a.as_slice(),
            a.cols(),
            b.as_slice(),
            b.cols(),
            c.as_mut_slice(),
            n,
            m,
            n,
            k,
        );
        Ok(c)
    }
}

/// Multiply through the optimized GEMM routine.
///
/// # Errors
/// Returns [`MatrixError::MatmulMismatch`](crate::MatrixError::MatmulMismatch)
/// if `a.cols() != b.rows()`.
pub fn multiply_fast(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    Fast::new().multiply(a, b)
}
