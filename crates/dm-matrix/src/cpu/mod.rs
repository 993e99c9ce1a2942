pub mod tiled;

use tracing::debug;

use crate::backend::{check_matmul_shapes, output_for, MultiplyStrategy};
use crate::error::Result;
use crate::matrix::Matrix;

pub use tiled::{multiply_tile, Tiled};

/// Direct triple-loop multiplication.
///
/// Each output cell is a sequential sum over `k` in increasing order.
/// Intended as the reference the other strategies are checked against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Naive;

impl Naive {
    pub fn new() -> Self {
        Naive
    }
}

impl MultiplyStrategy for Naive {
    fn name(&self) -> &str {
        "naive"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let (m, k, n) = check_matmul_shapes(a, b)?;
        debug!(strategy = self.name(), m, k, n, "multiply");

        let mut c = output_for(a, m, n)?;
        let (a, b) = (a.as_slice(), b.as_slice());
        let out = c.as_mut_slice();
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0f64;
                for p in 0..k {
                    sum += a[i * k + p] * b[p * n + j];
                }
                out[i * n + j] = sum;
            }
        }
        Ok(c)
    }
}

/// Multiply with the naive triple loop.
///
/// # Errors
/// Returns [`MatrixError::MatmulMismatch`](crate::MatrixError::MatmulMismatch)
/// if `a.cols() != b.rows()`.
pub fn multiply_naive(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    Naive.multiply(a, b)
}
