// Cache-blocked matmul.
//
// The output and the shared k dimension are split into square tiles. For each
// (row tile, column tile) pair the k tiles are swept in order, and inside a
// tile the loops run i-k-j so the innermost loop streams a row of B and a row
// of C.

use tracing::debug;

use crate::backend::{check_matmul_shapes, output_for, MultiplyStrategy};
use crate::config::DEFAULT_TILE_SIZE;
use crate::error::Result;
use crate::matrix::Matrix;

/// Blocked multiplication with square tiles of `tile_size`.
///
/// A `tile_size` of zero, or one at least as large as every dimension,
/// collapses to a single tile.
#[derive(Debug, Clone, Copy)]
pub struct Tiled {
    tile_size: usize,
}

impl Tiled {
    pub fn new(tile_size: usize) -> Self {
        Tiled { tile_size }
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    fn effective_tile(&self, m: usize, k: usize, n: usize) -> usize {
        if self.tile_size == 0 {
            m.max(k).max(n).max(1)
        } else {
            self.tile_size
        }
    }
}

impl Default for Tiled {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE)
    }
}

impl MultiplyStrategy for Tiled {
    fn name(&self) -> &str {
        "tile"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let (m, k, n) = check_matmul_shapes(a, b)?;
        let tile = self.effective_tile(m, k, n);
        debug!(strategy = self.name(), m, k, n, tile, "multiply");

        let mut c = output_for(a, m, n)?;
        let (a, b) = (a.as_slice(), b.as_slice());
        let out = c.as_mut_slice();

        for it in (0..m).step_by(tile) {
            let i_end = (it + tile).min(m);
            for jt in (0..n).step_by(tile) {
                let j_end = (jt + tile).min(n);
                for kt in (0..k).step_by(tile) {
                    let k_end = (kt + tile).min(k);

                    for i in it..i_end {
                        let c_row = &mut out[i * n + jt..i * n + j_end];
                        for p in kt..k_end {
                            let a_ip = a[i * k + p];
                            let b_row = &b[p * n + jt..p * n + j_end];
                            for (c_ij, &b_pj) in c_row.iter_mut().zip(b_row) {
                                *c_ij += a_ip * b_pj;
                            }
                        }
                    }
                }
            }
        }
        Ok(c)
    }
}

/// Multiply with square tiles of `tile_size`.
///
/// # Errors
/// Returns [`MatrixError::MatmulMismatch`](crate::MatrixError::MatmulMismatch)
/// if `a.cols() != b.rows()`.
pub fn multiply_tile(a: &Matrix, b: &Matrix, tile_size: usize) -> Result<Matrix> {
    Tiled::new(tile_size).multiply(a, b)
}
