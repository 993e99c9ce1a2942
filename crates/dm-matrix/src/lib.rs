//! `dm-matrix` - Dense row-major matrices with pluggable multiplication
//! strategies and allocation accounting.
//!
//! This crate provides:
//! - A `Matrix` type whose storage comes from a `TrackingAllocator`
//! - A `MultiplyStrategy` trait with naive, tiled and GEMM-backed strategies
//! - A `Gemm` seam for swapping the optimized matmul routine
//! - Process-wide allocation counters (`bytes`, `allocated`, `deallocated`)
//!
//! ```
//! use dm_matrix::{multiply_naive, multiply_tile, Matrix};
//!
//! let a = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]])?;
//! let b = Matrix::from_rows(&[&[5.0, 6.0], &[7.0, 8.0]])?;
//! let c = multiply_naive(&a, &b)?;
//! assert_eq!(c, multiply_tile(&a, &b, 1)?);
//! assert_eq!(c.to_string(), "[ 19 22\n 43 50 ]");
//! # Ok::<(), dm_matrix::MatrixError>(())
//! ```

pub mod alloc;
pub mod backend;
pub mod config;
pub mod cpu;
pub mod error;
pub mod gemm;
pub mod matrix;
pub mod profile;
pub mod shape;

// Re-export primary types at the crate root for convenience.
pub use alloc::{
    allocated, bytes, deallocated, ByteCounter, CounterSnapshot, TrackedBuffer, TrackingAllocator,
};
pub use backend::{check_matmul_shapes, MultiplyStrategy};
pub use config::{StrategyKind, DEFAULT_TILE_SIZE};
pub use cpu::{multiply_naive, multiply_tile, Naive, Tiled};
pub use error::{MatrixError, Result};
pub use gemm::{multiply_fast, FaerGemm, Fast, Gemm, ReferenceGemm};
pub use matrix::Matrix;
pub use profile::{flop_count, profile, Profile};
pub use shape::Shape;
