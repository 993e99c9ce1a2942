use std::time::{Duration, Instant};

use tracing::debug;

use crate::backend::MultiplyStrategy;
use crate::error::Result;
use crate::matrix::Matrix;

/// Number of multiply-add operations in `a * b`.
pub fn flop_count(a: &Matrix, b: &Matrix) -> usize {
    a.rows() * a.cols() * b.cols()
}

/// Timing of a single multiplication.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub strategy: String,
    pub elapsed: Duration,
    /// Multiply-add operations performed.
    pub nflo: usize,
}

impl Profile {
    /// Throughput in billions of multiply-adds per second.
    ///
    /// Returns 0.0 when no time was measured.
    pub fn gflops(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.nflo as f64 / secs / 1.0e9
    }
}

/// Run `strategy` once on `a * b` and time it.
pub fn profile(
    strategy: &dyn MultiplyStrategy,
    a: &Matrix,
    b: &Matrix,
) -> Result<(Matrix, Profile)> {
    let start = Instant::now();
    let c = strategy.multiply(a, b)?;
    let elapsed = start.elapsed();

    let p = Profile {
        strategy: strategy.name().to_string(),
        elapsed,
        nflo: flop_count(a, b),
    };
    debug!(
        strategy = %p.strategy,
        elapsed_us = elapsed.as_micros() as u64,
        gflops = p.gflops(),
        "profiled"
    );
    Ok((c, p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::TrackingAllocator;
    use crate::cpu::Naive;

    #[test]
    fn test_flop_count() {
        let alloc = TrackingAllocator::new();
        let a = Matrix::new_in(4, 5, alloc.clone()).unwrap();
        let b = Matrix::new_in(5, 6, alloc).unwrap();
        assert_eq!(flop_count(&a, &b), 120);
    }

    #[test]
    fn test_gflops() {
        let p = Profile {
            strategy: "naive".to_string(),
            elapsed: Duration::from_millis(500),
            nflo: 2_000_000_000,
        };
        assert!((p.gflops() - 4.0).abs() < 1e-12);

        let zero = Profile {
            elapsed: Duration::ZERO,
            ..p
        };
        assert_eq!(zero.gflops(), 0.0);
    }

    #[test]
    fn test_profile_returns_product() {
        let alloc = TrackingAllocator::new();
        let a = Matrix::identity_in(3, alloc.clone()).unwrap();
        let b = Matrix::from_slice_in(3, 1, &[1.0, 2.0, 3.0], alloc).unwrap();
        let (c, p) = profile(&Naive, &a, &b).unwrap();
        assert_eq!(c, b);
        assert_eq!(p.strategy, "naive");
        assert_eq!(p.nflo, 9);
    }

    #[test]
    fn test_profile_propagates_mismatch() {
        let alloc = TrackingAllocator::new();
        let a = Matrix::new_in(2, 3, alloc.clone()).unwrap();
        let b = Matrix::new_in(2, 3, alloc).unwrap();
        assert!(profile(&Naive, &a, &b).is_err());
    }
}
