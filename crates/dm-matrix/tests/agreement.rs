use dm_matrix::{
    multiply_fast, multiply_naive, multiply_tile, Fast, Matrix, MatrixError, MultiplyStrategy,
    ReferenceGemm, StrategyKind, TrackingAllocator,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_matrix(rows: usize, cols: usize, rng: &mut StdRng, alloc: &TrackingAllocator) -> Matrix {
    let data: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Matrix::from_slice_in(rows, cols, &data, alloc.clone()).unwrap()
}

fn assert_close(expected: &Matrix, actual: &Matrix, name: &str) {
    assert_eq!(expected.shape(), actual.shape(), "{}: shape mismatch", name);
    for i in 0..expected.rows() {
        for j in 0..expected.cols() {
            let (e, a) = (expected[(i, j)], actual[(i, j)]);
            let scale = e.abs().max(a.abs()).max(1.0);
            assert!(
                (e - a).abs() / scale < 1e-9,
                "{}: mismatch at ({}, {}): expected {}, got {}",
                name,
                i,
                j,
                e,
                a
            );
        }
    }
}

// ============================================================
// Fixed examples
// ============================================================

#[test]
fn test_2x2_all_strategies() {
    let alloc = TrackingAllocator::new();
    let a = Matrix::from_rows_in(&[&[1.0, 2.0], &[3.0, 4.0]], alloc.clone()).unwrap();
    let b = Matrix::from_rows_in(&[&[5.0, 6.0], &[7.0, 8.0]], alloc.clone()).unwrap();
    let expected = Matrix::from_rows_in(&[&[19.0, 22.0], &[43.0, 50.0]], alloc).unwrap();

    assert_eq!(multiply_naive(&a, &b).unwrap(), expected);
    assert_eq!(multiply_tile(&a, &b, 2).unwrap(), expected);
    assert_close(&expected, &multiply_fast(&a, &b).unwrap(), "fast");
}

#[test]
fn test_shape_mismatch_every_strategy() {
    let alloc = TrackingAllocator::new();
    let a = Matrix::new_in(2, 3, alloc.clone()).unwrap();
    let b = Matrix::new_in(2, 3, alloc).unwrap();

    let expected = MatrixError::MatmulMismatch {
        m: 2,
        k: 3,
        k2: 2,
        n: 3,
    };
    assert_eq!(multiply_naive(&a, &b).unwrap_err(), expected);
    assert_eq!(multiply_tile(&a, &b, 2).unwrap_err(), expected);
    assert_eq!(multiply_fast(&a, &b).unwrap_err(), expected);
}

// ============================================================
// Random matrices
// ============================================================

#[test]
fn test_strategies_agree_on_random_matrices() {
    let alloc = TrackingAllocator::new();
    let mut rng = StdRng::seed_from_u64(42);

    let sizes = [(1, 1, 1), (3, 5, 2), (17, 13, 19), (32, 32, 32), (45, 64, 33)];
    for &(m, k, n) in &sizes {
        let a = random_matrix(m, k, &mut rng, &alloc);
        let b = random_matrix(k, n, &mut rng, &alloc);
        let expected = multiply_naive(&a, &b).unwrap();

        for tile in [1, 2, 7, m.max(k).max(n) + 1] {
            let c = multiply_tile(&a, &b, tile).unwrap();
            assert_close(&expected, &c, &format!("tile {} on {}x{}x{}", tile, m, k, n));
        }
        assert_close(&expected, &multiply_fast(&a, &b).unwrap(), "fast");

        let reference = Fast::with_gemm(ReferenceGemm).multiply(&a, &b).unwrap();
        assert_close(&expected, &reference, "reference gemm");
    }
}

#[test]
fn test_identity_every_strategy() {
    let alloc = TrackingAllocator::new();
    let mut rng = StdRng::seed_from_u64(7);
    let n = 24;
    let a = random_matrix(n, n, &mut rng, &alloc);
    let id = Matrix::identity_in(n, alloc).unwrap();

    for kind in StrategyKind::all() {
        let strategy = kind.build();
        let c = strategy.multiply(&a, &id).unwrap();
        assert_close(&a, &c, strategy.name());
        let c = strategy.multiply(&id, &a).unwrap();
        assert_close(&a, &c, strategy.name());
    }
}

#[test]
fn test_every_strategy_allocates_one_result() {
    let alloc = TrackingAllocator::new();
    let mut rng = StdRng::seed_from_u64(3);
    let a = random_matrix(8, 6, &mut rng, &alloc);
    let b = random_matrix(6, 4, &mut rng, &alloc);

    for kind in StrategyKind::all() {
        let before = alloc.counter().snapshot();
        let c = kind.build().multiply(&a, &b).unwrap();
        assert_eq!(alloc.allocated(), before.allocated + 1, "{}", kind);
        assert_eq!(alloc.bytes(), before.bytes + 8 * 4 * 8, "{}", kind);
        drop(c);
        assert_eq!(alloc.bytes(), before.bytes, "{}", kind);
    }
}
