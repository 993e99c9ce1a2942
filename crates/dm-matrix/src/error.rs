use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    MatmulMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("failed to allocate {elements} elements of {elem_size} bytes")]
    Allocation { elements: usize, elem_size: usize },
    #[error("index ({row}, {col}) out of range for {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("data length mismatch: expected {expected} elements, got {got}")]
    DataLength { expected: usize, got: usize },
    #[error("unknown multiply strategy: {0}")]
    UnknownStrategy(String),
}

pub type Result<T> = std::result::Result<T, MatrixError>;
