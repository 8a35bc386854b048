use thiserror::Error;

// Unified error type for mgmc

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("zero diagonal entry in row {0}")]
    ZeroDiagonal(usize),
    #[error("matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("coloring error: {0}")]
    Coloring(String),
    #[error("scatter construction error: {0}")]
    Scatter(String),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("communication error: {0}")]
    Comm(String),
    #[error("sample callback failed at iteration {iteration}: {message}")]
    Callback { iteration: usize, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
