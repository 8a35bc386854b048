//! mgmc: Multigrid Monte Carlo sampling of Gaussian fields whose precision
//! operator is a large sparse SPD matrix.

pub mod config;
pub mod error;
pub mod matrix;
pub mod parallel;
pub mod problems;
pub mod random;
pub mod sampler;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use error::SamplerError;
pub use matrix::*;
pub use random::GaussianStream;
pub use sampler::*;
pub use solver::Richardson;
pub use utils::*;
