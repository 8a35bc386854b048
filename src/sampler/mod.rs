//! Samplers for Gaussians with sparse SPD precision operators.
//!
//! One application of a sampler maps a state `y` to a new state whose Markov
//! chain leaves N(A⁻¹b, A⁻¹) invariant. The concrete kinds form a closed
//! sum: multicolor SOR sweeps, exact Cholesky draws, multigrid V-cycles
//! composing the former two, and the lock-free Hogwild sweep.

use crate::error::SamplerError;
use crate::random::GaussianStream;

pub mod cholesky;
pub mod hogwild;
pub mod mcsor;
pub mod multigrid;

pub use cholesky::CholeskySampler;
pub use hogwild::HogwildSampler;
pub use mcsor::{LowRankApply, McSorSampler, SweepType};
pub use multigrid::{MultigridOptions, MultigridSampler};

/// Per-iteration sample callback.
///
/// The closure owns its captured state; registering a new callback (or
/// dropping the sampler) drops the previous state exactly once.
pub struct SampleCallback {
    f: Box<dyn FnMut(usize, &[f64]) -> Result<(), SamplerError> + Send>,
}

impl SampleCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(usize, &[f64]) -> Result<(), SamplerError> + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub fn call(&mut self, iteration: usize, sample: &[f64]) -> Result<(), SamplerError> {
        (self.f)(iteration, sample)
    }
}

impl std::fmt::Debug for SampleCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SampleCallback")
    }
}

/// Common capability set of all sampler kinds.
pub trait Sampler {
    /// One sampler step: consume the fixed right-hand side `b` and update
    /// the state `y` in place.
    fn apply(&mut self, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError>;

    /// Install a per-iteration callback, dropping any previous one.
    fn set_callback(&mut self, cb: SampleCallback);

    /// Remove the callback, dropping its state.
    fn clear_callback(&mut self);

    /// Invoke the callback, if any, with the current sample.
    fn fire_callback(&mut self, iteration: usize, y: &[f64]) -> Result<(), SamplerError>;

    /// Replace the sampler's random stream.
    fn set_rng(&mut self, rng: GaussianStream);
}

/// Closed sum over the concrete sampler kinds with inlined dispatch.
pub enum AnySampler {
    McSor(McSorSampler),
    Cholesky(CholeskySampler),
    Multigrid(MultigridSampler),
    Hogwild(HogwildSampler),
}

impl Sampler for AnySampler {
    fn apply(&mut self, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
        match self {
            AnySampler::McSor(s) => s.apply(b, y),
            AnySampler::Cholesky(s) => s.apply(b, y),
            AnySampler::Multigrid(s) => s.apply(b, y),
            AnySampler::Hogwild(s) => s.apply(b, y),
        }
    }
    fn set_callback(&mut self, cb: SampleCallback) {
        match self {
            AnySampler::McSor(s) => s.set_callback(cb),
            AnySampler::Cholesky(s) => s.set_callback(cb),
            AnySampler::Multigrid(s) => s.set_callback(cb),
            AnySampler::Hogwild(s) => s.set_callback(cb),
        }
    }
    fn clear_callback(&mut self) {
        match self {
            AnySampler::McSor(s) => s.clear_callback(),
            AnySampler::Cholesky(s) => s.clear_callback(),
            AnySampler::Multigrid(s) => s.clear_callback(),
            AnySampler::Hogwild(s) => s.clear_callback(),
        }
    }
    fn fire_callback(&mut self, iteration: usize, y: &[f64]) -> Result<(), SamplerError> {
        match self {
            AnySampler::McSor(s) => s.fire_callback(iteration, y),
            AnySampler::Cholesky(s) => s.fire_callback(iteration, y),
            AnySampler::Multigrid(s) => s.fire_callback(iteration, y),
            AnySampler::Hogwild(s) => s.fire_callback(iteration, y),
        }
    }
    fn set_rng(&mut self, rng: GaussianStream) {
        match self {
            AnySampler::McSor(s) => s.set_rng(rng),
            AnySampler::Cholesky(s) => s.set_rng(rng),
            AnySampler::Multigrid(s) => s.set_rng(rng),
            AnySampler::Hogwild(s) => s.set_rng(rng),
        }
    }
}
