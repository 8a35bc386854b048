//! Command-line or API options for the samplers.
//!
//! This module provides the `SamplerOptions` struct, which collects every
//! runtime knob of the sampling engine: the smoother family and its
//! relaxation parameter, the sweep ordering, the multigrid hierarchy shape,
//! the chain lengths and the seeding policy. The benchmark binary exposes
//! the same fields as command-line flags.

use crate::error::SamplerError;

/// Smoother family used inside MCSOR-based samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmootherType {
    /// Gauss-Seidel conditional draws (ω = 1).
    Gibbs,
    /// Over-relaxed sweep with ω ∈ (0, 2].
    Sor,
    /// Forward-then-backward Gibbs sweep.
    SymGibbs,
}

/// Order in which colors are traversed during one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    Forward,
    Backward,
    Symmetric,
}

/// Sampler used at the coarsest level of the multigrid hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseSolverType {
    /// Exact draw through a factorization (default).
    Cholesky,
    /// A fixed number of Gibbs sweeps.
    Gibbs,
}

/// Multigrid traversal pattern. Only the V-cycle is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MgCycleType {
    V,
}

/// How the per-process random stream is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Fixed seed; runs are reproducible for a fixed process count.
    Fixed(u64),
    /// Seed drawn from the operating system entropy source.
    FromEntropy,
}

/// Runtime options for samplers and the benchmark driver.
#[derive(Debug, Clone)]
pub struct SamplerOptions {
    pub smoother_type: SmootherType,
    /// Relaxation parameter ω, must lie in (0, 2]. Default 1.0.
    pub omega: f64,
    pub sweep_direction: SweepDirection,
    pub coarse_solver: CoarseSolverType,
    /// Number of hierarchy levels; `None` lets the coarsening decide.
    pub mg_levels: Option<usize>,
    pub mg_cycle: MgCycleType,
    /// Pre- and post-smoothing sweeps ν per level. Default 2.
    pub mg_smoothing_steps: usize,
    /// Coarse operators as Galerkin products PᵀAP instead of rediscretized.
    pub mg_galerkin: bool,
    pub n_burnin: usize,
    pub n_samples: usize,
    pub seed: SeedPolicy,
    pub measure_sampling_time: bool,
    pub measure_iact: bool,
    pub estimate_mean_and_var: bool,
    /// Dump the autocorrelation sequence to `acf.txt`.
    pub print_acf: bool,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            smoother_type: SmootherType::Gibbs,
            omega: 1.0,
            sweep_direction: SweepDirection::Forward,
            coarse_solver: CoarseSolverType::Cholesky,
            mg_levels: None,
            mg_cycle: MgCycleType::V,
            mg_smoothing_steps: 2,
            mg_galerkin: true,
            n_burnin: 0,
            n_samples: 1,
            seed: SeedPolicy::Fixed(1),
            measure_sampling_time: false,
            measure_iact: true,
            estimate_mean_and_var: false,
            print_acf: false,
        }
    }
}

impl SamplerOptions {
    /// Check option consistency before any sampler is constructed.
    pub fn validate(&self) -> Result<(), SamplerError> {
        // ω = 2 is the degenerate noise-free sweep and stays admissible.
        if !(self.omega > 0.0 && self.omega <= 2.0) {
            return Err(SamplerError::Config(format!(
                "relaxation parameter must lie in (0, 2], got {}",
                self.omega
            )));
        }
        if self.n_samples == 0 {
            return Err(SamplerError::Config("sample count must be positive".into()));
        }
        if let Some(levels) = self.mg_levels {
            if levels < 2 {
                return Err(SamplerError::Config(format!(
                    "a hierarchy needs at least 2 levels, got {levels}"
                )));
            }
        }
        if self.mg_smoothing_steps == 0 {
            return Err(SamplerError::Config(
                "smoothing step count must be positive".into(),
            ));
        }
        if !self.measure_sampling_time && !self.measure_iact {
            return Err(SamplerError::Config(
                "at least one of measure_sampling_time / measure_iact must be selected".into(),
            ));
        }
        Ok(())
    }

    /// Effective ω for the configured smoother (`Gibbs` pins ω to 1).
    pub fn effective_omega(&self) -> f64 {
        match self.smoother_type {
            SmootherType::Gibbs | SmootherType::SymGibbs => 1.0,
            SmootherType::Sor => self.omega,
        }
    }

    /// Effective sweep direction (`SymGibbs` forces a symmetric sweep).
    pub fn effective_sweep(&self) -> SweepDirection {
        match self.smoother_type {
            SmootherType::SymGibbs => SweepDirection::Symmetric,
            _ => self.sweep_direction,
        }
    }
}
