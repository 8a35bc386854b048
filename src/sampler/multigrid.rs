//! Multigrid Monte Carlo sampler.
//!
//! One application performs a V-cycle over a grid hierarchy: ν multicolor
//! SOR sweeps as a random pre-smoother, restriction of the residual, a
//! recursive draw on the coarser level (exact Cholesky or a fixed number of
//! Gibbs sweeps at the bottom), prolongated correction, and ν post-smoothing
//! sweeps in the reverse sweep direction. With symmetric smoothing and
//! matched pre/post counts the cycle composition is self-adjoint with
//! respect to the target distribution, which keeps the chain's invariant
//! distribution exact.

use tracing::debug;

use crate::config::CoarseSolverType;
use crate::error::SamplerError;
use crate::matrix::{Csr, GridHierarchy, Operator};
use crate::random::GaussianStream;
use crate::sampler::cholesky::CholeskyState;
use crate::sampler::mcsor::{LowRankApply, McSorState, SweepType};
use crate::sampler::{SampleCallback, Sampler};

/// Construction knobs for the multigrid sampler.
#[derive(Debug, Clone, Copy)]
pub struct MultigridOptions {
    /// Pre- and post-smoothing sweeps ν per level.
    pub smoothing_steps: usize,
    /// Smoother sweep type; symmetric keeps the cycle reversible.
    pub sweep: SweepType,
    /// Relaxation parameter of the level smoothers.
    pub omega: f64,
    /// Sampler used on the coarsest level.
    pub coarse_solver: CoarseSolverType,
    /// Sweep count of the coarsest-level Gibbs sampler.
    pub coarse_iterations: usize,
    /// How level smoothers apply the low-rank post-correction.
    pub low_rank_apply: LowRankApply,
}

impl Default for MultigridOptions {
    fn default() -> Self {
        Self {
            smoothing_steps: 2,
            sweep: SweepType::SYMMETRIC,
            omega: 1.0,
            coarse_solver: CoarseSolverType::Cholesky,
            coarse_iterations: 4,
            low_rank_apply: LowRankApply::Factored,
        }
    }
}

enum CoarseLevelSampler {
    Cholesky(CholeskyState),
    Gibbs {
        state: McSorState,
        iterations: usize,
    },
}

/// A level above the coarsest: operator, prolongation from below, smoother.
struct MgLevel {
    op: Operator,
    /// Maps the next-coarser level up to this one.
    prolongation: Csr,
    smoother: McSorState,
}

/// Sampler composing random smoothers over a grid hierarchy.
pub struct MultigridSampler {
    coarse_op: Operator,
    coarse: CoarseLevelSampler,
    /// Levels above the coarsest, ordered coarse to fine.
    levels: Vec<MgLevel>,
    smoothing_steps: usize,
    sweep: SweepType,
    rng: GaussianStream,
    callback: Option<SampleCallback>,
}

impl MultigridSampler {
    pub fn new(
        hierarchy: GridHierarchy,
        opts: MultigridOptions,
        rng: GaussianStream,
    ) -> Result<Self, SamplerError> {
        if opts.smoothing_steps == 0 {
            return Err(SamplerError::Config(
                "smoothing step count must be positive".into(),
            ));
        }
        if hierarchy.num_levels() < 2 {
            return Err(SamplerError::Config(
                "a hierarchy needs at least 2 levels".into(),
            ));
        }

        let mut level_iter = hierarchy.into_levels().into_iter();
        let coarse_level = level_iter.next().expect("hierarchy has levels");
        let coarse_op = coarse_level.op;
        let coarse = match opts.coarse_solver {
            CoarseSolverType::Cholesky => {
                CoarseLevelSampler::Cholesky(CholeskyState::setup(&coarse_op, true)?)
            }
            CoarseSolverType::Gibbs => CoarseLevelSampler::Gibbs {
                state: McSorState::setup(&coarse_op, opts.omega, opts.low_rank_apply)?,
                iterations: opts.coarse_iterations.max(1),
            },
        };

        let mut levels = Vec::new();
        for level in level_iter {
            let prolongation = level.prolongation.ok_or_else(|| {
                SamplerError::Config("non-coarsest level without a prolongation".into())
            })?;
            let smoother = McSorState::setup(&level.op, opts.omega, opts.low_rank_apply)?;
            levels.push(MgLevel {
                op: level.op,
                prolongation,
                smoother,
            });
        }
        debug!(
            levels = levels.len() + 1,
            nu = opts.smoothing_steps,
            "multigrid sampler ready"
        );

        Ok(Self {
            coarse_op,
            coarse,
            levels,
            smoothing_steps: opts.smoothing_steps,
            sweep: opts.sweep,
            rng,
            callback: None,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len() + 1
    }

    pub fn fine_rows(&self) -> usize {
        self.levels
            .last()
            .map(|l| l.op.local_rows())
            .unwrap_or_else(|| self.coarse_op.local_rows())
    }

    /// Draw on the coarsest level.
    fn coarse_sample(&mut self, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
        match &mut self.coarse {
            CoarseLevelSampler::Cholesky(state) => state.sample(b, y, &mut self.rng),
            CoarseLevelSampler::Gibbs { state, iterations } => {
                let its = *iterations;
                for _ in 0..its {
                    state.sweep(&self.coarse_op, b, y, SweepType::SYMMETRIC, &mut self.rng)?;
                }
                Ok(())
            }
        }
    }

    /// One V-cycle at `depth` levels above the coarsest.
    fn v_cycle(&mut self, depth: usize, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
        if depth == 0 {
            return self.coarse_sample(b, y);
        }
        let nu = self.smoothing_steps;
        let sweep = self.sweep;
        let idx = depth - 1;

        // Pre-smooth.
        {
            let MgLevel { op, smoother, .. } = &mut self.levels[idx];
            for _ in 0..nu {
                smoother.sweep(&*op, b, y, sweep, &mut self.rng)?;
            }
        }

        // Residual and restriction.
        let (rb, coarse_n) = {
            let level = &self.levels[idx];
            let n = level.op.local_rows();
            let mut r = vec![0.0; n];
            level.op.matvec_serial(y, &mut r);
            for (ri, bi) in r.iter_mut().zip(b) {
                *ri = bi - *ri;
            }
            let coarse_n = level.prolongation.ncols();
            let mut rb = vec![0.0; coarse_n];
            level.prolongation.spmv_transpose(&r, &mut rb);
            (rb, coarse_n)
        };

        // Recurse from a zero coarse state.
        let mut xc = vec![0.0; coarse_n];
        self.v_cycle(depth - 1, &rb, &mut xc)?;

        // Prolongated correction.
        {
            let level = &self.levels[idx];
            let mut corr = vec![0.0; level.op.local_rows()];
            level.prolongation.spmv(&xc, &mut corr);
            for (yi, ci) in y.iter_mut().zip(&corr) {
                *yi += ci;
            }
        }

        // Post-smooth in the reverse direction.
        {
            let MgLevel { op, smoother, .. } = &mut self.levels[idx];
            for _ in 0..nu {
                smoother.sweep(&*op, b, y, sweep.reversed(), &mut self.rng)?;
            }
        }
        Ok(())
    }
}

impl Sampler for MultigridSampler {
    fn apply(&mut self, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
        let n = self.fine_rows();
        if b.len() != n {
            return Err(SamplerError::DimensionMismatch {
                expected: n,
                got: b.len(),
            });
        }
        if y.len() != n {
            return Err(SamplerError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        self.v_cycle(self.levels.len(), b, y)
    }

    fn set_callback(&mut self, cb: SampleCallback) {
        self.callback = Some(cb);
    }

    fn clear_callback(&mut self) {
        self.callback = None;
    }

    fn fire_callback(&mut self, iteration: usize, y: &[f64]) -> Result<(), SamplerError> {
        if let Some(cb) = &mut self.callback {
            cb.call(iteration, y)?;
        }
        Ok(())
    }

    fn set_rng(&mut self, rng: GaussianStream) {
        self.rng = rng;
    }
}
