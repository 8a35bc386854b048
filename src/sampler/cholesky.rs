//! Exact Gaussian draws through a Cholesky factorization.
//!
//! With A = L Lᵀ the map y = L⁻ᵀ(L⁻¹ b + r), r ~ N(0, I), produces an exact
//! sample from N(A⁻¹b, A⁻¹) in one application: one forward solve, one
//! random fill, one back solve. The factorization is computed once at setup
//! and amortized over all samples. Low-rank-updated operators are assembled
//! into their explicit SPD form before factoring.
//!
//! The factor keeps the natural ordering. A `gathered` mode mirrors the
//! coarsest-level use inside a multigrid hierarchy, where the coarse problem
//! lives on a single process and only that process factors and solves while
//! the call keeps the distributed interface.

use faer::dyn_stack::{MemBuffer, MemStack};
use faer::linalg::cholesky::llt;
use faer::linalg::cholesky::llt::factor::LltRegularization;
use faer::{Mat, Par};
use tracing::debug;

use crate::error::SamplerError;
use crate::matrix::Operator;
use crate::random::GaussianStream;
use crate::sampler::{SampleCallback, Sampler};

/// Factorization plus per-sample work vectors.
pub(crate) struct CholeskyState {
    /// Lower-triangular factor (strict upper part is untouched scratch).
    l: Mat<f64>,
    v: Vec<f64>,
    r: Vec<f64>,
    gathered: bool,
}

impl CholeskyState {
    pub(crate) fn setup(op: &Operator, gathered: bool) -> Result<Self, SamplerError> {
        let mut m = op.assemble_dense();
        let n = m.nrows();
        let par = Par::Seq;
        let params = Default::default();
        let mut buf = MemBuffer::new(llt::factor::cholesky_in_place_scratch::<f64>(
            n, par, params,
        ));
        let stack = MemStack::new(&mut buf);
        llt::factor::cholesky_in_place(m.as_mut(), LltRegularization::default(), par, stack, params)
            .map_err(|_| SamplerError::NotPositiveDefinite)?;
        debug!(rows = n, gathered, "Cholesky factorization ready");
        Ok(Self {
            l: m,
            v: vec![0.0; n],
            r: vec![0.0; n],
            gathered,
        })
    }

    pub(crate) fn nrows(&self) -> usize {
        self.v.len()
    }

    /// True when only one process holds the factor.
    pub(crate) fn is_gathered(&self) -> bool {
        self.gathered
    }

    /// y = L⁻ᵀ(L⁻¹ b + r).
    pub(crate) fn sample(
        &mut self,
        b: &[f64],
        y: &mut [f64],
        rng: &mut GaussianStream,
    ) -> Result<(), SamplerError> {
        let n = self.nrows();
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
        self.v.copy_from_slice(b);
        forward_substitute(&self.l, &mut self.v);
        rng.fill(&mut self.r);
        for (vi, ri) in self.v.iter_mut().zip(&self.r) {
            *vi += ri;
        }
        y.copy_from_slice(&self.v);
        backward_substitute_transpose(&self.l, y);
        Ok(())
    }

    /// Deterministic solve A x = b with the stored factor.
    pub(crate) fn solve(&self, b: &[f64]) -> Vec<f64> {
        let mut x = b.to_vec();
        forward_substitute(&self.l, &mut x);
        backward_substitute_transpose(&self.l, &mut x);
        x
    }

    /// diag(A⁻¹), one solve per unit vector, columns in parallel.
    pub(crate) fn inverse_diagonal(&self) -> Vec<f64> {
        use rayon::prelude::*;
        let n = self.nrows();
        (0..n)
            .into_par_iter()
            .map(|i| {
                let mut e = vec![0.0; n];
                e[i] = 1.0;
                forward_substitute(&self.l, &mut e);
                backward_substitute_transpose(&self.l, &mut e);
                e[i]
            })
            .collect()
    }
}

/// Solve L x = rhs in place, reading only the lower triangle.
fn forward_substitute(l: &Mat<f64>, x: &mut [f64]) {
    let n = x.len();
    for i in 0..n {
        let mut sum = x[i];
        for j in 0..i {
            sum -= l[(i, j)] * x[j];
        }
        x[i] = sum / l[(i, i)];
    }
}

/// Solve Lᵀ x = rhs in place, reading only the lower triangle.
fn backward_substitute_transpose(l: &Mat<f64>, x: &mut [f64]) {
    let n = x.len();
    for i in (0..n).rev() {
        let mut sum = x[i];
        for j in i + 1..n {
            sum -= l[(j, i)] * x[j];
        }
        x[i] = sum / l[(i, i)];
    }
}

/// Exact sampler owning its operator, factor and stream.
pub struct CholeskySampler {
    op: Operator,
    state: CholeskyState,
    rng: GaussianStream,
    callback: Option<SampleCallback>,
}

impl CholeskySampler {
    pub fn new(op: Operator, rng: GaussianStream) -> Result<Self, SamplerError> {
        let state = CholeskyState::setup(&op, false)?;
        Ok(Self {
            op,
            state,
            rng,
            callback: None,
        })
    }

    /// The coarsest-level variant: factor and solve on one process only.
    pub fn new_gathered(op: Operator, rng: GaussianStream) -> Result<Self, SamplerError> {
        let state = CholeskyState::setup(&op, true)?;
        Ok(Self {
            op,
            state,
            rng,
            callback: None,
        })
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// True for the coarsest-level single-process variant.
    pub fn is_gathered(&self) -> bool {
        self.state.is_gathered()
    }

    /// Deterministic solve with the amortized factor (the chain mean).
    pub fn solve_mean(&self, b: &[f64]) -> Vec<f64> {
        self.state.solve(b)
    }

    /// Pointwise marginal variances diag(A⁻¹) of the target distribution.
    pub fn marginal_variances(&self) -> Vec<f64> {
        self.state.inverse_diagonal()
    }
}

impl Sampler for CholeskySampler {
    fn apply(&mut self, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
        self.state.sample(b, y, &mut self.rng)
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
