//! Multicolor Gauss-Seidel/SOR sampler.
//!
//! A true parallel Gauss-Seidel sweep (as opposed to block-Jacobi with
//! Gauss-Seidel inside the blocks): rows are partitioned into colors with no
//! intra-color coupling, each color's ghost values are exchanged once, and
//! every row update adds the conditional-draw noise √(ω(2−ω)/a_jj)·r so the
//! fixed point of the chain has covariance A⁻¹ for any sweep direction.
//!
//! For operators of the form A + BΣ⁻¹Bᵀ the sweep runs on A alone and a
//! low-rank post-correction y ← y − L⁻¹B(Σ + BᵀL⁻¹B)⁻¹Bᵀy with
//! L = tril(A) is applied after each pass. The correction matrix can be
//! precomputed explicitly (setup cost, fast apply) or applied factor by
//! factor; both are exact.

use bitflags::bitflags;
use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat};
use tracing::debug;

use crate::config::SweepDirection;
use crate::error::SamplerError;
use crate::matrix::{GhostScatter, LowRankUpdate, Operator};
use crate::random::GaussianStream;
use crate::sampler::{SampleCallback, Sampler};
use crate::utils::coloring::{self, Coloring};

bitflags! {
    /// Which passes one sweep performs.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SweepType: u32 {
        /// Colors in ascending order.
        const FORWARD  = 0b01;
        /// Colors in descending order.
        const BACKWARD = 0b10;
        /// Forward pass followed by a backward pass.
        const SYMMETRIC = Self::FORWARD.bits() | Self::BACKWARD.bits();
    }
}

impl SweepType {
    /// The direction a matching post-smoother must use.
    pub fn reversed(self) -> SweepType {
        if self == SweepType::FORWARD {
            SweepType::BACKWARD
        } else if self == SweepType::BACKWARD {
            SweepType::FORWARD
        } else {
            self
        }
    }
}

impl From<SweepDirection> for SweepType {
    fn from(direction: SweepDirection) -> Self {
        match direction {
            SweepDirection::Forward => SweepType::FORWARD,
            SweepDirection::Backward => SweepType::BACKWARD,
            SweepDirection::Symmetric => SweepType::SYMMETRIC,
        }
    }
}

/// How the low-rank post-correction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LowRankApply {
    /// Apply L⁻¹, B and the small inverse one factor at a time.
    #[default]
    Factored,
    /// Precompute L⁻¹B(Σ + BᵀL⁻¹B)⁻¹ once and apply it as one operator.
    Explicit,
}

/// Precomputed pieces of the low-rank post-correction.
///
/// The sweep's splitting matrix for the composite is the triangle of A plus
/// the whole low-rank term, M = T + BΣ⁻¹Bᵀ with T = tril(A) (forward pass)
/// or tril(A)ᵀ (backward pass). By the Woodbury identity
/// M⁻¹ = T⁻¹ − T⁻¹B(Σ + BᵀT⁻¹B)⁻¹BᵀT⁻¹, so after the triangular sweep the
/// state is corrected by y ← y − T⁻¹B(Σ + BᵀT⁻¹B)⁻¹Bᵀy. Invariance also
/// needs the rank-space noise BΣ⁻¹ᐟ²r₂ injected into the right-hand side of
/// every pass, on top of the per-row diagonal noise.
struct LowRankCorrection {
    /// tril(A), solved by forward substitution.
    lower: crate::matrix::Csr,
    /// tril(A)ᵀ, solved by backward substitution.
    upper: crate::matrix::Csr,
    /// (Σ + Bᵀ L⁻¹ B)⁻¹, dense k×k; its transpose serves the backward pass.
    sb: Mat<f64>,
    /// L⁻¹ B Sb when the explicit mode is selected, dense n×k.
    ec_forward: Option<Mat<f64>>,
    /// Lᵀ⁻¹ B Sbᵀ for the backward pass in explicit mode.
    ec_backward: Option<Mat<f64>>,
    /// 1/√σ per observation, for the rank-space noise.
    inv_sqrt_sigma: Vec<f64>,
    w: Vec<f64>,
    v: Vec<f64>,
    z: Vec<f64>,
    rk: Vec<f64>,
    b_eff: Vec<f64>,
}

impl LowRankCorrection {
    fn setup(lr: &LowRankUpdate, mode: LowRankApply) -> Result<Self, SamplerError> {
        let n = lr.base().local_rows();
        let k = lr.rank();
        let lower = lr.base().diag().lower_triangle();
        for (i, &d) in lower.diagonal().iter().enumerate() {
            if d == 0.0 {
                return Err(SamplerError::ZeroDiagonal(i));
            }
        }
        let upper = lower.transpose();

        // t = L⁻¹ B, one forward solve per observation column.
        let bt = lr.factor().transpose();
        let mut t = Mat::<f64>::zeros(n, k);
        let mut col = vec![0.0; n];
        for j in 0..k {
            col.fill(0.0);
            let (rows, vals) = bt.row(j);
            for (&r, &v) in rows.iter().zip(vals) {
                col[r] = v;
            }
            lower.forward_solve(&mut col)?;
            for i in 0..n {
                t[(i, j)] = col[i];
            }
        }

        // inner = Σ + Bᵀ t, dense k×k.
        let mut inner = Mat::<f64>::zeros(k, k);
        for i in 0..k {
            let (rows, vals) = bt.row(i);
            for j in 0..k {
                let mut sum = 0.0;
                for (&r, &v) in rows.iter().zip(vals) {
                    sum += v * t[(r, j)];
                }
                inner[(i, j)] = sum;
            }
            inner[(i, i)] += lr.sigma()[i];
        }

        // sb = inner⁻¹ by solving against the identity.
        let mut sb = Mat::<f64>::identity(k, k);
        let lu = FullPivLu::new(inner.as_ref());
        lu.solve_in_place_with_conj(Conj::No, sb.as_mut());

        let (ec_forward, ec_backward) = match mode {
            LowRankApply::Factored => (None, None),
            LowRankApply::Explicit => {
                let mut ec_f = Mat::<f64>::zeros(n, k);
                for i in 0..n {
                    for j in 0..k {
                        let mut sum = 0.0;
                        for l in 0..k {
                            sum += t[(i, l)] * sb[(l, j)];
                        }
                        ec_f[(i, j)] = sum;
                    }
                }
                // tb = Lᵀ⁻¹ B, then ec_b = tb · Sbᵀ.
                let mut tb = Mat::<f64>::zeros(n, k);
                for j in 0..k {
                    col.fill(0.0);
                    let (rows, vals) = bt.row(j);
                    for (&r, &v) in rows.iter().zip(vals) {
                        col[r] = v;
                    }
                    upper.backward_solve(&mut col)?;
                    for i in 0..n {
                        tb[(i, j)] = col[i];
                    }
                }
                let mut ec_b = Mat::<f64>::zeros(n, k);
                for i in 0..n {
                    for j in 0..k {
                        let mut sum = 0.0;
                        for l in 0..k {
                            sum += tb[(i, l)] * sb[(j, l)];
                        }
                        ec_b[(i, j)] = sum;
                    }
                }
                (Some(ec_f), Some(ec_b))
            }
        };

        Ok(Self {
            lower,
            upper,
            sb,
            ec_forward,
            ec_backward,
            inv_sqrt_sigma: lr.sigma().iter().map(|s| 1.0 / s.sqrt()).collect(),
            w: vec![0.0; k],
            v: vec![0.0; k],
            z: vec![0.0; n],
            rk: vec![0.0; k],
            b_eff: vec![0.0; n],
        })
    }

    /// y ← y − T⁻¹B(Σ + BᵀT⁻¹B)⁻¹Bᵀy for the pass's triangle T.
    fn apply_pass(
        &mut self,
        lr: &LowRankUpdate,
        y: &mut [f64],
        reverse: bool,
    ) -> Result<(), SamplerError> {
        let k = self.w.len();
        lr.factor().spmv_transpose(y, &mut self.w);
        let explicit = if reverse {
            &self.ec_backward
        } else {
            &self.ec_forward
        };
        match explicit {
            Some(ec) => {
                for i in 0..y.len() {
                    let mut sum = 0.0;
                    for j in 0..k {
                        sum += ec[(i, j)] * self.w[j];
                    }
                    self.z[i] = sum;
                }
            }
            None => {
                for i in 0..k {
                    let mut sum = 0.0;
                    for j in 0..k {
                        // The backward pass uses Sbᵀ.
                        let s = if reverse { self.sb[(j, i)] } else { self.sb[(i, j)] };
                        sum += s * self.w[j];
                    }
                    self.v[i] = sum;
                }
                lr.factor().spmv(&self.v, &mut self.z);
                if reverse {
                    self.upper.backward_solve(&mut self.z)?;
                } else {
                    self.lower.forward_solve(&mut self.z)?;
                }
            }
        }
        for (yi, zi) in y.iter_mut().zip(&self.z) {
            *yi -= zi;
        }
        Ok(())
    }
}

/// Setup-derived sweep state, shared by the standalone sampler and the
/// multigrid smoothers.
pub(crate) struct McSorState {
    coloring: Coloring,
    scatters: Vec<GhostScatter>,
    diagptrs: Vec<usize>,
    /// ω / a_ii, rebuilt lazily after ω changes.
    idiag: Vec<f64>,
    /// √(ω(2−ω)/a_ii), rebuilt together with `idiag`.
    nscale: Vec<f64>,
    omega: f64,
    omega_changed: bool,
    ghost: Vec<f64>,
    noise: Vec<f64>,
    lowrank: Option<LowRankCorrection>,
}

impl McSorState {
    pub(crate) fn setup(
        op: &Operator,
        omega: f64,
        lr_apply: LowRankApply,
    ) -> Result<Self, SamplerError> {
        check_omega(omega)?;
        if op.low_rank().is_some() && omega != 1.0 {
            return Err(SamplerError::Config(format!(
                "the low-rank post-correction pairs with the ω = 1 sweep, got ω = {omega}"
            )));
        }
        let a = op.base();
        if !a.is_serial() {
            // The per-color neighbor exchange that would fill the ghost
            // buffers is not implemented; a sweep that read them as zeros
            // would be silently wrong, so refuse the operator outright.
            return Err(SamplerError::Comm(
                "operators with off-process columns are not supported: the \
                 sweep has no ghost exchange to fill their receive buffers"
                    .into(),
            ));
        }
        for (i, &d) in a.diagonal().iter().enumerate() {
            if d == 0.0 {
                return Err(SamplerError::ZeroDiagonal(a.partition().start + i));
            }
            if d < 0.0 {
                return Err(SamplerError::NotPositiveDefinite);
            }
        }

        let coloring = coloring::color_rows(a.diag())?;
        coloring::validate(a.diag(), &coloring)?;
        let mut scatters = Vec::with_capacity(coloring.num_colors());
        for color in 0..coloring.num_colors() {
            scatters.push(GhostScatter::build(a, coloring.set(color))?);
        }
        let max_ghost = scatters.iter().map(|s| s.len()).max().unwrap_or(0);
        let max_color = coloring.sets().iter().map(|s| s.len()).max().unwrap_or(0);
        let diagptrs = a.diag().diag_ptrs()?;
        debug!(
            rows = a.local_rows(),
            colors = coloring.num_colors(),
            "multicolor sweep ready"
        );

        let lowrank = match op.low_rank() {
            Some(lr) => Some(LowRankCorrection::setup(lr, lr_apply)?),
            None => None,
        };

        Ok(Self {
            coloring,
            scatters,
            diagptrs,
            idiag: vec![0.0; a.local_rows()],
            nscale: vec![0.0; a.local_rows()],
            omega,
            omega_changed: true,
            ghost: vec![0.0; max_ghost],
            noise: vec![0.0; max_color],
            lowrank,
        })
    }

    pub(crate) fn omega(&self) -> f64 {
        self.omega
    }

    pub(crate) fn set_omega(&mut self, omega: f64) -> Result<(), SamplerError> {
        check_omega(omega)?;
        if self.lowrank.is_some() && omega != 1.0 {
            return Err(SamplerError::Config(format!(
                "the low-rank post-correction pairs with the ω = 1 sweep, got ω = {omega}"
            )));
        }
        self.omega = omega;
        self.omega_changed = true;
        Ok(())
    }

    pub(crate) fn num_colors(&self) -> usize {
        self.coloring.num_colors()
    }

    fn update_idiag(&mut self, op: &Operator) {
        let diag = op.base().diagonal();
        let omega = self.omega;
        for (i, &d) in diag.iter().enumerate() {
            self.idiag[i] = omega / d;
            self.nscale[i] = (omega * (2.0 - omega) / d).sqrt();
        }
        self.omega_changed = false;
    }

    /// One sweep of the requested type, including the low-rank correction.
    pub(crate) fn sweep(
        &mut self,
        op: &Operator,
        b: &[f64],
        y: &mut [f64],
        sweep: SweepType,
        rng: &mut GaussianStream,
    ) -> Result<(), SamplerError> {
        let n = op.local_rows();
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
        if self.omega_changed {
            self.update_idiag(op);
        }
        match op.low_rank() {
            None => {
                if sweep.contains(SweepType::FORWARD) {
                    self.color_pass(op, b, y, rng, false);
                }
                if sweep.contains(SweepType::BACKWARD) {
                    self.color_pass(op, b, y, rng, true);
                }
            }
            Some(lr) => {
                if sweep.contains(SweepType::FORWARD) {
                    self.low_rank_pass(op, lr, b, y, rng, false)?;
                }
                if sweep.contains(SweepType::BACKWARD) {
                    self.low_rank_pass(op, lr, b, y, rng, true)?;
                }
            }
        }
        Ok(())
    }

    /// One pass over a low-rank-updated operator: inject the rank-space
    /// noise into the right-hand side, sweep the base matrix, then apply the
    /// pass's post-correction.
    fn low_rank_pass(
        &mut self,
        op: &Operator,
        lr: &LowRankUpdate,
        b: &[f64],
        y: &mut [f64],
        rng: &mut GaussianStream,
        reverse: bool,
    ) -> Result<(), SamplerError> {
        let beff = {
            let ctx = self
                .lowrank
                .as_mut()
                .expect("low-rank context is built at setup");
            let mut beff = std::mem::take(&mut ctx.b_eff);
            rng.fill(&mut ctx.rk);
            for (r, s) in ctx.rk.iter_mut().zip(&ctx.inv_sqrt_sigma) {
                *r *= s;
            }
            lr.factor().spmv(&ctx.rk, &mut beff);
            for (bi, orig) in beff.iter_mut().zip(b) {
                *bi += orig;
            }
            beff
        };
        self.color_pass(op, &beff, y, rng, reverse);
        let ctx = self
            .lowrank
            .as_mut()
            .expect("low-rank context is built at setup");
        let result = ctx.apply_pass(lr, y, reverse);
        ctx.b_eff = beff;
        result
    }

    fn color_pass(
        &mut self,
        op: &Operator,
        b: &[f64],
        y: &mut [f64],
        rng: &mut GaussianStream,
        reverse: bool,
    ) {
        let a = op.base();
        let d = a.diag();
        let (rowptr, colidx, vals) = (d.rowptr(), d.colidx(), d.vals());
        let o = a.offdiag();
        let (orowptr, ovals) = (o.rowptr(), o.vals());
        let omega = self.omega;

        let ncolors = self.coloring.num_colors();
        for ci in 0..ncolors {
            let color = if reverse { ncolors - 1 - ci } else { ci };
            let rows = self.coloring.set(color);

            // Suspension point: the two-phase ghost exchange for this color
            // belongs here, strictly between colors. Setup rejects operators
            // with off-process columns, so every scatter is empty and the
            // receive buffer is never read.
            let nghost = self.scatters[color].len();
            debug_assert_eq!(nghost, 0);

            rng.fill(&mut self.noise[..rows.len()]);

            let mut gcnt = 0;
            for (i, &r) in rows.iter().enumerate() {
                let mut s = b[r];
                let dp = self.diagptrs[r];
                for k in rowptr[r]..dp {
                    s -= vals[k] * y[colidx[k]];
                }
                for k in dp + 1..rowptr[r + 1] {
                    s -= vals[k] * y[colidx[k]];
                }
                for k in orowptr[r]..orowptr[r + 1] {
                    debug_assert!(k < o.nnz());
                    s -= ovals[k] * self.ghost[gcnt];
                    gcnt += 1;
                }
                y[r] = (1.0 - omega) * y[r] + self.idiag[r] * s + self.nscale[r] * self.noise[i];
            }
        }
    }
}

fn check_omega(omega: f64) -> Result<(), SamplerError> {
    // ω = 2 is admitted as the degenerate noise-free sweep.
    if !(omega > 0.0 && omega <= 2.0) {
        return Err(SamplerError::Config(format!(
            "relaxation parameter must lie in (0, 2], got {omega}"
        )));
    }
    Ok(())
}

/// Standalone multicolor SOR sampler owning its operator and stream.
pub struct McSorSampler {
    op: Operator,
    state: McSorState,
    sweep: SweepType,
    rng: GaussianStream,
    callback: Option<SampleCallback>,
}

impl McSorSampler {
    /// Sampler with the factored low-rank correction (no-op for plain
    /// sparse operators).
    pub fn new(
        op: Operator,
        omega: f64,
        sweep: SweepType,
        rng: GaussianStream,
    ) -> Result<Self, SamplerError> {
        Self::with_low_rank_apply(op, omega, sweep, LowRankApply::Factored, rng)
    }

    pub fn with_low_rank_apply(
        op: Operator,
        omega: f64,
        sweep: SweepType,
        lr_apply: LowRankApply,
        rng: GaussianStream,
    ) -> Result<Self, SamplerError> {
        let state = McSorState::setup(&op, omega, lr_apply)?;
        Ok(Self {
            op,
            state,
            sweep,
            rng,
            callback: None,
        })
    }

    pub fn omega(&self) -> f64 {
        self.state.omega()
    }

    /// Update ω; the ω-scaled diagonal cache is rebuilt on the next apply.
    pub fn set_omega(&mut self, omega: f64) -> Result<(), SamplerError> {
        self.state.set_omega(omega)
    }

    pub fn sweep_type(&self) -> SweepType {
        self.sweep
    }

    pub fn num_colors(&self) -> usize {
        self.state.num_colors()
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

impl Sampler for McSorSampler {
    fn apply(&mut self, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
        self.state.sweep(&self.op, b, y, self.sweep, &mut self.rng)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Csr, DistCsr};
    use crate::problems::{point_observations, shifted_laplace_2d};
    use approx::assert_relative_eq;

    fn small_op() -> Operator {
        Operator::Sparse(DistCsr::serial(shifted_laplace_2d(3, 2.0)))
    }

    #[test]
    fn scalar_gibbs_update_matches_conditional_draw() {
        // A = [4], b = [8]: the conditional draw is 2 + r/√4.
        let a = Csr::from_triplets(1, 1, &[(0, 0, 4.0)]);
        let op = Operator::Sparse(DistCsr::serial(a));
        let mut sampler =
            McSorSampler::new(op, 1.0, SweepType::FORWARD, GaussianStream::new(9)).unwrap();
        let mut reference = GaussianStream::new(9);
        let mut y = vec![0.0];
        sampler.apply(&[8.0], &mut y).unwrap();
        let r = reference.next();
        assert_relative_eq!(y[0], 2.0 + 0.5 * r, epsilon = 1e-14);
    }

    #[test]
    fn omega_two_is_the_noise_free_sweep() {
        // With ω = 2 the noise coefficient vanishes and the sweep is the
        // deterministic over-relaxed iteration.
        let a = Csr::from_triplets(
            2,
            2,
            &[(0, 0, 4.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 3.0)],
        );
        let op = Operator::Sparse(DistCsr::serial(a));
        let mut sampler =
            McSorSampler::new(op, 2.0, SweepType::FORWARD, GaussianStream::new(1)).unwrap();
        let b = [2.0, 1.0];
        let mut y = vec![1.0, -1.0];
        // Colors: the off-diagonal couples rows 0 and 1, so each is its own
        // color; updates use the latest values.
        let y0 = -1.0 * 1.0 + (2.0 / 4.0) * (2.0 - (-1.0) * (-1.0));
        let y1 = -1.0 * -1.0 + (2.0 / 3.0) * (1.0 - (-1.0) * y0);
        sampler.apply(&b, &mut y).unwrap();
        assert_relative_eq!(y[0], y0, epsilon = 1e-14);
        assert_relative_eq!(y[1], y1, epsilon = 1e-14);
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let mut s1 =
            McSorSampler::new(small_op(), 1.0, SweepType::SYMMETRIC, GaussianStream::new(5))
                .unwrap();
        let mut s2 =
            McSorSampler::new(small_op(), 1.0, SweepType::SYMMETRIC, GaussianStream::new(5))
                .unwrap();
        let b = vec![1.0; 9];
        let mut y1 = vec![0.0; 9];
        let mut y2 = vec![0.0; 9];
        for _ in 0..10 {
            s1.apply(&b, &mut y1).unwrap();
            s2.apply(&b, &mut y2).unwrap();
        }
        for (a, b) in y1.iter().zip(&y2) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn omega_update_rebuilds_the_cache() {
        let mut retuned =
            McSorSampler::new(small_op(), 0.8, SweepType::FORWARD, GaussianStream::new(3))
                .unwrap();
        retuned.set_omega(1.3).unwrap();
        let mut fresh =
            McSorSampler::new(small_op(), 1.3, SweepType::FORWARD, GaussianStream::new(3))
                .unwrap();
        let b = vec![0.5; 9];
        let mut y1 = vec![0.0; 9];
        let mut y2 = vec![0.0; 9];
        retuned.apply(&b, &mut y1).unwrap();
        fresh.apply(&b, &mut y2).unwrap();
        for (a, b) in y1.iter().zip(&y2) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn operators_with_off_process_columns_are_rejected() {
        use crate::matrix::RowPartition;
        let a = shifted_laplace_2d(4, 1.0);
        let part = RowPartition {
            start: 4,
            end: 12,
            global_rows: a.nrows(),
        };
        let op = Operator::Sparse(DistCsr::from_global(&a, part));
        let err = McSorSampler::new(op, 1.0, SweepType::FORWARD, GaussianStream::new(0));
        assert!(matches!(err, Err(SamplerError::Comm(_))));
    }

    #[test]
    fn zero_diagonal_is_rejected_at_setup() {
        let a = Csr::from_triplets(2, 2, &[(0, 0, 0.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 2.0)]);
        let op = Operator::Sparse(DistCsr::serial(a));
        let err = McSorSampler::new(op, 1.0, SweepType::FORWARD, GaussianStream::new(0));
        assert!(matches!(err, Err(SamplerError::ZeroDiagonal(0))));
    }

    #[test]
    fn invalid_omega_is_rejected() {
        assert!(McSorSampler::new(small_op(), 0.0, SweepType::FORWARD, GaussianStream::new(0))
            .is_err());
        assert!(McSorSampler::new(small_op(), 2.5, SweepType::FORWARD, GaussianStream::new(0))
            .is_err());
    }

    #[test]
    fn explicit_and_factored_corrections_agree() {
        let a = DistCsr::serial(shifted_laplace_2d(3, 2.0));
        let bmat = point_observations(3, &[(1, 1), (2, 0)]);
        let lr = LowRankUpdate::new(a, bmat, vec![0.01, 0.02]).unwrap();
        let mut explicit = McSorSampler::with_low_rank_apply(
            Operator::LowRank(lr.clone()),
            1.0,
            SweepType::FORWARD,
            LowRankApply::Explicit,
            GaussianStream::new(11),
        )
        .unwrap();
        let mut factored = McSorSampler::with_low_rank_apply(
            Operator::LowRank(lr),
            1.0,
            SweepType::FORWARD,
            LowRankApply::Factored,
            GaussianStream::new(11),
        )
        .unwrap();
        let b = vec![1.0; 9];
        let mut y1 = vec![0.0; 9];
        let mut y2 = vec![0.0; 9];
        for _ in 0..5 {
            explicit.apply(&b, &mut y1).unwrap();
            factored.apply(&b, &mut y2).unwrap();
        }
        for (u, v) in y1.iter().zip(&y2) {
            assert_relative_eq!(*u, *v, epsilon = 1e-10);
        }
    }

    #[test]
    fn reversed_sweeps() {
        assert_eq!(SweepType::FORWARD.reversed(), SweepType::BACKWARD);
        assert_eq!(SweepType::BACKWARD.reversed(), SweepType::FORWARD);
        assert_eq!(SweepType::SYMMETRIC.reversed(), SweepType::SYMMETRIC);
    }
}
