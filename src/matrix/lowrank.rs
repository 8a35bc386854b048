//! Low-rank updates of a sparse precision operator.
//!
//! Conditioning a Gaussian field on k linear observations adds a rank-k term
//! to the precision: A + B·diag(Σ)⁻¹·Bᵀ with a tall-skinny B and a small
//! positive diagonal Σ. The composite is kept as the triple (A, B, Σ) and
//! only assembled explicitly where a factorization needs it.

use faer::Mat;

use crate::error::SamplerError;
use crate::matrix::{Csr, DistCsr};

/// The composite operator A + B Σ⁻¹ Bᵀ.
#[derive(Debug, Clone)]
pub struct LowRankUpdate {
    a: DistCsr,
    b: Csr,
    sigma: Vec<f64>,
}

impl LowRankUpdate {
    pub fn new(a: DistCsr, b: Csr, sigma: Vec<f64>) -> Result<Self, SamplerError> {
        if b.nrows() != a.local_rows() {
            return Err(SamplerError::DimensionMismatch {
                expected: a.local_rows(),
                got: b.nrows(),
            });
        }
        if b.ncols() != sigma.len() {
            return Err(SamplerError::DimensionMismatch {
                expected: b.ncols(),
                got: sigma.len(),
            });
        }
        if sigma.iter().any(|&s| s <= 0.0) {
            return Err(SamplerError::Config(
                "observation variances must be positive".into(),
            ));
        }
        Ok(Self { a, b, sigma })
    }

    /// Number of observation columns.
    pub fn rank(&self) -> usize {
        self.sigma.len()
    }

    pub fn base(&self) -> &DistCsr {
        &self.a
    }

    pub fn factor(&self) -> &Csr {
        &self.b
    }

    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    /// y = (A + B Σ⁻¹ Bᵀ) x on a single process.
    pub fn matvec_serial(&self, x: &[f64], y: &mut [f64]) {
        self.a.matvec_serial(x, y);
        let k = self.rank();
        let mut w = vec![0.0; k];
        self.b.spmv_transpose(x, &mut w);
        for (wi, &s) in w.iter_mut().zip(&self.sigma) {
            *wi /= s;
        }
        let mut u = vec![0.0; x.len()];
        self.b.spmv(&w, &mut u);
        for (yi, ui) in y.iter_mut().zip(&u) {
            *yi += ui;
        }
    }

    /// Dense assembly of the composite, used before a factorization.
    pub fn assemble_dense(&self) -> Mat<f64> {
        let mut m = self.a.diag().to_dense();
        // One rank-one update per observation column of B.
        let bt = self.b.transpose();
        for k in 0..self.rank() {
            let (rows, vals) = bt.row(k);
            let inv_sigma = 1.0 / self.sigma[k];
            for (&i, &vi) in rows.iter().zip(vals) {
                for (&j, &vj) in rows.iter().zip(vals) {
                    m[(i, j)] += vi * inv_sigma * vj;
                }
            }
        }
        m
    }
}

/// A sampler's target operator: plain sparse or low-rank-updated.
///
/// Kept as a closed sum so call sites dispatch inline.
#[derive(Debug, Clone)]
pub enum Operator {
    Sparse(DistCsr),
    LowRank(LowRankUpdate),
}

impl Operator {
    /// The sparse base matrix A (the full operator for `Sparse`).
    pub fn base(&self) -> &DistCsr {
        match self {
            Operator::Sparse(a) => a,
            Operator::LowRank(lr) => lr.base(),
        }
    }

    pub fn local_rows(&self) -> usize {
        self.base().local_rows()
    }

    pub fn low_rank(&self) -> Option<&LowRankUpdate> {
        match self {
            Operator::Sparse(_) => None,
            Operator::LowRank(lr) => Some(lr),
        }
    }

    /// y = op · x on a single process.
    pub fn matvec_serial(&self, x: &[f64], y: &mut [f64]) {
        match self {
            Operator::Sparse(a) => a.matvec_serial(x, y),
            Operator::LowRank(lr) => lr.matvec_serial(x, y),
        }
    }

    /// Dense assembly of the full operator.
    pub fn assemble_dense(&self) -> Mat<f64> {
        match self {
            Operator::Sparse(a) => a.diag().to_dense(),
            Operator::LowRank(lr) => lr.assemble_dense(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::{point_observations, shifted_laplace_2d};
    use approx::assert_relative_eq;

    fn small_update() -> LowRankUpdate {
        let a = DistCsr::serial(shifted_laplace_2d(3, 1.0));
        let b = point_observations(3, &[(0, 0), (2, 2)]);
        LowRankUpdate::new(a, b, vec![0.01, 0.01]).unwrap()
    }

    #[test]
    fn matvec_matches_dense_assembly() {
        let lr = small_update();
        let n = lr.base().local_rows();
        let dense = lr.assemble_dense();
        let x: Vec<f64> = (0..n).map(|i| 0.3 * i as f64 - 1.0).collect();
        let mut y = vec![0.0; n];
        lr.matvec_serial(&x, &mut y);
        for i in 0..n {
            let mut expected = 0.0;
            for j in 0..n {
                expected += dense[(i, j)] * x[j];
            }
            assert_relative_eq!(y[i], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn dense_assembly_adds_inverse_variances_on_observed_dofs() {
        let lr = small_update();
        let base = lr.base().diag().to_dense();
        let dense = lr.assemble_dense();
        // Observations sit on dofs 0 and 8 with Σ = 0.01.
        assert_relative_eq!(dense[(0, 0)] - base[(0, 0)], 100.0, epsilon = 1e-12);
        assert_relative_eq!(dense[(8, 8)] - base[(8, 8)], 100.0, epsilon = 1e-12);
        assert_relative_eq!(dense[(3, 3)], base[(3, 3)], epsilon = 1e-12);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let a = DistCsr::serial(shifted_laplace_2d(3, 1.0));
        let b = point_observations(3, &[(0, 0)]);
        assert!(LowRankUpdate::new(a.clone(), b.clone(), vec![0.01, 0.01]).is_err());
        assert!(LowRankUpdate::new(a, b, vec![-1.0]).is_err());
    }
}
