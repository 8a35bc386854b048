//! Hogwild Gibbs sampler.
//!
//! Injects the conditional-draw noise into the right-hand side,
//! w = b + √D·r, then runs one process-local forward Gauss-Seidel sweep on
//! A y = w. On one process this coincides with the forward Gibbs sweep; in
//! parallel each process sweeps its own rows against stale neighbor values,
//! trading bias for the absence of any color synchronization.

use crate::error::SamplerError;
use crate::matrix::Operator;
use crate::random::GaussianStream;
use crate::sampler::{SampleCallback, Sampler};

pub struct HogwildSampler {
    op: Operator,
    diagptrs: Vec<usize>,
    sqrt_diag: Vec<f64>,
    w: Vec<f64>,
    rng: GaussianStream,
    callback: Option<SampleCallback>,
}

impl HogwildSampler {
    pub fn new(op: Operator, rng: GaussianStream) -> Result<Self, SamplerError> {
        let a = op.base();
        let diag = a.diagonal();
        for (i, &d) in diag.iter().enumerate() {
            if d == 0.0 {
                return Err(SamplerError::ZeroDiagonal(a.partition().start + i));
            }
            if d < 0.0 {
                return Err(SamplerError::NotPositiveDefinite);
            }
        }
        let diagptrs = a.diag().diag_ptrs()?;
        let n = a.local_rows();
        Ok(Self {
            op,
            diagptrs,
            sqrt_diag: diag.iter().map(|d| d.sqrt()).collect(),
            w: vec![0.0; n],
            rng,
            callback: None,
        })
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

impl Sampler for HogwildSampler {
    fn apply(&mut self, b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
        let n = self.w.len();
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
        self.rng.fill(&mut self.w);
        for i in 0..n {
            self.w[i] = self.w[i] * self.sqrt_diag[i] + b[i];
        }
        // Local forward sweep against the latest owned values.
        let d = self.op.base().diag();
        let (rowptr, colidx, vals) = (d.rowptr(), d.colidx(), d.vals());
        for i in 0..n {
            let mut s = self.w[i];
            let dp = self.diagptrs[i];
            for k in rowptr[i]..dp {
                s -= vals[k] * y[colidx[k]];
            }
            for k in dp + 1..rowptr[i + 1] {
                s -= vals[k] * y[colidx[k]];
            }
            y[i] = s / vals[dp];
        }
        Ok(())
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
    use approx::assert_relative_eq;

    #[test]
    fn scalar_update_matches_conditional_draw() {
        let a = Csr::from_triplets(1, 1, &[(0, 0, 9.0)]);
        let op = Operator::Sparse(DistCsr::serial(a));
        let mut sampler = HogwildSampler::new(op, GaussianStream::new(21)).unwrap();
        let mut reference = GaussianStream::new(21);
        let mut y = vec![0.0];
        sampler.apply(&[18.0], &mut y).unwrap();
        let r = reference.next();
        // (b + √a·r)/a = 2 + r/3.
        assert_relative_eq!(y[0], 2.0 + r / 3.0, epsilon = 1e-14);
    }

    #[test]
    fn zero_diagonal_rejected() {
        let a = Csr::from_triplets(1, 1, &[(0, 0, 0.0)]);
        let op = Operator::Sparse(DistCsr::serial(a));
        assert!(HogwildSampler::new(op, GaussianStream::new(0)).is_err());
    }
}
