//! Stationarity checks for the single-level samplers on the shifted-Laplace
//! model problem. Exact means and marginal variances come from the Cholesky
//! factor of the same operator; statistical tolerances are set several
//! standard deviations wide of the chain length used.

use mgmc::problems::shifted_laplace_2d;
use mgmc::sampler::{CholeskySampler, HogwildSampler, McSorSampler, Sampler, SweepType};
use mgmc::solver::Richardson;
use mgmc::{DistCsr, GaussianStream, Operator};

fn serial_op(n: usize, shift: f64) -> Operator {
    Operator::Sparse(DistCsr::serial(shifted_laplace_2d(n, shift)))
}

/// Mean of `count` consecutive samples of the chain, after `burnin`.
fn chain_mean<S: Sampler>(
    sampler: &mut S,
    b: &[f64],
    burnin: usize,
    count: usize,
) -> Vec<f64> {
    let n = b.len();
    let mut x = vec![0.0; n];
    Richardson::new(burnin).burnin(sampler, b, &mut x).unwrap();
    let mut sum = vec![0.0; n];
    for _ in 0..count {
        sampler.apply(b, &mut x).unwrap();
        for (s, xi) in sum.iter_mut().zip(&x) {
            *s += xi;
        }
    }
    for s in sum.iter_mut() {
        *s /= count as f64;
    }
    sum
}

#[test]
fn cholesky_sampler_mean_and_variance_match_the_target() {
    // 17×17 lattice, shift 10; exact draws, so plain i.i.d. statistics.
    let op = serial_op(17, 10.0);
    let a = op.base().diag().clone();
    let mut sampler = CholeskySampler::new(op, GaussianStream::new(1)).unwrap();

    let n = 17 * 17;
    let x_true = vec![1.0; n];
    let mut b = vec![0.0; n];
    a.spmv(&x_true, &mut b);
    let mu = sampler.solve_mean(&b);
    for (m, t) in mu.iter().zip(&x_true) {
        assert!((m - t).abs() < 1e-10);
    }

    let vars = sampler.marginal_variances();
    let count = 10_000;
    let mut x = vec![0.0; n];
    let mut sum = vec![0.0; n];
    let mut sumsq = vec![0.0; n];
    for _ in 0..count {
        sampler.apply(&b, &mut x).unwrap();
        for i in 0..n {
            sum[i] += x[i];
            sumsq[i] += x[i] * x[i];
        }
    }
    for i in 0..n {
        let mean = sum[i] / count as f64;
        let var = sumsq[i] / count as f64 - mean * mean;
        let sigma = (vars[i] / count as f64).sqrt();
        assert!(
            (mean - mu[i]).abs() < 5.0 * sigma,
            "dof {i}: mean {mean} vs {} (σ = {sigma})",
            mu[i]
        );
        assert!(
            (var - vars[i]).abs() < 6.0 * vars[i] * (2.0 / count as f64).sqrt(),
            "dof {i}: variance {var} vs {}",
            vars[i]
        );
    }
}

#[test]
fn mcsor_chain_mean_agrees_with_the_exact_solve() {
    // 9×9 lattice, shift 10, symmetric Gibbs sweep.
    let n = 81;
    let op = serial_op(9, 10.0);
    let a = op.base().diag().clone();
    let reference = CholeskySampler::new(op.clone(), GaussianStream::new(2)).unwrap();

    let x_true = vec![1.0; n];
    let mut b = vec![0.0; n];
    a.spmv(&x_true, &mut b);
    let mu = reference.solve_mean(&b);
    let vars = reference.marginal_variances();

    let mut sampler =
        McSorSampler::new(op, 1.0, SweepType::SYMMETRIC, GaussianStream::new(3)).unwrap();
    let count = 20_000;
    let mean = chain_mean(&mut sampler, &b, 500, count);
    for i in 0..n {
        // The chain is correlated; widen the i.i.d. band accordingly.
        let bound = 10.0 * (vars[i] / count as f64).sqrt();
        assert!(
            (mean[i] - mu[i]).abs() < bound,
            "dof {i}: mean {} vs {} (bound {bound})",
            mean[i],
            mu[i]
        );
    }
}

#[test]
fn sor_chain_with_relaxation_keeps_the_same_mean() {
    let n = 81;
    let op = serial_op(9, 10.0);
    let reference = CholeskySampler::new(op.clone(), GaussianStream::new(4)).unwrap();
    let b = vec![1.0; n];
    let mu = reference.solve_mean(&b);
    let vars = reference.marginal_variances();

    let mut sampler =
        McSorSampler::new(op, 1.4, SweepType::FORWARD, GaussianStream::new(5)).unwrap();
    let count = 20_000;
    let mean = chain_mean(&mut sampler, &b, 500, count);
    for i in 0..n {
        let bound = 12.0 * (vars[i] / count as f64).sqrt();
        assert!(
            (mean[i] - mu[i]).abs() < bound,
            "dof {i}: mean {} vs {}",
            mean[i],
            mu[i]
        );
    }
}

#[test]
fn hogwild_matches_forward_gibbs_on_one_process() {
    let n = 81;
    let op = serial_op(9, 10.0);
    let reference = CholeskySampler::new(op.clone(), GaussianStream::new(6)).unwrap();
    let b = vec![0.5; n];
    let mu = reference.solve_mean(&b);
    let vars = reference.marginal_variances();

    let mut sampler = HogwildSampler::new(op, GaussianStream::new(7)).unwrap();
    let count = 20_000;
    let mean = chain_mean(&mut sampler, &b, 500, count);
    for i in 0..n {
        let bound = 10.0 * (vars[i] / count as f64).sqrt();
        assert!(
            (mean[i] - mu[i]).abs() < bound,
            "dof {i}: mean {} vs {}",
            mean[i],
            mu[i]
        );
    }
}
