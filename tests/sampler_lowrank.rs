//! Conditioning on point observations: samplers for A + BΣ⁻¹Bᵀ.

use mgmc::problems::{point_observations, shifted_laplace_2d};
use mgmc::sampler::{CholeskySampler, LowRankApply, McSorSampler, Sampler, SweepType};
use mgmc::solver::Richardson;
use mgmc::{DistCsr, GaussianStream, LowRankUpdate, Operator};

fn observed_operator() -> Operator {
    let a = DistCsr::serial(shifted_laplace_2d(9, 2.0));
    let b = point_observations(
        9,
        &[
            (1, 1),
            (1, 4),
            (1, 7),
            (4, 1),
            (4, 7),
            (7, 1),
            (7, 4),
            (7, 7),
        ],
    );
    let sigma = vec![1e-2; 8];
    Operator::LowRank(LowRankUpdate::new(a, b, sigma).unwrap())
}

#[test]
fn cholesky_factors_the_assembled_composite() {
    let op = observed_operator();
    let n = op.local_rows();
    let sampler = CholeskySampler::new(op.clone(), GaussianStream::new(1)).unwrap();
    // solve_mean must invert the composite, not the base matrix.
    let x_true: Vec<f64> = (0..n).map(|i| ((i % 7) as f64 - 3.0) * 0.1).collect();
    let mut b = vec![0.0; n];
    op.matvec_serial(&x_true, &mut b);
    let x = sampler.solve_mean(&b);
    for (xi, ti) in x.iter().zip(&x_true) {
        assert!((xi - ti).abs() < 1e-9, "{xi} vs {ti}");
    }
}

#[test]
fn observed_dofs_have_small_posterior_variance() {
    let sampler = CholeskySampler::new(observed_operator(), GaussianStream::new(2)).unwrap();
    let vars = sampler.marginal_variances();
    // An observation with Σ = 10⁻² pins its dof; variance cannot exceed Σ.
    let observed_dof = 9 + 1; // lattice point (1, 1)
    assert!(vars[observed_dof] < 1e-2);
    // Far-away dofs keep an O(1/diagonal) prior scale.
    assert!(vars[4 * 9 + 4] > vars[observed_dof]);
}

#[test]
fn mcsor_with_post_correction_matches_the_deterministic_solution() {
    let op = observed_operator();
    let n = op.local_rows();
    let reference = CholeskySampler::new(op.clone(), GaussianStream::new(3)).unwrap();
    let b = vec![1.0; n];
    let mu = reference.solve_mean(&b);
    let vars = reference.marginal_variances();

    for lr_apply in [LowRankApply::Explicit, LowRankApply::Factored] {
        let mut sampler = McSorSampler::with_low_rank_apply(
            op.clone(),
            1.0,
            SweepType::SYMMETRIC,
            lr_apply,
            GaussianStream::new(4),
        )
        .unwrap();
        let count = 20_000;
        let mut x = vec![0.0; n];
        Richardson::new(500).burnin(&mut sampler, &b, &mut x).unwrap();
        let mut mean = vec![0.0; n];
        for _ in 0..count {
            sampler.apply(&b, &mut x).unwrap();
            for (m, xi) in mean.iter_mut().zip(&x) {
                *m += xi;
            }
        }
        for m in mean.iter_mut() {
            *m /= count as f64;
        }
        for i in 0..n {
            let bound = (10.0 * (vars[i] / count as f64).sqrt()).max(1e-4);
            assert!(
                (mean[i] - mu[i]).abs() < bound,
                "{lr_apply:?}, dof {i}: mean {} vs {} (bound {bound})",
                mean[i],
                mu[i]
            );
        }
    }
}

#[test]
fn relaxed_sweeps_are_rejected_for_low_rank_operators() {
    let err = McSorSampler::new(
        observed_operator(),
        1.5,
        SweepType::FORWARD,
        GaussianStream::new(5),
    );
    assert!(err.is_err());

    let mut sampler = McSorSampler::new(
        observed_operator(),
        1.0,
        SweepType::FORWARD,
        GaussianStream::new(6),
    )
    .unwrap();
    assert!(sampler.set_omega(1.5).is_err());
    assert!(sampler.set_omega(1.0).is_ok());
}
