//! Sampling benchmark driver.
//!
//! Assembles the shifted-Laplace model problem, runs the selected sampler
//! through the Richardson driver, and reports wall-clock timings and the
//! integrated autocorrelation time of a scalar quantity of interest.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use mgmc::parallel::{Comm, SerialComm};
use mgmc::sampler::{
    AnySampler, CholeskySampler, HogwildSampler, McSorSampler, MultigridSampler, Sampler,
    SweepType,
};
use mgmc::solver::Richardson;
use mgmc::utils::{iact, welford};
use mgmc::{
    AggregationParams, CoarseSolverType, DistCsr, GaussianStream, GridHierarchy, LowRankApply,
    MultigridOptions, Operator, SamplerOptions, SeedPolicy, SmootherType, SweepDirection, Welford,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SamplerKindArg {
    Mcsor,
    Cholesky,
    Multigrid,
    Hogwild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SmootherArg {
    Gibbs,
    Sor,
    SymGibbs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SweepArg {
    Forward,
    Backward,
    Symmetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CoarseArg {
    Cholesky,
    Gibbs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HierarchyArg {
    Geometric,
    Algebraic,
}

/// Gaussian sampling benchmark on the 2D shifted-Laplace model problem.
#[derive(Parser, Debug)]
#[command(name = "mgmc-bench", version, about)]
struct Cli {
    /// Lattice vertices per side of the fine grid.
    grid_size: usize,

    /// Diagonal shift of the precision operator.
    #[arg(long, default_value_t = 10.0)]
    shift: f64,

    /// Which sampler to benchmark.
    #[arg(long, value_enum, default_value_t = SamplerKindArg::Mcsor)]
    sampler: SamplerKindArg,

    /// Smoother family for MCSOR-based samplers.
    #[arg(long, value_enum, default_value_t = SmootherArg::Gibbs)]
    smoother_type: SmootherArg,

    /// Relaxation parameter ω ∈ (0, 2]; ω = 2 disables the noise.
    #[arg(long, default_value_t = 1.0)]
    omega: f64,

    /// Sweep direction of MCSOR-based samplers.
    #[arg(long, value_enum, default_value_t = SweepArg::Symmetric)]
    sweep_direction: SweepArg,

    /// Coarsest-level sampler of the multigrid hierarchy.
    #[arg(long, value_enum, default_value_t = CoarseArg::Cholesky)]
    coarse_solver: CoarseArg,

    /// Hierarchy construction for the multigrid sampler.
    #[arg(long, value_enum, default_value_t = HierarchyArg::Geometric)]
    hierarchy: HierarchyArg,

    /// Number of hierarchy levels (geometric multigrid only).
    #[arg(long, default_value_t = 3)]
    mg_levels: usize,

    /// Pre- and post-smoothing sweeps ν per level.
    #[arg(long, default_value_t = 2)]
    mg_smoothing_steps: usize,

    /// Rediscretize coarse operators instead of Galerkin products.
    #[arg(long)]
    mg_rediscretize: bool,

    #[arg(long, default_value_t = 100)]
    n_burnin: usize,

    #[arg(long, default_value_t = 1000)]
    n_samples: usize,

    /// RNG seed.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Seed from the OS entropy source instead of --seed.
    #[arg(long)]
    seed_from_dev_random: bool,

    /// Time the setup / burn-in / sampling phases.
    #[arg(long)]
    measure_sampling_time: bool,

    /// Estimate the IACT of the QoI chain (default benchmark).
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    measure_iact: bool,

    /// Accumulate pointwise mean and variance during sampling.
    #[arg(long)]
    estimate_mean_and_var: bool,

    /// Dump the autocorrelation sequence to acf.txt.
    #[arg(long)]
    print_acf: bool,
}

impl Cli {
    fn to_options(&self) -> SamplerOptions {
        SamplerOptions {
            smoother_type: match self.smoother_type {
                SmootherArg::Gibbs => SmootherType::Gibbs,
                SmootherArg::Sor => SmootherType::Sor,
                SmootherArg::SymGibbs => SmootherType::SymGibbs,
            },
            omega: self.omega,
            sweep_direction: match self.sweep_direction {
                SweepArg::Forward => SweepDirection::Forward,
                SweepArg::Backward => SweepDirection::Backward,
                SweepArg::Symmetric => SweepDirection::Symmetric,
            },
            coarse_solver: match self.coarse_solver {
                CoarseArg::Cholesky => CoarseSolverType::Cholesky,
                CoarseArg::Gibbs => CoarseSolverType::Gibbs,
            },
            mg_levels: Some(self.mg_levels),
            mg_smoothing_steps: self.mg_smoothing_steps,
            mg_galerkin: !self.mg_rediscretize,
            n_burnin: self.n_burnin,
            n_samples: self.n_samples,
            seed: if self.seed_from_dev_random {
                SeedPolicy::FromEntropy
            } else {
                SeedPolicy::Fixed(self.seed)
            },
            measure_sampling_time: self.measure_sampling_time,
            measure_iact: self.measure_iact,
            estimate_mean_and_var: self.estimate_mean_and_var,
            print_acf: self.print_acf,
            ..Default::default()
        }
    }
}

/// Coarse lattice sizes for an L-level geometric hierarchy ending at n.
fn geometric_sizes(n: usize, levels: usize) -> Result<Vec<usize>> {
    let mut sizes = vec![n];
    for _ in 1..levels {
        let fine = *sizes.last().unwrap();
        if fine < 3 || fine % 2 == 0 {
            bail!("grid size {fine} cannot be coarsened; use sizes of the form 2^k·m + 1");
        }
        sizes.push((fine + 1) / 2);
    }
    sizes.reverse();
    Ok(sizes)
}

fn build_sampler(cli: &Cli, opts: &SamplerOptions, rng: GaussianStream) -> Result<AnySampler> {
    let fine = Operator::Sparse(DistCsr::serial(mgmc::problems::shifted_laplace_2d(
        cli.grid_size,
        cli.shift,
    )));
    let omega = opts.effective_omega();
    let sweep = SweepType::from(opts.effective_sweep());

    let sampler = match cli.sampler {
        SamplerKindArg::Mcsor => AnySampler::McSor(McSorSampler::new(fine, omega, sweep, rng)?),
        SamplerKindArg::Cholesky => AnySampler::Cholesky(CholeskySampler::new(fine, rng)?),
        SamplerKindArg::Hogwild => AnySampler::Hogwild(HogwildSampler::new(fine, rng)?),
        SamplerKindArg::Multigrid => {
            let hierarchy = match cli.hierarchy {
                HierarchyArg::Geometric => {
                    let sizes = geometric_sizes(cli.grid_size, cli.mg_levels)?;
                    let prolongations: Vec<_> = sizes[..sizes.len() - 1]
                        .iter()
                        .map(|&nc| mgmc::problems::interpolation_2d(nc))
                        .collect();
                    if opts.mg_galerkin {
                        GridHierarchy::galerkin(fine, prolongations)?
                    } else {
                        let ops = sizes
                            .iter()
                            .map(|&s| mgmc::problems::shifted_laplace_2d(s, cli.shift))
                            .collect();
                        GridHierarchy::rediscretized(ops, prolongations)?
                    }
                }
                HierarchyArg::Algebraic => GridHierarchy::algebraic(
                    fine,
                    AggregationParams {
                        max_levels: cli.mg_levels,
                        ..Default::default()
                    },
                )?,
            };
            let mg_opts = MultigridOptions {
                smoothing_steps: opts.mg_smoothing_steps,
                sweep,
                omega,
                coarse_solver: opts.coarse_solver,
                low_rank_apply: LowRankApply::Factored,
                ..Default::default()
            };
            AnySampler::Multigrid(MultigridSampler::new(hierarchy, mg_opts, rng)?)
        }
    };
    Ok(sampler)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let opts = cli.to_options();
    opts.validate().context("invalid benchmark options")?;

    // Each process owns one stream whose id equals its rank.
    let comm = SerialComm;
    let n = cli.grid_size * cli.grid_size;
    let rng = GaussianStream::from_policy(opts.seed, comm.rank() as u64);
    info!(
        dofs = n,
        sampler = ?cli.sampler,
        "benchmarking on the {}x{} shifted-Laplace lattice",
        cli.grid_size,
        cli.grid_size
    );

    let b = vec![0.0; n];

    if opts.measure_sampling_time {
        let start = Instant::now();
        let mut sampler = build_sampler(&cli, &opts, rng.clone())?;
        info!("setup took {:.4}s", start.elapsed().as_secs_f64());

        let mut x = vec![0.0; n];
        let start = Instant::now();
        Richardson::new(opts.n_burnin).burnin(&mut sampler, &b, &mut x)?;
        info!("burn-in took {:.4}s", start.elapsed().as_secs_f64());

        let start = Instant::now();
        Richardson::new(opts.n_samples).burnin(&mut sampler, &b, &mut x)?;
        info!("sampling took {:.4}s", start.elapsed().as_secs_f64());
    }

    if opts.measure_iact {
        let mut sampler = build_sampler(&cli, &opts, rng)?;
        let mut x = vec![0.0; n];
        Richardson::new(opts.n_burnin).burnin(&mut sampler, &b, &mut x)?;

        // Scalar QoI: the field value at the lattice center.
        let mut measurement = vec![0.0; n];
        measurement[n / 2] = 1.0;
        let chain = Arc::new(Mutex::new(Vec::with_capacity(opts.n_samples)));
        let statistics = opts
            .estimate_mean_and_var
            .then(|| Arc::new(Mutex::new(Welford::new(n))));
        match &statistics {
            None => sampler.set_callback(welford::qoi_callback(measurement, chain.clone())),
            Some(acc) => {
                // One callback records the QoI and feeds the accumulator.
                let acc = acc.clone();
                let chain = chain.clone();
                sampler.set_callback(mgmc::sampler::SampleCallback::new(move |it, sample| {
                    acc.lock()
                        .map_err(|_| mgmc::SamplerError::Callback {
                            iteration: it,
                            message: "statistics accumulator poisoned".into(),
                        })?
                        .update(sample);
                    let q = measurement
                        .iter()
                        .zip(sample)
                        .map(|(m, x)| m * x)
                        .sum::<f64>();
                    chain
                        .lock()
                        .map_err(|_| mgmc::SamplerError::Callback {
                            iteration: it,
                            message: "qoi chain poisoned".into(),
                        })?
                        .push(q);
                    Ok(())
                }));
            }
        }

        let start = Instant::now();
        Richardson::new(opts.n_samples).sample(&mut sampler, &b, &mut x)?;
        let elapsed = start.elapsed().as_secs_f64();

        let chain = chain
            .lock()
            .map_err(|_| anyhow::anyhow!("qoi chain poisoned"))?
            .clone();
        let est = iact::integrated_autocorr_time_with(
            &chain,
            iact::WINDOW_FACTOR,
            iact::MIN_CHAIN_FACTOR_BENCHMARK,
        );
        if !est.valid {
            warn!(
                "chain is too short for a reliable estimate (need at least {})",
                (iact::MIN_CHAIN_FACTOR_BENCHMARK * est.tau).ceil() as usize
            );
        }
        println!("IACT: {:.5}", est.tau);
        println!(
            "Time per independent sample [ms]: {:.6}",
            est.tau.max(1.0) * elapsed / opts.n_samples as f64 * 1000.0
        );

        if let Some(acc) = statistics {
            let acc = acc
                .lock()
                .map_err(|_| anyhow::anyhow!("statistics accumulator poisoned"))?;
            let mean_norm = acc.mean().iter().map(|m| m * m).sum::<f64>().sqrt();
            let max_var = acc.variance().into_iter().fold(0.0f64, f64::max);
            info!(mean_norm, max_var, "chain statistics");
        }

        if opts.print_acf {
            let acf = iact::autocorrelation(&chain, chain.len().saturating_sub(1));
            iact::write_acf("acf.txt", &acf).context("writing acf.txt")?;
            info!(lags = acf.len(), "wrote acf.txt");
        }
    }

    Ok(())
}
