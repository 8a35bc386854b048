//! Grid hierarchies for the multigrid sampler.
//!
//! A hierarchy is an ordered list of levels, coarsest first. Level ℓ > 0
//! carries the prolongation P_ℓ mapping level ℓ−1 to level ℓ; restriction is
//! its transpose. Coarse operators are either Galerkin products PᵀAP or
//! supplied by rediscretization. For low-rank-updated operators the
//! observation factor travels down the hierarchy as B_{ℓ-1} = P_ℓᵀ B_ℓ while
//! Σ is shared by all levels.

use tracing::debug;

use crate::error::SamplerError;
use crate::matrix::{Csr, DistCsr, LowRankUpdate, Operator};

/// One level of a hierarchy.
#[derive(Debug, Clone)]
pub struct Level {
    pub op: Operator,
    /// Prolongation from the next-coarser level; `None` on the coarsest.
    pub prolongation: Option<Csr>,
}

/// Ordered levels, index 0 = coarsest.
#[derive(Debug, Clone)]
pub struct GridHierarchy {
    levels: Vec<Level>,
}

/// Knobs for the algebraic (aggregation-based) coarsening.
#[derive(Debug, Clone, Copy)]
pub struct AggregationParams {
    /// Upper bound on the number of levels.
    pub max_levels: usize,
    /// Stop coarsening once a level has at most this many rows.
    pub min_coarse_rows: usize,
    /// Strength-of-connection cutoff relative to √(a_ii·a_jj).
    pub strength_threshold: f64,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            max_levels: 10,
            min_coarse_rows: 32,
            // Keep every connection; strongly shifted operators have
            // uniformly weak couplings that a positive cutoff would drop.
            strength_threshold: 0.0,
        }
    }
}

impl GridHierarchy {
    /// Build Galerkin coarse operators A_{ℓ-1} = P_ℓᵀ A_ℓ P_ℓ downward from
    /// the fine operator. `prolongations` is ordered coarsest-first:
    /// `prolongations[ℓ-1]` maps level ℓ−1 to level ℓ.
    pub fn galerkin(fine: Operator, prolongations: Vec<Csr>) -> Result<Self, SamplerError> {
        if prolongations.is_empty() {
            return Err(SamplerError::Config(
                "a hierarchy needs at least one prolongation".into(),
            ));
        }
        let n_levels = prolongations.len() + 1;
        let mut levels: Vec<Level> = Vec::with_capacity(n_levels);

        let mut current = fine;
        for (idx, p) in prolongations.iter().enumerate().rev() {
            if p.nrows() != current.local_rows() {
                return Err(SamplerError::DimensionMismatch {
                    expected: current.local_rows(),
                    got: p.nrows(),
                });
            }
            let coarse = coarsen_galerkin(&current, p)?;
            debug!(
                level = idx + 1,
                fine_rows = current.local_rows(),
                coarse_rows = coarse.local_rows(),
                "built Galerkin coarse operator"
            );
            levels.push(Level {
                op: current,
                prolongation: Some(p.clone()),
            });
            current = coarse;
        }
        levels.push(Level {
            op: current,
            prolongation: None,
        });
        levels.reverse();
        Ok(Self { levels })
    }

    /// Assemble a hierarchy from rediscretized operators (coarsest first)
    /// and the matching prolongations.
    pub fn rediscretized(
        ops: Vec<Csr>,
        prolongations: Vec<Csr>,
    ) -> Result<Self, SamplerError> {
        if ops.len() != prolongations.len() + 1 {
            return Err(SamplerError::Config(format!(
                "{} operators need {} prolongations, got {}",
                ops.len(),
                ops.len() - 1,
                prolongations.len()
            )));
        }
        let mut levels = Vec::with_capacity(ops.len());
        let mut prolongs = prolongations.into_iter();
        for (idx, a) in ops.into_iter().enumerate() {
            let prolongation = if idx == 0 { None } else { prolongs.next() };
            if let Some(p) = &prolongation {
                if p.nrows() != a.nrows() {
                    return Err(SamplerError::DimensionMismatch {
                        expected: a.nrows(),
                        got: p.nrows(),
                    });
                }
            }
            levels.push(Level {
                op: Operator::Sparse(DistCsr::serial(a)),
                prolongation,
            });
        }
        Ok(Self { levels })
    }

    /// Coarsen algebraically by strength-based pairwise aggregation.
    pub fn algebraic(fine: Operator, params: AggregationParams) -> Result<Self, SamplerError> {
        if params.max_levels < 2 {
            return Err(SamplerError::Config(format!(
                "a hierarchy needs at least 2 levels, got {}",
                params.max_levels
            )));
        }
        let mut levels_rev: Vec<Level> = Vec::new();
        let mut current = fine;
        while levels_rev.len() + 1 < params.max_levels
            && current.local_rows() > params.min_coarse_rows
        {
            let a = current.base().diag();
            let p = aggregation_prolongation(a, params.strength_threshold);
            if p.ncols() >= p.nrows() {
                // Aggregation stalled; keep what we have.
                break;
            }
            let coarse = coarsen_galerkin(&current, &p)?;
            debug!(
                fine_rows = p.nrows(),
                coarse_rows = p.ncols(),
                "aggregated level"
            );
            levels_rev.push(Level {
                op: current,
                prolongation: Some(p),
            });
            current = coarse;
        }
        if levels_rev.is_empty() {
            return Err(SamplerError::Config(
                "operator too small to coarsen; use a single-level sampler".into(),
            ));
        }
        levels_rev.push(Level {
            op: current,
            prolongation: None,
        });
        levels_rev.reverse();
        Ok(Self { levels: levels_rev })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, l: usize) -> &Level {
        &self.levels[l]
    }

    pub fn finest(&self) -> &Level {
        self.levels.last().expect("hierarchy has levels")
    }

    pub fn into_levels(self) -> Vec<Level> {
        self.levels
    }
}

/// One Galerkin coarsening step, carrying a low-rank factor down if present.
fn coarsen_galerkin(fine: &Operator, p: &Csr) -> Result<Operator, SamplerError> {
    let pt = p.transpose();
    let a_fine = fine.base().diag();
    let coarse_a = pt.matmul(&a_fine.matmul(p));
    let coarse_dist = DistCsr::serial(coarse_a);
    match fine {
        Operator::Sparse(_) => Ok(Operator::Sparse(coarse_dist)),
        Operator::LowRank(lr) => {
            let coarse_b = pt.matmul(lr.factor());
            Ok(Operator::LowRank(LowRankUpdate::new(
                coarse_dist,
                coarse_b,
                lr.sigma().to_vec(),
            )?))
        }
    }
}

/// Strength-of-connection graph: s_ij = |a_ij| / √(a_ii·a_jj) kept when it
/// exceeds the threshold.
fn strength_graph(a: &Csr, threshold: f64) -> Csr {
    let n = a.nrows();
    let diag = a.diagonal();
    let mut triplets = Vec::new();
    for i in 0..n {
        let (cols, vals) = a.row(i);
        for (&j, &v) in cols.iter().zip(vals) {
            if i == j {
                continue;
            }
            let denom = (diag[i].abs() * diag[j].abs()).sqrt();
            if denom > 0.0 {
                let s = v.abs() / denom;
                if s > threshold {
                    triplets.push((i, j, s));
                }
            }
        }
    }
    Csr::from_triplets(n, n, &triplets)
}

/// Pair each node with its strongest unaggregated neighbor; leftovers form
/// singletons. Returns the aggregate id per node and the aggregate count.
fn pairwise_aggregate(s: &Csr) -> (Vec<usize>, usize) {
    let n = s.nrows();
    let mut aggregates = vec![usize::MAX; n];
    let mut next_id = 0;
    for i in 0..n {
        if aggregates[i] != usize::MAX {
            continue;
        }
        let (cols, vals) = s.row(i);
        let mut strongest = None;
        let mut max_strength = 0.0;
        for (&j, &v) in cols.iter().zip(vals) {
            if aggregates[j] == usize::MAX && j != i && v > max_strength {
                max_strength = v;
                strongest = Some(j);
            }
        }
        aggregates[i] = next_id;
        if let Some(j) = strongest {
            aggregates[j] = next_id;
        }
        next_id += 1;
    }
    (aggregates, next_id)
}

/// Piecewise-constant prolongation from an aggregate assignment.
fn constant_prolongation(aggregates: &[usize], n_agg: usize) -> Csr {
    let triplets: Vec<(usize, usize, f64)> = aggregates
        .iter()
        .enumerate()
        .map(|(i, &agg)| (i, agg, 1.0))
        .collect();
    Csr::from_triplets(aggregates.len(), n_agg, &triplets)
}

/// Double-pairwise aggregation: pair once, rebuild the strength graph on the
/// aggregates, pair again, and compose the two prolongations.
fn aggregation_prolongation(a: &Csr, threshold: f64) -> Csr {
    let s = strength_graph(a, threshold);
    let (agg1, n1) = pairwise_aggregate(&s);
    let p1 = constant_prolongation(&agg1, n1);

    let s_coarse = p1.transpose().matmul(&s.matmul(&p1));
    let (agg2, n2) = pairwise_aggregate(&s_coarse);
    let p2 = constant_prolongation(&agg2, n2);

    p1.matmul(&p2)
}
