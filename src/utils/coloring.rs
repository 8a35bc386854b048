//! Distance-1 graph coloring for multicolor Gauss-Seidel sweeps.
//! See Saad §12.4 for background.
//!
//! Rows sharing a color must not be coupled by a nonzero entry of the
//! locally-owned block, so that all rows of one color can be updated
//! without reading each other's new values.

use crate::error::SamplerError;
use crate::matrix::Csr;

/// An ordered partition of local row indices into independent sets.
///
/// Built once at sampler setup and immutable thereafter. Within each set the
/// indices are ascending, which keeps sweeps deterministic for a fixed seed.
#[derive(Debug, Clone)]
pub struct Coloring {
    sets: Vec<Vec<usize>>,
}

impl Coloring {
    pub fn num_colors(&self) -> usize {
        self.sets.len()
    }

    pub fn sets(&self) -> &[Vec<usize>] {
        &self.sets
    }

    pub fn set(&self, color: usize) -> &[usize] {
        &self.sets[color]
    }
}

/// Greedy distance-1 coloring of the symmetrized sparsity graph of `a`.
pub fn color_rows(a: &Csr) -> Result<Coloring, SamplerError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(SamplerError::Coloring(format!(
            "coloring needs a square block, got {}x{}",
            n,
            a.ncols()
        )));
    }

    let adj = symmetrized_adjacency(a);
    let mut color_of = vec![usize::MAX; n];
    let mut banned = Vec::new();
    for i in 0..n {
        banned.clear();
        for &j in &adj[i] {
            if color_of[j] != usize::MAX {
                banned.push(color_of[j]);
            }
        }
        let mut c = 0;
        while banned.contains(&c) {
            c += 1;
        }
        color_of[i] = c;
    }

    let num_colors = color_of.iter().copied().max().map(|c| c + 1).unwrap_or(0);
    let mut sets = vec![Vec::new(); num_colors];
    for (i, &c) in color_of.iter().enumerate() {
        sets[c].push(i);
    }
    Ok(Coloring { sets })
}

/// Confirm that no two rows of the same color are coupled in `a`.
///
/// The sweep updates every row of a color against the previous values of
/// that color's peers, so a same-color coupling silently changes the kernel.
pub fn validate(a: &Csr, coloring: &Coloring) -> Result<(), SamplerError> {
    let n = a.nrows();
    let mut color_of = vec![usize::MAX; n];
    let mut seen = 0usize;
    for (c, set) in coloring.sets().iter().enumerate() {
        for &i in set {
            if i >= n || color_of[i] != usize::MAX {
                return Err(SamplerError::Coloring(format!(
                    "color sets are not a partition of 0..{n}"
                )));
            }
            color_of[i] = c;
            seen += 1;
        }
    }
    if seen != n {
        return Err(SamplerError::Coloring(format!(
            "color sets cover {seen} of {n} rows"
        )));
    }
    for i in 0..n {
        let (cols, vals) = a.row(i);
        for (&j, &v) in cols.iter().zip(vals) {
            if j != i && v != 0.0 && color_of[j] == color_of[i] {
                return Err(SamplerError::Coloring(format!(
                    "rows {i} and {j} share color {} but are coupled",
                    color_of[i]
                )));
            }
        }
    }
    Ok(())
}

fn symmetrized_adjacency(a: &Csr) -> Vec<Vec<usize>> {
    let n = a.nrows();
    let mut adj = vec![Vec::new(); n];
    for i in 0..n {
        let (cols, vals) = a.row(i);
        for (&j, &v) in cols.iter().zip(vals) {
            if j != i && v != 0.0 {
                adj[i].push(j);
                adj[j].push(i);
            }
        }
    }
    for list in &mut adj {
        list.sort_unstable();
        list.dedup();
    }
    adj
}
