//! Model-problem assembly.
//!
//! The samplers treat mesh construction and stencil assembly as an external
//! collaborator; this module is that collaborator for the tests and the
//! benchmark binary. It builds the 2D shifted-Laplace precision operator on
//! an n×n lattice with zero-Dirichlet exterior, bilinear prolongations for
//! grid refinement n → 2n−1, and point-observation matrices for the
//! low-rank-update case.

use crate::matrix::Csr;

/// 5-point shifted-Laplace operator on an n×n lattice: 4 + shift on the
/// diagonal, −1 towards each in-lattice neighbor. SPD for shift > 0.
pub fn shifted_laplace_2d(n: usize, shift: f64) -> Csr {
    let dofs = n * n;
    let mut triplets = Vec::with_capacity(5 * dofs);
    for i in 0..n {
        for j in 0..n {
            let row = i * n + j;
            triplets.push((row, row, 4.0 + shift));
            if i > 0 {
                triplets.push((row, row - n, -1.0));
            }
            if i + 1 < n {
                triplets.push((row, row + n, -1.0));
            }
            if j > 0 {
                triplets.push((row, row - 1, -1.0));
            }
            if j + 1 < n {
                triplets.push((row, row + 1, -1.0));
            }
        }
    }
    Csr::from_triplets(dofs, dofs, &triplets)
}

/// Bilinear prolongation from an nc×nc lattice to the refined
/// (2nc−1)×(2nc−1) lattice: coincident nodes copy, edge midpoints average
/// two coarse neighbors, cell centers average four.
pub fn interpolation_2d(nc: usize) -> Csr {
    assert!(nc >= 2, "refinement needs at least a 2x2 coarse lattice");
    let nf = 2 * nc - 1;
    let mut triplets = Vec::new();
    for fi in 0..nf {
        for fj in 0..nf {
            let frow = fi * nf + fj;
            let (ci, cj) = (fi / 2, fj / 2);
            match (fi % 2, fj % 2) {
                (0, 0) => {
                    triplets.push((frow, ci * nc + cj, 1.0));
                }
                (1, 0) => {
                    triplets.push((frow, ci * nc + cj, 0.5));
                    triplets.push((frow, (ci + 1) * nc + cj, 0.5));
                }
                (0, 1) => {
                    triplets.push((frow, ci * nc + cj, 0.5));
                    triplets.push((frow, ci * nc + cj + 1, 0.5));
                }
                (1, 1) => {
                    triplets.push((frow, ci * nc + cj, 0.25));
                    triplets.push((frow, ci * nc + cj + 1, 0.25));
                    triplets.push((frow, (ci + 1) * nc + cj, 0.25));
                    triplets.push((frow, (ci + 1) * nc + cj + 1, 0.25));
                }
                _ => unreachable!(),
            }
        }
    }
    Csr::from_triplets(nf * nf, nc * nc, &triplets)
}

/// Observation matrix B with one unit column per measured lattice point.
pub fn point_observations(n: usize, points: &[(usize, usize)]) -> Csr {
    let triplets: Vec<(usize, usize, f64)> = points
        .iter()
        .enumerate()
        .map(|(k, &(i, j))| {
            assert!(i < n && j < n, "observation ({i}, {j}) outside the lattice");
            (i * n + j, k, 1.0)
        })
        .collect();
    Csr::from_triplets(n * n, points.len(), &triplets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stencil_shape() {
        let a = shifted_laplace_2d(3, 10.0);
        assert_eq!(a.nrows(), 9);
        // Center dof couples to its four neighbors.
        let (cols, vals) = a.row(4);
        assert_eq!(cols, &[1, 3, 4, 5, 7]);
        assert_eq!(vals[2], 14.0);
        // Corner dof couples to two.
        let (cols, _) = a.row(0);
        assert_eq!(cols, &[0, 1, 3]);
    }

    #[test]
    fn stencil_is_symmetric() {
        let a = shifted_laplace_2d(5, 1.0);
        assert_eq!(a.transpose(), a);
    }

    #[test]
    fn interpolation_rows_sum_to_one() {
        let p = interpolation_2d(5);
        assert_eq!(p.nrows(), 81);
        assert_eq!(p.ncols(), 25);
        for i in 0..p.nrows() {
            let (_, vals) = p.row(i);
            let sum: f64 = vals.iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn interpolation_copies_coincident_nodes() {
        let nc = 3;
        let p = interpolation_2d(nc);
        let nf = 2 * nc - 1;
        let coarse: Vec<f64> = (0..nc * nc).map(|k| k as f64).collect();
        let mut fine = vec![0.0; nf * nf];
        p.spmv(&coarse, &mut fine);
        for ci in 0..nc {
            for cj in 0..nc {
                let f = (2 * ci) * nf + 2 * cj;
                assert_eq!(fine[f], coarse[ci * nc + cj]);
            }
        }
    }

    #[test]
    fn observations_hit_the_requested_dofs() {
        let b = point_observations(3, &[(0, 0), (1, 2)]);
        assert_eq!(b.nrows(), 9);
        assert_eq!(b.ncols(), 2);
        let (cols, vals) = b.row(0);
        assert_eq!((cols, vals), (&[0usize][..], &[1.0][..]));
        let (cols, _) = b.row(5);
        assert_eq!(cols, &[1]);
    }
}
