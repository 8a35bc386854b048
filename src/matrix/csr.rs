// Compressed-sparse-row storage and the kernels the samplers consume.

use faer::Mat;

use crate::error::SamplerError;

/// CSR matrix with raw index access.
///
/// Column indices are sorted within each row; explicit zeros are kept only
/// where the caller inserted them (the sweep kernels rely on structural
/// positions, not values).
#[derive(Debug, Clone, PartialEq)]
pub struct Csr {
    nrows: usize,
    ncols: usize,
    rowptr: Vec<usize>,
    colidx: Vec<usize>,
    vals: Vec<f64>,
}

impl Csr {
    /// Build a CSR from raw row-ptr, col-idx, and values.
    pub fn from_raw(
        nrows: usize,
        ncols: usize,
        rowptr: Vec<usize>,
        colidx: Vec<usize>,
        vals: Vec<f64>,
    ) -> Self {
        assert_eq!(rowptr.len(), nrows + 1);
        assert_eq!(colidx.len(), vals.len());
        assert_eq!(*rowptr.last().unwrap(), colidx.len());
        Self {
            nrows,
            ncols,
            rowptr,
            colidx,
            vals,
        }
    }

    /// Build from (row, col, value) triplets; duplicates are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut entries: Vec<(usize, usize, f64)> = triplets.to_vec();
        entries.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut rowptr = vec![0usize; nrows + 1];
        let mut colidx = Vec::with_capacity(entries.len());
        let mut vals: Vec<f64> = Vec::with_capacity(entries.len());
        let mut last: Option<(usize, usize)> = None;
        for &(r, c, v) in &entries {
            assert!(r < nrows && c < ncols, "triplet ({r}, {c}) out of bounds");
            if last == Some((r, c)) {
                *vals.last_mut().unwrap() += v;
                continue;
            }
            colidx.push(c);
            vals.push(v);
            rowptr[r + 1] += 1;
            last = Some((r, c));
        }
        for r in 0..nrows {
            rowptr[r + 1] += rowptr[r];
        }
        Self {
            nrows,
            ncols,
            rowptr,
            colidx,
            vals,
        }
    }

    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            rowptr: (0..=n).collect(),
            colidx: (0..n).collect(),
            vals: vec![1.0; n],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    pub fn rowptr(&self) -> &[usize] {
        &self.rowptr
    }

    pub fn colidx(&self) -> &[usize] {
        &self.colidx
    }

    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    /// Column indices and values of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.rowptr[i]..self.rowptr[i + 1];
        (&self.colidx[range.clone()], &self.vals[range])
    }

    /// y = A x.
    pub fn spmv(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        for i in 0..self.nrows {
            let mut sum = 0.0;
            for k in self.rowptr[i]..self.rowptr[i + 1] {
                sum += self.vals[k] * x[self.colidx[k]];
            }
            y[i] = sum;
        }
    }

    /// Row-parallel y = A x. Rows are independent, so the result is
    /// bit-identical to the sequential product.
    pub fn spmv_parallel(&self, x: &[f64], y: &mut [f64]) {
        use rayon::prelude::*;
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let mut sum = 0.0;
            for k in self.rowptr[i]..self.rowptr[i + 1] {
                sum += self.vals[k] * x[self.colidx[k]];
            }
            *yi = sum;
        });
    }

    /// y = Aᵀ x.
    pub fn spmv_transpose(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.nrows);
        assert_eq!(y.len(), self.ncols);
        y.fill(0.0);
        for i in 0..self.nrows {
            let xi = x[i];
            if xi == 0.0 {
                continue;
            }
            for k in self.rowptr[i]..self.rowptr[i + 1] {
                y[self.colidx[k]] += self.vals[k] * xi;
            }
        }
    }

    /// The main diagonal (zero where no entry is stored).
    pub fn diagonal(&self) -> Vec<f64> {
        let n = self.nrows.min(self.ncols);
        let mut diag = vec![0.0; n];
        for i in 0..n {
            let (cols, vals) = self.row(i);
            if let Ok(k) = cols.binary_search(&i) {
                diag[i] = vals[k];
            }
        }
        diag
    }

    /// Per-row offset of the diagonal entry within the CSR arrays.
    ///
    /// Fails on rows without a stored diagonal; the sweeps pivot on it.
    pub fn diag_ptrs(&self) -> Result<Vec<usize>, SamplerError> {
        let mut ptrs = vec![0usize; self.nrows];
        for i in 0..self.nrows {
            let (cols, _) = self.row(i);
            match cols.binary_search(&i) {
                Ok(k) => ptrs[i] = self.rowptr[i] + k,
                Err(_) => return Err(SamplerError::ZeroDiagonal(i)),
            }
        }
        Ok(ptrs)
    }

    /// Lower triangle including the diagonal.
    pub fn lower_triangle(&self) -> Csr {
        let mut rowptr = Vec::with_capacity(self.nrows + 1);
        rowptr.push(0);
        let mut colidx = Vec::new();
        let mut vals = Vec::new();
        for i in 0..self.nrows {
            let (cols, v) = self.row(i);
            for (&j, &val) in cols.iter().zip(v) {
                if j <= i {
                    colidx.push(j);
                    vals.push(val);
                }
            }
            rowptr.push(colidx.len());
        }
        Csr {
            nrows: self.nrows,
            ncols: self.ncols,
            rowptr,
            colidx,
            vals,
        }
    }

    pub fn transpose(&self) -> Csr {
        let mut rowptr = vec![0usize; self.ncols + 1];
        for &c in &self.colidx {
            rowptr[c + 1] += 1;
        }
        for c in 0..self.ncols {
            rowptr[c + 1] += rowptr[c];
        }
        let mut colidx = vec![0usize; self.nnz()];
        let mut vals = vec![0.0; self.nnz()];
        let mut next = rowptr.clone();
        for i in 0..self.nrows {
            for k in self.rowptr[i]..self.rowptr[i + 1] {
                let c = self.colidx[k];
                let dst = next[c];
                colidx[dst] = i;
                vals[dst] = self.vals[k];
                next[c] += 1;
            }
        }
        Csr {
            nrows: self.ncols,
            ncols: self.nrows,
            rowptr,
            colidx,
            vals,
        }
    }

    /// Sparse matrix product A · B with sorted result rows.
    pub fn matmul(&self, other: &Csr) -> Csr {
        assert_eq!(self.ncols, other.nrows);
        let mut rowptr = Vec::with_capacity(self.nrows + 1);
        rowptr.push(0);
        let mut colidx = Vec::new();
        let mut vals = Vec::new();
        let mut acc = vec![0.0f64; other.ncols];
        let mut marker = vec![usize::MAX; other.ncols];
        let mut active: Vec<usize> = Vec::new();
        for i in 0..self.nrows {
            active.clear();
            for k in self.rowptr[i]..self.rowptr[i + 1] {
                let j = self.colidx[k];
                let v = self.vals[k];
                for l in other.rowptr[j]..other.rowptr[j + 1] {
                    let c = other.colidx[l];
                    if marker[c] != i {
                        marker[c] = i;
                        acc[c] = 0.0;
                        active.push(c);
                    }
                    acc[c] += v * other.vals[l];
                }
            }
            active.sort_unstable();
            for &c in &active {
                colidx.push(c);
                vals.push(acc[c]);
            }
            rowptr.push(colidx.len());
        }
        Csr {
            nrows: self.nrows,
            ncols: other.ncols,
            rowptr,
            colidx,
            vals,
        }
    }

    /// Scale column j by s[j] in place.
    pub fn scale_columns(&mut self, s: &[f64]) {
        assert_eq!(s.len(), self.ncols);
        for k in 0..self.vals.len() {
            self.vals[k] *= s[self.colidx[k]];
        }
    }

    /// Solve L x = rhs in place for a lower-triangular matrix with stored
    /// diagonal (forward substitution).
    pub fn forward_solve(&self, x: &mut [f64]) -> Result<(), SamplerError> {
        assert_eq!(self.nrows, self.ncols);
        assert_eq!(x.len(), self.nrows);
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            let mut sum = x[i];
            let mut diag = 0.0;
            for (&j, &v) in cols.iter().zip(vals) {
                if j < i {
                    sum -= v * x[j];
                } else if j == i {
                    diag = v;
                }
            }
            if diag == 0.0 {
                return Err(SamplerError::ZeroDiagonal(i));
            }
            x[i] = sum / diag;
        }
        Ok(())
    }

    /// Solve U x = rhs in place for an upper-triangular matrix with stored
    /// diagonal (backward substitution).
    pub fn backward_solve(&self, x: &mut [f64]) -> Result<(), SamplerError> {
        assert_eq!(self.nrows, self.ncols);
        assert_eq!(x.len(), self.nrows);
        for i in (0..self.nrows).rev() {
            let (cols, vals) = self.row(i);
            let mut sum = x[i];
            let mut diag = 0.0;
            for (&j, &v) in cols.iter().zip(vals) {
                if j > i {
                    sum -= v * x[j];
                } else if j == i {
                    diag = v;
                }
            }
            if diag == 0.0 {
                return Err(SamplerError::ZeroDiagonal(i));
            }
            x[i] = sum / diag;
        }
        Ok(())
    }

    pub fn to_dense(&self) -> Mat<f64> {
        let mut m = Mat::<f64>::zeros(self.nrows, self.ncols);
        for i in 0..self.nrows {
            for k in self.rowptr[i]..self.rowptr[i + 1] {
                m[(i, self.colidx[k])] += self.vals[k];
            }
        }
        m
    }

    /// Sparsify a dense matrix, dropping entries with |a_ij| ≤ tol.
    pub fn from_dense(m: &Mat<f64>, tol: f64) -> Csr {
        let mut rowptr = Vec::with_capacity(m.nrows() + 1);
        rowptr.push(0);
        let mut colidx = Vec::new();
        let mut vals = Vec::new();
        for i in 0..m.nrows() {
            for j in 0..m.ncols() {
                let v = m[(i, j)];
                if v.abs() > tol {
                    colidx.push(j);
                    vals.push(v);
                }
            }
            rowptr.push(colidx.len());
        }
        Csr {
            nrows: m.nrows(),
            ncols: m.ncols(),
            rowptr,
            colidx,
            vals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_spmv() {
        let m = Csr::identity(3);
        let x = vec![2.0, 3.0, 5.0];
        let mut y = vec![0.0; 3];
        m.spmv(&x, &mut y);
        assert_eq!(y, x);
    }

    #[test]
    fn simple_pattern() {
        // 2×3 matrix [[1,2,0],[0,3,4]]
        let m = Csr::from_raw(2, 3, vec![0, 2, 4], vec![0, 1, 1, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let x = vec![1.0, 1.0, 1.0];
        let mut y = vec![0.0; 2];
        m.spmv(&x, &mut y);
        assert_eq!(y, vec![3.0, 7.0]);
    }

    #[test]
    fn parallel_spmv_matches_sequential() {
        let m = crate::problems::shifted_laplace_2d(7, 1.5);
        let x: Vec<f64> = (0..m.ncols()).map(|i| (i as f64).sin()).collect();
        let mut y1 = vec![0.0; m.nrows()];
        let mut y2 = vec![0.0; m.nrows()];
        m.spmv(&x, &mut y1);
        m.spmv_parallel(&x, &mut y2);
        for (a, b) in y1.iter().zip(&y2) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn triplets_sum_duplicates() {
        let m = Csr::from_triplets(2, 2, &[(0, 0, 1.0), (0, 0, 2.0), (1, 1, 5.0), (0, 1, -1.0)]);
        assert_eq!(m.nnz(), 3);
        let mut y = vec![0.0; 2];
        m.spmv(&[1.0, 1.0], &mut y);
        assert_eq!(y, vec![2.0, 5.0]);
    }

    #[test]
    fn transpose_roundtrip() {
        let m = Csr::from_triplets(2, 3, &[(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)]);
        let t = m.transpose();
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 2);
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn spmv_transpose_matches_transposed_spmv() {
        let m = Csr::from_triplets(
            3,
            2,
            &[(0, 0, 1.0), (1, 0, -2.0), (1, 1, 4.0), (2, 1, 0.5)],
        );
        let x = vec![1.0, 2.0, 3.0];
        let mut y1 = vec![0.0; 2];
        m.spmv_transpose(&x, &mut y1);
        let mut y2 = vec![0.0; 2];
        m.transpose().spmv(&x, &mut y2);
        assert_eq!(y1, y2);
    }

    #[test]
    fn matmul_against_dense() {
        let a = Csr::from_triplets(2, 3, &[(0, 0, 1.0), (0, 1, 2.0), (1, 2, 3.0)]);
        let b = Csr::from_triplets(3, 2, &[(0, 0, 4.0), (1, 1, 5.0), (2, 0, 6.0)]);
        let c = a.matmul(&b);
        let expected = Csr::from_triplets(2, 2, &[(0, 0, 4.0), (0, 1, 10.0), (1, 0, 18.0)]);
        assert_eq!(c, expected);
    }

    #[test]
    fn diag_ptrs_and_diagonal() {
        let m = Csr::from_triplets(2, 2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        assert_eq!(m.diagonal(), vec![2.0, 3.0]);
        let ptrs = m.diag_ptrs().unwrap();
        assert_eq!(m.vals()[ptrs[0]], 2.0);
        assert_eq!(m.vals()[ptrs[1]], 3.0);
    }

    #[test]
    fn missing_diagonal_is_rejected() {
        let m = Csr::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]);
        assert!(m.diag_ptrs().is_err());
    }

    #[test]
    fn forward_solve_lower_triangular() {
        // L = [[2,0],[1,4]]
        let l = Csr::from_triplets(2, 2, &[(0, 0, 2.0), (1, 0, 1.0), (1, 1, 4.0)]);
        let mut x = vec![4.0, 10.0];
        l.forward_solve(&mut x).unwrap();
        assert_eq!(x, vec![2.0, 2.0]);
    }

    #[test]
    fn backward_solve_upper_triangular() {
        // U = [[2,1],[0,4]]
        let u = Csr::from_triplets(2, 2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 1, 4.0)]);
        let mut x = vec![6.0, 8.0];
        u.backward_solve(&mut x).unwrap();
        assert_eq!(x, vec![2.0, 2.0]);
    }

    #[test]
    fn dense_roundtrip() {
        let m = Csr::from_triplets(3, 3, &[(0, 0, 1.5), (1, 2, -2.0), (2, 1, 4.0)]);
        let d = m.to_dense();
        assert_eq!(Csr::from_dense(&d, 0.0), m);
    }
}
