//! Row-partitioned sparse storage.
//!
//! Every process owns a contiguous block of rows. For each owned row the
//! matrix splits into a diagonal block (columns owned locally, stored with
//! local column indices) and an off-diagonal block whose compact column
//! indices map to global columns through `colmap`. Sweeps read off-process
//! values through per-color ghost scatters built once at setup.

use crate::error::SamplerError;
use crate::matrix::Csr;

/// Inclusive-exclusive range of globally-indexed rows owned by one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartition {
    pub start: usize,
    pub end: usize,
    pub global_rows: usize,
}

impl RowPartition {
    /// The whole matrix on a single process.
    pub fn serial(n: usize) -> Self {
        Self {
            start: 0,
            end: n,
            global_rows: n,
        }
    }

    pub fn local_size(&self) -> usize {
        self.end - self.start
    }

    pub fn owns(&self, global: usize) -> bool {
        global >= self.start && global < self.end
    }
}

/// Row-partitioned CSR matrix with a diagonal/off-diagonal block split.
#[derive(Debug, Clone)]
pub struct DistCsr {
    part: RowPartition,
    diag: Csr,
    offd: Csr,
    colmap: Vec<usize>,
    global_cols: usize,
}

impl DistCsr {
    /// Wrap a fully-owned matrix (single-process layout, empty off-diagonal).
    pub fn serial(a: Csr) -> Self {
        let n = a.nrows();
        assert_eq!(n, a.ncols(), "precision operators are square");
        Self {
            part: RowPartition::serial(n),
            offd: Csr::from_raw(n, 0, vec![0; n + 1], Vec::new(), Vec::new()),
            colmap: Vec::new(),
            global_cols: n,
            diag: a,
        }
    }

    /// Extract this process's row block of a globally-assembled matrix.
    ///
    /// Owned columns land in the diagonal block with local indices; the rest
    /// are compacted into the off-diagonal block in ascending global order.
    pub fn from_global(a: &Csr, part: RowPartition) -> Self {
        assert_eq!(a.nrows(), a.ncols());
        assert_eq!(a.nrows(), part.global_rows);
        assert!(part.end <= a.nrows() && part.start <= part.end);
        let m = part.local_size();

        // Mark ghost columns touched by owned rows, then compact them.
        let mut is_ghost = vec![false; a.ncols()];
        for i in part.start..part.end {
            let (cols, _) = a.row(i);
            for &j in cols {
                if !part.owns(j) {
                    is_ghost[j] = true;
                }
            }
        }
        let colmap: Vec<usize> = (0..a.ncols()).filter(|&j| is_ghost[j]).collect();
        let mut compact = vec![usize::MAX; a.ncols()];
        for (k, &j) in colmap.iter().enumerate() {
            compact[j] = k;
        }

        let mut d = Vec::new();
        let mut o = Vec::new();
        for (li, i) in (part.start..part.end).enumerate() {
            let (cols, vals) = a.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                if part.owns(j) {
                    d.push((li, j - part.start, v));
                } else {
                    o.push((li, compact[j], v));
                }
            }
        }
        Self {
            part,
            diag: Csr::from_triplets(m, m, &d),
            offd: Csr::from_triplets(m, colmap.len(), &o),
            colmap,
            global_cols: a.ncols(),
        }
    }

    pub fn partition(&self) -> &RowPartition {
        &self.part
    }

    pub fn local_rows(&self) -> usize {
        self.part.local_size()
    }

    pub fn global_rows(&self) -> usize {
        self.part.global_rows
    }

    /// Locally-owned diagonal block.
    pub fn diag(&self) -> &Csr {
        &self.diag
    }

    /// Off-diagonal block with compact column indices.
    pub fn offdiag(&self) -> &Csr {
        &self.offd
    }

    /// Global column index of each compact off-diagonal column.
    pub fn colmap(&self) -> &[usize] {
        &self.colmap
    }

    /// True when no other process holds coupled columns.
    pub fn is_serial(&self) -> bool {
        self.colmap.is_empty() && self.part.local_size() == self.part.global_rows
    }

    /// Diagonal entries of the owned rows (always in the diagonal block).
    pub fn diagonal(&self) -> Vec<f64> {
        self.diag.diagonal()
    }

    /// y = A x using owned values and an already-gathered ghost buffer laid
    /// out by compact off-diagonal column index.
    pub fn matvec_local(&self, x: &[f64], ghost: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.local_rows());
        assert_eq!(ghost.len(), self.colmap.len());
        self.diag.spmv(x, y);
        let (rowptr, colidx, vals) = (self.offd.rowptr(), self.offd.colidx(), self.offd.vals());
        for i in 0..self.local_rows() {
            let mut sum = 0.0;
            for k in rowptr[i]..rowptr[i + 1] {
                sum += vals[k] * ghost[colidx[k]];
            }
            y[i] += sum;
        }
    }

    /// y = A x on a single process.
    pub fn matvec_serial(&self, x: &[f64], y: &mut [f64]) {
        debug_assert!(self.is_serial());
        self.diag.spmv(x, y);
    }
}

/// Ghost values needed by one color's rows, in sweep order.
///
/// One scatter per color is built at sampler setup; the receive buffer holds
/// one slot per off-diagonal entry touched, duplicated per entry like the
/// off-diagonal CSR walk that consumes it.
#[derive(Debug, Clone)]
pub struct GhostScatter {
    global_indices: Vec<usize>,
}

impl GhostScatter {
    /// Collect the global ghost indices read by `rows` of the off-diagonal
    /// block, in row order.
    pub fn build(a: &DistCsr, rows: &[usize]) -> Result<Self, SamplerError> {
        let (rowptr, colidx) = (a.offd.rowptr(), a.offd.colidx());
        let total: usize = rows
            .iter()
            .map(|&r| {
                if r >= a.local_rows() {
                    0
                } else {
                    rowptr[r + 1] - rowptr[r]
                }
            })
            .sum();
        let mut global_indices = Vec::with_capacity(total);
        for &r in rows {
            if r >= a.local_rows() {
                return Err(SamplerError::Scatter(format!(
                    "row {r} outside the owned block of {} rows",
                    a.local_rows()
                )));
            }
            for k in rowptr[r]..rowptr[r + 1] {
                global_indices.push(a.colmap[colidx[k]]);
            }
        }
        Ok(Self { global_indices })
    }

    pub fn len(&self) -> usize {
        self.global_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global_indices.is_empty()
    }

    pub fn global_indices(&self) -> &[usize] {
        &self.global_indices
    }

    /// Gather ghost values through a caller-supplied resolver from global
    /// index to value. On one process this is never reached (the
    /// off-diagonal block is empty); with the `mpi` feature the resolver is
    /// backed by the neighbor exchange.
    pub fn gather_with<F>(&self, resolve: F, buf: &mut [f64])
    where
        F: Fn(usize) -> f64,
    {
        assert_eq!(buf.len(), self.global_indices.len());
        for (slot, &g) in buf.iter_mut().zip(&self.global_indices) {
            *slot = resolve(g);
        }
    }
}
