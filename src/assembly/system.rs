//! The assembled global system.

use std::ops::Range;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

use crate::assembly_error::AssemblyError;
use crate::dof::block::BlockIndex;

/// Global sparse matrix and right-hand side, with the block ranges they were
/// assembled against.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearSystem {
    matrix: CsrMatrix<f64>,
    rhs: DVector<f64>,
    ranges: Vec<Range<usize>>,
}

impl LinearSystem {
    pub(crate) fn new(matrix: CsrMatrix<f64>, rhs: DVector<f64>, ranges: Vec<Range<usize>>) -> Self {
        Self {
            matrix,
            rhs,
            ranges,
        }
    }

    /// Global matrix in compressed sparse row form.
    #[inline]
    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    /// Global right-hand side.
    #[inline]
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Number of rows (= columns = total DOFs).
    #[inline]
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Value at global `(row, col)`; zero if not stored or out of range.
    pub fn entry(&self, row: usize, col: usize) -> f64 {
        let Some(r) = self.matrix.get_row(row) else {
            return 0.0;
        };
        r.col_indices()
            .iter()
            .position(|&j| j == col)
            .map_or(0.0, |k| r.values()[k])
    }

    /// Dense copy of the sub-matrix coupling block `row` to block `col`.
    pub fn block(&self, row: BlockIndex, col: BlockIndex) -> Result<DMatrix<f64>, AssemblyError> {
        let rows = self.range(row)?;
        let cols = self.range(col)?;
        let mut out = DMatrix::zeros(rows.len(), cols.len());
        for i in rows.clone() {
            let r = self.matrix.row(i);
            for (&j, &v) in r.col_indices().iter().zip(r.values()) {
                if cols.contains(&j) {
                    out[(i - rows.start, j - cols.start)] += v;
                }
            }
        }
        Ok(out)
    }

    /// Copy of the rhs entries of block `b`.
    pub fn rhs_block(&self, b: BlockIndex) -> Result<DVector<f64>, AssemblyError> {
        let range = self.range(b)?;
        Ok(self.rhs.rows(range.start, range.len()).into_owned())
    }

    /// Split into the matrix and rhs for an external solver.
    pub fn into_parts(self) -> (CsrMatrix<f64>, DVector<f64>) {
        (self.matrix, self.rhs)
    }

    fn range(&self, b: BlockIndex) -> Result<Range<usize>, AssemblyError> {
        self.ranges
            .get(b.get())
            .cloned()
            .ok_or(AssemblyError::BlockIndexOutOfRange {
                index: b.get(),
                len: self.ranges.len(),
            })
    }
}
