//! Sparse matrix utilities shared across fryconv

use crate::core::error::{FryconvError, Result};
use itertools::Itertools;
use nalgebra_sparse::ops::serial::{spadd_csr_prealloc, spadd_pattern};
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rustc_hash::FxHashMap;

pub struct SparseOps;

impl SparseOps {
    /// Create a CSR matrix from COO triplets; duplicate coordinates are summed.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: Vec<(usize, usize, f32)>,
    ) -> Result<CsrMatrix<f32>> {
        if nrows == 0 || ncols == 0 || triplets.is_empty() {
            return Ok(CsrMatrix::zeros(nrows, ncols));
        }

        for &(row, col, _) in &triplets {
            if row >= nrows || col >= ncols {
                return Err(FryconvError::SparseMatrix(format!(
                    "index ({}, {}) exceeds matrix dimensions ({}, {})",
                    row, col, nrows, ncols
                )));
            }
        }

        let (row_indices, col_indices, values): (Vec<_>, Vec<_>, Vec<_>) =
            triplets.into_iter().multiunzip();

        let coo = CooMatrix::try_from_triplets(nrows, ncols, row_indices, col_indices, values)
            .map_err(|e| FryconvError::SparseMatrix(format!("COO creation failed: {:?}", e)))?;

        Ok(CsrMatrix::from(&coo))
    }

    /// Element-wise sparse addition over the union pattern of both operands.
    pub fn add_matrices(a: &CsrMatrix<f32>, b: &CsrMatrix<f32>) -> Result<CsrMatrix<f32>> {
        if a.nrows() != b.nrows() || a.ncols() != b.ncols() {
            return Err(FryconvError::MisalignedComponents {
                expected: format!("{}×{}", a.nrows(), a.ncols()),
                actual: format!("{}×{}", b.nrows(), b.ncols()),
            });
        }

        let pattern = spadd_pattern(a.pattern(), b.pattern());
        let mut result =
            CsrMatrix::try_from_pattern_and_values(pattern.clone(), vec![0.0f32; pattern.nnz()])
                .map_err(|e| {
                    FryconvError::SparseMatrix(format!("failed to create result matrix: {:?}", e))
                })?;

        // API signature: spadd_csr_prealloc(beta, C, alpha, Op<A>)
        spadd_csr_prealloc(1.0f32, &mut result, 1.0f32, Op::NoOp(a))
            .map_err(|e| FryconvError::SparseMatrix(format!("sparse addition failed: {:?}", e)))?;

        spadd_csr_prealloc(1.0f32, &mut result, 1.0f32, Op::NoOp(b))
            .map_err(|e| FryconvError::SparseMatrix(format!("sparse addition failed: {:?}", e)))?;

        Ok(result)
    }

    /// Keep the listed columns, dropping the rest. `keep_indices` must be in
    /// increasing order so within-row column indices stay sorted.
    pub fn filter_columns(
        matrix: &CsrMatrix<f32>,
        keep_indices: &[usize],
    ) -> Result<CsrMatrix<f32>> {
        let nrows = matrix.nrows();
        let new_ncols = keep_indices.len();

        if new_ncols == 0 {
            return Ok(CsrMatrix::zeros(nrows, 0));
        }

        let col_map: FxHashMap<usize, usize> = keep_indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut new_row_offsets = Vec::with_capacity(nrows + 1);
        let mut new_col_indices = Vec::new();
        let mut new_values = Vec::new();

        new_row_offsets.push(0);

        for row_idx in 0..nrows {
            let row = matrix.row(row_idx);

            for (&old_col, &val) in row.col_indices().iter().zip(row.values()) {
                if let Some(&new_col) = col_map.get(&old_col) {
                    new_col_indices.push(new_col);
                    new_values.push(val);
                }
            }

            new_row_offsets.push(new_col_indices.len());
        }

        CsrMatrix::try_from_csr_data(
            nrows,
            new_ncols,
            new_row_offsets,
            new_col_indices,
            new_values,
        )
        .map_err(|e| {
            FryconvError::SparseMatrix(format!("failed to create filtered matrix: {:?}", e))
        })
    }

    /// Materialize the matrix as a dense row-major buffer.
    pub fn to_dense(matrix: &CsrMatrix<f32>) -> Vec<f32> {
        let ncols = matrix.ncols();
        let mut dense = vec![0.0f32; matrix.nrows() * ncols];
        for (row, col, &value) in matrix.triplet_iter() {
            dense[row * ncols + col] = value;
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(triplets: Vec<(usize, usize, f32)>) -> CsrMatrix<f32> {
        SparseOps::from_triplets(2, 3, triplets).unwrap()
    }

    #[test]
    fn from_triplets_sums_duplicate_coordinates() {
        let m = matrix(vec![(0, 1, 2.0), (0, 1, 3.0), (1, 2, 1.0)]);
        assert_eq!(m.nnz(), 2);
        assert_eq!(SparseOps::to_dense(&m), vec![0.0, 5.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn from_triplets_rejects_out_of_bounds() {
        let err = SparseOps::from_triplets(2, 3, vec![(2, 0, 1.0)]);
        assert!(matches!(err, Err(FryconvError::SparseMatrix(_))));
    }

    #[test]
    fn add_matrices_unions_patterns() {
        let a = matrix(vec![(0, 0, 1.0), (1, 2, 4.0)]);
        let b = matrix(vec![(0, 0, 2.0), (0, 1, 7.0)]);
        let sum = SparseOps::add_matrices(&a, &b).unwrap();
        assert_eq!(
            SparseOps::to_dense(&sum),
            vec![3.0, 7.0, 0.0, 0.0, 0.0, 4.0]
        );
    }

    #[test]
    fn add_matrices_rejects_shape_mismatch() {
        let a = matrix(vec![(0, 0, 1.0)]);
        let b = SparseOps::from_triplets(3, 3, vec![(0, 0, 1.0)]).unwrap();
        let err = SparseOps::add_matrices(&a, &b);
        assert!(matches!(
            err,
            Err(FryconvError::MisalignedComponents { .. })
        ));
    }

    #[test]
    fn filter_columns_keeps_order_and_values() {
        let m = matrix(vec![(0, 0, 1.0), (0, 2, 3.0), (1, 1, 2.0)]);
        let filtered = SparseOps::filter_columns(&m, &[0, 2]).unwrap();
        assert_eq!(filtered.ncols(), 2);
        assert_eq!(SparseOps::to_dense(&filtered), vec![1.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn filter_columns_to_empty() {
        let m = matrix(vec![(0, 0, 1.0)]);
        let filtered = SparseOps::filter_columns(&m, &[]).unwrap();
        assert_eq!(filtered.ncols(), 0);
        assert_eq!(filtered.nrows(), 2);
    }
}
