//! Sparse matrix helpers.

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

/// Densify a CSC matrix. Explicitly stored duplicates are summed.
pub fn csc_to_dense(sparse: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(sparse.nrows(), sparse.ncols());
    for (row, col, val) in sparse.triplet_iter() {
        dense[(row, col)] += *val;
    }
    dense
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn test_duplicates_are_summed() {
        let mut coo = CooMatrix::new(2, 3);
        coo.push(0, 0, 1.0);
        coo.push(0, 0, 2.0);
        coo.push(1, 2, 5.0);
        let d = csc_to_dense(&CscMatrix::from(&coo));
        assert_eq!(d.shape(), (2, 3));
        assert_eq!(d[(0, 0)], 3.0);
        assert_eq!(d[(1, 2)], 5.0);
        assert_eq!(d.sum(), 8.0);
    }

    #[test]
    fn test_empty_matrix() {
        let d = csc_to_dense(&CscMatrix::zeros(3, 2));
        assert_eq!(d, DMatrix::zeros(3, 2));
    }
}
