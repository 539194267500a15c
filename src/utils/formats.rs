//! Utilities for converting between our matrix formats and sprs

use sprs::CsMat;

use crate::error::SaxpyResult;
use crate::matrix::{Format, SparseMatrix, Values};
use crate::ops::Scalar;

/// Converts a matrix to a sprs `CsMat` in CSC storage
///
/// Iso and pattern-only matrices are materialized; pattern entries become
/// `T::default()`.
pub fn to_sprs<T: Scalar>(matrix: &SparseMatrix<T>) -> SaxpyResult<CsMat<T>> {
    let sparse = match matrix.format() {
        Format::Sparse => matrix.clone(),
        _ => matrix.convert(Format::Sparse)?,
    };
    let nnz = sparse.nnz();
    let data = match sparse.values() {
        Values::Full(x) => x.clone(),
        Values::Iso(v) => vec![*v; nnz],
        Values::Pattern => vec![T::default(); nnz],
    };
    Ok(CsMat::new_csc(
        sparse.shape(),
        sparse.col_ptr().to_vec(),
        sparse.row_idx().to_vec(),
        data,
    ))
}

/// Converts a sprs `CsMat` (either storage order) to a sparse matrix
pub fn from_sprs<T: Scalar>(matrix: CsMat<T>) -> SaxpyResult<SparseMatrix<T>> {
    // Ensure matrix is in CSC format
    let matrix = if matrix.is_csc() { matrix } else { matrix.to_csc() };

    let shape = matrix.shape();
    let (indptr, indices, data) = matrix.into_raw_storage();

    SparseMatrix::try_new(shape.0, shape.1, indptr, indices, Values::Full(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprs_roundtrip() {
        let original = SparseMatrix::new(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 1, 1, 0, 2],
            vec![1.0f64, 2.0, 3.0, 4.0, 5.0],
        );

        let sprs_mat = to_sprs(&original).unwrap();
        assert!(sprs_mat.is_csc());
        assert_eq!(sprs_mat.nnz(), 5);

        let roundtrip = from_sprs(sprs_mat).unwrap();
        assert_eq!(roundtrip.triplets(), original.triplets());
    }

    #[test]
    fn test_from_sprs_csr() {
        // [1 0]
        // [2 3]
        let csr = CsMat::new((2, 2), vec![0, 1, 3], vec![0, 0, 1], vec![1i32, 2, 3]);
        let m = from_sprs(csr).unwrap();
        assert_eq!(m.triplets(), vec![(0, 0, 1), (1, 0, 2), (1, 1, 3)]);
    }

    #[test]
    fn test_iso_materialized() {
        let m = SparseMatrix::<u8>::identity(3).into_iso(4);
        let sprs_mat = to_sprs(&m).unwrap();
        assert_eq!(sprs_mat.data(), &[4, 4, 4]);
    }
}
