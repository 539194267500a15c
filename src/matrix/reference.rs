//! Reference implementation of masked multiplication
//!
//! This provides a baseline for correctness testing. It walks every output
//! row of every column and reduces the products in increasing `k`, with no
//! scheduling, no hashing and no early exit.

use crate::ops::{Scalar, Semiring};

use super::mask::Mask;
use super::sparse::{Format, SparseMatrix, Values};

/// Computes `C<M> = A*B` with a naive triple loop
///
/// # Panics
///
/// Panics if the inner dimensions of `a` and `b` differ.
pub fn reference_mxm<A, B, Z>(
    mask: Option<&Mask<'_>>,
    a: &SparseMatrix<A>,
    b: &SparseMatrix<B>,
    semiring: &Semiring<A, B, Z>,
) -> SparseMatrix<Z>
where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
{
    assert_eq!(
        a.n_cols(),
        b.n_rows(),
        "Matrix dimensions must be compatible for multiplication"
    );

    let (m, n) = (a.n_rows(), b.n_cols());
    let mut col_ptr = Vec::with_capacity(n + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    col_ptr.push(0);

    for j in 0..n {
        let column: Vec<(usize, B)> = b.column_iter(j).collect();
        for i in 0..m {
            let mut acc: Option<Z> = None;
            for &(k, bkj) in &column {
                if let Some(aik) = a.get(i, k) {
                    let t = semiring.multiply().call(&aik, &bkj, i, k, j);
                    acc = Some(match acc {
                        Some(z) => semiring.add().add(&z, &t),
                        None => t,
                    });
                }
            }
            let Some(z) = acc else { continue };
            if mask.map_or(true, |mask| mask.allows(i, j)) {
                row_idx.push(i);
                values.push(z);
            }
        }
        col_ptr.push(row_idx.len());
    }

    SparseMatrix::from_parts(m, n, Format::Sparse, col_ptr, Vec::new(), row_idx, Values::Full(values))
}
