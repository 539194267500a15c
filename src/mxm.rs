//! `C<M> = A*B` with replace semantics
//!
//! The engine may leave a mask unapplied when scattering it would cost more
//! than the product; this entry point applies it afterwards so the caller
//! always sees the masked result. Entries of an existing C outside the mask
//! survive unless `replace` is set. There is no accumulator: inside the mask
//! the product overwrites C.

use std::cmp::Ordering;

use crate::error::{SaxpyError, SaxpyResult};
use crate::matrix::{apply_mask, Format, Mask, SparseMatrix, Values};
use crate::ops::Scalar;
use crate::saxpy3::Saxpy3;

/// Computes `C<M, replace> = A*B`
///
/// With no mask the result is `A*B` and `c_in` is ignored. With a mask and
/// no `c_in`, or with `replace`, the result is `A*B` restricted to the mask.
/// Otherwise the entries of `c_in` where the mask is false are kept.
pub fn mxm<A: Scalar, B: Scalar, Z: Scalar>(
    c_in: Option<&SparseMatrix<Z>>,
    mask: Option<Mask<'_>>,
    replace: bool,
    a: &SparseMatrix<A>,
    b: &SparseMatrix<B>,
    engine: &Saxpy3<'_, A, B, Z>,
) -> SaxpyResult<SparseMatrix<Z>> {
    if let Some(c) = c_in {
        if c.shape() != (a.n_rows(), b.n_cols()) {
            return Err(SaxpyError::dimension_mismatch(format!(
                "C is {}x{} but A*B is {}x{}",
                c.n_rows(),
                c.n_cols(),
                a.n_rows(),
                b.n_cols()
            )));
        }
    }

    let product = engine.multiply(mask, a, b)?;
    let Some(mask) = mask else { return Ok(product.matrix) };
    let t = if product.mask_applied { product.matrix } else { apply_mask(&product.matrix, &mask) };

    match c_in {
        Some(c) if !replace => Ok(merge_outside_mask(c, &t, &mask)),
        _ => Ok(t),
    }
}

/// Entries of `t`, plus the entries of `c` that the mask does not allow
fn merge_outside_mask<Z: Scalar>(c: &SparseMatrix<Z>, t: &SparseMatrix<Z>, mask: &Mask<'_>) -> SparseMatrix<Z> {
    let (m, n) = t.shape();
    let mut col_ptr = Vec::with_capacity(n + 1);
    let mut row_idx = Vec::with_capacity(t.nnz());
    let mut values = Vec::with_capacity(t.nnz());
    col_ptr.push(0);

    for j in 0..n {
        let mut kept = c.column_iter(j).filter(|&(i, _)| !mask.allows(i, j)).peekable();
        let mut computed = t.column_iter(j).peekable();
        loop {
            let next = match (kept.peek(), computed.peek()) {
                (Some(&(ic, _)), Some(&(it, _))) => match ic.cmp(&it) {
                    Ordering::Less => kept.next(),
                    // A kept entry lies outside the mask and a computed one
                    // inside it, so rows never tie
                    Ordering::Equal | Ordering::Greater => computed.next(),
                },
                (Some(_), None) => kept.next(),
                (None, Some(_)) => computed.next(),
                (None, None) => break,
            };
            if let Some((i, z)) = next {
                row_idx.push(i);
                values.push(z);
            }
        }
        col_ptr.push(row_idx.len());
    }
    SparseMatrix::from_parts(m, n, Format::Sparse, col_ptr, Vec::new(), row_idx, Values::Full(values))
}
