//! Per-column flop estimate for `C<M> = A*B`
//!
//! The flops of column `j` are the sum of `nnz(A(:,k))` over the entries
//! `B(k,j)`, plus `nnz(M(:,j))` when a mask is scattered. A column is free
//! when `B(:,j)` is empty, or when a non-complemented mask has no entries in
//! column `j`. With a non-complemented mask, an `A(:,k)` whose row range
//! misses the row range of `M(:,j)` contributes nothing.

use rayon::prelude::*;

use crate::error::SaxpyResult;
use crate::matrix::{Format, Mask, Structure};
use crate::utils::try_filled;

/// Cumulative flop counts per vector of B, with the mask work
#[derive(Debug, Clone, PartialEq)]
pub struct FlopCount {
    /// `bflops[kk]` is the work of vectors `0..kk`; length `bnvec + 1`
    pub bflops: Vec<usize>,
    /// Total number of mask entries scanned
    pub mwork: usize,
}

impl FlopCount {
    pub fn total(&self) -> usize {
        self.bflops.last().copied().unwrap_or(0)
    }

    /// Flops of vector `kk` alone
    pub fn vector_flops(&self, kk: usize) -> usize {
        self.bflops[kk + 1] - self.bflops[kk]
    }

    /// Flops excluding mask work
    pub fn axb_flops(&self) -> usize {
        self.total().saturating_sub(self.mwork)
    }

    /// Adds `extra` flops to every vector
    pub(crate) fn add_per_vector(&mut self, extra: usize) {
        for (kk, w) in self.bflops.iter_mut().enumerate() {
            *w += extra * kk;
        }
    }
}

/// First and last row held by a non-empty range of a column
fn row_bounds(s: &Structure<'_>, range: std::ops::Range<usize>) -> (usize, usize) {
    match s.format {
        Format::Sparse | Format::Hypersparse => (s.i[range.start], s.i[range.end - 1]),
        Format::Bitmap | Format::Full => (0, s.vlen.saturating_sub(1)),
    }
}

/// Flops and mask work of the `kk`-th vector of B
fn vector_flops(mask: Option<&Mask<'_>>, a: &Structure<'_>, b: &Structure<'_>, kk: usize) -> (usize, usize) {
    let b_range = b.vector_range(kk);
    if b_range.is_empty() {
        return (0, 0);
    }
    let j = b.vector_id(kk);

    let mut flops = 0;
    let mut mwork = 0;
    let mut mask_rows = None;
    if let Some(mask) = mask {
        let m = mask.structure();
        match m.lookup(j).filter(|r| !r.is_empty()) {
            Some(m_range) => {
                let mjnz = m_range.len();
                flops = mjnz;
                mwork = mjnz;
                if !mask.is_complemented() {
                    mask_rows = Some(row_bounds(&m, m_range));
                }
            }
            None if !mask.is_complemented() => return (0, 0),
            None => {}
        }
    }

    for pb in b_range {
        if !b.present(pb) {
            continue;
        }
        let k = b.index(pb);
        let Some(a_range) = a.lookup(k) else { continue };
        if a_range.is_empty() {
            continue;
        }
        if let Some((mlo, mhi)) = mask_rows {
            let (alo, ahi) = row_bounds(a, a_range.clone());
            if ahi < mlo || alo > mhi {
                continue;
            }
        }
        flops += a_range.len();
    }
    (flops, mwork)
}

/// Estimates the work of every column of `C<M> = A*B`
///
/// Pass `mask = None` for an unmasked product or for a mask that will be
/// tested in place rather than scattered.
pub fn flopcount(
    mask: Option<&Mask<'_>>,
    a: Structure<'_>,
    b: Structure<'_>,
    parallel: bool,
) -> SaxpyResult<FlopCount> {
    let bnvec = b.nvec();
    let mut per_vector = try_filled(bnvec, (0usize, 0usize), "flop count")?;

    let count = |(kk, slot): (usize, &mut (usize, usize))| *slot = vector_flops(mask, &a, &b, kk);
    if parallel {
        per_vector.par_iter_mut().enumerate().for_each(count);
    } else {
        per_vector.iter_mut().enumerate().for_each(count);
    }

    let mut bflops = try_filled(bnvec + 1, 0usize, "flop count")?;
    let mut mwork = 0;
    for (kk, &(flops, work)) in per_vector.iter().enumerate() {
        bflops[kk + 1] = bflops[kk] + flops;
        mwork += work;
    }
    Ok(FlopCount { bflops, mwork })
}
