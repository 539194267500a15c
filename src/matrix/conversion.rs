//! Conversion functions between matrix formats

use ndarray::Array2;

use crate::error::{SaxpyError, SaxpyResult};
use crate::ops::Scalar;

use super::sparse::{Format, SparseMatrix, Values};

impl<T: Scalar> SparseMatrix<T> {
    /// Returns the transpose in sparse format
    pub fn transpose(&self) -> SparseMatrix<T> {
        // Count entries per row of self (columns of the result)
        let mut row_counts = vec![0; self.vlen + 1];
        for (i, _, _) in self.triplets() {
            row_counts[i + 1] += 1;
        }
        for i in 0..self.vlen {
            row_counts[i + 1] += row_counts[i];
        }
        let col_ptr = row_counts.clone();
        let mut next = row_counts;

        let nnz = self.nvals;
        let mut row_idx = vec![0; nnz];
        let mut values = vec![T::default(); nnz];

        // Columns are visited in order, so rows of the result stay sorted
        for (i, j, v) in self.triplets() {
            let pos = next[i];
            row_idx[pos] = j;
            values[pos] = v;
            next[i] += 1;
        }

        let values = match &self.values {
            Values::Full(_) => Values::Full(values),
            Values::Iso(v) => Values::Iso(*v),
            Values::Pattern => Values::Pattern,
        };
        SparseMatrix::from_parts(self.vdim, self.vlen, Format::Sparse, col_ptr, Vec::new(), row_idx, values)
    }

    /// Builds a column-oriented matrix from compressed-row arrays
    pub fn from_csr(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> SaxpyResult<Self> {
        // Row-major input is the column-major transpose
        let transposed = SparseMatrix::try_new(n_cols, n_rows, row_ptr, col_idx, Values::Full(values))?;
        Ok(transposed.transpose())
    }

    /// Converts to another storage format
    ///
    /// Converting to [`Format::Full`] fails unless every entry is present.
    pub fn convert(&self, format: Format) -> SaxpyResult<SparseMatrix<T>> {
        if format == self.format {
            return Ok(self.clone());
        }
        let triplets = self.triplets();
        let held_values = |held: Vec<T>| match &self.values {
            Values::Full(_) => Values::Full(held),
            Values::Iso(v) => Values::Iso(*v),
            Values::Pattern => Values::Pattern,
        };

        match format {
            Format::Sparse | Format::Hypersparse => {
                let mut col_ptr = vec![0; self.vdim + 1];
                for &(_, j, _) in &triplets {
                    col_ptr[j + 1] += 1;
                }
                for j in 0..self.vdim {
                    col_ptr[j + 1] += col_ptr[j];
                }
                let row_idx: Vec<usize> = triplets.iter().map(|&(i, _, _)| i).collect();
                let values: Vec<T> = triplets.iter().map(|&(_, _, v)| v).collect();
                let sparse = SparseMatrix::from_parts(
                    self.vlen,
                    self.vdim,
                    Format::Sparse,
                    col_ptr,
                    Vec::new(),
                    row_idx,
                    held_values(values),
                );
                if format == Format::Sparse {
                    return Ok(sparse);
                }
                let mut hyper = sparse;
                hyper.format = Format::Hypersparse;
                hyper.h = (0..self.vdim).collect();
                hyper.prune_empty_vectors();
                Ok(hyper)
            }
            Format::Bitmap | Format::Full => {
                let slots = self
                    .vlen
                    .checked_mul(self.vdim)
                    .ok_or_else(|| SaxpyError::invalid_input("dense dimensions overflow"))?;
                if format == Format::Full && triplets.len() != slots {
                    return Err(SaxpyError::invalid_input(format!(
                        "cannot convert to full: {} of {} entries present",
                        triplets.len(),
                        slots
                    )));
                }
                let mut present = vec![false; slots];
                let mut values = vec![T::default(); slots];
                for (i, j, v) in triplets {
                    let pos = j * self.vlen + i;
                    present[pos] = true;
                    values[pos] = v;
                }
                if format == Format::Full {
                    SparseMatrix::full(self.vlen, self.vdim, held_values(values))
                } else {
                    SparseMatrix::bitmap(self.vlen, self.vdim, present, held_values(values))
                }
            }
        }
    }

    /// Dense copy with `fill` in place of missing entries
    pub fn to_dense(&self, fill: T) -> Array2<T> {
        let mut dense = Array2::from_elem((self.vlen, self.vdim), fill);
        for (i, j, v) in self.triplets() {
            dense[[i, j]] = v;
        }
        dense
    }
}
