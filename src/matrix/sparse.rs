//! Column-oriented sparse matrix in sparse, hypersparse, bitmap or full form

use std::fmt;
use std::ops::Range;

use crate::error::{SaxpyError, SaxpyResult};
use crate::ops::{Arith, Scalar};

/// Storage format of a [`SparseMatrix`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Column pointers plus row indices
    Sparse,
    /// Like sparse, but only non-empty columns are listed
    Hypersparse,
    /// Every slot held, with a presence byte per slot
    Bitmap,
    /// Every slot held and present
    Full,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Sparse => "sparse",
            Format::Hypersparse => "hyper",
            Format::Bitmap => "bitmap",
            Format::Full => "full",
        }
    }
}

/// Values of a matrix
#[derive(Debug, Clone, PartialEq)]
pub enum Values<T> {
    /// One value per held entry
    Full(Vec<T>),
    /// Every entry has the same value
    Iso(T),
    /// Structure only; entries read as `T::default()`
    Pattern,
}

/// Borrowed view of the values, used on hot paths
#[derive(Clone, Copy)]
pub(crate) enum ValueView<'a, T> {
    Full(&'a [T]),
    Iso(T),
    Pattern,
}

impl<T: Scalar> ValueView<'_, T> {
    #[inline]
    pub(crate) fn get(&self, pos: usize) -> T {
        match self {
            ValueView::Full(x) => x[pos],
            ValueView::Iso(v) => *v,
            ValueView::Pattern => T::default(),
        }
    }
}

/// Type-independent view of the pattern of a matrix
///
/// A "vector" is one column. Positions index the row array (sparse and
/// hypersparse) or the `vlen * vdim` slot array (bitmap and full).
#[derive(Debug, Clone, Copy)]
pub struct Structure<'a> {
    pub format: Format,
    /// Length of each vector (number of rows)
    pub vlen: usize,
    /// Number of vectors (number of columns)
    pub vdim: usize,
    /// Number of entries present
    pub nvals: usize,
    pub p: &'a [usize],
    pub h: &'a [usize],
    pub b: &'a [bool],
    pub i: &'a [usize],
}

impl<'a> Structure<'a> {
    /// Number of stored vectors
    #[inline]
    pub fn nvec(&self) -> usize {
        match self.format {
            Format::Hypersparse => self.h.len(),
            _ => self.vdim,
        }
    }

    /// Column index of the `k`-th stored vector
    #[inline]
    pub fn vector_id(&self, k: usize) -> usize {
        match self.format {
            Format::Hypersparse => self.h[k],
            _ => k,
        }
    }

    /// Positions held by the `k`-th stored vector
    #[inline]
    pub fn vector_range(&self, k: usize) -> Range<usize> {
        match self.format {
            Format::Sparse | Format::Hypersparse => self.p[k]..self.p[k + 1],
            Format::Bitmap | Format::Full => k * self.vlen..(k + 1) * self.vlen,
        }
    }

    /// Positions held by column `j`, or `None` if the column is not stored
    #[inline]
    pub fn lookup(&self, j: usize) -> Option<Range<usize>> {
        match self.format {
            Format::Hypersparse => self
                .h
                .binary_search(&j)
                .ok()
                .map(|k| self.p[k]..self.p[k + 1]),
            _ if j < self.vdim => Some(self.vector_range(j)),
            _ => None,
        }
    }

    #[inline]
    pub fn present(&self, pos: usize) -> bool {
        match self.format {
            Format::Bitmap => self.b[pos],
            _ => true,
        }
    }

    /// Row index of the entry at `pos`
    #[inline]
    pub fn index(&self, pos: usize) -> usize {
        match self.format {
            Format::Sparse | Format::Hypersparse => self.i[pos],
            Format::Bitmap | Format::Full => pos % self.vlen,
        }
    }

    /// Whether every slot holds an entry
    pub fn is_packed(&self) -> bool {
        match self.format {
            Format::Full => true,
            Format::Hypersparse => {
                self.h.len() == self.vdim && self.nvals == self.vlen.saturating_mul(self.vdim)
            }
            Format::Sparse | Format::Bitmap => self.nvals == self.vlen.saturating_mul(self.vdim),
        }
    }

    /// Position of `(i, j)` in a packed matrix
    #[inline]
    pub fn packed_position(&self, i: usize, j: usize) -> usize {
        j * self.vlen + i
    }

    /// Number of entries present across all stored vectors, plus the
    /// number of stored vectors
    pub fn work(&self) -> usize {
        self.nvals + self.nvec()
    }
}

/// A sparse matrix stored by columns
///
/// Row indices within each column are strictly increasing; columns of a
/// hypersparse matrix are listed in increasing order.
#[derive(Clone)]
pub struct SparseMatrix<T> {
    pub(crate) vlen: usize,
    pub(crate) vdim: usize,
    pub(crate) format: Format,
    pub(crate) p: Vec<usize>,
    pub(crate) h: Vec<usize>,
    pub(crate) b: Vec<bool>,
    pub(crate) i: Vec<usize>,
    pub(crate) values: Values<T>,
    pub(crate) nvals: usize,
}

fn check_compressed(
    n_rows: usize,
    nvec: usize,
    col_ptr: &[usize],
    row_idx: &[usize],
) -> SaxpyResult<()> {
    if col_ptr.len() != nvec + 1 {
        return Err(SaxpyError::invalid_input(format!(
            "col_ptr.len() must be {} but is {}",
            nvec + 1,
            col_ptr.len()
        )));
    }
    if col_ptr[0] != 0 || col_ptr[nvec] != row_idx.len() {
        return Err(SaxpyError::invalid_input(
            "col_ptr must start at 0 and end at row_idx.len()",
        ));
    }
    for k in 0..nvec {
        let (start, end) = (col_ptr[k], col_ptr[k + 1]);
        if start > end || end > row_idx.len() {
            return Err(SaxpyError::invalid_input(format!(
                "col_ptr is not monotone at vector {}",
                k
            )));
        }
        let column = &row_idx[start..end];
        if let Some(&last) = column.last() {
            if last >= n_rows {
                return Err(SaxpyError::invalid_input(format!(
                    "row index {} out of bounds (n_rows = {})",
                    last, n_rows
                )));
            }
        }
        if column.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SaxpyError::invalid_input(format!(
                "row indices of vector {} are not strictly increasing",
                k
            )));
        }
    }
    Ok(())
}

fn check_values<T>(values: &Values<T>, held: usize) -> SaxpyResult<()> {
    match values {
        Values::Full(x) if x.len() != held => Err(SaxpyError::invalid_input(format!(
            "expected {} values but got {}",
            held,
            x.len()
        ))),
        _ => Ok(()),
    }
}

impl<T: Scalar> SparseMatrix<T> {
    /// Creates a sparse matrix from compressed-column arrays
    ///
    /// # Panics
    ///
    /// Panics if the arrays are inconsistent:
    /// - col_ptr.len() must be n_cols + 1
    /// - row_idx.len() must equal values.len()
    /// - row indices must be in bounds and strictly increasing per column
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Self {
        match Self::try_new(n_rows, n_cols, col_ptr, row_idx, Values::Full(values)) {
            Ok(m) => m,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates a sparse matrix, reporting malformed input as an error
    pub fn try_new(
        n_rows: usize,
        n_cols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Values<T>,
    ) -> SaxpyResult<Self> {
        check_compressed(n_rows, n_cols, &col_ptr, &row_idx)?;
        check_values(&values, row_idx.len())?;
        let nvals = row_idx.len();
        Ok(Self {
            vlen: n_rows,
            vdim: n_cols,
            format: Format::Sparse,
            p: col_ptr,
            h: Vec::new(),
            b: Vec::new(),
            i: row_idx,
            values,
            nvals,
        })
    }

    /// Creates a hypersparse matrix holding only the columns in `col_ids`
    pub fn hypersparse(
        n_rows: usize,
        n_cols: usize,
        col_ids: Vec<usize>,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Values<T>,
    ) -> SaxpyResult<Self> {
        if col_ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SaxpyError::invalid_input(
                "hypersparse column ids must be strictly increasing",
            ));
        }
        if col_ids.last().is_some_and(|&j| j >= n_cols) {
            return Err(SaxpyError::invalid_input("hypersparse column id out of bounds"));
        }
        check_compressed(n_rows, col_ids.len(), &col_ptr, &row_idx)?;
        check_values(&values, row_idx.len())?;
        let nvals = row_idx.len();
        Ok(Self {
            vlen: n_rows,
            vdim: n_cols,
            format: Format::Hypersparse,
            p: col_ptr,
            h: col_ids,
            b: Vec::new(),
            i: row_idx,
            values,
            nvals,
        })
    }

    /// Creates a bitmap matrix; `present` and `values` are column-major
    pub fn bitmap(n_rows: usize, n_cols: usize, present: Vec<bool>, values: Values<T>) -> SaxpyResult<Self> {
        let slots = n_rows
            .checked_mul(n_cols)
            .ok_or_else(|| SaxpyError::invalid_input("bitmap dimensions overflow"))?;
        if present.len() != slots {
            return Err(SaxpyError::invalid_input(format!(
                "bitmap needs {} presence flags but got {}",
                slots,
                present.len()
            )));
        }
        check_values(&values, slots)?;
        let nvals = present.iter().filter(|&&x| x).count();
        Ok(Self {
            vlen: n_rows,
            vdim: n_cols,
            format: Format::Bitmap,
            p: Vec::new(),
            h: Vec::new(),
            b: present,
            i: Vec::new(),
            values,
            nvals,
        })
    }

    /// Creates a full matrix; `values` are column-major
    pub fn full(n_rows: usize, n_cols: usize, values: Values<T>) -> SaxpyResult<Self> {
        let slots = n_rows
            .checked_mul(n_cols)
            .ok_or_else(|| SaxpyError::invalid_input("full dimensions overflow"))?;
        check_values(&values, slots)?;
        Ok(Self {
            vlen: n_rows,
            vdim: n_cols,
            format: Format::Full,
            p: Vec::new(),
            h: Vec::new(),
            b: Vec::new(),
            i: Vec::new(),
            values,
            nvals: slots,
        })
    }

    /// Builds a sparse matrix from `(row, col, value)` triplets, combining
    /// duplicates with `dup`
    pub fn from_triplets<F>(
        n_rows: usize,
        n_cols: usize,
        triplets: &[(usize, usize, T)],
        dup: F,
    ) -> SaxpyResult<Self>
    where
        F: Fn(&T, &T) -> T,
    {
        if let Some(&(i, j, _)) = triplets.iter().find(|&&(i, j, _)| i >= n_rows || j >= n_cols) {
            return Err(SaxpyError::invalid_input(format!(
                "entry ({}, {}) out of bounds for {}x{}",
                i, j, n_rows, n_cols
            )));
        }

        // Stable sort keeps duplicates in input order
        let mut sorted: Vec<(usize, usize, T)> = triplets.to_vec();
        sorted.sort_by_key(|&(i, j, _)| (j, i));

        let mut col_ptr = vec![0; n_cols + 1];
        let mut row_idx: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<T> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;

        for (i, j, v) in sorted {
            if last == Some((i, j)) {
                if let Some(x) = values.last_mut() {
                    *x = dup(&*x, &v);
                }
                continue;
            }
            last = Some((i, j));
            row_idx.push(i);
            values.push(v);
            col_ptr[j + 1] += 1;
        }
        for j in 0..n_cols {
            col_ptr[j + 1] += col_ptr[j];
        }

        Self::try_new(n_rows, n_cols, col_ptr, row_idx, Values::Full(values))
    }

    /// Creates an empty sparse matrix with the given dimensions
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            vlen: n_rows,
            vdim: n_cols,
            format: Format::Sparse,
            p: vec![0; n_cols + 1],
            h: Vec::new(),
            b: Vec::new(),
            i: Vec::new(),
            values: Values::Full(Vec::new()),
            nvals: 0,
        }
    }

    /// Assembles a matrix from arrays the engine already knows are valid
    pub(crate) fn from_parts(
        vlen: usize,
        vdim: usize,
        format: Format,
        p: Vec<usize>,
        h: Vec<usize>,
        i: Vec<usize>,
        values: Values<T>,
    ) -> Self {
        debug_assert!(matches!(format, Format::Sparse | Format::Hypersparse));
        debug_assert!(check_compressed(vlen, p.len().saturating_sub(1), &p, &i).is_ok());
        let nvals = i.len();
        Self {
            vlen,
            vdim,
            format,
            p,
            h,
            b: Vec::new(),
            i,
            values,
            nvals,
        }
    }

    /// Replaces the values with a single value shared by every entry
    pub fn into_iso(mut self, value: T) -> Self {
        self.values = Values::Iso(value);
        self
    }

    /// Drops the values, keeping only the pattern
    pub fn into_pattern(mut self) -> Self {
        self.values = Values::Pattern;
        self
    }

    pub fn n_rows(&self) -> usize {
        self.vlen
    }

    pub fn n_cols(&self) -> usize {
        self.vdim
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.vlen, self.vdim)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Number of entries present
    pub fn nnz(&self) -> usize {
        self.nvals
    }

    pub fn nvec(&self) -> usize {
        self.structure().nvec()
    }

    pub fn is_iso(&self) -> bool {
        matches!(self.values, Values::Iso(_))
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self.values, Values::Pattern)
    }

    pub fn values(&self) -> &Values<T> {
        &self.values
    }

    /// Column pointers (sparse and hypersparse only)
    pub fn col_ptr(&self) -> &[usize] {
        &self.p
    }

    /// Row indices (sparse and hypersparse only)
    pub fn row_idx(&self) -> &[usize] {
        &self.i
    }

    /// Column ids of the stored vectors (hypersparse only)
    pub fn col_ids(&self) -> &[usize] {
        &self.h
    }

    pub fn structure(&self) -> Structure<'_> {
        Structure {
            format: self.format,
            vlen: self.vlen,
            vdim: self.vdim,
            nvals: self.nvals,
            p: &self.p,
            h: &self.h,
            b: &self.b,
            i: &self.i,
        }
    }

    pub(crate) fn value_view(&self) -> ValueView<'_, T> {
        match &self.values {
            Values::Full(x) => ValueView::Full(x),
            Values::Iso(v) => ValueView::Iso(*v),
            Values::Pattern => ValueView::Pattern,
        }
    }

    /// Value stored at a position of the structure
    #[inline]
    pub fn value_at(&self, pos: usize) -> T {
        self.value_view().get(pos)
    }

    /// Returns the entry `(i, j)` if present
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i >= self.vlen {
            return None;
        }
        let s = self.structure();
        let range = s.lookup(j)?;
        match self.format {
            Format::Sparse | Format::Hypersparse => {
                let column = &self.i[range.clone()];
                column
                    .binary_search(&i)
                    .ok()
                    .map(|offset| self.value_at(range.start + offset))
            }
            Format::Bitmap | Format::Full => {
                let pos = range.start + i;
                s.present(pos).then(|| self.value_at(pos))
            }
        }
    }

    /// Iterates over the entries of column `j` as `(row, value)` pairs
    pub fn column_iter(&self, j: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let s = self.structure();
        let range = s.lookup(j).unwrap_or(0..0);
        range
            .filter(move |&pos| s.present(pos))
            .map(move |pos| (s.index(pos), self.value_at(pos)))
    }

    /// All entries as `(row, col, value)`, ordered by column then row
    pub fn triplets(&self) -> Vec<(usize, usize, T)> {
        let s = self.structure();
        let mut out = Vec::with_capacity(self.nvals);
        for k in 0..s.nvec() {
            let j = s.vector_id(k);
            for pos in s.vector_range(k) {
                if s.present(pos) {
                    out.push((s.index(pos), j, self.value_at(pos)));
                }
            }
        }
        out
    }

    /// Removes empty vectors from a hypersparse matrix
    pub(crate) fn prune_empty_vectors(&mut self) {
        if self.format != Format::Hypersparse {
            return;
        }
        let mut kept = 0;
        for k in 0..self.h.len() {
            let (start, end) = (self.p[k], self.p[k + 1]);
            if start < end {
                self.h[kept] = self.h[k];
                self.p[kept] = start;
                kept += 1;
            }
        }
        self.p[kept] = self.i.len();
        self.h.truncate(kept);
        self.p.truncate(kept + 1);
    }
}

impl<T: Arith> SparseMatrix<T> {
    /// Creates an identity matrix of the given size
    pub fn identity(n: usize) -> Self {
        let col_ptr = (0..=n).collect();
        let row_idx = (0..n).collect();
        Self::new(n, n, col_ptr, row_idx, vec![T::ONE; n])
    }
}

impl<T: Scalar> fmt::Debug for SparseMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseMatrix {{")?;
        writeln!(f, "  dimensions: {} × {}", self.vlen, self.vdim)?;
        writeln!(f, "  format: {}", self.format.name())?;
        writeln!(f, "  nnz: {}", self.nvals)?;
        match &self.values {
            Values::Iso(v) => writeln!(f, "  iso value: {:?}", v)?,
            Values::Pattern => writeln!(f, "  pattern only")?,
            Values::Full(_) => {}
        }

        let s = self.structure();
        let max_vectors_to_print = s.nvec().min(5);
        if max_vectors_to_print > 0 {
            writeln!(f, "  content sample:")?;
            for k in 0..max_vectors_to_print {
                write!(f, "    col {}: ", s.vector_id(k))?;
                let entries: Vec<usize> = s.vector_range(k).filter(|&pos| s.present(pos)).collect();
                if entries.is_empty() {
                    writeln!(f, "(empty)")?;
                    continue;
                }
                let max_elements = entries.len().min(5);
                for &pos in &entries[..max_elements] {
                    write!(f, "({}, {:?}) ", s.index(pos), self.value_at(pos))?;
                }
                if entries.len() > max_elements {
                    write!(f, "... ({} more)", entries.len() - max_elements)?;
                }
                writeln!(f)?;
            }
            if s.nvec() > max_vectors_to_print {
                writeln!(f, "    ... ({} more columns)", s.nvec() - max_vectors_to_print)?;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix<i32> {
        // [1 0 4]
        // [0 3 0]
        // [2 0 5]
        SparseMatrix::new(3, 3, vec![0, 2, 3, 5], vec![0, 2, 1, 0, 2], vec![1, 2, 3, 4, 5])
    }

    #[test]
    fn test_new_matrix() {
        let m = sample();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.nnz(), 5);
        assert_eq!(m.get(2, 0), Some(2));
        assert_eq!(m.get(1, 0), None);
        assert_eq!(m.column_iter(2).collect::<Vec<_>>(), vec![(0, 4), (2, 5)]);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_unsorted_rows_rejected() {
        SparseMatrix::new(3, 1, vec![0, 2], vec![2, 0], vec![1, 2]);
    }

    #[test]
    fn test_from_triplets_combines_duplicates() {
        let m = SparseMatrix::from_triplets(2, 2, &[(1, 1, 3), (0, 1, 1), (1, 1, 4)], |a, b| a + b)
            .unwrap();
        assert_eq!(m.triplets(), vec![(0, 1, 1), (1, 1, 7)]);
        assert!(SparseMatrix::from_triplets(2, 2, &[(2, 0, 1)], |a: &i32, _| *a).is_err());
    }

    #[test]
    fn test_hypersparse_lookup() {
        let m = SparseMatrix::hypersparse(
            4,
            100,
            vec![3, 70],
            vec![0, 1, 3],
            vec![2, 0, 3],
            Values::Full(vec![1.0, 2.0, 3.0]),
        )
        .unwrap();
        assert_eq!(m.nvec(), 2);
        assert_eq!(m.get(2, 3), Some(1.0));
        assert_eq!(m.get(3, 70), Some(3.0));
        assert_eq!(m.get(0, 4), None);
        assert!(m.structure().lookup(5).is_none());
    }

    #[test]
    fn test_bitmap_and_full() {
        let b = SparseMatrix::bitmap(
            2,
            2,
            vec![true, false, false, true],
            Values::Full(vec![1u8, 0, 0, 4]),
        )
        .unwrap();
        assert_eq!(b.nnz(), 2);
        assert_eq!(b.get(1, 1), Some(4));
        assert_eq!(b.get(1, 0), None);
        assert!(!b.structure().is_packed());

        let f = SparseMatrix::full(2, 2, Values::Iso(7i64)).unwrap();
        assert!(f.structure().is_packed());
        assert_eq!(f.get(1, 0), Some(7));
        assert_eq!(f.triplets().len(), 4);
    }

    #[test]
    fn test_iso_and_pattern_values() {
        let m = sample().into_iso(9);
        assert_eq!(m.get(1, 1), Some(9));
        let p = sample().into_pattern();
        assert_eq!(p.get(1, 1), Some(0));
        assert!(p.is_pattern());
    }

    #[test]
    fn test_prune_empty_vectors() {
        let mut m = SparseMatrix::hypersparse(
            3,
            10,
            vec![1, 4, 8],
            vec![0, 1, 1, 2],
            vec![0, 2],
            Values::Iso(true),
        )
        .unwrap();
        m.prune_empty_vectors();
        assert_eq!(m.col_ids(), &[1, 8]);
        assert_eq!(m.col_ptr(), &[0, 1, 2]);
        assert_eq!(m.get(2, 8), Some(true));
    }

    #[test]
    fn test_identity() {
        let m = SparseMatrix::<f64>::identity(3);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.get(1, 1), Some(1.0));
    }
}
