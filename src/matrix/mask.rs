//! Write masks for `C<M> = A*B`

use std::fmt;

use crate::ops::Scalar;

use super::sparse::{SparseMatrix, Structure, Values};

/// Truth values of mask entries, independent of the mask's element type
pub trait MaskValues: Sync {
    /// Whether the value at `pos` reads as true
    fn is_true(&self, pos: usize) -> bool;
}

impl<T: Scalar> MaskValues for SparseMatrix<T> {
    #[inline]
    fn is_true(&self, pos: usize) -> bool {
        match &self.values {
            Values::Full(x) => x[pos].is_truthy(),
            Values::Iso(v) => v.is_truthy(),
            Values::Pattern => true,
        }
    }
}

/// A mask over the output
///
/// An output entry `(i, j)` is allowed when `M(i,j)` is present (and true,
/// unless the mask is structural), or, for a complemented mask, when it is
/// not.
#[derive(Clone, Copy)]
pub struct Mask<'a> {
    structure: Structure<'a>,
    values: &'a dyn MaskValues,
    complement: bool,
    structural: bool,
}

impl<'a> Mask<'a> {
    /// A valued, non-complemented mask
    pub fn new<T: Scalar>(m: &'a SparseMatrix<T>) -> Self {
        Self {
            structure: m.structure(),
            values: m,
            complement: false,
            structural: m.is_pattern(),
        }
    }

    /// Flip the sense of the mask
    pub fn complement(mut self) -> Self {
        self.complement = !self.complement;
        self
    }

    /// Use only the pattern of the mask, ignoring its values
    pub fn structural(mut self) -> Self {
        self.structural = true;
        self
    }

    pub fn is_complemented(&self) -> bool {
        self.complement
    }

    pub fn is_structural(&self) -> bool {
        self.structural
    }

    pub fn structure(&self) -> Structure<'a> {
        self.structure
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.structure.vlen, self.structure.vdim)
    }

    /// Whether the entry at `pos` is a true mask entry, ignoring complement
    #[inline]
    pub fn entry_is_set(&self, pos: usize) -> bool {
        self.structure.present(pos) && (self.structural || self.values.is_true(pos))
    }

    /// Whether `(i, j)` is allowed in a packed mask
    #[inline]
    pub fn packed_allows(&self, i: usize, j: usize) -> bool {
        self.entry_is_set(self.structure.packed_position(i, j)) != self.complement
    }

    /// Whether the output entry `(i, j)` is allowed
    pub fn allows(&self, i: usize, j: usize) -> bool {
        let set = match self.structure.lookup(j) {
            Some(range) => match self.structure.format {
                super::Format::Sparse | super::Format::Hypersparse => self.structure.i[range.clone()]
                    .binary_search(&i)
                    .map(|offset| self.entry_is_set(range.start + offset))
                    .unwrap_or(false),
                super::Format::Bitmap | super::Format::Full => {
                    i < self.structure.vlen && self.entry_is_set(range.start + i)
                }
            },
            None => false,
        };
        set != self.complement
    }
}

impl fmt::Debug for Mask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("shape", &self.shape())
            .field("format", &self.structure.format)
            .field("nvals", &self.structure.nvals)
            .field("complement", &self.complement)
            .field("structural", &self.structural)
            .finish()
    }
}

/// Keeps only the entries of `t` that the mask allows
pub fn apply_mask<Z: Scalar>(t: &SparseMatrix<Z>, mask: &Mask<'_>) -> SparseMatrix<Z> {
    let mut col_ptr = Vec::with_capacity(t.n_cols() + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    col_ptr.push(0);
    for j in 0..t.n_cols() {
        for (i, z) in t.column_iter(j) {
            if mask.allows(i, j) {
                row_idx.push(i);
                values.push(z);
            }
        }
        col_ptr.push(row_idx.len());
    }
    let values = match t.values() {
        Values::Iso(v) => Values::Iso(*v),
        _ => Values::Full(values),
    };
    SparseMatrix::from_parts(
        t.n_rows(),
        t.n_cols(),
        super::Format::Sparse,
        col_ptr,
        Vec::new(),
        row_idx,
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal_mask() -> SparseMatrix<u8> {
        // Entry (1,1) is present but false
        SparseMatrix::new(3, 3, vec![0, 1, 2, 3], vec![0, 1, 2], vec![1, 0, 1])
    }

    #[test]
    fn test_valued_mask() {
        let m = diagonal_mask();
        let mask = Mask::new(&m);
        assert!(mask.allows(0, 0));
        assert!(!mask.allows(1, 1));
        assert!(!mask.allows(0, 1));
    }

    #[test]
    fn test_structural_and_complement() {
        let m = diagonal_mask();
        let structural = Mask::new(&m).structural();
        assert!(structural.allows(1, 1));
        let complement = Mask::new(&m).complement();
        assert!(complement.allows(1, 1));
        assert!(complement.allows(2, 0));
        assert!(!complement.allows(2, 2));
        assert!(!Mask::new(&m).complement().complement().allows(1, 1));
    }

    #[test]
    fn test_apply_mask() {
        let t = SparseMatrix::new(3, 3, vec![0, 2, 3, 4], vec![0, 2, 1, 2], vec![5, 6, 7, 8]);
        let m = diagonal_mask();
        let masked = apply_mask(&t, &Mask::new(&m));
        assert_eq!(masked.triplets(), vec![(0, 0, 5), (2, 2, 8)]);
    }

    #[test]
    fn test_packed_mask() {
        let m = SparseMatrix::full(2, 2, Values::Full(vec![true, false, true, true])).unwrap();
        let mask = Mask::new(&m);
        assert!(mask.packed_allows(0, 0));
        assert!(!mask.packed_allows(1, 0));
        assert!(mask.complement().packed_allows(1, 0));
    }
}
