//! Accumulator tables for the saxpy kernels
//!
//! A coarse task owns its table outright and walks its columns one after
//! another, reusing the table by bumping an epoch mark instead of clearing
//! it. A fine team shares one table between its members, so those tables
//! are made of atomics and every state change is a compare-and-swap.
//!
//! Both flavours come in a dense Gustavson form, indexed directly by row,
//! and an open-addressing hash form for columns that touch few rows.

pub mod atomic;
pub mod dense;
pub mod hash;
pub mod sort;

pub use dense::{CoarseGustavson, SharedGustavson};
pub use hash::{CoarseHash, SharedHash};
pub use sort::{Contribution, PartialSums};

use crate::constants::HASH_MULTIPLIER;

/// Outcome of offering row `i` to a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// First product for this row in the current column; holds the slot
    Fresh(usize),
    /// The row already holds a product; holds the slot
    Seen(usize),
    /// The mask rules the row out
    Blocked,
}

impl Claim {
    pub fn slot(&self) -> Option<usize> {
        match *self {
            Claim::Fresh(slot) | Claim::Seen(slot) => Some(slot),
            Claim::Blocked => None,
        }
    }
}

/// How the mask scattered into a table is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskRule {
    /// Nothing was scattered
    Unmasked,
    /// Only scattered rows may appear
    Allowed,
    /// Scattered rows may not appear
    Forbidden,
}

/// Home slot of row `i` in a power-of-two table
#[inline]
pub fn hash_slot(i: usize, size: usize) -> usize {
    i.wrapping_mul(HASH_MULTIPLIER) & (size - 1)
}

/// A table owned by one coarse task
pub trait CoarseTable {
    /// Starts a new column; everything from earlier columns reads as absent
    fn next_vector(&mut self);

    /// Records that row `i` is a mask entry of the current column
    fn scatter_mask(&mut self, i: usize);

    fn claim(&mut self, i: usize, rule: MaskRule) -> Claim;

    /// Slot of a row claimed in the current column
    fn find(&self, i: usize) -> usize;

    /// Current epoch, to resume the table in a later phase
    fn epoch(&self) -> u64;

    /// Sorts the rows claimed in the current column
    ///
    /// `rows` holds every claimed row, in any order.
    fn sort_rows(&self, rows: &mut [usize]);
}

/// A table shared by the members of a fine team
pub trait SharedTable: Sync {
    /// Records mask row `i`; only the leader calls this, before any claim
    fn scatter_mask(&self, i: usize);

    fn claim(&self, i: usize, rule: MaskRule) -> Claim;

    /// Slot of row `i` if it was claimed
    fn slot_of(&self, i: usize) -> Option<usize>;

    /// Marks a claimed slot as holding a value; true for the first caller
    fn try_fill(&self, slot: usize) -> bool;

    /// Forgets which slots hold values, keeping the claims
    fn reset_fills(&self);

    /// Writes the claimed rows into `rows` in ascending order
    ///
    /// `rows.len()` must equal the number of claimed rows.
    fn gather_rows(&self, rows: &mut [usize]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_slot_stays_in_table() {
        for size in [1usize, 2, 4, 64, 1024] {
            for i in 0..5000 {
                assert!(hash_slot(i, size) < size);
            }
        }
        assert_eq!(hash_slot(1, 1024), 257);
        assert_eq!(hash_slot(4, 1024), 4 * 257 - 1024);
    }

    #[test]
    fn test_claim_slot() {
        assert_eq!(Claim::Fresh(3).slot(), Some(3));
        assert_eq!(Claim::Seen(7).slot(), Some(7));
        assert_eq!(Claim::Blocked.slot(), None);
    }
}
