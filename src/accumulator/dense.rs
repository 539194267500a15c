//! Dense (Gustavson) accumulator tables
//!
//! One flag per row of the output column. The coarse table stores epoch
//! marks so a task can move to its next column without clearing anything;
//! the shared table stores a small state per row that team members update
//! with compare-and-swap.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::constants::DENSE_GATHER_DIVISOR;

use super::{Claim, CoarseTable, MaskRule, SharedTable};

/// Gustavson table of a coarse task
///
/// For the current column, a row whose mark equals `mark` was scattered
/// from the mask and a row whose mark equals `mark + 1` holds a product.
/// Anything lower is left over from earlier columns.
pub struct CoarseGustavson<'a> {
    marks: &'a mut [u64],
    mark: u64,
}

impl<'a> CoarseGustavson<'a> {
    /// Uses the first `cvlen` marks, resuming from `epoch`
    pub fn new(marks: &'a mut [u64], cvlen: usize, epoch: u64) -> Self {
        Self { marks: &mut marks[..cvlen], mark: epoch }
    }

    #[inline]
    fn present(&self) -> u64 {
        self.mark + 1
    }
}

impl CoarseTable for CoarseGustavson<'_> {
    #[inline]
    fn next_vector(&mut self) {
        self.mark += 2;
    }

    #[inline]
    fn scatter_mask(&mut self, i: usize) {
        self.marks[i] = self.mark;
    }

    #[inline]
    fn claim(&mut self, i: usize, rule: MaskRule) -> Claim {
        let present = self.present();
        let current = self.marks[i];
        if current == present {
            return Claim::Seen(i);
        }
        let scattered = current == self.mark;
        let allowed = match rule {
            MaskRule::Unmasked => true,
            MaskRule::Allowed => scattered,
            MaskRule::Forbidden => !scattered,
        };
        if allowed {
            self.marks[i] = present;
            Claim::Fresh(i)
        } else {
            Claim::Blocked
        }
    }

    #[inline]
    fn find(&self, i: usize) -> usize {
        i
    }

    fn epoch(&self) -> u64 {
        self.mark
    }

    fn sort_rows(&self, rows: &mut [usize]) {
        let cvlen = self.marks.len();
        if rows.len() > cvlen / DENSE_GATHER_DIVISOR {
            // Dense column: a scan of the flags is cheaper than a sort
            let present = self.present();
            let hits = self.marks.iter().enumerate().filter(|(_, &m)| m == present);
            for (dst, (i, _)) in rows.iter_mut().zip(hits) {
                *dst = i;
            }
        } else {
            rows.sort_unstable();
        }
    }
}

const EMPTY: u8 = 0;
const MASKED: u8 = 1;
const PRESENT: u8 = 2;
const FILLED: u8 = 3;

/// Gustavson table shared by a fine team
///
/// Each row is `EMPTY`, `MASKED` (scattered by the leader), `PRESENT`
/// (claimed by a member) or `FILLED` (claimed and holding a value).
pub struct SharedGustavson<'a> {
    states: &'a [AtomicU8],
}

impl<'a> SharedGustavson<'a> {
    pub fn new(states: &'a [AtomicU8]) -> Self {
        Self { states }
    }

    #[inline]
    fn swap(&self, i: usize, from: u8, to: u8) -> Result<u8, u8> {
        self.states[i].compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
    }
}

impl SharedTable for SharedGustavson<'_> {
    fn scatter_mask(&self, i: usize) {
        self.states[i].store(MASKED, Ordering::Relaxed);
    }

    #[inline]
    fn claim(&self, i: usize, rule: MaskRule) -> Claim {
        let from = match rule {
            MaskRule::Allowed => MASKED,
            MaskRule::Unmasked | MaskRule::Forbidden => EMPTY,
        };
        match self.swap(i, from, PRESENT) {
            Ok(_) => Claim::Fresh(i),
            Err(PRESENT) | Err(FILLED) => Claim::Seen(i),
            Err(_) => Claim::Blocked,
        }
    }

    #[inline]
    fn slot_of(&self, i: usize) -> Option<usize> {
        (self.states[i].load(Ordering::Acquire) >= PRESENT).then_some(i)
    }

    #[inline]
    fn try_fill(&self, slot: usize) -> bool {
        self.swap(slot, PRESENT, FILLED).is_ok()
    }

    fn reset_fills(&self) {
        for state in self.states {
            if state.load(Ordering::Relaxed) == FILLED {
                state.store(PRESENT, Ordering::Relaxed);
            }
        }
    }

    fn gather_rows(&self, rows: &mut [usize]) {
        let claimed = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.load(Ordering::Acquire) >= PRESENT);
        for (dst, (i, _)) in rows.iter_mut().zip(claimed) {
            *dst = i;
        }
    }
}
