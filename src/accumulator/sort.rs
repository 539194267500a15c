//! Sort-based partial sums for fine tasks without atomics
//!
//! When values cannot be updated with a single compare-and-swap, each team
//! member records its products as [`Contribution`]s, sorts them by slot and
//! merges duplicates into one partial sum per slot. The team leader then
//! folds the members' partial sums into the shared value table in member
//! order, so the result does not depend on thread timing.

use crate::error::SaxpyResult;
use crate::utils::try_with_capacity;

/// One product `A(i,k) * B(k,j)` waiting to be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    /// Slot of row `i` in the team's table
    pub slot: usize,
    pub i: usize,
    pub k: usize,
    /// Position of `A(i,k)`
    pub pa: usize,
    /// Position of `B(k,j)`
    pub pb: usize,
}

/// Per-member buffers, sized once for the member's flop bound
#[derive(Debug)]
pub struct PartialSums<Z> {
    contributions: Vec<Contribution>,
    sums: Vec<(usize, Z)>,
}

impl<Z: Copy> PartialSums<Z> {
    /// Buffers for at most `flops` products
    pub fn with_capacity(flops: usize) -> SaxpyResult<Self> {
        Ok(Self {
            contributions: try_with_capacity(flops, "fine task partial products")?,
            sums: try_with_capacity(flops, "fine task partial sums")?,
        })
    }

    pub fn clear(&mut self) {
        self.contributions.clear();
        self.sums.clear();
    }

    #[inline]
    pub fn push(&mut self, contribution: Contribution) {
        debug_assert!(self.contributions.len() < self.contributions.capacity());
        self.contributions.push(contribution);
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    /// Sorts the contributions by slot and reduces each run to one sum
    ///
    /// Within a slot, products are taken in order of their position in B,
    /// which is the order a sequential saxpy would add them. Once a sum
    /// satisfies `stop`, the remaining products of its slot are not
    /// evaluated.
    pub fn reduce<M, F, S>(&mut self, multiply: M, add: F, stop: S)
    where
        M: Fn(&Contribution) -> Z,
        F: Fn(&Z, &Z) -> Z,
        S: Fn(&Z) -> bool,
    {
        self.sums.clear();
        self.contributions.sort_unstable_by_key(|c| (c.slot, c.pb));

        let mut run = self.contributions.iter();
        let Some(first) = run.next() else { return };
        let mut current_slot = first.slot;
        let mut current = multiply(first);

        for c in run {
            if c.slot == current_slot {
                if !stop(&current) {
                    current = add(&current, &multiply(c));
                }
            } else {
                self.sums.push((current_slot, current));
                current_slot = c.slot;
                current = multiply(c);
            }
        }
        self.sums.push((current_slot, current));
    }

    /// One `(slot, sum)` per distinct slot, in slot order
    pub fn sums(&self) -> &[(usize, Z)] {
        &self.sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(slot: usize, pb: usize) -> Contribution {
        Contribution { slot, i: slot, k: pb, pa: 0, pb }
    }

    #[test]
    fn test_empty_reduce() {
        let mut partial = PartialSums::<f64>::with_capacity(4).unwrap();
        partial.reduce(|_| 1.0, |x, y| x + y, |_| false);
        assert!(partial.sums().is_empty());
        assert!(partial.is_empty());
    }

    #[test]
    fn test_reduce_merges_slots() {
        let mut partial = PartialSums::<i64>::with_capacity(6).unwrap();
        for (slot, pb) in [(3, 0), (1, 1), (3, 2), (1, 3), (5, 4), (3, 5)] {
            partial.push(contribution(slot, pb));
        }
        assert_eq!(partial.len(), 6);
        // Each product is worth its position in B plus one
        partial.reduce(|c| c.pb as i64 + 1, |x, y| x + y, |_| false);
        assert_eq!(partial.sums(), &[(1, 2 + 4), (3, 1 + 3 + 6), (5, 5)]);
    }

    #[test]
    fn test_reduce_stops_at_terminal() {
        let mut partial = PartialSums::<u8>::with_capacity(3).unwrap();
        for pb in 0..3 {
            partial.push(contribution(0, pb));
        }
        let evaluated = std::cell::Cell::new(0);
        partial.reduce(
            |_| {
                evaluated.set(evaluated.get() + 1);
                200
            },
            |x, y| x.saturating_add(*y),
            |x| *x == u8::MAX,
        );
        assert_eq!(partial.sums(), &[(0, u8::MAX)]);
        assert_eq!(evaluated.get(), 2);

        partial.clear();
        assert!(partial.is_empty());
    }
}
