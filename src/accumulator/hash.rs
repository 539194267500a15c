//! Open-addressing accumulator tables
//!
//! Rows are placed at `hash_slot(i, size)` and collisions probe linearly.
//! Table sizes are powers of two at least twice the flops of any column the
//! table serves, so a probe always finds a free slot.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{hash_slot, Claim, CoarseTable, MaskRule, SharedTable};

/// Hash table of a coarse task
///
/// `marks` follows the epoch scheme of the Gustavson table; a slot whose
/// mark is below the current epoch is free. `rows` holds the row stored in
/// each live slot.
pub struct CoarseHash<'a> {
    marks: &'a mut [u64],
    rows: &'a mut [usize],
    mark: u64,
    bits: usize,
}

impl<'a> CoarseHash<'a> {
    /// Uses the first `size` slots, resuming from `epoch`
    pub fn new(marks: &'a mut [u64], rows: &'a mut [usize], size: usize, epoch: u64) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            marks: &mut marks[..size],
            rows: &mut rows[..size],
            mark: epoch,
            bits: size - 1,
        }
    }

    /// Slot of row `i`, or the free slot where it would go
    #[inline]
    fn probe(&self, i: usize) -> (usize, bool) {
        let mut h = hash_slot(i, self.bits + 1);
        loop {
            if self.marks[h] < self.mark {
                return (h, false);
            }
            if self.rows[h] == i {
                return (h, true);
            }
            h = (h + 1) & self.bits;
        }
    }
}

impl CoarseTable for CoarseHash<'_> {
    #[inline]
    fn next_vector(&mut self) {
        self.mark += 2;
    }

    fn scatter_mask(&mut self, i: usize) {
        let (h, found) = self.probe(i);
        if !found {
            self.marks[h] = self.mark;
            self.rows[h] = i;
        }
    }

    #[inline]
    fn claim(&mut self, i: usize, rule: MaskRule) -> Claim {
        let present = self.mark + 1;
        let (h, found) = self.probe(i);
        if found && self.marks[h] == present {
            return Claim::Seen(h);
        }
        // `found` now means the row was scattered from the mask
        let allowed = match rule {
            MaskRule::Unmasked => true,
            MaskRule::Allowed => found,
            MaskRule::Forbidden => !found,
        };
        if !allowed {
            return Claim::Blocked;
        }
        self.marks[h] = present;
        self.rows[h] = i;
        Claim::Fresh(h)
    }

    #[inline]
    fn find(&self, i: usize) -> usize {
        self.probe(i).0
    }

    fn epoch(&self) -> u64 {
        self.mark
    }

    fn sort_rows(&self, rows: &mut [usize]) {
        rows.sort_unstable();
    }
}

const EMPTY_WORD: u64 = 0;
const STATE_BITS: u64 = 0b11;
const MASKED: u64 = 1;
const PRESENT: u64 = 2;
const FILLED: u64 = 3;

#[inline]
fn pack(i: usize, state: u64) -> u64 {
    ((i as u64 + 1) << 2) | state
}

#[inline]
fn row_of(word: u64) -> usize {
    ((word >> 2) - 1) as usize
}

/// Hash table shared by a fine team
///
/// Each slot is one word holding `(row + 1) << 2 | state`, so zero is a
/// free slot and a row and its state change together.
pub struct SharedHash<'a> {
    slots: &'a [AtomicU64],
    bits: usize,
}

impl<'a> SharedHash<'a> {
    pub fn new(slots: &'a [AtomicU64]) -> Self {
        debug_assert!(slots.len().is_power_of_two());
        Self { slots, bits: slots.len() - 1 }
    }

    /// Slot and word of row `i`, if it is in the table
    #[inline]
    fn locate(&self, i: usize) -> Option<(usize, u64)> {
        let mut h = hash_slot(i, self.slots.len());
        loop {
            let word = self.slots[h].load(Ordering::Acquire);
            if word == EMPTY_WORD {
                return None;
            }
            if row_of(word) == i {
                return Some((h, word));
            }
            h = (h + 1) & self.bits;
        }
    }

    fn claim_found(&self, h: usize, word: u64, i: usize, rule: MaskRule) -> Claim {
        if word & STATE_BITS != MASKED {
            return Claim::Seen(h);
        }
        match rule {
            MaskRule::Allowed => {
                let swapped = self.slots[h].compare_exchange(
                    word,
                    pack(i, PRESENT),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                match swapped {
                    Ok(_) => Claim::Fresh(h),
                    Err(_) => Claim::Seen(h),
                }
            }
            MaskRule::Forbidden | MaskRule::Unmasked => Claim::Blocked,
        }
    }
}

impl SharedTable for SharedHash<'_> {
    fn scatter_mask(&self, i: usize) {
        let mut h = hash_slot(i, self.slots.len());
        loop {
            let word = self.slots[h].load(Ordering::Relaxed);
            if word == EMPTY_WORD {
                self.slots[h].store(pack(i, MASKED), Ordering::Relaxed);
                return;
            }
            if row_of(word) == i {
                return;
            }
            h = (h + 1) & self.bits;
        }
    }

    fn claim(&self, i: usize, rule: MaskRule) -> Claim {
        let mut h = hash_slot(i, self.slots.len());
        loop {
            let mut word = self.slots[h].load(Ordering::Acquire);
            if word == EMPTY_WORD {
                if rule == MaskRule::Allowed {
                    return Claim::Blocked;
                }
                match self.slots[h].compare_exchange(
                    EMPTY_WORD,
                    pack(i, PRESENT),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return Claim::Fresh(h),
                    // Another member took the slot first; look at what it wrote
                    Err(actual) => word = actual,
                }
            }
            if row_of(word) == i {
                return self.claim_found(h, word, i, rule);
            }
            h = (h + 1) & self.bits;
        }
    }

    #[inline]
    fn slot_of(&self, i: usize) -> Option<usize> {
        self.locate(i)
            .filter(|&(_, word)| word & STATE_BITS >= PRESENT)
            .map(|(h, _)| h)
    }

    #[inline]
    fn try_fill(&self, slot: usize) -> bool {
        let word = self.slots[slot].load(Ordering::Acquire);
        word & STATE_BITS == PRESENT
            && self.slots[slot]
                .compare_exchange(word, word | FILLED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    fn reset_fills(&self) {
        for slot in self.slots {
            let word = slot.load(Ordering::Relaxed);
            if word & STATE_BITS == FILLED {
                slot.store((word & !STATE_BITS) | PRESENT, Ordering::Relaxed);
            }
        }
    }

    fn gather_rows(&self, rows: &mut [usize]) {
        let claimed = self.slots.iter().filter_map(|slot| {
            let word = slot.load(Ordering::Acquire);
            (word != EMPTY_WORD && word & STATE_BITS >= PRESENT).then(|| row_of(word))
        });
        for (dst, i) in rows.iter_mut().zip(claimed) {
            *dst = i;
        }
        rows.sort_unstable();
    }
}
