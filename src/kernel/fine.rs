//! Numeric phase of the fine teams
//!
//! Members of a team work on disjoint entries of the same column of B and
//! share one table whose rows were claimed during the symbolic phase, so a
//! member only has to look rows up. Values reach the table in one of two
//! ways:
//!
//! * atomic: each value is a packed word that members update in place with
//!   compare-and-swap;
//! * serialized: each member reduces its own products to one partial sum
//!   per row, and the leader folds the partial sums in member order.
//!
//! Either way the leader then gathers the column into its part of C.

use std::sync::atomic::AtomicU64;

use crate::accumulator::{atomic, Contribution, PartialSums, SharedTable};
use crate::ops::{Scalar, SemiringOps, WordCodec};
use crate::schedule::Task;

use super::{Multiplier, PhaseContext};

/// Value table of one team
pub(crate) enum TeamValues<'t, Z> {
    Atomic { words: &'t [AtomicU64], codec: WordCodec<Z> },
    Plain(&'t mut [Z]),
    /// C is iso
    None,
}

/// One member's share on the atomic path
pub(crate) fn accumulate_atomic<A, B, Z, O, T>(
    ctx: &PhaseContext<'_>,
    mul: &Multiplier<'_, '_, A, B, Z, O>,
    task: &Task,
    table: &T,
    words: &[AtomicU64],
    codec: WordCodec<Z>,
) where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
    O: SemiringOps<A, B, Z>,
    T: SharedTable,
{
    let Some(kk) = task.vector else { return };
    let j = ctx.b.vector_id(kk);
    ctx.for_each_product(task.start..task.end, |i, k, pa, pb| {
        let Some(slot) = table.slot_of(i) else { return };
        let word = &words[slot];
        if mul.is_any() {
            // First writer wins; the rest leave the word alone
            if table.try_fill(slot) {
                atomic::store(word, codec, mul.product(pa, pb, i, k, j));
            }
            return;
        }
        if mul.done(&atomic::load(word, codec)) {
            return;
        }
        let t = mul.product(pa, pb, i, k, j);
        atomic::accumulate(word, codec, &t, |x, y| mul.add(x, y), |x| mul.done(x));
    });
}

/// One member's share on the serialized path
pub(crate) fn collect_partials<A, B, Z, O, T>(
    ctx: &PhaseContext<'_>,
    mul: &Multiplier<'_, '_, A, B, Z, O>,
    task: &Task,
    table: &T,
    partial: &mut PartialSums<Z>,
) where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
    O: SemiringOps<A, B, Z>,
    T: SharedTable,
{
    partial.clear();
    let Some(kk) = task.vector else { return };
    let j = ctx.b.vector_id(kk);
    ctx.for_each_product(task.start..task.end, |i, k, pa, pb| {
        if let Some(slot) = table.slot_of(i) {
            partial.push(Contribution { slot, i, k, pa, pb });
        }
    });
    partial.reduce(
        |c| mul.product(c.pa, c.pb, c.i, c.k, j),
        |x, y| mul.add(x, y),
        |z| mul.done(z),
    );
}

/// Leader's share: merge partial sums, then write the column of C
///
/// `members` holds the partial sums of the team's members in member order;
/// it is only read on the serialized path.
pub(crate) fn gather_team<A, B, Z, O, T>(
    mul: &Multiplier<'_, '_, A, B, Z, O>,
    table: &T,
    values: TeamValues<'_, Z>,
    members: &[PartialSums<Z>],
    ci: &mut [usize],
    cx: &mut [Z],
) where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
    O: SemiringOps<A, B, Z>,
    T: SharedTable,
{
    let mut values = values;
    if let TeamValues::Plain(hx) = &mut values {
        for partial in members {
            for &(slot, z) in partial.sums() {
                if table.try_fill(slot) {
                    hx[slot] = z;
                } else if !mul.done(&hx[slot]) {
                    hx[slot] = mul.add(&hx[slot], &z);
                }
            }
        }
    }

    table.gather_rows(ci);
    if cx.is_empty() {
        return;
    }
    for (x, &i) in cx.iter_mut().zip(ci.iter()) {
        let Some(slot) = table.slot_of(i) else { continue };
        match &values {
            TeamValues::Atomic { words, codec } => *x = atomic::load(&words[slot], *codec),
            TeamValues::Plain(hx) => *x = hx[slot],
            TeamValues::None => {}
        }
    }
}
