//! Numeric phase of a coarse task
//!
//! A coarse task computes whole columns of C on its own. Each column is
//! accumulated in the task's table, its rows are written straight into the
//! task's part of `Ci` as they are first claimed, and once the column is
//! complete the rows are sorted and the values copied out of the table.

use crate::accumulator::{Claim, CoarseTable};
use crate::ops::{Scalar, SemiringOps};
use crate::schedule::Task;

use super::{Multiplier, PhaseContext};

/// Where a coarse task writes its columns
pub(crate) struct CoarseOutput<'c, Z> {
    /// Entries `cp[task.start]..cp[task.end]` of `Ci`
    pub ci: &'c mut [usize],
    /// The same entries of `Cx`; empty when C is iso
    pub cx: &'c mut [Z],
}

/// Computes the columns of one coarse task
///
/// `hx` is the task's value table, empty when C is iso.
pub(crate) fn compute_coarse<A, B, Z, O, T>(
    ctx: &PhaseContext<'_>,
    mul: &Multiplier<'_, '_, A, B, Z, O>,
    task: &Task,
    cp: &[usize],
    table: &mut T,
    hx: &mut [Z],
    out: CoarseOutput<'_, Z>,
) where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
    O: SemiringOps<A, B, Z>,
    T: CoarseTable,
{
    let with_values = !hx.is_empty();
    let rule = ctx.rule();
    let base = cp[task.start];

    for kk in task.start..task.end {
        table.next_vector();
        let (lo, hi) = (cp[kk] - base, cp[kk + 1] - base);
        if lo == hi {
            continue;
        }
        let j = ctx.b.vector_id(kk);
        ctx.scatter(j, |i| table.scatter_mask(i));

        let rows = &mut out.ci[lo..hi];
        let mut n = 0;
        ctx.for_each_product(ctx.b.vector_range(kk), |i, k, pa, pb| {
            match ctx.claim_coarse(table, i, j, rule) {
                Claim::Fresh(slot) => {
                    rows[n] = i;
                    n += 1;
                    if with_values {
                        hx[slot] = mul.product(pa, pb, i, k, j);
                    }
                }
                Claim::Seen(slot) if with_values && !mul.done(&hx[slot]) => {
                    let t = mul.product(pa, pb, i, k, j);
                    hx[slot] = mul.add(&hx[slot], &t);
                }
                _ => {}
            }
        });
        debug_assert_eq!(n, hi - lo);

        table.sort_rows(rows);
        if with_values {
            for (x, &i) in out.cx[lo..hi].iter_mut().zip(rows.iter()) {
                *x = hx[table.find(i)];
            }
        }
    }
}
