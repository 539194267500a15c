//! Symbolic phase: count the entries of every column of C
//!
//! Coarse tasks count their columns directly. The members of a fine team
//! each count the rows they were first to claim in the shared table, and the
//! team's column count is the sum over its members. Column pointers are the
//! exclusive scan of the counts.

use tracing::trace;

use crate::accumulator::{Claim, CoarseGustavson, CoarseHash, CoarseTable, SharedTable};
use crate::error::SaxpyResult;
use crate::parallel::for_each_indexed;
use crate::schedule::{CoarseSlices, FineSlices, StructureArena, TableMethod, Task};
use crate::utils::{exclusive_scan, split_ranges_mut, try_filled};

use super::{team_of, teams, with_shared_table, PhaseContext};

/// Column pointers of C and the table epochs the coarse tasks reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SymbolicCounts {
    pub cp: Vec<usize>,
    pub coarse_epochs: Vec<u64>,
}

impl SymbolicCounts {
    pub fn nnz(&self) -> usize {
        self.cp.last().copied().unwrap_or(0)
    }
}

enum Work<'w> {
    Fine {
        task: &'w Task,
        table: FineSlices<'w>,
        count: &'w mut usize,
    },
    Coarse {
        task: &'w Task,
        slices: CoarseSlices<'w>,
        counts: &'w mut [usize],
        epoch: &'w mut u64,
    },
}

fn count_coarse<T: CoarseTable>(ctx: &PhaseContext<'_>, task: &Task, table: &mut T, counts: &mut [usize]) {
    let rule = ctx.rule();
    for (kk, count) in (task.start..task.end).zip(counts.iter_mut()) {
        table.next_vector();
        let j = ctx.b.vector_id(kk);
        if ctx.column_masked_out(j) {
            *count = 0;
            continue;
        }
        ctx.scatter(j, |i| table.scatter_mask(i));
        let mut cjnz = 0;
        ctx.for_each_product(ctx.b.vector_range(kk), |i, _, _, _| {
            if let Claim::Fresh(_) = ctx.claim_coarse(table, i, j, rule) {
                cjnz += 1;
            }
        });
        *count = cjnz;
    }
}

fn count_fine<T: SharedTable>(ctx: &PhaseContext<'_>, task: &Task, table: &T) -> usize {
    let Some(kk) = task.vector else { return 0 };
    let j = ctx.b.vector_id(kk);
    let rule = ctx.rule();
    let mut fresh = 0;
    ctx.for_each_product(task.start..task.end, |i, _, _, _| {
        if let Claim::Fresh(_) = ctx.claim_shared(table, i, j, rule) {
            fresh += 1;
        }
    });
    fresh
}

/// Runs the symbolic phase over every task
pub(crate) fn count_entries(ctx: &PhaseContext<'_>, arena: &mut StructureArena) -> SaxpyResult<SymbolicCounts> {
    let tasks = ctx.tasks;
    let mut counts = try_filled(ctx.b.nvec(), 0usize, "column counts")?;
    let mut member_counts = try_filled(tasks.nfine, 0usize, "fine task counts")?;
    let mut coarse_epochs = try_filled(tasks.coarse().len(), 0u64, "coarse table epochs")?;
    let teams = teams(tasks);
    let team_of = team_of(tasks);
    let (coarse_tables, fine_tables) = arena.split_mut();

    // Leaders scatter the mask before any member claims a row
    let scatters: Vec<_> = teams.iter().zip(&fine_tables).collect();
    for_each_indexed(ctx.parallel, scatters, |_, (team, table)| {
        let j = ctx.b.vector_id(team.vector);
        with_shared_table!(*table, |shared| ctx.scatter(j, |i| shared.scatter_mask(i)));
    });

    let mut work = Vec::with_capacity(tasks.len());
    for ((task, count), team) in tasks.fine().iter().zip(member_counts.iter_mut()).zip(&team_of) {
        work.push(Work::Fine { task, table: fine_tables[*team], count });
    }
    let coarse_counts = split_ranges_mut(&mut counts, tasks.coarse().iter().map(|t| t.start..t.end));
    let coarse = tasks.coarse().iter().zip(coarse_tables).zip(coarse_counts).zip(coarse_epochs.iter_mut());
    for (((task, slices), counts), epoch) in coarse {
        work.push(Work::Coarse { task, slices, counts, epoch });
    }

    for_each_indexed(ctx.parallel, work, |_, item| match item {
        Work::Fine { task, table, count } => {
            *count = with_shared_table!(table, |shared| count_fine(ctx, task, shared));
        }
        Work::Coarse { task, slices, counts, epoch } => {
            *epoch = match task.method {
                TableMethod::Gustavson => {
                    let mut table = CoarseGustavson::new(slices.marks, task.hash_size, 0);
                    count_coarse(ctx, task, &mut table, counts);
                    table.epoch()
                }
                TableMethod::Hash => {
                    let mut table = CoarseHash::new(slices.marks, slices.rows, task.hash_size, 0);
                    count_coarse(ctx, task, &mut table, counts);
                    table.epoch()
                }
            };
        }
    });

    for team in &teams {
        counts[team.vector] = member_counts[team.members.clone()].iter().sum();
    }
    let cp = exclusive_scan(&counts);
    trace!(cnz = cp.last().copied().unwrap_or(0), "symbolic phase done");
    Ok(SymbolicCounts { cp, coarse_epochs })
}
