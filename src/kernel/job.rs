//! The numeric job handed to the kernel tiers
//!
//! A [`NumericJob`] is everything the numeric phase needs once the symbolic
//! phase is done: the operands, the mask, the task list, the claimed tables
//! and the column pointers of C. Any tier may run it with its own
//! [`SemiringOps`]; running it again gives the same result.

use std::fmt;
use std::sync::atomic::AtomicU64;

use tracing::{debug, trace};

use crate::accumulator::{CoarseGustavson, CoarseHash, CoarseTable, PartialSums, SharedTable};
use crate::error::SaxpyResult;
use crate::matrix::{Mask, PlatformAtomics, SparseMatrix, Values};
use crate::ops::{Scalar, SemiringOps};
use crate::parallel::for_each_indexed;
use crate::schedule::{
    CoarseSlices, FineSlices, FineValueTables, StructureArena, TableMethod, Task, TaskList, ValueArena,
    WorkspacePlan,
};
use crate::utils::try_filled;

use super::coarse::{compute_coarse, CoarseOutput};
use super::fine::{accumulate_atomic, collect_partials, gather_team, TeamValues};
use super::symbolic::{count_entries, SymbolicCounts};
use super::{iso_output, team_of, teams, with_shared_table, MaskMode, Multiplier, OutputLayout, PhaseContext, Team};

/// Row indices and values of C, in the column order fixed by the job
#[derive(Debug, Clone, PartialEq)]
pub struct NumericOutput<Z> {
    pub ci: Vec<usize>,
    pub values: Values<Z>,
}

/// Knobs of the numeric phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JobSettings {
    pub parallel: bool,
    pub atomics: bool,
    pub terminal_exit: bool,
    pub workspace_limit: Option<usize>,
}

/// A product whose structure is known and whose values are still to come
pub struct NumericJob<'a, A, B> {
    a: &'a SparseMatrix<A>,
    b: &'a SparseMatrix<B>,
    core: JobCore<'a>,
}

/// The part of a job that does not depend on the value types
pub(crate) struct JobCore<'a> {
    mask: Option<Mask<'a>>,
    mask_mode: MaskMode,
    tasks: TaskList,
    plan: WorkspacePlan,
    arena: StructureArena,
    counts: SymbolicCounts,
    settings: JobSettings,
    runs: usize,
}

enum Work<'w, Z> {
    Coarse {
        task: &'w Task,
        slices: CoarseSlices<'w>,
        epoch: &'w mut u64,
        hx: &'w mut [Z],
        out: CoarseOutput<'w, Z>,
    },
    Fine {
        task: &'w Task,
        table: FineSlices<'w>,
        words: Option<&'w [AtomicU64]>,
        partial: &'w mut PartialSums<Z>,
    },
}

struct TeamWork<'w, Z> {
    team: &'w Team,
    table: FineSlices<'w>,
    values: TeamValues<'w, Z>,
    ci: &'w mut [usize],
    cx: &'w mut [Z],
}

impl<'a, A: Scalar, B: Scalar> NumericJob<'a, A, B> {
    /// Allocates the tables and runs the symbolic phase
    pub(crate) fn prepare(
        a: &'a SparseMatrix<A>,
        b: &'a SparseMatrix<B>,
        mask: Option<Mask<'a>>,
        mask_mode: MaskMode,
        tasks: TaskList,
        settings: JobSettings,
    ) -> SaxpyResult<Self> {
        let plan = WorkspacePlan::new(&tasks);
        plan.check_limit(settings.workspace_limit, 0, false)?;
        let mut arena = StructureArena::allocate(&plan)?;
        let ctx = PhaseContext {
            a: a.structure(),
            b: b.structure(),
            mask,
            mask_mode,
            tasks: &tasks,
            parallel: settings.parallel,
        };
        let counts = count_entries(&ctx, &mut arena)?;
        debug!(cnz = counts.nnz(), ntasks = tasks.len(), "symbolic phase complete");
        let core = JobCore { mask, mask_mode, tasks, plan, arena, counts, settings, runs: 0 };
        Ok(Self { a, b, core })
    }

    /// Operands and the typeless core, for tiers that run with other types
    pub(crate) fn parts(&mut self) -> (&'a SparseMatrix<A>, &'a SparseMatrix<B>, &mut JobCore<'a>) {
        (self.a, self.b, &mut self.core)
    }

    pub fn a(&self) -> &'a SparseMatrix<A> {
        self.a
    }

    pub fn b(&self) -> &'a SparseMatrix<B> {
        self.b
    }

    pub fn mask(&self) -> Option<&Mask<'a>> {
        self.core.mask.as_ref()
    }

    pub fn mask_mode(&self) -> MaskMode {
        self.core.mask_mode
    }

    pub fn tasks(&self) -> &TaskList {
        &self.core.tasks
    }

    /// Column pointers of C, one per vector of B plus one
    pub fn col_ptr(&self) -> &[usize] {
        &self.core.counts.cp
    }

    /// Entries of C
    pub fn nnz(&self) -> usize {
        self.core.counts.nnz()
    }

    /// Completed numeric runs
    pub fn runs(&self) -> usize {
        self.core.runs
    }

    /// Whether fine teams would accumulate with atomics for `ops`
    pub fn uses_atomics<Z: Scalar, O: SemiringOps<A, B, Z>>(&self, ops: &O) -> bool {
        self.core.uses_atomics(ops)
    }

    /// Runs the numeric phase with the given operators
    pub fn run<Z: Scalar, O: SemiringOps<A, B, Z>>(&mut self, ops: &O) -> SaxpyResult<NumericOutput<Z>> {
        self.core.run(self.a, self.b, ops)
    }
}

impl JobCore<'_> {
    fn uses_atomics<A, B, Z: Scalar, O: SemiringOps<A, B, Z>>(&self, ops: &O) -> bool {
        self.settings.atomics
            && ops.atomic_add()
            && Z::WORD.is_some()
            && PlatformAtomics::get().supports_bits(std::mem::size_of::<Z>() * 8)
    }

    pub(crate) fn run<A, B, Z, O>(
        &mut self,
        a: &SparseMatrix<A>,
        b: &SparseMatrix<B>,
        ops: &O,
    ) -> SaxpyResult<NumericOutput<Z>>
    where
        A: Scalar,
        B: Scalar,
        Z: Scalar,
        O: SemiringOps<A, B, Z>,
    {
        let iso = iso_output(ops, a, b);
        let with_values = iso.is_none();
        let codec = Z::WORD.filter(|_| with_values && self.uses_atomics(ops));
        let value_size = std::mem::size_of::<Z>();
        self.plan.check_limit(self.settings.workspace_limit, value_size, with_values)?;

        let atomic_identity = codec.map(|c| (c.pack)(ops.identity()));
        let mut value_arena = ValueArena::<Z>::allocate(&self.plan, with_values, atomic_identity)?;

        let serialized = with_values && codec.is_none();
        let mut partials = Vec::with_capacity(self.tasks.nfine);
        for task in self.tasks.fine() {
            let capacity = if serialized { task.flops } else { 0 };
            partials.push(PartialSums::<Z>::with_capacity(capacity)?);
        }

        let cnz = self.counts.nnz();
        let mut ci = try_filled(cnz, 0usize, "C row indices")?;
        let mut cx = if with_values { try_filled(cnz, Z::default(), "C values")? } else { Vec::new() };

        trace!(
            atomic = codec.is_some(),
            iso = iso.is_some(),
            run = self.runs,
            "numeric phase"
        );

        let tasks = &self.tasks;
        let cp = &self.counts.cp;
        let ctx = PhaseContext {
            a: a.structure(),
            b: b.structure(),
            mask: self.mask,
            mask_mode: self.mask_mode,
            tasks,
            parallel: self.settings.parallel,
        };
        let mul = Multiplier::new(ops, a, b, self.settings.terminal_exit);
        let teams = teams(tasks);
        let team_of = team_of(tasks);
        let layout = OutputLayout::new(tasks, &teams, cp);
        let (coarse_ci, team_ci) = layout.split(&mut ci);
        let (coarse_cx, team_cx) = layout.split(&mut cx);

        let (coarse_tables, fine_tables) = self.arena.split_mut();
        if self.runs > 0 {
            for table in &fine_tables {
                with_shared_table!(*table, |shared| shared.reset_fills());
            }
        }
        let (coarse_hx, fine_values) = value_arena.split_mut();
        let (fine_words, fine_plain) = match fine_values {
            FineValueTables::Atomic(words) => (Some(words), None),
            FineValueTables::Serialized(plain) => (None, Some(plain)),
            FineValueTables::None => (None, None),
        };

        // Members and coarse tasks
        let mut work = Vec::with_capacity(tasks.len());
        for ((task, partial), &team) in tasks.fine().iter().zip(partials.iter_mut()).zip(&team_of) {
            work.push(Work::Fine {
                task,
                table: fine_tables[team],
                words: fine_words.as_ref().map(|w| w[team]),
                partial,
            });
        }
        let coarse = tasks
            .coarse()
            .iter()
            .zip(coarse_tables)
            .zip(self.counts.coarse_epochs.iter_mut())
            .zip(coarse_hx)
            .zip(coarse_ci.into_iter().zip(coarse_cx));
        for ((((task, slices), epoch), hx), (ci, cx)) in coarse {
            work.push(Work::Coarse { task, slices, epoch, hx, out: CoarseOutput { ci, cx } });
        }

        for_each_indexed(ctx.parallel, work, |_, item| match item {
            Work::Coarse { task, slices, epoch, hx, out } => {
                *epoch = match task.method {
                    TableMethod::Gustavson => {
                        let mut table = CoarseGustavson::new(slices.marks, task.hash_size, *epoch);
                        compute_coarse(&ctx, &mul, task, cp, &mut table, hx, out);
                        table.epoch()
                    }
                    TableMethod::Hash => {
                        let mut table = CoarseHash::new(slices.marks, slices.rows, task.hash_size, *epoch);
                        compute_coarse(&ctx, &mul, task, cp, &mut table, hx, out);
                        table.epoch()
                    }
                };
            }
            Work::Fine { task, table, words, partial } => {
                with_shared_table!(table, |shared| match (words, codec) {
                    (Some(words), Some(codec)) => accumulate_atomic(&ctx, &mul, task, shared, words, codec),
                    _ if serialized => collect_partials(&ctx, &mul, task, shared, partial),
                    _ => {}
                });
            }
        });

        // Leaders merge and gather
        let mut plain = fine_plain.map(|p| p.into_iter());
        let mut team_work = Vec::with_capacity(teams.len());
        for ((team, (ci, cx)), index) in teams.iter().zip(team_ci.into_iter().zip(team_cx)).zip(0..) {
            let values = match (&fine_words, codec, plain.as_mut().and_then(|p| p.next())) {
                (Some(words), Some(codec), _) => TeamValues::Atomic { words: words[index], codec },
                (_, _, Some(hx)) => TeamValues::Plain(hx),
                _ => TeamValues::None,
            };
            team_work.push(TeamWork { team, table: fine_tables[index], values, ci, cx });
        }
        let partials = &partials;
        for_each_indexed(ctx.parallel, team_work, |_, tw| {
            let members = &partials[tw.team.members.clone()];
            with_shared_table!(tw.table, |shared| gather_team(&mul, shared, tw.values, members, tw.ci, tw.cx));
        });

        self.runs += 1;
        let values = match iso {
            Some(v) => Values::Iso(v),
            None => Values::Full(cx),
        };
        Ok(NumericOutput { ci, values })
    }
}

impl<A, B> fmt::Debug for NumericJob<'_, A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericJob")
            .field("shape", &(self.a.vlen, self.b.vdim))
            .field("mask", &self.core.mask)
            .field("mask_mode", &self.core.mask_mode)
            .field("ntasks", &self.core.tasks.len())
            .field("nfine", &self.core.tasks.nfine)
            .field("cnz", &self.core.counts.nnz())
            .field("runs", &self.core.runs)
            .finish()
    }
}
