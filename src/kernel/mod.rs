//! Symbolic and numeric phases of the saxpy3 product
//!
//! Both phases walk the same products `A(i,k) * B(k,j)` task by task. The
//! symbolic phase only claims rows and counts them, which fixes the column
//! pointers of C. The numeric phase claims the same rows again, this time
//! accumulating values, and writes each column of C into the slice that the
//! column pointers reserved for it.

pub mod coarse;
pub mod fine;
pub mod job;
pub mod symbolic;

pub use job::{NumericJob, NumericOutput};

use std::ops::Range;

use crate::accumulator::{Claim, CoarseTable, MaskRule, SharedTable};
use crate::matrix::sparse::ValueView;
use crate::matrix::{Mask, SparseMatrix, Structure, Values};
use crate::ops::{Scalar, SemiringOps};
use crate::schedule::TaskList;
use crate::utils::split_ranges_mut;

/// How the mask reaches the kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskMode {
    /// Each column of the mask is scattered into the task's table
    Scatter,
    /// The mask is bitmap or full and is read in place for every product
    DenseInPlace,
}

/// Runs a block with a [`SharedTable`] built over a team's flags
macro_rules! with_shared_table {
    ($slices:expr, |$table:ident| $body:expr) => {
        match $slices {
            $crate::schedule::FineSlices::Gustavson(states) => {
                let $table = &$crate::accumulator::SharedGustavson::new(states);
                $body
            }
            $crate::schedule::FineSlices::Hash(slots) => {
                let $table = &$crate::accumulator::SharedHash::new(slots);
                $body
            }
        }
    };
}
pub(crate) use with_shared_table;

/// Everything the task loops read but never write
#[derive(Clone, Copy)]
pub(crate) struct PhaseContext<'a> {
    pub a: Structure<'a>,
    pub b: Structure<'a>,
    pub mask: Option<Mask<'a>>,
    pub mask_mode: MaskMode,
    pub tasks: &'a TaskList,
    pub parallel: bool,
}

impl PhaseContext<'_> {
    /// How claims read a scattered mask
    pub fn rule(&self) -> MaskRule {
        match (self.mask, self.mask_mode) {
            (Some(mask), MaskMode::Scatter) if mask.is_complemented() => MaskRule::Forbidden,
            (Some(_), MaskMode::Scatter) => MaskRule::Allowed,
            _ => MaskRule::Unmasked,
        }
    }

    /// Calls `f(i)` for every true entry of `M(:,j)`, when the mask is scattered
    pub fn scatter<F: FnMut(usize)>(&self, j: usize, mut f: F) {
        let Some(mask) = self.mask else { return };
        if self.mask_mode != MaskMode::Scatter {
            return;
        }
        let m = mask.structure();
        for pos in m.lookup(j).unwrap_or(0..0) {
            if mask.entry_is_set(pos) {
                f(m.index(pos));
            }
        }
    }

    /// Whether a scattered, non-complemented mask leaves column `j` empty
    pub fn column_masked_out(&self, j: usize) -> bool {
        match (self.mask, self.mask_mode) {
            (Some(mask), MaskMode::Scatter) if !mask.is_complemented() => {
                mask.structure().lookup(j).map_or(true, |r| r.is_empty())
            }
            _ => false,
        }
    }

    #[inline]
    fn allows_in_place(&self, i: usize, j: usize) -> bool {
        match (self.mask, self.mask_mode) {
            (Some(mask), MaskMode::DenseInPlace) => mask.packed_allows(i, j),
            _ => true,
        }
    }

    #[inline]
    pub fn claim_coarse<T: CoarseTable>(&self, table: &mut T, i: usize, j: usize, rule: MaskRule) -> Claim {
        if self.allows_in_place(i, j) {
            table.claim(i, rule)
        } else {
            Claim::Blocked
        }
    }

    #[inline]
    pub fn claim_shared<T: SharedTable>(&self, table: &T, i: usize, j: usize, rule: MaskRule) -> Claim {
        if self.allows_in_place(i, j) {
            table.claim(i, rule)
        } else {
            Claim::Blocked
        }
    }

    /// Calls `f(i, k, pa, pb)` for every product reached from the entries
    /// `entries` of one vector of B
    #[inline]
    pub fn for_each_product<F>(&self, entries: Range<usize>, mut f: F)
    where
        F: FnMut(usize, usize, usize, usize),
    {
        let (a, b) = (&self.a, &self.b);
        for pb in entries {
            if !b.present(pb) {
                continue;
            }
            let k = b.index(pb);
            let Some(a_range) = a.lookup(k) else { continue };
            for pa in a_range {
                if a.present(pa) {
                    f(a.index(pa), k, pa, pb);
                }
            }
        }
    }
}

/// A fine team: consecutive fine tasks sharing one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Team {
    pub vector: usize,
    pub members: Range<usize>,
}

/// Fine teams in leader order
pub(crate) fn teams(tasks: &TaskList) -> Vec<Team> {
    tasks
        .leaders()
        .filter_map(|leader| {
            let task = &tasks.tasks[leader];
            task.vector.map(|vector| Team { vector, members: leader..leader + task.team_size })
        })
        .collect()
}

/// Team index of every fine task
pub(crate) fn team_of(tasks: &TaskList) -> Vec<usize> {
    let mut team = 0;
    let mut out = Vec::with_capacity(tasks.nfine);
    for (id, task) in tasks.fine().iter().enumerate() {
        if task.leader == id && id > 0 {
            team += 1;
        }
        out.push(team);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Coarse,
    Team,
}

/// Which task writes which part of `Ci` and `Cx`
pub(crate) struct OutputLayout {
    parts: Vec<(Range<usize>, Owner)>,
    ncoarse: usize,
    nteams: usize,
}

impl OutputLayout {
    pub fn new(tasks: &TaskList, teams: &[Team], cp: &[usize]) -> Self {
        let mut parts: Vec<(usize, Range<usize>, Owner)> = tasks
            .coarse()
            .iter()
            .map(|t| (t.start, cp[t.start]..cp[t.end], Owner::Coarse))
            .chain(teams.iter().map(|t| (t.vector, cp[t.vector]..cp[t.vector + 1], Owner::Team)))
            .collect();
        parts.sort_by_key(|(first, _, _)| *first);
        Self {
            parts: parts.into_iter().map(|(_, range, owner)| (range, owner)).collect(),
            ncoarse: tasks.coarse().len(),
            nteams: teams.len(),
        }
    }

    /// One piece per coarse task and one per team, each in task order
    ///
    /// A `data` shorter than the output yields empty pieces.
    pub fn split<'c, T>(&self, data: &'c mut [T]) -> (Vec<&'c mut [T]>, Vec<&'c mut [T]>) {
        let total = self.parts.last().map_or(0, |(r, _)| r.end);
        if data.len() < total {
            let empty = |n: usize| std::iter::repeat_with(<&mut [T]>::default).take(n).collect();
            return (empty(self.ncoarse), empty(self.nteams));
        }
        let mut coarse = Vec::with_capacity(self.ncoarse);
        let mut team = Vec::with_capacity(self.nteams);
        let pieces = split_ranges_mut(data, self.parts.iter().map(|(r, _)| r.clone()));
        for (piece, (_, owner)) in pieces.into_iter().zip(&self.parts) {
            match owner {
                Owner::Coarse => coarse.push(piece),
                Owner::Team => team.push(piece),
            }
        }
        (coarse, team)
    }
}

/// The single value every entry takes, when the values of A and B do not matter
fn constant_value<T: Scalar>(m: &SparseMatrix<T>) -> Option<T> {
    match m.values() {
        Values::Iso(v) => Some(*v),
        Values::Pattern => Some(T::default()),
        Values::Full(_) => None,
    }
}

/// Value of every entry of C when it is known without any arithmetic
///
/// Holds for `ANY_PAIR`, and for an `ANY` monoid with a non-positional
/// multiplier over iso operands.
pub(crate) fn iso_output<A, B, Z, O>(ops: &O, a: &SparseMatrix<A>, b: &SparseMatrix<B>) -> Option<Z>
where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
    O: SemiringOps<A, B, Z>,
{
    if !ops.is_any() {
        return None;
    }
    if ops.is_pair() {
        return Some(ops.multiply(&A::default(), &B::default(), 0, 0, 0));
    }
    match (constant_value(a), constant_value(b)) {
        (Some(x), Some(y)) if !ops.is_positional() => Some(ops.multiply(&x, &y, 0, 0, 0)),
        _ => None,
    }
}

/// Evaluates products and knows when a sum can take no more
pub(crate) struct Multiplier<'a, 'o, A, B, Z, O> {
    ops: &'o O,
    a: ValueView<'a, A>,
    b: ValueView<'a, B>,
    /// Product of iso operands, computed once
    iso: Option<Z>,
    any: bool,
    terminal_exit: bool,
}

impl<'a, 'o, A, B, Z, O> Multiplier<'a, 'o, A, B, Z, O>
where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
    O: SemiringOps<A, B, Z>,
{
    pub fn new(ops: &'o O, a: &'a SparseMatrix<A>, b: &'a SparseMatrix<B>, terminal_exit: bool) -> Self {
        let iso = match (constant_value(a), constant_value(b)) {
            (Some(x), Some(y)) if !ops.is_positional() => Some(ops.multiply(&x, &y, 0, 0, 0)),
            _ => None,
        };
        Self {
            ops,
            a: a.value_view(),
            b: b.value_view(),
            iso,
            any: ops.is_any(),
            terminal_exit: terminal_exit && ops.has_terminal(),
        }
    }

    #[inline]
    pub fn product(&self, pa: usize, pb: usize, i: usize, k: usize, j: usize) -> Z {
        match self.iso {
            Some(t) => t,
            None => self.ops.multiply(&self.a.get(pa), &self.b.get(pb), i, k, j),
        }
    }

    #[inline]
    pub fn add(&self, x: &Z, y: &Z) -> Z {
        self.ops.add(x, y)
    }

    pub fn is_any(&self) -> bool {
        self.any
    }

    /// Whether a sum holding `z` ignores every further product
    #[inline]
    pub fn done(&self, z: &Z) -> bool {
        self.any || (self.terminal_exit && self.ops.is_terminal(z))
    }
}
