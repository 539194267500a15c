//! Workspace layout and allocation for the per-task tables
//!
//! Every coarse task and every fine team leader owns one table. A table has
//! up to three parts: flags `Hf`, row indices `Hi` (coarse hash tasks only)
//! and values `Hx`. Fine team members borrow the leader's table. The flag
//! and index parts do not depend on the value type and are allocated once
//! in a [`StructureArena`]; values are allocated per numeric run in a
//! [`ValueArena`]. All allocation happens before any parallel region.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicU8};

use aligned_vec::AVec;
use tracing::debug;

use crate::constants::{CACHE_LINE_BYTES, TABLE_PAD_WORDS};
use crate::error::{SaxpyError, SaxpyResult};
use crate::utils::{split_at_bounds, try_aligned_zeros, try_filled, try_filled_with};

use super::hash_size::TableMethod;
use super::partition::TaskList;

/// The kind of table a leader owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Epoch marks indexed by row
    CoarseGustavson,
    /// Epoch marks plus row indices
    CoarseHash,
    /// One atomic state byte per row
    FineGustavson,
    /// One atomic word per slot packing row and state
    FineHash,
}

/// Table owned by one leader task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub task: usize,
    pub kind: TableKind,
    pub hash_size: usize,
}

impl TableSpec {
    /// Bytes of `Hf` including padding
    pub fn flag_bytes(&self) -> usize {
        match self.kind {
            TableKind::CoarseGustavson | TableKind::CoarseHash | TableKind::FineHash => {
                (self.hash_size + TABLE_PAD_WORDS) * 8
            }
            TableKind::FineGustavson => fine_state_len(self.hash_size),
        }
    }

    /// Bytes of `Hi` including padding
    pub fn index_bytes(&self) -> usize {
        match self.kind {
            TableKind::CoarseHash => (self.hash_size + TABLE_PAD_WORDS) * std::mem::size_of::<usize>(),
            _ => 0,
        }
    }

    /// Slots of `Hx` including padding, for values of `value_size` bytes
    pub fn value_slots(&self, value_size: usize) -> usize {
        self.hash_size + value_pad(value_size)
    }
}

/// Padding in slots that keeps neighbouring value tables a cache line apart
fn value_pad(value_size: usize) -> usize {
    CACHE_LINE_BYTES.div_ceil(value_size.max(1))
}

/// State bytes for a fine Gustavson table, rounded to whole words
fn fine_state_len(hash_size: usize) -> usize {
    (hash_size + CACHE_LINE_BYTES).div_ceil(8) * 8
}

/// Tables of all leaders, in task order
#[derive(Debug, Clone, Default)]
pub struct WorkspacePlan {
    pub tables: Vec<TableSpec>,
}

impl WorkspacePlan {
    pub fn new(tasks: &TaskList) -> Self {
        let tables = tasks
            .tasks
            .iter()
            .enumerate()
            .filter(|(id, task)| task.leader == *id)
            .map(|(id, task)| {
                let kind = match (task.is_fine(), task.method) {
                    (false, TableMethod::Gustavson) => TableKind::CoarseGustavson,
                    (false, TableMethod::Hash) => TableKind::CoarseHash,
                    (true, TableMethod::Gustavson) => TableKind::FineGustavson,
                    (true, TableMethod::Hash) => TableKind::FineHash,
                };
                TableSpec { task: id, kind, hash_size: task.hash_size }
            })
            .collect();
        Self { tables }
    }

    /// Bytes of all `Hf` and `Hi` parts
    pub fn structure_bytes(&self) -> usize {
        self.tables
            .iter()
            .map(|t| t.flag_bytes() + t.index_bytes())
            .fold(0usize, usize::saturating_add)
    }

    /// Bytes of all `Hx` parts
    pub fn value_bytes(&self, value_size: usize) -> usize {
        self.tables
            .iter()
            .map(|t| t.value_slots(value_size).saturating_mul(value_size))
            .fold(0usize, usize::saturating_add)
    }

    /// Fails if the workspace would exceed `limit` bytes
    pub fn check_limit(&self, limit: Option<usize>, value_size: usize, with_values: bool) -> SaxpyResult<()> {
        let values = if with_values { self.value_bytes(value_size) } else { 0 };
        let total = self.structure_bytes().saturating_add(values);
        let limit = limit.unwrap_or(isize::MAX as usize);
        if total > limit {
            return Err(SaxpyError::out_of_memory("saxpy3 workspace", total));
        }
        Ok(())
    }
}

/// Sequential offsets of the leader tables within one pool
fn layout<F>(tables: &[TableSpec], include: impl Fn(&TableSpec) -> bool, size: F) -> (Vec<(usize, Range<usize>)>, usize)
where
    F: Fn(&TableSpec) -> usize,
{
    let mut offset = 0;
    let mut ranges = Vec::new();
    for table in tables.iter().filter(|t| include(t)) {
        let len = size(table);
        ranges.push((table.task, offset..offset + table.hash_size.min(len)));
        offset += len;
    }
    (ranges, offset)
}

/// Cumulative bounds of consecutive pieces with the given sizes
fn tile(sizes: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut bounds = vec![0];
    let mut end = 0;
    for len in sizes {
        end = usize::saturating_add(end, len);
        bounds.push(end);
    }
    bounds
}

fn is_coarse(t: &TableSpec) -> bool {
    matches!(t.kind, TableKind::CoarseGustavson | TableKind::CoarseHash)
}

/// Mutable views of one coarse task's table
pub struct CoarseSlices<'a> {
    pub marks: &'a mut [u64],
    /// Empty for Gustavson tasks
    pub rows: &'a mut [usize],
}

/// Shared table of one fine team
#[derive(Clone, Copy)]
pub enum FineSlices<'a> {
    Gustavson(&'a [AtomicU8]),
    Hash(&'a [AtomicU64]),
}

/// Value-independent table memory for every leader
pub struct StructureArena {
    coarse_marks: AVec<u64>,
    coarse_rows: AVec<usize>,
    /// Per coarse task: bounds into the marks and rows pools
    coarse_mark_bounds: Vec<usize>,
    coarse_row_bounds: Vec<usize>,
    fine_states: Vec<AtomicU8>,
    fine_slots: Vec<AtomicU64>,
    /// Per fine team, in leader order: its method and range in the matching pool
    fine_teams: Vec<(TableMethod, Range<usize>)>,
}

impl StructureArena {
    pub fn allocate(plan: &WorkspacePlan) -> SaxpyResult<Self> {
        let coarse_tables: Vec<&TableSpec> = plan.tables.iter().filter(|t| is_coarse(t)).collect();

        let coarse_mark_bounds = tile(coarse_tables.iter().map(|t| t.hash_size.saturating_add(TABLE_PAD_WORDS)));
        let coarse_row_bounds = tile(coarse_tables.iter().map(|t| match t.kind {
            TableKind::CoarseHash => t.hash_size.saturating_add(TABLE_PAD_WORDS),
            _ => 0,
        }));
        let n_marks = coarse_mark_bounds.last().copied().unwrap_or(0);
        let n_rows = coarse_row_bounds.last().copied().unwrap_or(0);
        let coarse_marks = try_aligned_zeros::<u64>(n_marks, "coarse table marks")?;
        let coarse_rows = try_aligned_zeros::<usize>(n_rows, "coarse hash rows")?;

        let (state_ranges, n_states) = layout(
            &plan.tables,
            |t| t.kind == TableKind::FineGustavson,
            |t| fine_state_len(t.hash_size),
        );
        let (slot_ranges, n_slots) = layout(
            &plan.tables,
            |t| t.kind == TableKind::FineHash,
            |t| t.hash_size + TABLE_PAD_WORDS,
        );
        let fine_states = try_filled_with(n_states, || AtomicU8::new(0), "fine gustavson flags")?;
        let fine_slots = try_filled_with(n_slots, || AtomicU64::new(0), "fine hash flags")?;

        let mut states = state_ranges.into_iter();
        let mut slots = slot_ranges.into_iter();
        let fine_teams = plan
            .tables
            .iter()
            .filter(|t| !is_coarse(t))
            .filter_map(|t| match t.kind {
                TableKind::FineGustavson => states.next().map(|(_, r)| (TableMethod::Gustavson, r)),
                _ => slots.next().map(|(_, r)| (TableMethod::Hash, r)),
            })
            .collect::<Vec<_>>();

        debug!(
            coarse_tables = coarse_tables.len(),
            fine_tables = fine_teams.len(),
            bytes = plan.structure_bytes(),
            "allocated table workspace"
        );

        Ok(Self {
            coarse_marks,
            coarse_rows,
            coarse_mark_bounds,
            coarse_row_bounds,
            fine_states,
            fine_slots,
            fine_teams,
        })
    }

    /// One view per coarse task in coarse task order, and one per fine team
    /// in leader order
    pub fn split_mut(&mut self) -> (Vec<CoarseSlices<'_>>, Vec<FineSlices<'_>>) {
        let marks = split_at_bounds(&mut self.coarse_marks[..], &self.coarse_mark_bounds);
        let rows = split_at_bounds(&mut self.coarse_rows[..], &self.coarse_row_bounds);
        let coarse = marks
            .into_iter()
            .zip(rows)
            .map(|(marks, rows)| CoarseSlices { marks, rows })
            .collect();

        let (states, slots) = (&self.fine_states, &self.fine_slots);
        let fine = self
            .fine_teams
            .iter()
            .map(|(method, range)| match method {
                TableMethod::Gustavson => FineSlices::Gustavson(&states[range.clone()]),
                TableMethod::Hash => FineSlices::Hash(&slots[range.clone()]),
            })
            .collect();
        (coarse, fine)
    }
}

/// Value tables of the fine teams, in leader order
pub enum FineValueTables<'a, Z> {
    /// Packed words updated with compare-and-swap
    Atomic(Vec<&'a [AtomicU64]>),
    /// Plain values written by the leader while merging partials
    Serialized(Vec<&'a mut [Z]>),
    None,
}

enum FineValues<Z> {
    Atomic(Vec<AtomicU64>),
    Serialized(Vec<Z>),
    None,
}

/// Value tables for one numeric run
pub struct ValueArena<Z> {
    coarse: Vec<Z>,
    coarse_bounds: Vec<usize>,
    fine: FineValues<Z>,
    fine_bounds: Vec<usize>,
}

impl<Z: Copy + Default> ValueArena<Z> {
    /// Allocates `Hx` for every leader
    ///
    /// `atomic_identity` selects the atomic layout for fine teams and gives
    /// the packed identity word their tables start from. With `with_values`
    /// false nothing is allocated.
    pub fn allocate(plan: &WorkspacePlan, with_values: bool, atomic_identity: Option<u64>) -> SaxpyResult<Self> {
        let value_size = std::mem::size_of::<Z>();
        let size = |t: &TableSpec| if with_values { t.value_slots(value_size) } else { 0 };

        let coarse_bounds = tile(plan.tables.iter().filter(|t| is_coarse(t)).map(size));
        let fine_bounds = tile(plan.tables.iter().filter(|t| !is_coarse(t)).map(size));
        let n_coarse = coarse_bounds.last().copied().unwrap_or(0);
        let n_fine = fine_bounds.last().copied().unwrap_or(0);

        let coarse = try_filled(n_coarse, Z::default(), "coarse value tables")?;
        let fine = if !with_values || n_fine == 0 {
            FineValues::None
        } else if let Some(word) = atomic_identity {
            FineValues::Atomic(try_filled_with(n_fine, || AtomicU64::new(word), "fine value tables")?)
        } else {
            FineValues::Serialized(try_filled(n_fine, Z::default(), "fine value tables")?)
        };

        Ok(Self { coarse, coarse_bounds, fine, fine_bounds })
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self.fine, FineValues::Atomic(_))
    }

    /// One value table per coarse task in coarse task order, and the fine
    /// team tables
    pub fn split_mut(&mut self) -> (Vec<&mut [Z]>, FineValueTables<'_, Z>) {
        let coarse = split_at_bounds(&mut self.coarse, &self.coarse_bounds);
        let fine = match &mut self.fine {
            FineValues::Atomic(words) => {
                let words: &[AtomicU64] = words;
                FineValueTables::Atomic(self.fine_bounds.windows(2).map(|w| &words[w[0]..w[1]]).collect())
            }
            FineValues::Serialized(values) => {
                FineValueTables::Serialized(split_at_bounds(values, &self.fine_bounds))
            }
            FineValues::None => FineValueTables::None,
        };
        (coarse, fine)
    }
}
