//! Splits the columns of B into coarse tasks and fine teams
//!
//! Columns are first sliced into `ntasks_per_thread * nthreads` chunks of
//! similar flop count. A chunk much heavier than the target is scanned
//! column by column: a costly column with more than one entry becomes a
//! team of fine tasks that share one table, and the cheap runs between
//! costly columns stay coarse. Fine tasks are numbered first.

use crate::error::SaxpyResult;
use crate::matrix::{AxbMethod, Structure, TaskTuning};
use crate::utils::{pslice, try_filled};

use super::flopcount::FlopCount;
use super::hash_size::{hash_table_size, TableMethod};

/// One unit of scheduled work
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Coarse: first vector of B. Fine: first entry of `B(:,vector)`
    pub start: usize,
    /// One past the last vector (coarse) or entry (fine)
    pub end: usize,
    /// Vector of B shared by a fine team; `None` for coarse tasks
    pub vector: Option<usize>,
    pub method: TableMethod,
    /// Table size; `cvlen` for Gustavson
    pub hash_size: usize,
    /// Estimated flops; for fine tasks an upper bound on the products
    pub flops: usize,
    /// Task id of the team leader; a coarse task leads itself
    pub leader: usize,
    pub team_size: usize,
}

impl Task {
    pub fn is_fine(&self) -> bool {
        self.vector.is_some()
    }

    pub fn is_gustavson(&self) -> bool {
        self.method == TableMethod::Gustavson
    }
}

/// Fine tasks first, then coarse tasks
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub nfine: usize,
    /// Threads the tasks were sized for
    pub nthreads: usize,
}

impl TaskList {
    pub fn fine(&self) -> &[Task] {
        &self.tasks[..self.nfine]
    }

    pub fn coarse(&self) -> &[Task] {
        &self.tasks[self.nfine..]
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ids of the fine team leaders
    pub fn leaders(&self) -> impl Iterator<Item = usize> + '_ {
        self.fine()
            .iter()
            .enumerate()
            .filter(|(id, t)| t.leader == *id)
            .map(|(id, _)| id)
    }

    pub fn stats(&self, total_flops: usize) -> TaskStats {
        let mut stats = TaskStats {
            nthreads: self.nthreads,
            ntasks: self.tasks.len(),
            total_flops,
            ..TaskStats::default()
        };
        for task in &self.tasks {
            match (task.is_fine(), task.method) {
                (true, TableMethod::Gustavson) => stats.nfine_gustavson += 1,
                (true, TableMethod::Hash) => stats.nfine_hash += 1,
                (false, TableMethod::Gustavson) => stats.ncoarse_gustavson += 1,
                (false, TableMethod::Hash) => stats.ncoarse_hash += 1,
            }
        }
        stats
    }
}

/// Summary of a schedule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub nthreads: usize,
    pub ntasks: usize,
    pub nfine_gustavson: usize,
    pub nfine_hash: usize,
    pub ncoarse_gustavson: usize,
    pub ncoarse_hash: usize,
    pub total_flops: usize,
}

impl TaskStats {
    pub fn nfine(&self) -> usize {
        self.nfine_gustavson + self.nfine_hash
    }

    pub fn ncoarse(&self) -> usize {
        self.ncoarse_gustavson + self.ncoarse_hash
    }
}

/// Inputs of the partitioner besides the flop counts
#[derive(Debug, Clone)]
pub struct PartitionParams<'a> {
    pub cvlen: usize,
    pub nthreads: usize,
    pub chunk: f64,
    /// Method after any override from the mask economy
    pub method: AxbMethod,
    pub tuning: &'a TaskTuning,
}

struct Builder<'p, 'a> {
    params: &'p PartitionParams<'a>,
    flops: &'p FlopCount,
    a: Structure<'a>,
    b: Structure<'a>,
    fine: Vec<Task>,
    coarse: Vec<Task>,
}

impl Builder<'_, '_> {
    fn table(&self, flmax: usize) -> (TableMethod, usize) {
        hash_table_size(
            flmax,
            self.params.cvlen,
            self.params.method,
            self.params.tuning.gustavson_divisor,
        )
    }

    fn push_coarse(&mut self, kfirst: usize, klast: usize) {
        let flmax = (kfirst..klast)
            .map(|kk| self.flops.vector_flops(kk))
            .max()
            .unwrap_or(0)
            .max(1);
        let (method, hash_size) = self.table(flmax);
        self.coarse.push(Task {
            start: kfirst,
            end: klast,
            vector: None,
            method,
            hash_size,
            flops: self.flops.bflops[klast] - self.flops.bflops[kfirst],
            leader: 0,
            team_size: 1,
        });
    }

    /// Splits the entries of `B(:,kk)` over a team sharing one table
    fn push_team(&mut self, kk: usize, jflops: usize, team_size: usize) -> SaxpyResult<()> {
        let range = self.b.vector_range(kk);
        let bjnz = range.len();
        let team_size = team_size.clamp(1, bjnz.max(1));

        // Cumulative length of A(:,k) over the entries B(k,kk)
        let mut bflops2 = try_filled(bjnz + 1, 0usize, "fine task slicing")?;
        for (s, pb) in range.clone().enumerate() {
            let alen = if self.b.present(pb) {
                self.a.lookup(self.b.index(pb)).map_or(0, |r| r.len())
            } else {
                0
            };
            bflops2[s + 1] = bflops2[s] + alen;
        }

        let (method, hash_size) = self.table(jflops);
        let slices = pslice(&bflops2, team_size);
        let leader = self.fine.len();
        for f in 0..team_size {
            self.fine.push(Task {
                start: range.start + slices[f],
                end: range.start + slices[f + 1],
                vector: Some(kk),
                method,
                hash_size,
                flops: bflops2[slices[f + 1]] - bflops2[slices[f]],
                leader,
                team_size,
            });
        }
        Ok(())
    }
}

/// Builds the task list for `C = A*B` from the per-vector flop counts
pub fn partition(
    flops: &FlopCount,
    a: Structure<'_>,
    b: Structure<'_>,
    params: &PartitionParams<'_>,
) -> SaxpyResult<TaskList> {
    let bnvec = b.nvec();
    let nthreads = params.nthreads.max(1);
    if bnvec == 0 {
        return Ok(TaskList { tasks: Vec::new(), nfine: 0, nthreads });
    }

    let tuning = params.tuning;
    let total = flops.total();
    let ntasks_initial = if nthreads == 1 { 1 } else { tuning.ntasks_per_thread * nthreads };
    let target_task_size = (total as f64 / ntasks_initial as f64).max(params.chunk);
    let target_fine_size = (target_task_size / tuning.fine_work).max(params.chunk);

    let mut builder = Builder { params, flops, a, b, fine: Vec::new(), coarse: Vec::new() };

    if ntasks_initial > 1 {
        let initial = pslice(&flops.bflops, ntasks_initial);
        for t in 0..ntasks_initial {
            let (kfirst, klast) = (initial[t], initial[t + 1]);
            if kfirst >= klast {
                continue;
            }
            let task_flops = flops.bflops[klast] - flops.bflops[kfirst];
            if (task_flops as f64) <= 2.0 * tuning.costly * target_task_size {
                builder.push_coarse(kfirst, klast);
                continue;
            }

            // Heavy chunk: peel off the costly columns into fine teams
            let mut coarse_start = kfirst;
            for kk in kfirst..klast {
                let jflops = flops.vector_flops(kk);
                let bjnz = b.vector_range(kk).len();
                if (jflops as f64) > tuning.costly * target_task_size && bjnz > 1 {
                    if coarse_start < kk {
                        builder.push_coarse(coarse_start, kk);
                    }
                    coarse_start = kk + 1;
                    let team_size = (jflops as f64 / target_fine_size).ceil() as usize;
                    builder.push_team(kk, jflops, team_size)?;
                }
            }
            if coarse_start < klast {
                builder.push_coarse(coarse_start, klast);
            }
        }
    } else if bnvec == 1 {
        // A single column on a single thread is one fine task
        builder.push_team(0, total, 1)?;
    } else {
        builder.push_coarse(0, bnvec);
    }

    let nfine = builder.fine.len();
    let mut tasks = builder.fine;
    for (offset, mut task) in builder.coarse.into_iter().enumerate() {
        task.leader = nfine + offset;
        tasks.push(task);
    }
    Ok(TaskList { tasks, nfine, nthreads })
}
