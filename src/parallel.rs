//! # Thread budgets for the saxpy3 phases
//!
//! Each phase decides how many threads its work deserves from a chunk size:
//! a phase with less than two chunks of work runs on the calling thread.
//! Parallel phases run their tasks through Rayon, inside a pool sized to the
//! budget when it differs from the current pool.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::warn;

/// Threads worth using for `work` units at `chunk` units per thread
///
/// The result is `floor(work / chunk)` clamped to `1..=max_threads`.
pub fn nthreads_for(work: f64, chunk: f64, max_threads: usize) -> usize {
    let max_threads = max_threads.max(1);
    if chunk <= 0.0 || !chunk.is_finite() {
        return max_threads;
    }
    let n = (work / chunk).floor();
    if n.is_nan() || n < 1.0 {
        1
    } else {
        (n as usize).min(max_threads)
    }
}

/// A number of threads, with the pool that provides them
pub struct ThreadBudget {
    nthreads: usize,
    pool: Option<ThreadPool>,
}

impl ThreadBudget {
    pub fn new(nthreads: usize) -> Self {
        let nthreads = nthreads.max(1);
        let pool = if nthreads > 1 && rayon::current_num_threads() != nthreads {
            match ThreadPoolBuilder::new().num_threads(nthreads).build() {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!(nthreads, %err, "could not build a thread pool; using the current one");
                    None
                }
            }
        } else {
            None
        };
        Self { nthreads, pool }
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads
    }

    pub fn is_parallel(&self) -> bool {
        self.nthreads > 1
    }

    /// Runs `f` with this budget's pool as the current Rayon pool
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

/// Calls `f(index, item)` for every item, in parallel when asked to
pub fn for_each_indexed<T, F>(parallel: bool, items: Vec<T>, f: F)
where
    T: Send,
    F: Fn(usize, T) + Sync + Send,
{
    if parallel {
        items.into_par_iter().enumerate().for_each(|(index, item)| f(index, item));
    } else {
        items.into_iter().enumerate().for_each(|(index, item)| f(index, item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_nthreads_for() {
        assert_eq!(nthreads_for(0.0, 65536.0, 8), 1);
        assert_eq!(nthreads_for(65535.0, 65536.0, 8), 1);
        assert_eq!(nthreads_for(3.0 * 65536.0, 65536.0, 8), 3);
        assert_eq!(nthreads_for(1e12, 65536.0, 8), 8);
        assert_eq!(nthreads_for(100.0, 1.0, 0), 1);
    }

    #[test]
    fn test_budget_runs_closures() {
        for n in [1, 3] {
            let budget = ThreadBudget::new(n);
            assert_eq!(budget.is_parallel(), n > 1);
            let sum: usize = budget.install(|| (0..100usize).into_par_iter().sum());
            assert_eq!(sum, 4950);
        }
    }

    #[test]
    fn test_for_each_indexed_visits_all() {
        for parallel in [false, true] {
            let hits = AtomicUsize::new(0);
            for_each_indexed(parallel, (0..50).collect(), |index, item: usize| {
                assert_eq!(index, item);
                hits.fetch_add(1, Ordering::Relaxed);
            });
            assert_eq!(hits.load(Ordering::Relaxed), 50);
        }
    }
}
