//! The saxpy3 engine for `C<M> = A*B`
//!
//! A multiplication runs in fixed phases, each finishing before the next
//! starts:
//!
//! 1. flop count and the mask economy, which may decide to read a dense mask
//!    in place or to drop a sparse mask that costs more than the product;
//! 2. task partitioning over a thread budget sized by the total flops;
//! 3. workspace allocation and the symbolic phase, which fix the column
//!    pointers of C;
//! 4. the numeric phase, on the first kernel tier that accepts it;
//! 5. assembly of C, pruning empty vectors when B is hypersparse.
//!
//! Every allocation happens before a parallel region starts, so a failure
//! returns [`SaxpyError::OutOfMemory`] and drops whatever was built.

use std::sync::Arc;

use tracing::{debug, debug_span, trace};

use crate::dispatch::{run_tiers, JitBackend, KernelTier};
use crate::error::{SaxpyError, SaxpyResult};
use crate::kernel::job::JobSettings;
use crate::kernel::{MaskMode, NumericJob};
use crate::matrix::{AxbMethod, Format, Mask, SaxpyConfig, SparseMatrix, Structure};
use crate::ops::{Scalar, Semiring};
use crate::parallel::{nthreads_for, ThreadBudget};
use crate::schedule::{flopcount, partition, FlopCount, PartitionParams, TaskStats};

/// Result of [`Saxpy3::multiply`]
#[derive(Debug, Clone)]
pub struct SaxpyProduct<Z: Scalar> {
    pub matrix: SparseMatrix<Z>,
    /// False when a mask was given but dropped by the mask economy; the
    /// caller must then apply it to `matrix`
    pub mask_applied: bool,
    /// Tier that ran the numeric phase
    pub tier: KernelTier,
    pub stats: TaskStats,
}

/// How the mask takes part, decided from the flop counts
struct MaskPlan<'m> {
    flops: FlopCount,
    mask: Option<Mask<'m>>,
    mode: MaskMode,
    method: AxbMethod,
    applied: bool,
}

/// Masked sparse matrix multiplication over one semiring
pub struct Saxpy3<'s, A, B, Z> {
    semiring: &'s Semiring<A, B, Z>,
    config: SaxpyConfig,
    jit: Option<Arc<dyn JitBackend<A, B, Z>>>,
}

impl<'s, A: Scalar, B: Scalar, Z: Scalar> Saxpy3<'s, A, B, Z> {
    pub fn new(semiring: &'s Semiring<A, B, Z>, config: SaxpyConfig) -> Self {
        Self { semiring, config, jit: None }
    }

    /// Registers a just-in-time backend, tried before the compiled kernels
    pub fn with_jit(mut self, backend: Arc<dyn JitBackend<A, B, Z>>) -> Self {
        self.jit = Some(backend);
        self
    }

    pub fn semiring(&self) -> &Semiring<A, B, Z> {
        self.semiring
    }

    pub fn config(&self) -> &SaxpyConfig {
        &self.config
    }

    /// Computes `C<M> = A*B`, or `C = A*B` without a mask
    ///
    /// The mask may be dropped when applying it would cost far more than the
    /// product; [`SaxpyProduct::mask_applied`] reports this.
    pub fn multiply(
        &self,
        mask: Option<Mask<'_>>,
        a: &SparseMatrix<A>,
        b: &SparseMatrix<B>,
    ) -> SaxpyResult<SaxpyProduct<Z>> {
        let span = debug_span!(
            "saxpy3",
            semiring = self.semiring.name(),
            m = a.n_rows(),
            n = b.n_cols()
        );
        let _enter = span.enter();

        self.validate(mask.as_ref(), a, b)?;
        let config = &self.config;
        let max_threads = config.system.n_threads;

        let fc_threads = nthreads_for(b.structure().work() as f64, config.chunk, max_threads);
        let fc_budget = ThreadBudget::new(fc_threads);
        let plan = fc_budget.install(|| {
            self.plan_mask(mask, a.structure(), b.structure(), fc_budget.is_parallel())
        })?;

        let total = plan.flops.total();
        let budget = ThreadBudget::new(nthreads_for(total as f64, config.chunk, max_threads));
        let params = PartitionParams {
            cvlen: a.n_rows(),
            nthreads: budget.nthreads(),
            chunk: config.chunk,
            method: plan.method,
            tuning: &config.tuning,
        };
        let tasks = partition(&plan.flops, a.structure(), b.structure(), &params)?;
        let stats = tasks.stats(total);
        debug!(
            nthreads = stats.nthreads,
            ncoarse_gustavson = stats.ncoarse_gustavson,
            ncoarse_hash = stats.ncoarse_hash,
            nfine_gustavson = stats.nfine_gustavson,
            nfine_hash = stats.nfine_hash,
            flops = total,
            "tasks"
        );

        let settings = JobSettings {
            parallel: budget.is_parallel(),
            atomics: config.atomics,
            terminal_exit: config.terminal_exit,
            workspace_limit: config.workspace_limit,
        };
        let (mask, mode) = (plan.mask, plan.mode);
        let (cp, out, tier) = budget.install(|| {
            let mut job = NumericJob::prepare(a, b, mask, mode, tasks, settings)?;
            let (out, tier) = run_tiers(self.semiring, &config.dispatch, self.jit.as_deref(), &mut job)?;
            SaxpyResult::Ok((job.col_ptr().to_vec(), out, tier))
        })?;

        let bs = b.structure();
        let matrix = if bs.format == Format::Hypersparse {
            let mut c = SparseMatrix::from_parts(
                a.n_rows(),
                b.n_cols(),
                Format::Hypersparse,
                cp,
                bs.h.to_vec(),
                out.ci,
                out.values,
            );
            c.prune_empty_vectors();
            c
        } else {
            SparseMatrix::from_parts(a.n_rows(), b.n_cols(), Format::Sparse, cp, Vec::new(), out.ci, out.values)
        };
        debug!(cnz = matrix.nnz(), tier = %tier, "saxpy3 done");

        Ok(SaxpyProduct { matrix, mask_applied: plan.applied, tier, stats })
    }

    fn validate(&self, mask: Option<&Mask<'_>>, a: &SparseMatrix<A>, b: &SparseMatrix<B>) -> SaxpyResult<()> {
        self.config.validate()?;
        if a.n_cols() != b.n_rows() {
            return Err(SaxpyError::dimension_mismatch(format!(
                "A is {}x{} but B is {}x{}",
                a.n_rows(),
                a.n_cols(),
                b.n_rows(),
                b.n_cols()
            )));
        }
        if let Some(mask) = mask {
            let (mr, mc) = mask.shape();
            if (mr, mc) != (a.n_rows(), b.n_cols()) {
                return Err(SaxpyError::dimension_mismatch(format!(
                    "mask is {}x{} but C is {}x{}",
                    mr,
                    mc,
                    a.n_rows(),
                    b.n_cols()
                )));
            }
        }
        let multiply = self.semiring.multiply();
        if a.is_pattern() && multiply.uses_x() {
            return Err(SaxpyError::invalid_input(format!(
                "{} reads the values of A, which holds only a pattern",
                multiply.name()
            )));
        }
        if b.is_pattern() && multiply.uses_y() {
            return Err(SaxpyError::invalid_input(format!(
                "{} reads the values of B, which holds only a pattern",
                multiply.name()
            )));
        }
        Ok(())
    }

    /// Counts flops and decides how the mask takes part
    fn plan_mask<'m>(
        &self,
        mask: Option<Mask<'m>>,
        a: Structure<'_>,
        b: Structure<'_>,
        parallel: bool,
    ) -> SaxpyResult<MaskPlan<'m>> {
        let tuning = &self.config.tuning;
        let method = self.config.method;
        let Some(m) = mask else {
            let flops = flopcount(None, a, b, parallel)?;
            return Ok(MaskPlan { flops, mask: None, mode: MaskMode::Scatter, method, applied: true });
        };

        let ms = m.structure();
        if ms.is_packed() && method == AxbMethod::Default {
            // A packed mask costs cvlen per column to scatter
            let mut flops = flopcount(None, a, b, parallel)?;
            let mwork = ms.vlen.saturating_mul(ms.vdim);
            if (flops.axb_flops() as f64) < mwork as f64 * tuning.mwork_beta {
                trace!(axbflops = flops.axb_flops(), mwork, "dense mask in place");
                return Ok(MaskPlan {
                    flops,
                    mask: Some(m),
                    mode: MaskMode::DenseInPlace,
                    method: AxbMethod::Hash,
                    applied: true,
                });
            }
            trace!(axbflops = flops.axb_flops(), mwork, "dense mask");
            flops.add_per_vector(ms.vlen);
            return Ok(MaskPlan {
                flops,
                mask: Some(m),
                mode: MaskMode::Scatter,
                method: AxbMethod::Gustavson,
                applied: true,
            });
        }

        let flops = flopcount(Some(&m), a, b, parallel)?;
        if (flops.axb_flops() as f64) < flops.mwork as f64 * tuning.mwork_alpha {
            trace!(axbflops = flops.axb_flops(), mwork = flops.mwork, "discard mask");
            let flops = flopcount(None, a, b, parallel)?;
            return Ok(MaskPlan { flops, mask: None, mode: MaskMode::Scatter, method, applied: false });
        }
        trace!(axbflops = flops.axb_flops(), mwork = flops.mwork, "use mask");
        Ok(MaskPlan { flops, mask: Some(m), mode: MaskMode::Scatter, method, applied: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::TaskTuning;

    fn engine(semiring: &Semiring<f64, f64, f64>, tuning: TaskTuning, method: AxbMethod) -> Saxpy3<'_, f64, f64, f64> {
        let mut config = SaxpyConfig::default().with_threads(1).with_method(method);
        config.tuning = tuning;
        Saxpy3::new(semiring, config)
    }

    #[test]
    fn test_mask_economy_decisions() {
        let s = Semiring::<f64, f64, f64>::plus_times();
        let a = SparseMatrix::<f64>::identity(4);
        let b = SparseMatrix::<f64>::identity(4);
        let sparse_mask = SparseMatrix::<f64>::identity(4);
        let dense_mask = SparseMatrix::full(4, 4, crate::matrix::Values::Iso(true)).unwrap();

        let keep = engine(&s, TaskTuning::default(), AxbMethod::Default);
        let plan = keep.plan_mask(Some(Mask::new(&sparse_mask)), a.structure(), b.structure(), false).unwrap();
        assert!(plan.applied && plan.mask.is_some());
        assert_eq!(plan.mode, MaskMode::Scatter);

        let tuning = TaskTuning { mwork_alpha: 1e6, ..TaskTuning::default() };
        let drop = engine(&s, tuning, AxbMethod::Default);
        let plan = drop.plan_mask(Some(Mask::new(&sparse_mask)), a.structure(), b.structure(), false).unwrap();
        assert!(!plan.applied && plan.mask.is_none());
        assert_eq!(plan.flops.mwork, 0);

        // 4 flops against 16 mask entries
        let plan = keep.plan_mask(Some(Mask::new(&dense_mask)), a.structure(), b.structure(), false).unwrap();
        assert_eq!(plan.mode, MaskMode::Scatter);
        assert_eq!(plan.method, AxbMethod::Gustavson);
        assert_eq!(plan.flops.total(), 4 + 4 * 4);

        let tuning = TaskTuning { mwork_beta: 1.0, ..TaskTuning::default() };
        let in_place = engine(&s, tuning, AxbMethod::Default);
        let plan = in_place.plan_mask(Some(Mask::new(&dense_mask)), a.structure(), b.structure(), false).unwrap();
        assert_eq!(plan.mode, MaskMode::DenseInPlace);
        assert_eq!(plan.method, AxbMethod::Hash);
        assert_eq!(plan.flops.total(), 4);
    }

    #[test]
    fn test_validation() {
        let s = Semiring::<f64, f64, f64>::plus_times();
        let e = engine(&s, TaskTuning::default(), AxbMethod::Default);
        let a = SparseMatrix::<f64>::identity(3);
        let b = SparseMatrix::<f64>::identity(4);
        assert!(matches!(e.multiply(None, &a, &b), Err(SaxpyError::DimensionMismatch(_))));

        let m = SparseMatrix::<bool>::identity(2);
        let err = e.multiply(Some(Mask::new(&m)), &a, &a).unwrap_err();
        assert!(matches!(err, SaxpyError::DimensionMismatch(_)));

        let pattern = SparseMatrix::<f64>::identity(3).into_pattern();
        assert!(matches!(e.multiply(None, &pattern, &a), Err(SaxpyError::InvalidInput(_))));

        let first = Semiring::<f64, f64, f64>::plus_first();
        let e = engine(&first, TaskTuning::default(), AxbMethod::Default);
        assert!(e.multiply(None, &a, &pattern).is_ok());
    }

    #[test]
    fn test_product_is_cloneable_and_printable() {
        let s = Semiring::<f64, f64, f64>::plus_times();
        let e = engine(&s, TaskTuning::default(), AxbMethod::Default);
        let a = SparseMatrix::<f64>::identity(3);
        let product = e.multiply(None, &a, &a).unwrap();
        let copy = product.clone();
        assert_eq!(copy.matrix.triplets(), product.matrix.triplets());
        assert_eq!(copy.stats, product.stats);
        assert!(format!("{:?}", copy).contains("mask_applied"));
    }
}
