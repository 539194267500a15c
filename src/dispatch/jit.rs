//! Pluggable just-in-time kernels
//!
//! The engine never generates code itself. A backend receives the kernel key
//! and the prepared job; it may compile a kernel for the key and run it, or
//! report that it cannot. Only the status matters to the dispatcher: anything
//! other than [`JitRun::Ran`] moves on to the next tier.

use crate::error::SaxpyResult;
use crate::kernel::{NumericJob, NumericOutput};
use crate::ops::Scalar;

use super::{KernelKey, TierOutcome};

/// Status reported by a backend
#[derive(Debug)]
pub enum JitRun<Z> {
    /// The kernel ran and produced the numeric phase
    Ran(NumericOutput<Z>),
    /// No kernel can be generated for this key
    NotSupported,
    /// A kernel was generated but could not be compiled or loaded
    CompileFailed(String),
    /// The backend is switched off
    Disabled,
}

/// A source of compiled kernels
///
/// A backend that returns [`JitRun::Ran`] must have called
/// [`NumericJob::run`] (or produced an identical result). Errors are fatal
/// to the multiplication, so a backend should only return one for
/// out-of-memory; every other problem is a status.
pub trait JitBackend<A, B, Z>: Send + Sync {
    fn compile_and_run(&self, key: &KernelKey, job: &mut NumericJob<'_, A, B>) -> SaxpyResult<JitRun<Z>>;
}

/// Backend that never runs anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledJit;

impl<A, B, Z> JitBackend<A, B, Z> for DisabledJit {
    fn compile_and_run(&self, _key: &KernelKey, _job: &mut NumericJob<'_, A, B>) -> SaxpyResult<JitRun<Z>> {
        Ok(JitRun::Disabled)
    }
}

pub(crate) fn try_jit<A: Scalar, B: Scalar, Z: Scalar>(
    key: &KernelKey,
    enabled: bool,
    backend: Option<&dyn JitBackend<A, B, Z>>,
    job: &mut NumericJob<'_, A, B>,
) -> SaxpyResult<TierOutcome<Z>> {
    if !enabled {
        return Ok(TierOutcome::NotApplicable("disabled by configuration".to_string()));
    }
    let Some(backend) = backend else {
        return Ok(TierOutcome::NotApplicable("no backend registered".to_string()));
    };
    Ok(match backend.compile_and_run(key, job)? {
        JitRun::Ran(out) => TierOutcome::Done(out),
        JitRun::NotSupported => TierOutcome::NotApplicable("not supported by backend".to_string()),
        JitRun::CompileFailed(msg) => TierOutcome::NotApplicable(format!("compile failed: {msg}")),
        JitRun::Disabled => TierOutcome::NotApplicable("backend disabled".to_string()),
    })
}
