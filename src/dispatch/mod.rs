//! Kernel tier selection for the numeric phase
//!
//! The numeric phase is tried in three tiers, in order: a registered
//! just-in-time backend, the compiled specialized kernels, and the generic
//! kernel that calls through the runtime semiring. A tier that cannot handle
//! the request steps aside and the next one runs; the generic tier always
//! handles it. Out-of-memory from any tier ends the multiplication.

pub mod jit;
pub mod specialized;

use std::fmt;

use tracing::debug;

use crate::error::SaxpyResult;
use crate::kernel::{MaskMode, NumericJob, NumericOutput};
use crate::matrix::{DispatchControl, Format, Values};
use crate::ops::{BinaryOpcode, DynOps, MonoidOpcode, Scalar, Semiring, TypeCode};

pub use jit::{DisabledJit, JitBackend, JitRun};

/// Which implementation computed the numeric phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelTier {
    Jit,
    Specialized,
    Generic,
}

impl KernelTier {
    pub fn name(&self) -> &'static str {
        match self {
            KernelTier::Jit => "jit",
            KernelTier::Specialized => "specialized",
            KernelTier::Generic => "generic",
        }
    }
}

impl fmt::Display for KernelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the mask reaches the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaskKey {
    pub complemented: bool,
    pub structural: bool,
    pub in_place: bool,
}

/// Everything a compiled kernel is specialized on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    /// Name of the semiring, which identifies user-defined operators
    pub semiring: String,
    pub add: MonoidOpcode,
    pub multiply: BinaryOpcode,
    pub atype: TypeCode,
    pub btype: TypeCode,
    pub ztype: TypeCode,
    pub a_format: Format,
    pub b_format: Format,
    pub a_iso: bool,
    pub b_iso: bool,
    pub mask: Option<MaskKey>,
}

impl KernelKey {
    pub fn new<A: Scalar, B: Scalar, Z: Scalar>(semiring: &Semiring<A, B, Z>, job: &NumericJob<'_, A, B>) -> Self {
        let mask = job.mask().map(|m| MaskKey {
            complemented: m.is_complemented(),
            structural: m.is_structural(),
            in_place: job.mask_mode() == MaskMode::DenseInPlace,
        });
        Self {
            semiring: semiring.name().to_string(),
            add: semiring.add().opcode(),
            multiply: semiring.multiply().opcode(),
            atype: A::TYPE,
            btype: B::TYPE,
            ztype: Z::TYPE,
            a_format: job.a().format(),
            b_format: job.b().format(),
            a_iso: !matches!(job.a().values(), Values::Full(_)),
            b_iso: !matches!(job.b().values(), Values::Full(_)),
            mask,
        }
    }

    /// Whether every operator and type is built in
    pub fn is_builtin(&self) -> bool {
        self.add != MonoidOpcode::User
            && self.multiply != BinaryOpcode::User
            && self.atype.is_builtin()
            && self.btype.is_builtin()
            && self.ztype.is_builtin()
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "saxpy3_{}__{}_{}__{}{}_{}{}",
            self.semiring,
            self.atype,
            self.btype,
            self.a_format.name(),
            if self.a_iso { "_iso" } else { "" },
            self.b_format.name(),
            if self.b_iso { "_iso" } else { "" },
        )?;
        if let Some(mask) = self.mask {
            f.write_str("__mask")?;
            if mask.complemented {
                f.write_str("_comp")?;
            }
            if mask.structural {
                f.write_str("_struct")?;
            }
            if mask.in_place {
                f.write_str("_inplace")?;
            }
        }
        Ok(())
    }
}

/// Result of offering a job to one tier
pub(crate) enum TierOutcome<Z> {
    Done(NumericOutput<Z>),
    NotApplicable(String),
}

/// Runs the numeric phase on the first tier that accepts it
pub(crate) fn run_tiers<A, B, Z>(
    semiring: &Semiring<A, B, Z>,
    control: &DispatchControl,
    jit: Option<&dyn JitBackend<A, B, Z>>,
    job: &mut NumericJob<'_, A, B>,
) -> SaxpyResult<(NumericOutput<Z>, KernelTier)>
where
    A: Scalar,
    B: Scalar,
    Z: Scalar,
{
    let key = KernelKey::new(semiring, job);

    match jit::try_jit(&key, control.jit, jit, job)? {
        TierOutcome::Done(out) => return Ok((out, KernelTier::Jit)),
        TierOutcome::NotApplicable(reason) => debug!(kernel = %key, tier = "jit", %reason, "tier skipped"),
    }

    match specialized::try_specialized(semiring, control.specialized, job)? {
        TierOutcome::Done(out) => return Ok((out, KernelTier::Specialized)),
        TierOutcome::NotApplicable(reason) => {
            debug!(kernel = %key, tier = "specialized", %reason, "tier skipped")
        }
    }

    let out = job.run(&DynOps::new(semiring))?;
    debug!(kernel = %key, tier = "generic", "numeric phase complete");
    Ok((out, KernelTier::Generic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_key_name() {
        let key = KernelKey {
            semiring: "plus_times_fp64".to_string(),
            add: MonoidOpcode::Plus,
            multiply: BinaryOpcode::Times,
            atype: TypeCode::Fp64,
            btype: TypeCode::Fp64,
            ztype: TypeCode::Fp64,
            a_format: Format::Sparse,
            b_format: Format::Hypersparse,
            a_iso: false,
            b_iso: true,
            mask: Some(MaskKey { complemented: true, structural: false, in_place: false }),
        };
        assert_eq!(key.to_string(), "saxpy3_plus_times_fp64__fp64_fp64__sparse_hyper_iso__mask_comp");
        assert!(key.is_builtin());
    }

    #[test]
    fn test_tier_names() {
        assert_eq!(KernelTier::Jit.to_string(), "jit");
        assert_eq!(KernelTier::Generic.name(), "generic");
    }
}
