//! The operator interface seen by the numeric kernels
//!
//! Kernels are generic over [`SemiringOps`]. The generic dispatch tier plugs
//! in [`DynOps`], which calls through the function pointers of a runtime
//! [`Semiring`]; the specialized tier plugs in zero-sized built-in
//! strategies so the whole inner loop is monomorphized.

use super::scalar::Scalar;
use super::semiring::Semiring;

/// Semiring operations as used inside the kernels
pub trait SemiringOps<A, B, Z>: Sync {
    /// `A(i,k) ⊗ B(k,j)`
    fn multiply(&self, a: &A, b: &B, i: usize, k: usize, j: usize) -> Z;

    fn add(&self, x: &Z, y: &Z) -> Z;

    fn identity(&self) -> Z;

    /// Whether `z` absorbs every further addition
    fn is_terminal(&self, z: &Z) -> bool;

    fn has_terminal(&self) -> bool;

    /// First-writer-wins additive monoid
    fn is_any(&self) -> bool;

    /// Multiplier ignores both operand values and returns one
    fn is_pair(&self) -> bool;

    fn is_positional(&self) -> bool;

    /// Whether fine tasks may accumulate with word-sized compare-and-swap
    fn atomic_add(&self) -> bool;
}

/// Runtime operators from a [`Semiring`]
pub struct DynOps<'s, A, B, Z> {
    semiring: &'s Semiring<A, B, Z>,
}

impl<'s, A: Scalar, B: Scalar, Z: Scalar> DynOps<'s, A, B, Z> {
    pub fn new(semiring: &'s Semiring<A, B, Z>) -> Self {
        Self { semiring }
    }
}

impl<'s, A: Scalar, B: Scalar, Z: Scalar> SemiringOps<A, B, Z> for DynOps<'s, A, B, Z> {
    #[inline]
    fn multiply(&self, a: &A, b: &B, i: usize, k: usize, j: usize) -> Z {
        self.semiring.multiply().call(a, b, i, k, j)
    }

    #[inline]
    fn add(&self, x: &Z, y: &Z) -> Z {
        self.semiring.add().add(x, y)
    }

    fn identity(&self) -> Z {
        self.semiring.add().identity()
    }

    #[inline]
    fn is_terminal(&self, z: &Z) -> bool {
        self.semiring.add().is_terminal(z)
    }

    fn has_terminal(&self) -> bool {
        self.semiring.add().has_terminal()
    }

    fn is_any(&self) -> bool {
        self.semiring.add().is_any()
    }

    fn is_pair(&self) -> bool {
        self.semiring.multiply().opcode() == super::binary::BinaryOpcode::Pair
    }

    fn is_positional(&self) -> bool {
        self.semiring.multiply().is_positional()
    }

    fn atomic_add(&self) -> bool {
        self.semiring.add().supports_atomic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dyn_ops_forward_to_semiring() {
        let s = Semiring::<i32, i32, i32>::min_plus();
        let ops = DynOps::new(&s);
        assert_eq!(ops.multiply(&2, &3, 0, 0, 0), 5);
        assert_eq!(ops.add(&2, &3), 2);
        assert_eq!(ops.identity(), i32::MAX);
        assert!(ops.is_terminal(&i32::MIN));
        assert!(ops.has_terminal());
        assert!(!ops.is_any());
        assert!(ops.atomic_add());
    }
}
