//! Semirings: an additive monoid paired with a multiplicative operator

use std::fmt;

use super::binary::{BinaryOp, BinaryOpcode};
use super::monoid::{Monoid, MonoidOpcode};
use super::scalar::{Arith, Scalar};

/// A semiring `(⊕, ⊗)` with `⊗: A × B → Z` and `⊕` a monoid over `Z`
#[derive(Clone)]
pub struct Semiring<A, B, Z> {
    name: String,
    add: Monoid<Z>,
    multiply: BinaryOp<A, B, Z>,
}

impl<A, B, Z: fmt::Debug> fmt::Debug for Semiring<A, B, Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semiring")
            .field("name", &self.name)
            .field("add", &self.add)
            .field("multiply", &self.multiply)
            .finish()
    }
}

impl<A: Scalar, B: Scalar, Z: Scalar> Semiring<A, B, Z> {
    pub fn new(add: Monoid<Z>, multiply: BinaryOp<A, B, Z>) -> Self {
        let name = format!("{}_{}", add.opcode().name(), multiply.name());
        Self { name, add, multiply }
    }

    /// Replace the generated name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn add(&self) -> &Monoid<Z> {
        &self.add
    }

    pub fn multiply(&self) -> &BinaryOp<A, B, Z> {
        &self.multiply
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// ANY_PAIR computes only the pattern of the product
    pub fn is_any_pair(&self) -> bool {
        self.add.opcode() == MonoidOpcode::Any && self.multiply.opcode() == BinaryOpcode::Pair
    }
}

macro_rules! named_semirings {
    ($($(#[$doc:meta])* $fn_name:ident => $add:ident, $mult:ident;)*) => {
        impl<T: Arith> Semiring<T, T, T> {
            $(
                $(#[$doc])*
                pub fn $fn_name() -> Self {
                    Self::new(Monoid::$add(), BinaryOp::$mult())
                }
            )*
        }
    };
}

named_semirings! {
    /// Conventional linear algebra
    plus_times => plus, times;
    /// Shortest paths
    min_plus => min, plus;
    /// Longest paths
    max_plus => max, plus;
    min_times => min, times;
    max_times => max, times;
    /// Bottleneck paths
    max_min => max, min;
    min_max => min, max;
    plus_min => plus, min;
    plus_first => plus, first;
    plus_second => plus, second;
    min_first => min, first;
    min_second => min, second;
    max_first => max, first;
    max_second => max, second;
    any_first => any, first;
    any_second => any, second;
    /// Counts the number of paths of length two
    plus_pair => plus, pair;
    /// Pattern of the product only
    any_pair => any, pair;
    lor_land => lor, land;
    land_lor => land, lor;
    lxor_land => lxor, land;
    max_isge => max, isge;
}

impl<X: Scalar, Y: Scalar> Semiring<X, Y, i64> {
    /// Minimum parent row index, as used by breadth-first search
    pub fn min_first_i() -> Self {
        Self::new(Monoid::min(), BinaryOp::first_i())
    }

    /// Any parent row index
    pub fn any_first_i() -> Self {
        Self::new(Monoid::any(), BinaryOp::first_i())
    }

    pub fn min_second_i() -> Self {
        Self::new(Monoid::min(), BinaryOp::second_i())
    }

    pub fn max_second_j() -> Self {
        Self::new(Monoid::max(), BinaryOp::second_j())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_semirings() {
        let s = Semiring::<f64, f64, f64>::plus_times();
        assert_eq!(s.name(), "plus_times_fp64");
        assert_eq!(s.add().identity(), 0.0);
        assert_eq!(s.multiply().call(&2.0, &4.0, 0, 0, 0), 8.0);
        assert!(Semiring::<u8, u8, u8>::any_pair().is_any_pair());
        assert!(!Semiring::<u8, u8, u8>::plus_pair().is_any_pair());
    }

    #[test]
    fn test_positional_semiring() {
        let s = Semiring::<f32, bool, i64>::min_first_i();
        assert!(s.multiply().is_positional());
        assert_eq!(s.multiply().call(&1.0, &true, 3, 1, 2), 3);
        assert_eq!(s.add().terminal(), Some(i64::MIN));
    }
}
