//! Element types and algebraic operators

pub mod binary;
pub mod kernel_ops;
pub mod monoid;
pub mod scalar;
pub mod semiring;

pub use binary::{BinaryOp, BinaryOpcode};
pub use kernel_ops::{DynOps, SemiringOps};
pub use monoid::{Monoid, MonoidOpcode};
pub use scalar::{Arith, Scalar, TypeCode, WordCodec};
pub use semiring::Semiring;
