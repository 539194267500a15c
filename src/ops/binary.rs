//! Binary operators used as the multiplicative part of a semiring

use std::fmt;
use std::sync::Arc;

use super::scalar::{Arith, Scalar, TypeCode};

/// Identifies a built-in binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpcode {
    First,
    Second,
    /// Always one; reads neither operand
    Pair,
    Plus,
    Minus,
    Times,
    Div,
    Min,
    Max,
    Land,
    Lor,
    Lxor,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    IsEq,
    IsNe,
    IsGt,
    IsLt,
    IsGe,
    IsLe,
    /// Row index `i` of the entry of A
    FirstI,
    /// Column index `k` of the entry of A
    FirstJ,
    /// Row index `k` of the entry of B
    SecondI,
    /// Column index `j` of the entry of B
    SecondJ,
    /// User-defined operator
    User,
}

impl BinaryOpcode {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOpcode::First => "first",
            BinaryOpcode::Second => "second",
            BinaryOpcode::Pair => "pair",
            BinaryOpcode::Plus => "plus",
            BinaryOpcode::Minus => "minus",
            BinaryOpcode::Times => "times",
            BinaryOpcode::Div => "div",
            BinaryOpcode::Min => "min",
            BinaryOpcode::Max => "max",
            BinaryOpcode::Land => "land",
            BinaryOpcode::Lor => "lor",
            BinaryOpcode::Lxor => "lxor",
            BinaryOpcode::Eq => "eq",
            BinaryOpcode::Ne => "ne",
            BinaryOpcode::Gt => "gt",
            BinaryOpcode::Lt => "lt",
            BinaryOpcode::Ge => "ge",
            BinaryOpcode::Le => "le",
            BinaryOpcode::IsEq => "iseq",
            BinaryOpcode::IsNe => "isne",
            BinaryOpcode::IsGt => "isgt",
            BinaryOpcode::IsLt => "islt",
            BinaryOpcode::IsGe => "isge",
            BinaryOpcode::IsLe => "isle",
            BinaryOpcode::FirstI => "firsti",
            BinaryOpcode::FirstJ => "firstj",
            BinaryOpcode::SecondI => "secondi",
            BinaryOpcode::SecondJ => "secondj",
            BinaryOpcode::User => "user",
        }
    }

    /// Positional operators compute their result from indices alone
    pub fn is_positional(&self) -> bool {
        matches!(
            self,
            BinaryOpcode::FirstI | BinaryOpcode::FirstJ | BinaryOpcode::SecondI | BinaryOpcode::SecondJ
        )
    }

    fn reads_x(&self) -> bool {
        !matches!(self, BinaryOpcode::Second | BinaryOpcode::Pair) && !self.is_positional()
    }

    fn reads_y(&self) -> bool {
        !matches!(self, BinaryOpcode::First | BinaryOpcode::Pair) && !self.is_positional()
    }
}

/// `z = f(x, y, i, k, j)` where `x = A(i,k)` and `y = B(k,j)`
type MultiplyFn<X, Y, Z> = dyn Fn(&X, &Y, usize, usize, usize) -> Z + Send + Sync;

/// A binary operator `X × Y → Z`
///
/// Every operator receives the indices of the product it contributes to, so
/// positional and index-aware user operators share one calling convention
/// with ordinary value operators.
pub struct BinaryOp<X, Y, Z> {
    opcode: BinaryOpcode,
    name: String,
    func: Arc<MultiplyFn<X, Y, Z>>,
    commutative: bool,
    reads_x: bool,
    reads_y: bool,
}

impl<X, Y, Z> Clone for BinaryOp<X, Y, Z> {
    fn clone(&self) -> Self {
        Self {
            opcode: self.opcode,
            name: self.name.clone(),
            func: Arc::clone(&self.func),
            commutative: self.commutative,
            reads_x: self.reads_x,
            reads_y: self.reads_y,
        }
    }
}

impl<X, Y, Z> fmt::Debug for BinaryOp<X, Y, Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryOp")
            .field("name", &self.name)
            .field("opcode", &self.opcode)
            .finish()
    }
}

impl<X: Scalar, Y: Scalar, Z: Scalar> BinaryOp<X, Y, Z> {
    fn builtin<F>(opcode: BinaryOpcode, commutative: bool, f: F) -> Self
    where
        F: Fn(&X, &Y, usize, usize, usize) -> Z + Send + Sync + 'static,
    {
        Self {
            opcode,
            name: format!("{}_{}", opcode.name(), Z::TYPE),
            func: Arc::new(f),
            commutative,
            reads_x: opcode.reads_x(),
            reads_y: opcode.reads_y(),
        }
    }

    /// Create a user-defined operator over values
    pub fn new_user<F>(name: &str, f: F) -> Self
    where
        F: Fn(&X, &Y) -> Z + Send + Sync + 'static,
    {
        Self {
            opcode: BinaryOpcode::User,
            name: name.to_string(),
            func: Arc::new(move |x: &X, y: &Y, _, _, _| f(x, y)),
            commutative: false,
            reads_x: true,
            reads_y: true,
        }
    }

    /// Create a user-defined operator that also sees the indices `(i, k, j)`
    pub fn new_indexed<F>(name: &str, f: F) -> Self
    where
        F: Fn(&X, &Y, usize, usize, usize) -> Z + Send + Sync + 'static,
    {
        Self {
            opcode: BinaryOpcode::User,
            name: name.to_string(),
            func: Arc::new(f),
            commutative: false,
            reads_x: true,
            reads_y: true,
        }
    }

    /// Declare whether `f(x, y) == f(y, x)`
    pub fn with_commutative(mut self, commutative: bool) -> Self {
        self.commutative = commutative;
        self
    }

    /// Apply the operator to `x = A(i,k)` and `y = B(k,j)`
    #[inline]
    pub fn call(&self, x: &X, y: &Y, i: usize, k: usize, j: usize) -> Z {
        (self.func)(x, y, i, k, j)
    }

    pub fn opcode(&self) -> BinaryOpcode {
        self.opcode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_positional(&self) -> bool {
        self.opcode.is_positional()
    }

    pub fn is_commutative(&self) -> bool {
        self.commutative
    }

    /// Whether the operator reads the value of its first operand
    pub fn uses_x(&self) -> bool {
        self.reads_x
    }

    /// Whether the operator reads the value of its second operand
    pub fn uses_y(&self) -> bool {
        self.reads_y
    }

    pub fn types(&self) -> (TypeCode, TypeCode, TypeCode) {
        (X::TYPE, Y::TYPE, Z::TYPE)
    }
}

impl<X: Scalar, Y: Scalar> BinaryOp<X, Y, X> {
    /// `z = x`
    pub fn first() -> Self {
        Self::builtin(BinaryOpcode::First, false, |x, _, _, _, _| *x)
    }
}

impl<X: Scalar, Y: Scalar> BinaryOp<X, Y, Y> {
    /// `z = y`
    pub fn second() -> Self {
        Self::builtin(BinaryOpcode::Second, false, |_, y, _, _, _| *y)
    }
}

impl<X: Scalar, Y: Scalar, Z: Arith> BinaryOp<X, Y, Z> {
    /// `z = 1`
    pub fn pair() -> Self {
        Self::builtin(BinaryOpcode::Pair, true, |_, _, _, _, _| Z::ONE)
    }

    /// `z = i`
    pub fn first_i() -> Self {
        Self::builtin(BinaryOpcode::FirstI, false, |_, _, i, _, _| Z::from_index(i))
    }

    /// `z = k`, the column of A
    pub fn first_j() -> Self {
        Self::builtin(BinaryOpcode::FirstJ, false, |_, _, _, k, _| Z::from_index(k))
    }

    /// `z = k`, the row of B
    pub fn second_i() -> Self {
        Self::builtin(BinaryOpcode::SecondI, false, |_, _, _, k, _| Z::from_index(k))
    }

    /// `z = j`
    pub fn second_j() -> Self {
        Self::builtin(BinaryOpcode::SecondJ, false, |_, _, _, _, j| Z::from_index(j))
    }
}

macro_rules! arith_ops {
    ($($(#[$doc:meta])* $fn_name:ident => $opcode:ident, $comm:expr, |$x:ident, $y:ident| $body:expr;)*) => {
        impl<T: Arith> BinaryOp<T, T, T> {
            $(
                $(#[$doc])*
                pub fn $fn_name() -> Self {
                    Self::builtin(BinaryOpcode::$opcode, $comm, |$x: &T, $y: &T, _, _, _| {
                        let ($x, $y) = (*$x, *$y);
                        $body
                    })
                }
            )*
        }
    };
}

arith_ops! {
    /// `z = x + y`
    plus => Plus, true, |x, y| x.plus(y);
    /// `z = x - y`
    minus => Minus, false, |x, y| x.minus(y);
    /// `z = x * y`
    times => Times, true, |x, y| x.times(y);
    /// `z = x / y`
    div => Div, false, |x, y| x.div(y);
    min => Min, true, |x, y| x.min_of(y);
    max => Max, true, |x, y| x.max_of(y);
    land => Land, true, |x, y| T::from_bool(x.is_truthy() && y.is_truthy());
    lor => Lor, true, |x, y| T::from_bool(x.is_truthy() || y.is_truthy());
    lxor => Lxor, true, |x, y| T::from_bool(x.is_truthy() != y.is_truthy());
    iseq => IsEq, true, |x, y| T::from_bool(x == y);
    isne => IsNe, true, |x, y| T::from_bool(x != y);
    isgt => IsGt, false, |x, y| T::from_bool(x > y);
    islt => IsLt, false, |x, y| T::from_bool(x < y);
    isge => IsGe, false, |x, y| T::from_bool(x >= y);
    isle => IsLe, false, |x, y| T::from_bool(x <= y);
}

macro_rules! compare_ops {
    ($($fn_name:ident => $opcode:ident, $comm:expr, |$x:ident, $y:ident| $body:expr;)*) => {
        impl<T: Arith> BinaryOp<T, T, bool> {
            $(
                pub fn $fn_name() -> Self {
                    Self::builtin(BinaryOpcode::$opcode, $comm, |$x: &T, $y: &T, _, _, _| $body)
                }
            )*
        }
    };
}

compare_ops! {
    eq => Eq, true, |x, y| x == y;
    ne => Ne, true, |x, y| x != y;
    gt => Gt, false, |x, y| x > y;
    lt => Lt, false, |x, y| x < y;
    ge => Ge, false, |x, y| x >= y;
    le => Le, false, |x, y| x <= y;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_values() {
        assert_eq!(BinaryOp::<i32, i32, i32>::plus().call(&2, &3, 0, 0, 0), 5);
        assert_eq!(BinaryOp::<u8, u8, u8>::isge().call(&3, &7, 0, 0, 0), 0);
        assert_eq!(BinaryOp::<u8, u8, u8>::isge().call(&7, &7, 0, 0, 0), 1);
        assert!(BinaryOp::<f64, f64, bool>::lt().call(&1.0, &2.0, 0, 0, 0));
        assert_eq!(BinaryOp::<f64, i32, f64>::first().call(&1.5, &9, 0, 0, 0), 1.5);
        assert_eq!(BinaryOp::<f64, i32, i32>::second().call(&1.5, &9, 0, 0, 0), 9);
    }

    #[test]
    fn test_positional_operators() {
        let firsti = BinaryOp::<f64, f64, i64>::first_i();
        let secondj = BinaryOp::<f64, f64, i64>::second_j();
        assert!(firsti.is_positional());
        assert_eq!(firsti.call(&0.0, &0.0, 4, 5, 6), 4);
        assert_eq!(BinaryOp::<f64, f64, i64>::first_j().call(&0.0, &0.0, 4, 5, 6), 5);
        assert_eq!(BinaryOp::<f64, f64, i64>::second_i().call(&0.0, &0.0, 4, 5, 6), 5);
        assert_eq!(secondj.call(&0.0, &0.0, 4, 5, 6), 6);
        assert!(!firsti.uses_x() && !firsti.uses_y());
    }

    #[test]
    fn test_operand_usage() {
        assert!(BinaryOp::<i32, i32, i32>::first().uses_x());
        assert!(!BinaryOp::<i32, i32, i32>::first().uses_y());
        assert!(!BinaryOp::<i32, i32, i32>::second().uses_x());
        assert!(!BinaryOp::<i32, i32, i32>::pair().uses_x());
        let user = BinaryOp::<i32, i32, i32>::new_user("absdiff", |x, y| (x - y).abs());
        assert_eq!(user.opcode(), BinaryOpcode::User);
        assert!(user.uses_x() && user.uses_y());
        assert_eq!(user.call(&2, &9, 0, 0, 0), 7);
        assert_eq!(BinaryOp::<i32, i32, i32>::times().name(), "times_int32");
    }
}
