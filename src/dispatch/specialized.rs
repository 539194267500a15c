//! Compiled kernels for the common built-in semirings
//!
//! Each built-in semiring over a single built-in type gets its own copy of
//! the numeric kernels, with the monoid and the multiplier as zero-sized
//! strategy types so that the inner loops inline both. The tier applies when
//! A, B and C share one of the supported types and the `(monoid,
//! multiplier)` pair is in the table below.

use std::marker::PhantomData;

use crate::ops::{Arith, SemiringOps};

/// Additive monoid known at compile time
pub trait AddStrategy<T>: Send + Sync + 'static {
    /// First-writer-wins monoid
    const ANY: bool = false;

    fn add(x: T, y: T) -> T;
}

/// Multiplier known at compile time
pub trait MultiplyStrategy<T>: Send + Sync + 'static {
    /// Ignores both operands and returns one
    const PAIR: bool = false;

    fn multiply(x: T, y: T) -> T;
}

macro_rules! add_strategies {
    ($($(#[$doc:meta])* $name:ident $(any = $any:expr)? => |$x:ident, $y:ident| $body:expr;)*) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl<T: Arith> AddStrategy<T> for $name {
            $(const ANY: bool = $any;)?

            #[inline(always)]
            fn add($x: T, $y: T) -> T {
                $body
            }
        }
    )*};
}

macro_rules! multiply_strategies {
    ($($name:ident $(pair = $pair:expr)? => |$x:ident, $y:ident| $body:expr;)*) => {$(
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl<T: Arith> MultiplyStrategy<T> for $name {
            $(const PAIR: bool = $pair;)?

            #[inline(always)]
            fn multiply($x: T, $y: T) -> T {
                $body
            }
        }
    )*};
}

add_strategies! {
    AddPlus => |x, y| x.plus(y);
    AddMin => |x, y| x.min_of(y);
    AddMax => |x, y| x.max_of(y);
    /// Keeps the value already held
    AddAny any = true => |x, _y| x;
    AddLor => |x, y| T::from_bool(x.is_truthy() || y.is_truthy());
    AddLand => |x, y| T::from_bool(x.is_truthy() && y.is_truthy());
    AddLxor => |x, y| T::from_bool(x.is_truthy() != y.is_truthy());
}

multiply_strategies! {
    MulTimes => |x, y| x.times(y);
    MulPlus => |x, y| x.plus(y);
    MulMin => |x, y| x.min_of(y);
    MulMax => |x, y| x.max_of(y);
    MulFirst => |x, _y| x;
    MulSecond => |_x, y| y;
    MulPair pair = true => |_x, _y| T::ONE;
    MulLand => |x, y| T::from_bool(x.is_truthy() && y.is_truthy());
    MulLor => |x, y| T::from_bool(x.is_truthy() || y.is_truthy());
}

/// A built-in semiring over one type, with its operators fixed at compile
/// time
pub struct Builtin<T, Add, Mul> {
    identity: T,
    terminal: Option<T>,
    atomic: bool,
    _ops: PhantomData<fn() -> (Add, Mul)>,
}

impl<T: Arith, Add: AddStrategy<T>, Mul: MultiplyStrategy<T>> Builtin<T, Add, Mul> {
    pub fn new(identity: T, terminal: Option<T>, atomic: bool) -> Self {
        Self { identity, terminal, atomic, _ops: PhantomData }
    }
}

impl<T, Add, Mul> SemiringOps<T, T, T> for Builtin<T, Add, Mul>
where
    T: Arith,
    Add: AddStrategy<T>,
    Mul: MultiplyStrategy<T>,
{
    #[inline(always)]
    fn multiply(&self, a: &T, b: &T, _i: usize, _k: usize, _j: usize) -> T {
        Mul::multiply(*a, *b)
    }

    #[inline(always)]
    fn add(&self, x: &T, y: &T) -> T {
        Add::add(*x, *y)
    }

    fn identity(&self) -> T {
        self.identity
    }

    #[inline(always)]
    fn is_terminal(&self, z: &T) -> bool {
        match self.terminal {
            Some(t) => *z == t,
            None => Add::ANY,
        }
    }

    fn has_terminal(&self) -> bool {
        Add::ANY || self.terminal.is_some()
    }

    fn is_any(&self) -> bool {
        Add::ANY
    }

    fn is_pair(&self) -> bool {
        Mul::PAIR
    }

    fn is_positional(&self) -> bool {
        false
    }

    fn atomic_add(&self) -> bool {
        self.atomic
    }
}

#[cfg(feature = "specialized-kernels")]
mod table {
    use std::any::{Any, TypeId};

    use super::*;
    use crate::dispatch::TierOutcome;
    use crate::error::SaxpyResult;
    use crate::kernel::job::JobCore;
    use crate::kernel::{NumericJob, NumericOutput};
    use crate::matrix::SparseMatrix;
    use crate::ops::{BinaryOpcode, MonoidOpcode, Scalar, Semiring};

    fn cast<X: 'static, Y: Copy + 'static>(x: &X) -> Option<Y> {
        (x as &dyn Any).downcast_ref::<Y>().copied()
    }

    struct Params<T> {
        identity: T,
        terminal: Option<T>,
        atomic: bool,
    }

    /// Runs the compiled kernel for `(add, mul)` over `T`, if there is one
    fn run_builtin<T: Arith>(
        add: MonoidOpcode,
        mul: BinaryOpcode,
        params: Params<T>,
        core: &mut JobCore<'_>,
        a: &SparseMatrix<T>,
        b: &SparseMatrix<T>,
    ) -> SaxpyResult<Option<NumericOutput<T>>> {
        let Params { identity, terminal, atomic } = params;
        macro_rules! kernels {
            ($(($add:ident, $mul:ident) => $a:ident, $m:ident;)*) => {
                match (add, mul) {
                    $(
                        (MonoidOpcode::$add, BinaryOpcode::$mul) => {
                            let ops = Builtin::<T, $a, $m>::new(identity, terminal, atomic);
                            core.run(a, b, &ops).map(Some)
                        }
                    )*
                    _ => Ok(None),
                }
            };
        }
        kernels! {
            (Plus, Times) => AddPlus, MulTimes;
            (Plus, Min) => AddPlus, MulMin;
            (Plus, First) => AddPlus, MulFirst;
            (Plus, Second) => AddPlus, MulSecond;
            (Plus, Pair) => AddPlus, MulPair;
            (Min, Plus) => AddMin, MulPlus;
            (Min, Times) => AddMin, MulTimes;
            (Min, Max) => AddMin, MulMax;
            (Min, First) => AddMin, MulFirst;
            (Min, Second) => AddMin, MulSecond;
            (Max, Plus) => AddMax, MulPlus;
            (Max, Times) => AddMax, MulTimes;
            (Max, Min) => AddMax, MulMin;
            (Max, First) => AddMax, MulFirst;
            (Max, Second) => AddMax, MulSecond;
            (Any, First) => AddAny, MulFirst;
            (Any, Second) => AddAny, MulSecond;
            (Any, Pair) => AddAny, MulPair;
            (Lor, Land) => AddLor, MulLand;
            (Land, Lor) => AddLand, MulLor;
            (Lxor, Land) => AddLxor, MulLand;
        }
    }

    /// Tries the table with every operand and the result of type `T`
    fn run_as<T, A, B, Z>(
        semiring: &Semiring<A, B, Z>,
        job: &mut NumericJob<'_, A, B>,
    ) -> SaxpyResult<Option<TierOutcome<Z>>>
    where
        T: Arith,
        A: Scalar,
        B: Scalar,
        Z: Scalar,
    {
        if TypeId::of::<Z>() != TypeId::of::<T>() {
            return Ok(None);
        }
        let (a, b, core) = job.parts();
        let a = (a as &dyn Any).downcast_ref::<SparseMatrix<T>>();
        let b = (b as &dyn Any).downcast_ref::<SparseMatrix<T>>();
        let (Some(a), Some(b)) = (a, b) else { return Ok(None) };

        let monoid = semiring.add();
        let Some(identity) = cast::<Z, T>(&monoid.identity()) else { return Ok(None) };
        let terminal = match monoid.terminal() {
            Some(t) => match cast::<Z, T>(&t) {
                Some(t) => Some(t),
                None => return Ok(None),
            },
            None => None,
        };
        let params = Params { identity, terminal, atomic: monoid.supports_atomic() };

        let out = run_builtin(monoid.opcode(), semiring.multiply().opcode(), params, core, a, b)?;
        let Some(out) = out else {
            let reason = format!("no compiled kernel for {}", semiring.name());
            return Ok(Some(TierOutcome::NotApplicable(reason)));
        };
        let out: Box<dyn Any> = Box::new(out);
        Ok(out.downcast::<NumericOutput<Z>>().ok().map(|out| TierOutcome::Done(*out)))
    }

    pub(crate) fn try_specialized<A: Scalar, B: Scalar, Z: Scalar>(
        semiring: &Semiring<A, B, Z>,
        enabled: bool,
        job: &mut NumericJob<'_, A, B>,
    ) -> SaxpyResult<TierOutcome<Z>> {
        if !enabled {
            return Ok(TierOutcome::NotApplicable("disabled by configuration".to_string()));
        }
        macro_rules! by_type {
            ($($t:ty),*) => {$(
                if let Some(outcome) = run_as::<$t, A, B, Z>(semiring, job)? {
                    return Ok(outcome);
                }
            )*};
        }
        by_type!(bool, i32, i64, u32, u64, f32, f64);
        Ok(TierOutcome::NotApplicable(format!(
            "no compiled kernel for types ({}, {}, {})",
            A::TYPE,
            B::TYPE,
            Z::TYPE
        )))
    }
}

#[cfg(feature = "specialized-kernels")]
pub(crate) use table::try_specialized;

#[cfg(not(feature = "specialized-kernels"))]
pub(crate) fn try_specialized<A: crate::ops::Scalar, B: crate::ops::Scalar, Z: crate::ops::Scalar>(
    _semiring: &crate::ops::Semiring<A, B, Z>,
    _enabled: bool,
    _job: &mut crate::kernel::NumericJob<'_, A, B>,
) -> crate::error::SaxpyResult<super::TierOutcome<Z>> {
    Ok(super::TierOutcome::NotApplicable("built without specialized kernels".to_string()))
}
