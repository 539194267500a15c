//! Monoids used as the additive part of a semiring

use std::fmt;
use std::sync::Arc;

use super::scalar::{Arith, Scalar, TypeCode};

/// Identifies a built-in monoid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonoidOpcode {
    Plus,
    Times,
    Min,
    Max,
    /// Keeps any one of the values it is given
    Any,
    Lor,
    Land,
    Lxor,
    Eq,
    User,
}

impl MonoidOpcode {
    pub fn name(&self) -> &'static str {
        match self {
            MonoidOpcode::Plus => "plus",
            MonoidOpcode::Times => "times",
            MonoidOpcode::Min => "min",
            MonoidOpcode::Max => "max",
            MonoidOpcode::Any => "any",
            MonoidOpcode::Lor => "lor",
            MonoidOpcode::Land => "land",
            MonoidOpcode::Lxor => "lxor",
            MonoidOpcode::Eq => "eq",
            MonoidOpcode::User => "user",
        }
    }
}

type AddFn<Z> = dyn Fn(&Z, &Z) -> Z + Send + Sync;

/// An associative, commutative operator with an identity and an optional
/// terminal (absorbing) value
pub struct Monoid<Z> {
    opcode: MonoidOpcode,
    name: String,
    add: Arc<AddFn<Z>>,
    identity: Z,
    terminal: Option<Z>,
    atomic: bool,
}

impl<Z: Clone> Clone for Monoid<Z> {
    fn clone(&self) -> Self {
        Self {
            opcode: self.opcode,
            name: self.name.clone(),
            add: Arc::clone(&self.add),
            identity: self.identity.clone(),
            terminal: self.terminal.clone(),
            atomic: self.atomic,
        }
    }
}

impl<Z: fmt::Debug> fmt::Debug for Monoid<Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monoid")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .field("terminal", &self.terminal)
            .finish()
    }
}

impl<Z: Scalar> Monoid<Z> {
    fn builtin<F>(opcode: MonoidOpcode, identity: Z, terminal: Option<Z>, f: F) -> Self
    where
        F: Fn(&Z, &Z) -> Z + Send + Sync + 'static,
    {
        Self {
            opcode,
            name: format!("{}_{}", opcode.name(), Z::TYPE),
            add: Arc::new(f),
            identity,
            terminal,
            atomic: true,
        }
    }

    /// Create a user-defined monoid
    ///
    /// The operator must be associative and commutative with `identity` as
    /// its identity. User monoids are never updated with atomics unless
    /// [`Monoid::with_atomic`] says so.
    pub fn new_user<F>(name: &str, identity: Z, f: F) -> Self
    where
        F: Fn(&Z, &Z) -> Z + Send + Sync + 'static,
    {
        Self {
            opcode: MonoidOpcode::User,
            name: name.to_string(),
            add: Arc::new(f),
            identity,
            terminal: None,
            atomic: false,
        }
    }

    /// Set the absorbing value: `add(terminal, x) == terminal` for all `x`
    pub fn with_terminal(mut self, terminal: Z) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Allow lock-free compare-and-swap accumulation when `Z` fits a word
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    #[inline]
    pub fn add(&self, x: &Z, y: &Z) -> Z {
        (self.add)(x, y)
    }

    pub fn identity(&self) -> Z {
        self.identity
    }

    pub fn terminal(&self) -> Option<Z> {
        self.terminal
    }

    pub fn has_terminal(&self) -> bool {
        self.terminal.is_some() || self.is_any()
    }

    /// Whether `z` can no longer change under further additions
    ///
    /// Every value of the ANY monoid is terminal.
    #[inline]
    pub fn is_terminal(&self, z: &Z) -> bool {
        match self.terminal {
            Some(t) => *z == t,
            None => self.is_any(),
        }
    }

    pub fn is_any(&self) -> bool {
        self.opcode == MonoidOpcode::Any
    }

    pub fn supports_atomic(&self) -> bool {
        self.atomic
    }

    pub fn opcode(&self) -> MonoidOpcode {
        self.opcode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ztype(&self) -> TypeCode {
        Z::TYPE
    }
}

impl<T: Arith> Monoid<T> {
    /// Addition; over `bool` this is logical or with terminal `true`
    pub fn plus() -> Self {
        let terminal = (T::TYPE == TypeCode::Bool).then_some(T::ONE);
        Self::builtin(MonoidOpcode::Plus, T::ZERO, terminal, |x, y| x.plus(*y))
    }

    /// Multiplication; integer zero is terminal, floats have no terminal
    pub fn times() -> Self {
        let is_float = matches!(T::TYPE, TypeCode::Fp32 | TypeCode::Fp64);
        let terminal = (!is_float).then_some(T::ZERO);
        Self::builtin(MonoidOpcode::Times, T::ONE, terminal, |x, y| x.times(*y))
    }

    pub fn min() -> Self {
        Self::builtin(MonoidOpcode::Min, T::MAX_VALUE, Some(T::MIN_VALUE), |x, y| x.min_of(*y))
    }

    pub fn max() -> Self {
        Self::builtin(MonoidOpcode::Max, T::MIN_VALUE, Some(T::MAX_VALUE), |x, y| x.max_of(*y))
    }

    /// Keeps the first value written to each entry
    pub fn any() -> Self {
        Self::builtin(MonoidOpcode::Any, T::ZERO, None, |x, _| *x)
    }

    pub fn lor() -> Self {
        Self::builtin(MonoidOpcode::Lor, T::from_bool(false), Some(T::from_bool(true)), |x, y| {
            T::from_bool(x.is_truthy() || y.is_truthy())
        })
    }

    pub fn land() -> Self {
        Self::builtin(MonoidOpcode::Land, T::from_bool(true), Some(T::from_bool(false)), |x, y| {
            T::from_bool(x.is_truthy() && y.is_truthy())
        })
    }

    pub fn lxor() -> Self {
        Self::builtin(MonoidOpcode::Lxor, T::from_bool(false), None, |x, y| {
            T::from_bool(x.is_truthy() != y.is_truthy())
        })
    }
}

impl Monoid<bool> {
    /// Logical equality (xnor)
    pub fn eq() -> Self {
        Self::builtin(MonoidOpcode::Eq, true, None, |x, y| x == y)
    }
}
