//! Element types that can flow through the engine

use std::fmt;

use num_traits::{AsPrimitive, Bounded};

/// Runtime tag for an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Fp32,
    Fp64,
    /// A user-defined type, identified by name
    User(&'static str),
}

impl TypeCode {
    pub fn name(&self) -> &'static str {
        match self {
            TypeCode::Bool => "bool",
            TypeCode::Int8 => "int8",
            TypeCode::Int16 => "int16",
            TypeCode::Int32 => "int32",
            TypeCode::Int64 => "int64",
            TypeCode::UInt8 => "uint8",
            TypeCode::UInt16 => "uint16",
            TypeCode::UInt32 => "uint32",
            TypeCode::UInt64 => "uint64",
            TypeCode::Fp32 => "fp32",
            TypeCode::Fp64 => "fp64",
            TypeCode::User(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, TypeCode::User(_))
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packs a value into a 64-bit word and back, for lock-free accumulation
pub struct WordCodec<T> {
    pub pack: fn(T) -> u64,
    pub unpack: fn(u64) -> T,
}

impl<T> Clone for WordCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WordCodec<T> {}

/// An element type of a matrix
///
/// Built-in numeric types implement this already. A user-defined type only
/// needs [`Scalar::TYPE`] and [`Scalar::is_truthy`]; leaving
/// [`Scalar::WORD`] as `None` routes fine-task accumulation through the
/// serialized path.
pub trait Scalar: Copy + Send + Sync + fmt::Debug + PartialEq + Default + 'static {
    const TYPE: TypeCode;

    /// Word encoding used by atomic accumulation, if the type fits one
    const WORD: Option<WordCodec<Self>> = None;

    /// Truth value of a mask entry holding this value
    fn is_truthy(&self) -> bool;
}

/// Bit-level conversion between a built-in type and a 64-bit word
trait WordBits: Sized {
    fn to_word(self) -> u64;
    fn from_word(word: u64) -> Self;
}

macro_rules! int_word_bits {
    ($($t:ty => $u:ty),*) => {$(
        impl WordBits for $t {
            #[inline]
            fn to_word(self) -> u64 {
                self as $u as u64
            }
            #[inline]
            fn from_word(word: u64) -> Self {
                word as $u as $t
            }
        }
    )*};
}

int_word_bits!(i8 => u8, i16 => u16, i32 => u32, i64 => u64, u8 => u8, u16 => u16, u32 => u32, u64 => u64);

impl WordBits for bool {
    #[inline]
    fn to_word(self) -> u64 {
        self as u64
    }
    #[inline]
    fn from_word(word: u64) -> Self {
        word != 0
    }
}

impl WordBits for f32 {
    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits() as u64
    }
    #[inline]
    fn from_word(word: u64) -> Self {
        f32::from_bits(word as u32)
    }
}

impl WordBits for f64 {
    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits()
    }
    #[inline]
    fn from_word(word: u64) -> Self {
        f64::from_bits(word)
    }
}

macro_rules! builtin_scalar {
    ($($t:ty => $code:ident, |$x:ident| $truthy:expr;)*) => {$(
        impl Scalar for $t {
            const TYPE: TypeCode = TypeCode::$code;
            const WORD: Option<WordCodec<Self>> = Some(WordCodec {
                pack: <$t as WordBits>::to_word,
                unpack: <$t as WordBits>::from_word,
            });

            #[inline]
            fn is_truthy(&self) -> bool {
                let $x = *self;
                $truthy
            }
        }
    )*};
}

builtin_scalar! {
    bool => Bool, |x| x;
    i8 => Int8, |x| x != 0;
    i16 => Int16, |x| x != 0;
    i32 => Int32, |x| x != 0;
    i64 => Int64, |x| x != 0;
    u8 => UInt8, |x| x != 0;
    u16 => UInt16, |x| x != 0;
    u32 => UInt32, |x| x != 0;
    u64 => UInt64, |x| x != 0;
    f32 => Fp32, |x| x != 0.0;
    f64 => Fp64, |x| x != 0.0;
}

/// Arithmetic needed by the built-in operators
///
/// Integer arithmetic wraps. Integer division by zero follows the usual
/// sparse-library convention: `0 / 0 = 0`, otherwise the result saturates
/// toward the sign of the dividend. Over `bool`, `plus` is logical or,
/// `times` is logical and, `minus` is exclusive or and `div` returns `x`.
pub trait Arith: Scalar + PartialOrd {
    const ZERO: Self;
    const ONE: Self;
    /// Smallest value, negative infinity for floats
    const MIN_VALUE: Self;
    /// Largest value, positive infinity for floats
    const MAX_VALUE: Self;

    fn plus(self, other: Self) -> Self;
    fn minus(self, other: Self) -> Self;
    fn times(self, other: Self) -> Self;
    fn div(self, other: Self) -> Self;

    /// Minimum; for floats a NaN operand yields the other operand
    fn min_of(self, other: Self) -> Self;
    /// Maximum; for floats a NaN operand yields the other operand
    fn max_of(self, other: Self) -> Self;

    fn from_bool(b: bool) -> Self;
    fn from_index(i: usize) -> Self;
}

macro_rules! signed_arith {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const MIN_VALUE: Self = <$t>::MIN;
            const MAX_VALUE: Self = <$t>::MAX;

            #[inline]
            fn plus(self, other: Self) -> Self { self.wrapping_add(other) }
            #[inline]
            fn minus(self, other: Self) -> Self { self.wrapping_sub(other) }
            #[inline]
            fn times(self, other: Self) -> Self { self.wrapping_mul(other) }
            #[inline]
            fn div(self, other: Self) -> Self {
                if other == 0 {
                    if self == 0 { 0 } else if self < 0 { <$t as Bounded>::min_value() } else { <$t as Bounded>::max_value() }
                } else {
                    self.wrapping_div(other)
                }
            }
            #[inline]
            fn min_of(self, other: Self) -> Self { Ord::min(self, other) }
            #[inline]
            fn max_of(self, other: Self) -> Self { Ord::max(self, other) }
            #[inline]
            fn from_bool(b: bool) -> Self { b as $t }
            #[inline]
            fn from_index(i: usize) -> Self { i.as_() }
        }
    )*};
}

macro_rules! unsigned_arith {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const MIN_VALUE: Self = 0;
            const MAX_VALUE: Self = <$t>::MAX;

            #[inline]
            fn plus(self, other: Self) -> Self { self.wrapping_add(other) }
            #[inline]
            fn minus(self, other: Self) -> Self { self.wrapping_sub(other) }
            #[inline]
            fn times(self, other: Self) -> Self { self.wrapping_mul(other) }
            #[inline]
            fn div(self, other: Self) -> Self {
                if other == 0 {
                    if self == 0 { 0 } else { <$t as Bounded>::max_value() }
                } else {
                    self / other
                }
            }
            #[inline]
            fn min_of(self, other: Self) -> Self { Ord::min(self, other) }
            #[inline]
            fn max_of(self, other: Self) -> Self { Ord::max(self, other) }
            #[inline]
            fn from_bool(b: bool) -> Self { b as $t }
            #[inline]
            fn from_index(i: usize) -> Self { i.as_() }
        }
    )*};
}

macro_rules! float_arith {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const MIN_VALUE: Self = <$t>::NEG_INFINITY;
            const MAX_VALUE: Self = <$t>::INFINITY;

            #[inline]
            fn plus(self, other: Self) -> Self { self + other }
            #[inline]
            fn minus(self, other: Self) -> Self { self - other }
            #[inline]
            fn times(self, other: Self) -> Self { self * other }
            #[inline]
            fn div(self, other: Self) -> Self { self / other }
            #[inline]
            fn min_of(self, other: Self) -> Self { self.min(other) }
            #[inline]
            fn max_of(self, other: Self) -> Self { self.max(other) }
            #[inline]
            fn from_bool(b: bool) -> Self { if b { 1.0 } else { 0.0 } }
            #[inline]
            fn from_index(i: usize) -> Self { i.as_() }
        }
    )*};
}

signed_arith!(i8, i16, i32, i64);
unsigned_arith!(u8, u16, u32, u64);
float_arith!(f32, f64);

impl Arith for bool {
    const ZERO: Self = false;
    const ONE: Self = true;
    const MIN_VALUE: Self = false;
    const MAX_VALUE: Self = true;

    #[inline]
    fn plus(self, other: Self) -> Self {
        self || other
    }
    #[inline]
    fn minus(self, other: Self) -> Self {
        self != other
    }
    #[inline]
    fn times(self, other: Self) -> Self {
        self && other
    }
    #[inline]
    fn div(self, _other: Self) -> Self {
        self
    }
    #[inline]
    fn min_of(self, other: Self) -> Self {
        self && other
    }
    #[inline]
    fn max_of(self, other: Self) -> Self {
        self || other
    }
    #[inline]
    fn from_bool(b: bool) -> Self {
        b
    }
    #[inline]
    fn from_index(i: usize) -> Self {
        i != 0
    }
}
