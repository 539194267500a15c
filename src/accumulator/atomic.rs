//! Lock-free updates of packed value words
//!
//! Fine tasks on the atomic path keep each value of the shared table in an
//! `AtomicU64`, encoded with the type's [`WordCodec`]. Additions retry a
//! compare-and-swap until no other member has changed the word in between.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ops::WordCodec;

/// Reads the value held in `word`
#[inline]
pub fn load<Z>(word: &AtomicU64, codec: WordCodec<Z>) -> Z {
    (codec.unpack)(word.load(Ordering::Acquire))
}

/// Overwrites `word` with `z`
#[inline]
pub fn store<Z>(word: &AtomicU64, codec: WordCodec<Z>, z: Z) {
    word.store((codec.pack)(z), Ordering::Release);
}

/// Replaces the value `x` held in `word` by `add(x, t)`
///
/// Stops early without writing when `skip(x)` holds for the current value.
#[inline]
pub fn accumulate<Z, F, S>(word: &AtomicU64, codec: WordCodec<Z>, t: &Z, add: F, skip: S)
where
    Z: Copy,
    F: Fn(&Z, &Z) -> Z,
    S: Fn(&Z) -> bool,
{
    let mut current = word.load(Ordering::Acquire);
    loop {
        let x = (codec.unpack)(current);
        if skip(&x) {
            return;
        }
        let next = (codec.pack)(add(&x, t));
        if next == current {
            return;
        }
        match word.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}
