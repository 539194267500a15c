//! Utility functions and helpers

pub mod formats;

pub use formats::{from_sprs, to_sprs};

use std::ops::Range;

use aligned_vec::AVec;

use crate::constants::CACHE_LINE_BYTES;
use crate::error::{SaxpyError, SaxpyResult};

/// Computes an exclusive prefix sum (scan) for a vector
pub fn exclusive_scan(input: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(input.len() + 1);
    let mut sum = 0;

    result.push(0); // First element is always 0

    for &val in input {
        sum += val;
        result.push(sum);
    }

    result
}

/// Splits `0..n` into `ntasks` contiguous slices of roughly equal work
///
/// `cumulative` has `n + 1` entries with `cumulative[0] == 0`; slice `t` is
/// `result[t]..result[t + 1]`. When there is no work the items are split
/// evenly by count.
pub fn pslice(cumulative: &[usize], ntasks: usize) -> Vec<usize> {
    let n = cumulative.len().saturating_sub(1);
    let ntasks = ntasks.max(1);
    let mut slice = vec![0; ntasks + 1];
    slice[ntasks] = n;

    let work = cumulative.last().copied().unwrap_or(0);
    for t in 1..ntasks {
        slice[t] = if work == 0 {
            t * n / ntasks
        } else {
            let target = t as f64 * work as f64 / ntasks as f64;
            cumulative.partition_point(|&w| (w as f64) < target).min(n)
        };
        slice[t] = slice[t].max(slice[t - 1]);
    }
    slice
}

/// Splits `data` into consecutive pieces at the given boundaries
///
/// `bounds` starts at 0, is nondecreasing and ends at `data.len()`.
pub fn split_at_bounds<'a, T>(mut data: &'a mut [T], bounds: &[usize]) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(bounds.len().saturating_sub(1));
    for w in bounds.windows(2) {
        let (head, tail) = std::mem::take(&mut data).split_at_mut(w[1] - w[0]);
        parts.push(head);
        data = tail;
    }
    parts
}

/// Borrows disjoint, increasing ranges of `data` mutably
pub fn split_ranges_mut<'a, T, I>(mut data: &'a mut [T], ranges: I) -> Vec<&'a mut [T]>
where
    I: IntoIterator<Item = Range<usize>>,
{
    let mut parts = Vec::new();
    let mut consumed = 0;
    for range in ranges {
        debug_assert!(range.start >= consumed, "ranges must be disjoint and increasing");
        let rest = std::mem::take(&mut data);
        let (_, rest) = rest.split_at_mut(range.start - consumed);
        let (part, rest) = rest.split_at_mut(range.end - range.start);
        parts.push(part);
        data = rest;
        consumed = range.end;
    }
    parts
}

/// Allocates `len` copies of `value`, reporting failure instead of aborting
pub fn try_filled<T: Clone>(len: usize, value: T, what: &'static str) -> SaxpyResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| SaxpyError::out_of_memory(what, len.saturating_mul(std::mem::size_of::<T>())))?;
    v.resize(len, value);
    Ok(v)
}

/// Like [`try_filled`] for types that are built rather than cloned
pub fn try_filled_with<T, F>(len: usize, f: F, what: &'static str) -> SaxpyResult<Vec<T>>
where
    F: FnMut() -> T,
{
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| SaxpyError::out_of_memory(what, len.saturating_mul(std::mem::size_of::<T>())))?;
    v.resize_with(len, f);
    Ok(v)
}

/// Empty vector with room for `capacity` items
pub fn try_with_capacity<T>(capacity: usize, what: &'static str) -> SaxpyResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(capacity).map_err(|_| {
        SaxpyError::out_of_memory(what, capacity.saturating_mul(std::mem::size_of::<T>()))
    })?;
    Ok(v)
}

/// Cache-line aligned buffer of `len` default values
pub fn try_aligned_zeros<T: Copy + Default>(len: usize, what: &'static str) -> SaxpyResult<AVec<T>> {
    let bytes = len.saturating_mul(std::mem::size_of::<T>());
    if bytes > isize::MAX as usize - CACHE_LINE_BYTES {
        return Err(SaxpyError::out_of_memory(what, bytes));
    }
    // AVec aborts on allocation failure, so reserve the same size first
    let mut trial = Vec::<T>::new();
    trial.try_reserve_exact(len).map_err(|_| SaxpyError::out_of_memory(what, bytes))?;
    drop(trial);
    Ok(AVec::from_iter(CACHE_LINE_BYTES, std::iter::repeat(T::default()).take(len)))
}
