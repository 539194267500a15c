//! Centralized constants for the saxpy3 engine
//!
//! Scheduling thresholds live here as defaults; every one of them can be
//! overridden per call through [`TaskTuning`](crate::matrix::config::TaskTuning).
//! Constants are organized by category for easy reference and maintenance.

// ============================================================================
// TASK SCHEDULING
// ============================================================================

/// Initial tasks created per thread when slicing the columns of B
pub const NTASKS_PER_THREAD: usize = 2;

/// A column costing more than this multiple of the target task size is
/// handed to a fine team
pub const COSTLY: f64 = 1.2;

/// Fine tasks are this many times smaller than coarse tasks
pub const FINE_WORK: f64 = 2.0;

/// Default work per thread used by the thread-count heuristic
pub const DEFAULT_CHUNK: f64 = 65_536.0;

// ============================================================================
// MASK ECONOMY
// ============================================================================

/// Discard a sparse mask when the unmasked flops are below this fraction of
/// the mask work
pub const MWORK_ALPHA: f64 = 0.01;

/// Use a dense mask in place when the flops are below this fraction of
/// `cvlen * cvdim`
pub const MWORK_BETA: f64 = 0.10;

// ============================================================================
// HASH TABLES
// ============================================================================

/// The default method picks Gustavson once the hash table reaches
/// `cvlen / GUSTAVSON_DIVISOR`
pub const GUSTAVSON_DIVISOR: usize = 16;

/// Multiplier of the table hash function `(i * 257) & (size - 1)`
pub const HASH_MULTIPLIER: usize = 257;

/// Cache line size in bytes, used for workspace alignment and padding
pub const CACHE_LINE_BYTES: usize = 64;

/// Padding in words appended to every word-sized workspace table
pub const TABLE_PAD_WORDS: usize = CACHE_LINE_BYTES / 8;

// ============================================================================
// OUTPUT
// ============================================================================

/// Coarse Gustavson columns denser than `cvlen / DENSE_GATHER_DIVISOR`
/// are gathered by scanning the table instead of sorting
pub const DENSE_GATHER_DIVISOR: usize = 16;
