//! # saxpy3: masked sparse matrix multiplication over semirings
//!
//! This crate computes `C<M> = A*B` for sparse matrices over an arbitrary
//! semiring, optionally under a mask `M` or its complement. It follows the
//! saxpy formulation: every column of C is built as a sum of columns of A
//! scaled by the entries of the matching column of B.
//!
//! ## Overview
//!
//! - Work is estimated per column of B, then split into **coarse tasks**
//!   (ranges of columns) and **fine tasks** (teams that share one costly
//!   column).
//! - Each task accumulates in either a dense **Gustavson** table or an
//!   open-addressing **hash** table, sized from its flop bound.
//! - A symbolic phase fixes the structure of C before a numeric phase fills
//!   in the values.
//! - The numeric phase runs on a just-in-time backend if one is registered,
//!   else on a kernel compiled for a built-in semiring, else on a generic
//!   kernel that works for any user-defined type and operator.
//!
//! ## Usage
//!
//! ```
//! use saxpy3::{Saxpy3, SaxpyConfig, Semiring, SparseMatrix};
//!
//! let a = SparseMatrix::new(3, 3, vec![0, 1, 2, 3], vec![0, 1, 2], vec![2.0, 3.0, 4.0]);
//! let b = SparseMatrix::new(3, 3, vec![0, 1, 2, 3], vec![0, 1, 2], vec![5.0, 6.0, 7.0]);
//!
//! let semiring = Semiring::<f64, f64, f64>::plus_times();
//! let engine = Saxpy3::new(&semiring, SaxpyConfig::default());
//! let c = engine.multiply(None, &a, &b).unwrap().matrix;
//!
//! assert_eq!(c.triplets(), vec![(0, 0, 10.0), (1, 1, 18.0), (2, 2, 28.0)]);
//! ```
//!
//! Masked products go through [`mxm`], which also handles a mask the engine
//! chose not to apply:
//!
//! ```
//! use saxpy3::{mxm, Mask, Saxpy3, SaxpyConfig, Semiring, SparseMatrix};
//!
//! let a = SparseMatrix::<i64>::identity(3);
//! let m = SparseMatrix::new(3, 3, vec![0, 1, 1, 1], vec![0], vec![true]);
//! let semiring = Semiring::<i64, i64, i64>::plus_times();
//! let engine = Saxpy3::new(&semiring, SaxpyConfig::default());
//!
//! let c = mxm(None, Some(Mask::new(&m)), true, &a, &a, &engine).unwrap();
//! assert_eq!(c.triplets(), vec![(0, 0, 1)]);
//! ```

pub mod accumulator;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod mxm;
pub mod ops;
pub mod parallel;
pub mod saxpy3;
pub mod schedule;
pub mod utils;

// Re-export primary components
pub use dispatch::{DisabledJit, JitBackend, JitRun, KernelKey, KernelTier};
pub use error::{SaxpyError, SaxpyResult};
pub use kernel::{NumericJob, NumericOutput};
pub use matrix::config::{AxbMethod, DispatchControl, PlatformAtomics, SaxpyConfig, SystemParameters, TaskTuning};
pub use matrix::{apply_mask, reference_mxm, Format, Mask, SparseMatrix, Values};
pub use mxm::mxm;
pub use ops::{Arith, BinaryOp, BinaryOpcode, Monoid, MonoidOpcode, Scalar, Semiring, SemiringOps, TypeCode};
pub use saxpy3::{Saxpy3, SaxpyProduct};
pub use schedule::TaskStats;
pub use utils::{from_sprs, to_sprs};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
