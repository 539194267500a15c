//! Error types for the saxpy3 engine

use thiserror::Error;

/// Result alias used throughout the crate
pub type SaxpyResult<T> = Result<T, SaxpyError>;

/// Errors reported by the multiplication engine
///
/// Out-of-memory is the only failure the kernels themselves can produce,
/// and it is always detected before any parallel region starts. The other
/// variants come from argument validation at the public entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaxpyError {
    /// A workspace or output allocation could not be satisfied
    #[error("out of memory: {what} needs {bytes} bytes")]
    OutOfMemory {
        /// Which buffer was being allocated
        what: &'static str,
        /// Requested size in bytes
        bytes: usize,
    },

    /// Operand dimensions do not conform
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Malformed operands or configuration
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SaxpyError {
    /// Create an out-of-memory error for a named buffer
    pub fn out_of_memory(what: &'static str, bytes: usize) -> Self {
        SaxpyError::OutOfMemory { what, bytes }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<S: Into<String>>(msg: S) -> Self {
        SaxpyError::DimensionMismatch(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        SaxpyError::InvalidInput(msg.into())
    }

    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, SaxpyError::OutOfMemory { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SaxpyError::out_of_memory("hash table", 4096);
        assert_eq!(err.to_string(), "out of memory: hash table needs 4096 bytes");
        assert!(err.is_out_of_memory());

        let err = SaxpyError::dimension_mismatch("A is 3x4 but B is 5x2");
        assert_eq!(err.to_string(), "dimension mismatch: A is 3x4 but B is 5x2");
        assert!(!err.is_out_of_memory());
    }
}
