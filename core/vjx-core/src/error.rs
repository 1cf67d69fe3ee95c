//! Error types for the VJX join engine.
//!
//! All public APIs return `VjxResult<T>` — no panics in library code.

use thiserror::Error;

/// Unified error type for all VJX operations.
#[derive(Debug, Error)]
pub enum VjxError {
    /// Apache Arrow error (RecordBatch operations)
    #[error("arrow error: {source}")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    /// Memory pool refused an allocation request
    #[error("out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// Schema definition or validation error
    #[error("schema error: {0}")]
    Schema(String),

    /// A caller broke an interface contract or internal state is corrupt
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Invalid operation for the engine's current state
    #[error("invalid operation: {message}\nContext: {context}")]
    InvalidOperation { message: String, context: String },

    /// Join key column has a type the key encoder does not handle
    #[error("join key type not supported: {0}")]
    KeyTypeNotSupported(String),
}

/// Result type alias for all VJX operations.
pub type VjxResult<T> = Result<T, VjxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_out_of_memory() {
        let err = VjxError::OutOfMemory {
            requested: 4096,
            available: 1024,
        };
        assert_eq!(
            err.to_string(),
            "out of memory: requested 4096 bytes, 1024 available"
        );
    }

    #[test]
    fn error_display_invariant() {
        let err = VjxError::Invariant("chain cursor points past build batches".to_string());
        assert!(err.to_string().contains("invariant violation"));
    }

    #[test]
    fn error_display_invalid_operation() {
        let err = VjxError::InvalidOperation {
            message: "probe after close".to_string(),
            context: "engine buffers already released".to_string(),
        };
        assert!(err.to_string().contains("invalid operation"));
        assert!(err.to_string().contains("probe after close"));
    }

    #[test]
    fn vjx_result_ok() {
        let result: VjxResult<i32> = Ok(7);
        assert_eq!(result.unwrap(), 7);
    }
}
