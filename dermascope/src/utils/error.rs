//! Error Handling Module
//!
//! Defines custom error types for the dermascope library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::inference::codec::DecodeError;

/// Main error type for dermascope operations
#[derive(Error, Debug)]
pub enum DermascopeError {
    /// Malformed or missing request fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport text or image bytes could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The classifier or explanation engine failed during a forward pass
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model artifact could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for dermascope operations
pub type Result<T> = std::result::Result<T, DermascopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DermascopeError::Dataset("missing metadata".to_string());
        assert_eq!(format!("{}", err), "Dataset error: missing metadata");
    }

    #[test]
    fn test_decode_error_is_transparent() {
        let err = DermascopeError::from(DecodeError::BadEncoding("truncated".to_string()));
        assert!(format!("{}", err).contains("truncated"));
    }
}
