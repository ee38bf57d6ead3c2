use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object handle: {0}")]
    InvalidHandle(String),

    #[error("value kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },
}
