//! Error types for document operations.
//!
//! Lookups and link resolution never produce these: they answer with
//! `Option`, sentinels, or reports. Errors are reserved for refused
//! mutations and for replay failures, which leave the document marked
//! inconsistent.

use docgraph_types::{ObjectId, TransactionId, ValueKind};
use thiserror::Error;

/// Errors from attribute access and declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("attribute not found: {name}")]
    NotFound { name: String },

    #[error("unknown attribute type: {type_name}")]
    UnknownType { type_name: String },

    #[error("type {type_name} is not an instantiable attribute type")]
    NotAnAttributeType { type_name: String },

    #[error("attribute {name} holds {expected} values, got {actual}")]
    KindMismatch {
        name: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("attribute name already in use: {name}")]
    NameCollision { name: String },
}

/// Errors from link mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("attribute {name} is not a link")]
    NotALink { name: String },

    #[error("attribute {name} is not a link list")]
    NotALinkList { name: String },

    #[error("link target {target} is not a live object of this document")]
    DeadTarget { target: ObjectId },
}

/// Errors from transaction replay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// A step of undo/redo/abort failed. The document is now inconsistent.
    #[error("replay of {id} failed: {reason}")]
    ReplayFailed { id: TransactionId, reason: String },

    /// A previous replay failed; history cannot be used until it is cleared.
    #[error("document is inconsistent after a failed replay; reload or clear history")]
    Inconsistent,
}

/// Errors from persistence and configuration loading.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error of the document core.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("type {0} does not derive from DocumentObject")]
    NotAnObjectType(String),

    #[error("type {0} is abstract")]
    AbstractType(String),

    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    /// The back-link mirror invariant does not hold.
    #[error("integrity violation: {0}")]
    Integrity(String),
}

/// Convenience alias for document operations.
pub type DocResult<T> = Result<T, DocumentError>;
