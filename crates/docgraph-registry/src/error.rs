//! Error types for type registration.

use thiserror::Error;

/// Reasons a type registration was refused.
///
/// [`TypeRegistry::create_type`](crate::TypeRegistry::create_type) logs
/// these and returns the bad-type sentinel; use
/// [`TypeRegistry::try_create_type`](crate::TypeRegistry::try_create_type)
/// to inspect them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The type name is not acceptable.
    #[error("invalid type name: {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The parent handle does not name a registered type.
    #[error("unknown parent for type {name}")]
    UnknownParent { name: String },

    /// The name is already registered under a different parent.
    #[error("type {name} already registered under {existing}, not {requested}")]
    ParentConflict {
        name: String,
        existing: String,
        requested: String,
    },
}
