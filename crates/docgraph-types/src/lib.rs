//! Foundation types for docgraph.
//!
//! This crate provides the identity, value, and versioning types shared by
//! the type registry and the document core. Every other docgraph crate
//! depends on `docgraph-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Generation-counted arena handle of a document object
//! - [`TransactionId`]: Process-wide monotonically increasing transaction id
//! - [`Value`]: Closed tagged variant over the concrete attribute kinds
//! - [`ValueKind`]: Fieldless discriminant of [`Value`]
//! - [`VersionInfo`]: Document format version carried through persistence

pub mod error;
pub mod object;
pub mod transaction;
pub mod value;
pub mod version;

pub use error::TypeError;
pub use object::ObjectId;
pub use transaction::TransactionId;
pub use value::{Value, ValueKind};
pub use version::{VersionInfo, FORMAT_VERSION};
