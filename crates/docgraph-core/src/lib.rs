//! Document core for docgraph.
//!
//! A [`Document`] owns typed objects whose attributes can be declared by
//! their type or added at run time, links between objects with an
//! automatically maintained back-link mirror, and a transactional
//! undo/redo history.
//!
//! - Attributes are written through the document only; every write is
//!   recorded in the open transaction and keeps back-links in step.
//! - Repeated writes of one attribute in one transaction are coalesced
//!   into a single undo snapshot.
//! - Undo and redo re-instate objects under their original handles, so
//!   links captured in snapshots stay valid.
//! - Transaction ids come from a process-wide counter, so one user action
//!   can be undone across several documents at once.
//!
//! # Modules
//!
//! - [`error`]: Error types and the [`DocResult`] alias
//! - [`config`]: [`DocumentConfig`] and deep copy policies
//! - [`attribute`]: [`Attribute`] and the per-object [`AttributeContainer`]
//! - [`object`]: [`DocObject`] and its [`BackLinks`]
//! - [`document`]: The [`Document`] and its single write path
//! - [`link`]: Link mutation, mirror verification, resolution after load
//! - [`copy`]: Deep copy with link remapping
//! - [`transaction`]: [`Transaction`] recording and journal encoding
//! - [`replay`]: Undo, redo, abort and grouped undo
//! - [`persist`]: JSON save/restore and document digests

mod arena;
pub mod attribute;
pub mod config;
pub mod copy;
pub mod document;
pub mod error;
pub mod link;
pub mod object;
pub mod persist;
pub mod replay;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use attribute::{Attribute, AttributeContainer, AttributeMeta, AttributeSpec};
pub use config::{DeepCopyConfig, DocumentConfig, ExternalPolicy};
pub use copy::CopyMap;
pub use document::Document;
pub use error::{AttributeError, DocResult, DocumentError, LinkError, PersistError, TransactionError};
pub use link::{BrokenLink, LinkResolution, LinkViolation};
pub use object::{BackLinks, DocObject};
pub use persist::{AttributeRecord, DocumentRecord, LoadReport, ObjectRecord, StoredValue};
pub use transaction::{
    AttributeSnapshot, ObjectSnapshot, ObjectState, Transaction, TransactionObject, AUTO_TRANSACTION_NAME,
};
