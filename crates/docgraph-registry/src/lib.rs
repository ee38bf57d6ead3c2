//! Runtime type registry for docgraph.
//!
//! The registry is a catalog of type descriptors forming a forest of
//! single-inheritance trees. Types optionally carry a factory; a type
//! without one is abstract and cannot be instantiated by name.
//!
//! The registry is an explicit value: build it once at startup (usually
//! with [`TypeRegistry::with_builtins`] plus application tables), then share
//! it read-only, e.g. behind an `Arc`.
//!
//! Lookups never fail loudly. Unknown names resolve to [`TypeId::BAD`] and
//! instantiation of unknown or abstract types yields `None`, so speculative
//! queries made while loading documents written by another application
//! version degrade gracefully.
//!
//! # Modules
//!
//! - [`error`]: Reasons a registration was refused
//! - [`names`]: Type name validation
//! - [`schema`]: [`Instance`], [`ObjectSchema`], [`AttributeDecl`]
//! - [`registry`]: The [`TypeRegistry`] itself
//! - [`table`]: Declarative [`TypeDecl`] registration tables
//! - [`builtin`]: Built-in attribute and object types

pub mod builtin;
pub mod error;
pub mod names;
pub mod registry;
pub mod schema;
pub mod table;

pub use error::RegistryError;
pub use names::validate_type_name;
pub use registry::{Factory, TypeDescriptor, TypeId, TypeRegistry};
pub use schema::{AttributeDecl, AttributeFlags, Instance, ObjectSchema};
pub use table::{RegistrationReport, TypeDecl};
