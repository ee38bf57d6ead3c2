//! Declarative registration tables.
//!
//! Applications describe their types as static [`TypeDecl`] slices and
//! hand them to [`TypeRegistry::register_table`]. Parents are resolved by
//! name, and a table may list a type before its parent or refer to a
//! parent registered by a later table entry: entries are retried until no
//! further progress is possible.

use tracing::{debug, warn};

use crate::registry::{Factory, TypeRegistry};

/// One row of a registration table.
#[derive(Clone, Copy, Debug)]
pub struct TypeDecl {
    pub name: &'static str,
    /// Parent type name; `None` for a root.
    pub parent: Option<&'static str>,
    pub factory: Option<Factory>,
}

impl TypeDecl {
    pub const fn root(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            factory: None,
        }
    }

    pub const fn abstract_type(name: &'static str, parent: &'static str) -> Self {
        Self {
            name,
            parent: Some(parent),
            factory: None,
        }
    }

    pub const fn concrete(name: &'static str, parent: &'static str, factory: Factory) -> Self {
        Self {
            name,
            parent: Some(parent),
            factory: Some(factory),
        }
    }
}

/// Outcome of registering a table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Entries now registered (including consistent duplicates).
    pub registered: usize,
    /// Entries refused by the registry (conflicting parent, bad name).
    pub refused: Vec<String>,
    /// Entries whose parent never became available.
    pub orphaned: Vec<String>,
}

impl RegistrationReport {
    pub fn is_clean(&self) -> bool {
        self.refused.is_empty() && self.orphaned.is_empty()
    }
}

impl TypeRegistry {
    /// Register every entry of `table`, resolving parents by name.
    pub fn register_table(&mut self, table: &[TypeDecl]) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        let mut pending: Vec<&TypeDecl> = table.iter().collect();

        loop {
            let before = pending.len();
            pending.retain(|decl| {
                let parent = match decl.parent {
                    None => None,
                    Some(name) => {
                        let id = self.from_name(name);
                        if id.is_bad() {
                            return true;
                        }
                        Some(id)
                    }
                };
                if self.create_type(parent, decl.name, decl.factory).is_bad() {
                    report.refused.push(decl.name.to_string());
                } else {
                    report.registered += 1;
                }
                false
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        for decl in pending {
            warn!(
                name = decl.name,
                parent = decl.parent.unwrap_or_default(),
                "type parent never registered"
            );
            report.orphaned.push(decl.name.to_string());
        }

        debug!(
            registered = report.registered,
            refused = report.refused.len(),
            orphaned = report.orphaned.len(),
            "registration table processed"
        );
        report
    }
}
