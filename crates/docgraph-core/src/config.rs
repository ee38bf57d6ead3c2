use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use docgraph_registry::builtin::{ATTRIBUTE_LINK_LIST_OWNED, ATTRIBUTE_LINK_OWNED};
use docgraph_registry::{TypeId, TypeRegistry};

use crate::error::PersistError;

/// What a deep copy does with a reference to an object outside the
/// copied set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalPolicy {
    /// The copy keeps referencing the original external object.
    Keep,
    /// The reference is dropped from the copy.
    Drop,
}

/// Per-link-kind deep copy policies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepCopyConfig {
    /// Applied when neither the link type nor any ancestor is listed.
    pub default_policy: ExternalPolicy,
    /// Policy keyed by attribute type name.
    pub policies: BTreeMap<String, ExternalPolicy>,
}

impl Default for DeepCopyConfig {
    fn default() -> Self {
        let policies = [
            (ATTRIBUTE_LINK_OWNED.to_string(), ExternalPolicy::Drop),
            (ATTRIBUTE_LINK_LIST_OWNED.to_string(), ExternalPolicy::Drop),
        ]
        .into_iter()
        .collect();
        Self {
            default_policy: ExternalPolicy::Keep,
            policies,
        }
    }
}

impl DeepCopyConfig {
    /// Policy of the nearest listed type on the parent chain of `link_type`.
    pub fn policy_for(&self, registry: &TypeRegistry, link_type: TypeId) -> ExternalPolicy {
        let mut current = registry.descriptor(link_type).map(|_| link_type);
        while let Some(t) = current {
            if let Some(policy) = registry.name(t).and_then(|n| self.policies.get(n)) {
                return *policy;
            }
            current = registry.parent(t);
        }
        self.default_policy
    }
}

/// Behavior knobs of a [`Document`](crate::Document).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Maximum number of undo steps kept; 0 keeps everything.
    pub undo_limit: usize,
    /// Open a transaction on the first tracked mutation when none is open.
    pub auto_transaction: bool,
    /// Verify the back-link mirror around every object whose links are
    /// written; a breach fails the write with `DocumentError::Integrity`.
    pub check_invariants: bool,
    pub deep_copy: DeepCopyConfig,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            undo_limit: 100,
            auto_transaction: true,
            check_invariants: true,
            deep_copy: DeepCopyConfig::default(),
        }
    }
}

impl DocumentConfig {
    /// Parse a TOML configuration. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, PersistError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The defaults, with link checks on.
    pub fn strict() -> Self {
        Self {
            check_invariants: true,
            ..Self::default()
        }
    }
}
