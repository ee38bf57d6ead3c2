//! Attributes and the per-object attribute store.
//!
//! An [`AttributeContainer`] holds the statically declared attributes of an
//! object (in declaration order) followed by attributes added at run time
//! (in insertion order). Names are unique within one container: dynamic
//! additions that collide are renamed deterministically, pre-existing
//! additions that collide are refused.
//!
//! Values are only written through the document (`pub(crate)` setters), so
//! every mutation passes the transaction recorder and back-link upkeep.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use docgraph_registry::builtin::ATTRIBUTE;
use docgraph_registry::{AttributeDecl, AttributeFlags, ObjectSchema, TypeId, TypeRegistry};
use docgraph_types::{Value, ValueKind};

use crate::error::AttributeError;

/// Descriptive metadata of an attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMeta {
    pub group: String,
    pub doc: String,
    pub flags: AttributeFlags,
}

/// A named, typed value owned by one object.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    name: String,
    type_id: TypeId,
    type_name: String,
    value: Value,
    meta: AttributeMeta,
    dynamic: bool,
}

impl Attribute {
    /// Instantiate an attribute of a registered attribute type with its
    /// default value.
    pub fn instantiate(
        registry: &TypeRegistry,
        type_name: &str,
        name: impl Into<String>,
        meta: AttributeMeta,
    ) -> Result<Self, AttributeError> {
        let type_id = registry.from_name(type_name);
        if type_id.is_bad() {
            return Err(AttributeError::UnknownType {
                type_name: type_name.to_string(),
            });
        }
        let not_attribute = || AttributeError::NotAnAttributeType {
            type_name: type_name.to_string(),
        };
        if !registry.is_derived_from(type_id, registry.from_name(ATTRIBUTE)) {
            return Err(not_attribute());
        }
        let value = registry
            .instantiate(type_id)
            .and_then(|i| i.as_attribute().cloned())
            .ok_or_else(not_attribute)?;

        Ok(Self {
            name: name.into(),
            type_id,
            type_name: type_name.to_string(),
            value,
            meta,
            dynamic: false,
        })
    }

    fn from_decl(registry: &TypeRegistry, decl: &AttributeDecl) -> Result<Self, AttributeError> {
        let meta = AttributeMeta {
            group: decl.group.clone(),
            doc: decl.doc.clone(),
            flags: decl.flags,
        };
        Self::instantiate(registry, &decl.type_name, decl.name.clone(), meta)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn is_link(&self) -> bool {
        self.value.is_link()
    }

    pub fn meta(&self) -> &AttributeMeta {
        &self.meta
    }

    pub fn flags(&self) -> AttributeFlags {
        self.meta.flags
    }

    /// Whether the attribute was added at run time (and can be removed).
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    /// Replace the value after a kind check; returns the previous value.
    pub(crate) fn replace_value(&mut self, value: Value) -> Result<Value, AttributeError> {
        if value.kind() != self.kind() {
            return Err(AttributeError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind(),
                actual: value.kind(),
            });
        }
        Ok(std::mem::replace(&mut self.value, value))
    }
}

/// Request for a run-time attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSpec {
    pub type_name: String,
    /// Requested name; adjusted if invalid or already taken.
    pub name: String,
    pub group: String,
    pub doc: String,
    pub flags: AttributeFlags,
}

impl AttributeSpec {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            group: String::new(),
            doc: String::new(),
            flags: AttributeFlags::default(),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.flags.read_only = read_only;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.flags.hidden = hidden;
        self
    }

    pub fn flags(mut self, flags: AttributeFlags) -> Self {
        self.flags = flags;
        self
    }

    fn meta(&self) -> AttributeMeta {
        AttributeMeta {
            group: self.group.clone(),
            doc: self.doc.clone(),
            flags: self.flags,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Static(usize),
    Dynamic(usize),
}

/// The attribute store of one object.
#[derive(Clone, Debug, Default)]
pub struct AttributeContainer {
    statics: Vec<Attribute>,
    dynamics: Vec<Attribute>,
    index: HashMap<String, Slot>,
}

impl AttributeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate the static attributes declared by `schema`.
    pub fn from_schema(registry: &TypeRegistry, schema: &ObjectSchema) -> Result<Self, AttributeError> {
        let mut container = Self::new();
        for decl in &schema.attributes {
            let attr = Attribute::from_decl(registry, decl)?;
            if !container.add_preexisting(attr) {
                return Err(AttributeError::NameCollision {
                    name: decl.name.clone(),
                });
            }
        }
        Ok(container)
    }

    pub fn len(&self) -> usize {
        self.statics.len() + self.dynamics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        match *self.index.get(name)? {
            Slot::Static(i) => self.statics.get(i),
            Slot::Dynamic(i) => self.dynamics.get(i),
        }
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        match *self.index.get(name)? {
            Slot::Static(i) => self.statics.get_mut(i),
            Slot::Dynamic(i) => self.dynamics.get_mut(i),
        }
    }

    /// Static attributes in declaration order, then dynamic ones in
    /// insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.statics.iter().chain(self.dynamics.iter())
    }

    pub fn list(&self) -> Vec<&Attribute> {
        self.iter().collect()
    }

    pub fn map(&self) -> BTreeMap<&str, &Attribute> {
        self.iter().map(|a| (a.name(), a)).collect()
    }

    /// Names of the attributes holding links.
    pub fn link_names(&self) -> Vec<String> {
        self.iter()
            .filter(|a| a.is_link())
            .map(|a| a.name().to_string())
            .collect()
    }

    // ---------------------------------------------------------------
    // Declaration
    // ---------------------------------------------------------------

    /// Register an attribute the object already owns (e.g. declared by
    /// its type). It is not removable. Fails on a name collision.
    pub fn add_preexisting(&mut self, mut attr: Attribute) -> bool {
        if self.index.contains_key(attr.name()) {
            return false;
        }
        attr.set_dynamic(false);
        self.index
            .insert(attr.name().to_string(), Slot::Static(self.statics.len()));
        self.statics.push(attr);
        true
    }

    /// Instantiate `spec.type_name` and add it under a unique name derived
    /// from `spec.name`.
    pub fn add_dynamic(
        &mut self,
        registry: &TypeRegistry,
        spec: &AttributeSpec,
    ) -> Result<&Attribute, AttributeError> {
        let name = self.unique_name(&spec.name);
        let attr = Attribute::instantiate(registry, &spec.type_name, name, spec.meta())?;
        self.insert_dynamic(attr)
    }

    /// Add a fully built attribute as dynamic under its exact name.
    pub(crate) fn insert_dynamic(&mut self, mut attr: Attribute) -> Result<&Attribute, AttributeError> {
        if self.index.contains_key(attr.name()) {
            return Err(AttributeError::NameCollision {
                name: attr.name().to_string(),
            });
        }
        attr.set_dynamic(true);
        let i = self.dynamics.len();
        self.index.insert(attr.name().to_string(), Slot::Dynamic(i));
        self.dynamics.push(attr);
        Ok(&self.dynamics[i])
    }

    /// Remove a dynamic attribute. Statically declared or unknown names
    /// are left alone and yield `None`.
    pub(crate) fn remove_dynamic(&mut self, name: &str) -> Option<Attribute> {
        let Some(Slot::Dynamic(i)) = self.index.get(name).copied() else {
            return None;
        };
        self.index.remove(name);
        let removed = self.dynamics.remove(i);
        for (j, attr) in self.dynamics.iter().enumerate().skip(i) {
            self.index.insert(attr.name().to_string(), Slot::Dynamic(j));
        }
        Some(removed)
    }

    /// Deterministic unique name for a dynamic attribute.
    ///
    /// Characters outside `[A-Za-z0-9_]` become `_`; an empty name becomes
    /// `Attribute`; a leading digit gets a `_` prefix. If the result is
    /// taken, the smallest free three-digit suffix is appended.
    pub fn unique_name(&self, requested: &str) -> String {
        let mut base: String = requested
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() {
            base = "Attribute".to_string();
        }
        if base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert(0, '_');
        }
        if !self.contains(&base) {
            return base;
        }
        (1u32..)
            .map(|n| format!("{base}{n:03}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or(base)
    }
}
