use std::collections::BTreeMap;

use docgraph_registry::builtin::LABEL;
use docgraph_registry::TypeId;
use docgraph_types::{ObjectId, Value};

use crate::attribute::{Attribute, AttributeContainer};

/// Inverse view of the forward links targeting one object.
///
/// A multiset keyed by source object: the count is the number of forward
/// link attributes on the source that currently reference this object.
/// Only the document mutates it, as a side effect of forward-link writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackLinks {
    sources: BTreeMap<ObjectId, u32>,
}

impl BackLinks {
    /// Distinct referring objects, sorted.
    pub fn sources(&self) -> Vec<ObjectId> {
        self.sources.keys().copied().collect()
    }

    pub fn contains(&self, source: ObjectId) -> bool {
        self.sources.contains_key(&source)
    }

    /// Number of forward link attributes on `source` referencing this object.
    pub fn count(&self, source: ObjectId) -> u32 {
        self.sources.get(&source).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ObjectId, u32)> + '_ {
        self.sources.iter().map(|(s, c)| (*s, *c))
    }

    pub(crate) fn add(&mut self, source: ObjectId) {
        *self.sources.entry(source).or_insert(0) += 1;
    }

    /// Drop one reference from `source`; false if there was none.
    pub(crate) fn remove(&mut self, source: ObjectId) -> bool {
        match self.sources.get_mut(&source) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.sources.remove(&source);
                true
            }
            None => false,
        }
    }
}

/// An object of a document: a typed attribute container.
#[derive(Clone, Debug)]
pub struct DocObject {
    id: ObjectId,
    serial: u64,
    type_id: TypeId,
    type_name: String,
    attributes: AttributeContainer,
    back_links: BackLinks,
}

impl DocObject {
    pub(crate) fn new(
        id: ObjectId,
        serial: u64,
        type_id: TypeId,
        type_name: String,
        attributes: AttributeContainer,
    ) -> Self {
        Self {
            id,
            serial,
            type_id,
            type_name,
            attributes,
            back_links: BackLinks::default(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Persistent, document-unique number; links are saved as serials.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attributes(&self) -> &AttributeContainer {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).map(Attribute::value)
    }

    /// The `Label` attribute, or an empty string.
    pub fn label(&self) -> &str {
        self.value(LABEL).and_then(Value::as_str).unwrap_or("")
    }

    pub fn back_links(&self) -> &BackLinks {
        &self.back_links
    }

    /// Distinct objects referenced by any link attribute, sorted.
    pub fn link_targets(&self) -> Vec<ObjectId> {
        let mut targets: Vec<ObjectId> = self
            .attributes
            .iter()
            .flat_map(|a| a.value().link_targets())
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Names of the link attributes currently referencing `target`.
    pub fn attributes_linking_to(&self, target: ObjectId) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|a| a.value().link_targets().contains(&target))
            .map(|a| a.name().to_string())
            .collect()
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeContainer {
        &mut self.attributes
    }

    pub(crate) fn back_links_mut(&mut self) -> &mut BackLinks {
        &mut self.back_links
    }
}
