//! Deep copy of object sets with link remapping.
//!
//! Copies are made in two phases. Every copy is created first, with its
//! non-link values; only then are link attributes copied, so a remapped
//! link can only ever point at a fully constructed copy. Links to objects
//! outside the copied set follow the [`ExternalPolicy`] configured for the
//! link's attribute type.

use std::collections::BTreeMap;

use tracing::debug;

use docgraph_types::ObjectId;

use crate::config::ExternalPolicy;
use crate::document::Document;
use crate::error::{DocResult, DocumentError};
use crate::transaction::AttributeSnapshot;

/// Original → copy.
pub type CopyMap = BTreeMap<ObjectId, ObjectId>;

impl Document {
    /// Copy a set of objects, remapping links among them to the copies.
    /// Runs inside the open (or implicit) transaction.
    pub fn copy_objects(&mut self, sources: &[ObjectId]) -> DocResult<CopyMap> {
        let mut map = CopyMap::new();
        for &source in sources {
            if map.contains_key(&source) {
                continue;
            }
            let copy = self.copy_shell(source)?;
            map.insert(source, copy);
        }

        for (&source, &copy) in &map {
            let names = self
                .object(source)
                .map(|obj| obj.attributes().link_names())
                .unwrap_or_default();
            for name in names {
                self.deep_copy_attribute(source, &name, copy, &map)?;
            }
        }
        debug!(objects = map.len(), "objects copied");
        Ok(map)
    }

    /// Copy one attribute from `source` to `dest`, creating it on `dest`
    /// if `source` holds it dynamically. Link targets found in `map` are
    /// replaced by their copies; other targets are kept or dropped per
    /// the link type's policy.
    pub fn deep_copy_attribute(
        &mut self,
        source: ObjectId,
        name: &str,
        dest: ObjectId,
        map: &CopyMap,
    ) -> DocResult<()> {
        let attr = self.require_attribute(source, name)?;
        let policy = self
            .config
            .deep_copy
            .policy_for(&self.registry, attr.type_id());
        let value = attr.value().remap_links(|target| match map.get(&target) {
            Some(copy) => Some(*copy),
            None => match policy {
                ExternalPolicy::Keep => Some(target),
                ExternalPolicy::Drop => None,
            },
        });
        let definition = AttributeSnapshot::of(attr);

        if !self.contains(dest) {
            return Err(DocumentError::ObjectNotFound(dest));
        }
        self.ensure_attribute(dest, &definition)?;
        self.store_value(dest, name, value)?;
        Ok(())
    }

    /// Create a copy of `source` with its dynamic attributes and non-link
    /// values; links are left at their defaults.
    fn copy_shell(&mut self, source: ObjectId) -> DocResult<ObjectId> {
        let obj = self.object(source).ok_or(DocumentError::ObjectNotFound(source))?;
        let type_name = obj.type_name().to_string();
        let attributes: Vec<AttributeSnapshot> = obj.attributes().iter().map(AttributeSnapshot::of).collect();

        let copy = self.create_object(&type_name)?;
        for attr in attributes {
            self.ensure_attribute(copy, &attr)?;
            if !attr.value.is_link() {
                self.store_value(copy, &attr.name, attr.value)?;
            }
        }
        Ok(copy)
    }
}
