//! The document: object arena, attribute writes and edit history.
//!
//! Every attribute write goes through one path, in this order: validate,
//! capture the pre-value in the open transaction, replace the forward
//! value, then update the back-links of the old and new targets. Undo
//! replays the inverse through the same path, so back-links are always
//! maintained as a side effect and never touched directly.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use docgraph_registry::builtin::DOCUMENT_OBJECT;
use docgraph_registry::{Instance, TypeId, TypeRegistry};
use docgraph_types::{ObjectId, Value, ValueKind};

use crate::arena::Arena;
use crate::attribute::{Attribute, AttributeContainer, AttributeSpec};
use crate::config::DocumentConfig;
use crate::error::{AttributeError, DocResult, DocumentError, LinkError};
use crate::link::PendingLink;
use crate::object::DocObject;
use crate::transaction::{AttributeSnapshot, ObjectSnapshot, Transaction};

/// A graph of typed objects with transactional undo/redo.
///
/// Single-writer: a document performs no internal locking.
#[derive(Debug)]
pub struct Document {
    pub(crate) uid: Uuid,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) config: DocumentConfig,
    pub(crate) objects: Arena<DocObject>,
    pub(crate) serials: HashMap<u64, ObjectId>,
    pub(crate) next_serial: u64,
    pub(crate) active: Option<Transaction>,
    pub(crate) undo_stack: Vec<Transaction>,
    pub(crate) redo_stack: Vec<Transaction>,
    /// Set while replaying or loading; mutations are not recorded.
    pub(crate) untracked: bool,
    /// Set by a failed replay; history is unusable until cleared.
    pub(crate) inconsistent: bool,
    pub(crate) pending_links: Vec<PendingLink>,
}

impl Document {
    pub fn new(registry: Arc<TypeRegistry>, config: DocumentConfig) -> Self {
        Self {
            uid: Uuid::now_v7(),
            registry,
            config,
            objects: Arena::default(),
            serials: HashMap::new(),
            next_serial: 1,
            active: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            untracked: false,
            inconsistent: false,
            pending_links: Vec::new(),
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.len() == 0
    }

    /// Whether a failed replay left the document in an unknown state.
    pub fn is_inconsistent(&self) -> bool {
        self.inconsistent
    }

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------

    pub fn object(&self, id: ObjectId) -> Option<&DocObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains(id)
    }

    /// Live objects in arena order.
    pub fn objects(&self) -> impl Iterator<Item = &DocObject> {
        self.objects.iter().map(|(_, obj)| obj)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|(id, _)| id).collect()
    }

    pub fn find_by_serial(&self, serial: u64) -> Option<ObjectId> {
        self.serials.get(&serial).copied()
    }

    /// Create an object of a concrete type derived from `DocumentObject`.
    pub fn create_object(&mut self, type_name: &str) -> DocResult<ObjectId> {
        let (type_id, attributes) = self.build_object(type_name)?;
        let serial = self.next_serial;
        if self.serials.contains_key(&serial) {
            return Err(DocumentError::Integrity(format!("serial {serial} is already in use")));
        }
        self.next_serial = serial.saturating_add(1);
        let type_name = type_name.to_string();
        let id = self
            .objects
            .insert_with(|id| DocObject::new(id, serial, type_id, type_name, attributes));
        self.serials.insert(serial, id);
        self.record_creation(id);
        debug!(object = %id, serial, "object created");
        Ok(id)
    }

    /// Remove an object. Every link to it is cleared first (recorded as a
    /// change of the referring object), then its own links are dropped.
    pub fn remove_object(&mut self, id: ObjectId) -> DocResult<()> {
        for referrer in self.referrers(id)? {
            self.unlink_from(referrer, id)?;
        }
        self.record_deletion(id);
        self.detach_and_remove(id)?;
        debug!(object = %id, "object removed");
        Ok(())
    }

    /// Resolve a type name into the type and the fresh attribute store of
    /// a new object.
    pub(crate) fn build_object(&self, type_name: &str) -> DocResult<(TypeId, AttributeContainer)> {
        let registry = &self.registry;
        let type_id = registry.from_name(type_name);
        if type_id.is_bad() {
            return Err(DocumentError::UnknownType(type_name.to_string()));
        }
        if !registry.is_derived_from(type_id, registry.from_name(DOCUMENT_OBJECT)) {
            return Err(DocumentError::NotAnObjectType(type_name.to_string()));
        }
        if registry.is_abstract(type_id) {
            return Err(DocumentError::AbstractType(type_name.to_string()));
        }
        let schema = registry
            .instantiate(type_id)
            .and_then(Instance::into_object)
            .ok_or_else(|| DocumentError::NotAnObjectType(type_name.to_string()))?;
        let attributes = AttributeContainer::from_schema(registry, &schema)?;
        Ok((type_id, attributes))
    }

    /// Put an object back under its original handle, with its snapshot's
    /// attribute set but default values.
    pub(crate) fn reinstate(&mut self, id: ObjectId, snapshot: &ObjectSnapshot) -> DocResult<()> {
        let (type_id, mut attributes) = self.build_object(&snapshot.type_name)?;
        for captured in &snapshot.attributes {
            if attributes.contains(&captured.name) {
                continue;
            }
            if !captured.dynamic {
                return Err(AttributeError::NotFound {
                    name: captured.name.clone(),
                }
                .into());
            }
            attributes.insert_dynamic(captured.instantiate(&self.registry)?)?;
        }
        let obj = DocObject::new(id, snapshot.serial, type_id, snapshot.type_name.clone(), attributes);
        self.objects
            .insert_at(id, obj)
            .map_err(|_| DocumentError::Integrity(format!("slot of {id} is occupied")))?;
        self.serials.insert(snapshot.serial, id);
        self.next_serial = self.next_serial.max(snapshot.serial.saturating_add(1));
        Ok(())
    }

    /// Clear inbound links without recording, drop the object and its
    /// outbound back-link entries.
    pub(crate) fn detach_and_remove(&mut self, id: ObjectId) -> DocResult<()> {
        for referrer in self.referrers(id)? {
            self.untracked(|doc| doc.unlink_from(referrer, id))?;
        }
        let removed = if self.history_may_refer() {
            self.objects.remove_retained(id)
        } else {
            self.objects.remove(id)
        };
        let obj = removed.ok_or(DocumentError::ObjectNotFound(id))?;
        self.serials.remove(&obj.serial());
        for attr in obj.attributes().iter() {
            for target in attr.value().link_targets() {
                if let Some(target) = self.objects.get_mut(target) {
                    target.back_links_mut().remove(id);
                }
            }
        }
        Ok(())
    }

    /// Whether an open or recorded transaction may still name a handle
    /// being removed now. Such slots are kept from fresh inserts until
    /// the history is cleared, so replay can re-instate into them.
    fn history_may_refer(&self) -> bool {
        self.untracked || self.active.is_some() || !self.undo_stack.is_empty() || !self.redo_stack.is_empty()
    }

    fn referrers(&self, id: ObjectId) -> DocResult<Vec<ObjectId>> {
        let obj = self.object(id).ok_or(DocumentError::ObjectNotFound(id))?;
        Ok(obj
            .back_links()
            .sources()
            .into_iter()
            .filter(|source| *source != id)
            .collect())
    }

    /// Drop every reference `source` holds to `target`.
    pub(crate) fn unlink_from(&mut self, source: ObjectId, target: ObjectId) -> DocResult<()> {
        let names = self
            .object(source)
            .map(|obj| obj.attributes_linking_to(target))
            .unwrap_or_default();
        for name in names {
            let Some(value) = self.get(source, &name) else {
                continue;
            };
            let cleared = value.remap_links(|t| (t != target).then_some(t));
            self.store_value(source, &name, cleared)?;
        }
        Ok(())
    }

    /// Run `f` with recording suspended.
    pub(crate) fn untracked<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.untracked, true);
        let out = f(self);
        self.untracked = previous;
        out
    }

    // ---------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------

    pub fn attribute(&self, id: ObjectId, name: &str) -> Option<&Attribute> {
        self.objects.get(id)?.attribute(name)
    }

    pub(crate) fn require_attribute(&self, id: ObjectId, name: &str) -> DocResult<&Attribute> {
        let obj = self.object(id).ok_or(DocumentError::ObjectNotFound(id))?;
        obj.attribute(name).ok_or_else(|| {
            AttributeError::NotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn get(&self, id: ObjectId, name: &str) -> Option<&Value> {
        self.attribute(id, name).map(Attribute::value)
    }

    /// Write an attribute value. The value must be of the attribute's kind;
    /// link targets must be live objects of this document.
    pub fn set(&mut self, id: ObjectId, name: &str, value: impl Into<Value>) -> DocResult<()> {
        self.store_value(id, name, value.into())?;
        Ok(())
    }

    /// The single write path. Returns whether the value changed.
    pub(crate) fn store_value(&mut self, id: ObjectId, name: &str, value: Value) -> DocResult<bool> {
        let attr = self.require_attribute(id, name)?;
        if attr.kind() != value.kind() {
            return Err(AttributeError::KindMismatch {
                name: name.to_string(),
                expected: attr.kind(),
                actual: value.kind(),
            }
            .into());
        }
        let value = match value.kind() {
            ValueKind::LinkList => value.remap_links(Some),
            _ => value,
        };
        if attr.value() == &value {
            return Ok(false);
        }
        let new_targets = value.link_targets();
        if let Some(target) = new_targets.iter().find(|t| !self.objects.contains(**t)) {
            return Err(LinkError::DeadTarget { target: *target }.into());
        }
        let is_link = value.is_link();

        self.record_change(id, name);
        let old = self
            .objects
            .get_mut(id)
            .and_then(|obj| obj.attributes_mut().get_mut(name))
            .ok_or_else(|| AttributeError::NotFound {
                name: name.to_string(),
            })?
            .replace_value(value)?;

        let released = old.link_targets();
        if is_link {
            for &target in &released {
                if let Some(obj) = self.objects.get_mut(target) {
                    obj.back_links_mut().remove(id);
                }
            }
            for target in new_targets {
                if let Some(obj) = self.objects.get_mut(target) {
                    obj.back_links_mut().add(id);
                }
            }
        }
        debug!(object = %id, attribute = name, "attribute written");

        if is_link && self.config.check_invariants {
            self.check_links_around(id, &released)?;
        }
        Ok(true)
    }

    /// Add a run-time attribute; returns the name actually assigned.
    pub fn add_dynamic_attribute(&mut self, id: ObjectId, spec: &AttributeSpec) -> DocResult<String> {
        let registry = Arc::clone(&self.registry);
        let obj = self.objects.get_mut(id).ok_or(DocumentError::ObjectNotFound(id))?;
        let name = obj.attributes_mut().add_dynamic(&registry, spec)?.name().to_string();
        debug!(object = %id, attribute = %name, type_name = %spec.type_name, "dynamic attribute added");
        Ok(name)
    }

    /// Remove a run-time attribute. Statically declared and unknown names
    /// are left alone and yield `false`. A link attribute is cleared first
    /// so back-links stay in step; the removal itself is recorded and
    /// undone by re-adding the attribute.
    pub fn remove_dynamic_attribute(&mut self, id: ObjectId, name: &str) -> DocResult<bool> {
        let obj = self.object(id).ok_or(DocumentError::ObjectNotFound(id))?;
        let Some(attr) = obj.attribute(name).filter(|a| a.is_dynamic()) else {
            return Ok(false);
        };
        let cleared = attr.is_link().then(|| attr.kind().default_value());

        self.record_change(id, name);
        if let Some(cleared) = cleared {
            self.store_value(id, name, cleared)?;
        }
        let removed = self
            .objects
            .get_mut(id)
            .and_then(|obj| obj.attributes_mut().remove_dynamic(name));
        debug!(object = %id, attribute = name, "dynamic attribute removed");
        Ok(removed.is_some())
    }

    /// Re-create a captured attribute if it is missing. Only dynamic
    /// attributes can be re-created.
    pub(crate) fn ensure_attribute(&mut self, id: ObjectId, captured: &AttributeSnapshot) -> DocResult<()> {
        let obj = self.object(id).ok_or(DocumentError::ObjectNotFound(id))?;
        if obj.attribute(&captured.name).is_some() {
            return Ok(());
        }
        if !captured.dynamic {
            return Err(AttributeError::NotFound {
                name: captured.name.clone(),
            }
            .into());
        }
        let attr = captured.instantiate(&self.registry)?;
        if let Some(obj) = self.objects.get_mut(id) {
            obj.attributes_mut().insert_dynamic(attr)?;
        }
        Ok(())
    }

    /// Write captured values, re-creating missing dynamic attributes.
    pub(crate) fn write_snapshots(&mut self, id: ObjectId, captured: &[AttributeSnapshot]) -> DocResult<()> {
        for snapshot in captured {
            self.ensure_attribute(id, snapshot)?;
            self.store_value(id, &snapshot.name, snapshot.value.clone())?;
        }
        Ok(())
    }
}
