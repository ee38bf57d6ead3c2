//! Transactions: the captured before/after state of one undoable edit.
//!
//! Recording follows three rules:
//!
//! - the first write of an attribute on an existing object captures its
//!   pre-transaction value; later writes of the same attribute in the same
//!   transaction capture nothing (coalescing)
//! - a created object is recorded as [`ObjectState::New`] and snapshotted
//!   in full at commit
//! - a deleted object is recorded as [`ObjectState::Deleted`] with a full
//!   snapshot of its pre-transaction state; deleting an object created in
//!   the same transaction removes its entry altogether

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use docgraph_registry::{AttributeFlags, TypeRegistry};
use docgraph_types::{ObjectId, TransactionId, Value, VersionInfo};

use crate::attribute::{Attribute, AttributeMeta};
use crate::document::Document;
use crate::error::{AttributeError, PersistError};
use crate::object::DocObject;

/// Name of transactions opened implicitly by the first tracked mutation.
pub const AUTO_TRANSACTION_NAME: &str = "Edit";

/// Role of an object within one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    /// Created during the transaction.
    New,
    /// Existed before and was removed during the transaction.
    Deleted,
    /// Existed before and after; only mutated attributes are captured.
    Changed,
}

/// One attribute, with enough of its definition to re-create it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeSnapshot {
    pub name: String,
    pub type_name: String,
    pub dynamic: bool,
    pub meta: AttributeMeta,
    pub value: Value,
}

impl AttributeSnapshot {
    pub(crate) fn of(attr: &Attribute) -> Self {
        Self {
            name: attr.name().to_string(),
            type_name: attr.type_name().to_string(),
            dynamic: attr.is_dynamic(),
            meta: attr.meta().clone(),
            value: attr.value().clone(),
        }
    }

    /// Re-create the attribute definition (with its default value).
    pub(crate) fn instantiate(&self, registry: &TypeRegistry) -> Result<Attribute, AttributeError> {
        Attribute::instantiate(registry, &self.type_name, self.name.clone(), self.meta.clone())
    }
}

/// Full state of one object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub serial: u64,
    pub type_name: String,
    pub attributes: Vec<AttributeSnapshot>,
}

impl ObjectSnapshot {
    pub(crate) fn of(obj: &DocObject) -> Self {
        Self {
            serial: obj.serial(),
            type_name: obj.type_name().to_string(),
            attributes: obj.attributes().iter().map(AttributeSnapshot::of).collect(),
        }
    }

    /// The snapshot with earlier-captured values taking precedence over
    /// the current ones.
    fn overridden_by(mut self, before: &[AttributeSnapshot]) -> Self {
        for captured in before {
            match self.attributes.iter_mut().find(|a| a.name == captured.name) {
                Some(current) => *current = captured.clone(),
                None => self.attributes.push(captured.clone()),
            }
        }
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSnapshot> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Everything one transaction recorded about one object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionObject {
    pub object: ObjectId,
    pub state: ObjectState,
    /// `Changed`: pre-transaction values, one per mutated attribute.
    pub before: Vec<AttributeSnapshot>,
    /// `Changed`: values at commit for the attributes in `before`.
    pub after: Vec<AttributeSnapshot>,
    /// `Changed`: captured attributes that no longer existed at commit.
    pub removed_after: Vec<String>,
    /// `Deleted`: pre-transaction state. `New`: state at commit.
    pub snapshot: Option<ObjectSnapshot>,
}

impl TransactionObject {
    fn new(object: ObjectId, state: ObjectState) -> Self {
        Self {
            object,
            state,
            before: Vec::new(),
            after: Vec::new(),
            removed_after: Vec::new(),
            snapshot: None,
        }
    }

    fn is_noop(&self) -> bool {
        self.state == ObjectState::Changed && self.removed_after.is_empty() && self.before == self.after
    }
}

/// One atomic, undoable unit of document mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    name: String,
    entries: Vec<TransactionObject>,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[TransactionObject] {
        &self.entries
    }

    pub fn entry(&self, object: ObjectId) -> Option<&TransactionObject> {
        self.entries.iter().find(|e| e.object == object)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the pre-value of `name` on `object` needs no capture.
    fn has_captured(&self, object: ObjectId, name: &str) -> bool {
        match self.entry(object) {
            Some(e) => match e.state {
                ObjectState::New | ObjectState::Deleted => true,
                ObjectState::Changed => e.before.iter().any(|b| b.name == name),
            },
            None => false,
        }
    }

    fn capture(&mut self, object: ObjectId, snapshot: AttributeSnapshot) {
        match self.entries.iter_mut().find(|e| e.object == object) {
            Some(e) if e.state == ObjectState::Changed => e.before.push(snapshot),
            Some(_) => {}
            None => {
                let mut entry = TransactionObject::new(object, ObjectState::Changed);
                entry.before.push(snapshot);
                self.entries.push(entry);
            }
        }
    }

    fn record_new(&mut self, object: ObjectId) {
        self.entries.push(TransactionObject::new(object, ObjectState::New));
    }

    /// Record a deletion given the object's current state.
    fn record_deleted(&mut self, object: ObjectId, current: ObjectSnapshot) {
        match self.entries.iter().position(|e| e.object == object) {
            Some(i) if self.entries[i].state == ObjectState::New => {
                self.entries.remove(i);
            }
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.snapshot = Some(current.overridden_by(&entry.before));
                entry.state = ObjectState::Deleted;
                entry.before.clear();
            }
            None => {
                let mut entry = TransactionObject::new(object, ObjectState::Deleted);
                entry.snapshot = Some(current);
                self.entries.push(entry);
            }
        }
    }

    /// Fill in commit-time state and drop entries that changed nothing.
    fn finalize(&mut self, doc: &Document) {
        for entry in &mut self.entries {
            let Some(obj) = doc.object(entry.object) else {
                continue;
            };
            match entry.state {
                ObjectState::New => entry.snapshot = Some(ObjectSnapshot::of(obj)),
                ObjectState::Changed => {
                    entry.after.clear();
                    entry.removed_after.clear();
                    for captured in &entry.before {
                        match obj.attribute(&captured.name) {
                            Some(attr) => entry.after.push(AttributeSnapshot::of(attr)),
                            None => entry.removed_after.push(captured.name.clone()),
                        }
                    }
                }
                ObjectState::Deleted => {}
            }
        }
        self.entries.retain(|e| !e.is_noop());
    }

    // ---------------------------------------------------------------
    // Journal encoding
    // ---------------------------------------------------------------

    /// Write the transaction as a binary journal record behind a version
    /// header. Object handles are only meaningful within the session that
    /// recorded them.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<(), PersistError> {
        bincode::serialize_into(&mut writer, &VersionInfo::current())?;
        bincode::serialize_into(&mut writer, self)?;
        Ok(())
    }

    /// Read a journal record written by [`Transaction::save`].
    pub fn restore<R: Read>(mut reader: R) -> Result<Self, PersistError> {
        let version: VersionInfo = bincode::deserialize_from(&mut reader)?;
        if version.is_newer_than_current() {
            warn!(format = version.format, producer = %version.producer, "transaction journal written by a newer format");
        }
        let mut tx: Transaction = bincode::deserialize_from(&mut reader)?;
        if !version.has_attribute_flags() {
            tx.for_each_snapshot_mut(|a| a.meta.flags = AttributeFlags::default());
        }
        Ok(tx)
    }

    fn for_each_snapshot_mut(&mut self, mut f: impl FnMut(&mut AttributeSnapshot)) {
        for entry in &mut self.entries {
            entry.before.iter_mut().for_each(&mut f);
            entry.after.iter_mut().for_each(&mut f);
            if let Some(snapshot) = entry.snapshot.as_mut() {
                snapshot.attributes.iter_mut().for_each(&mut f);
            }
        }
    }
}

impl Document {
    // ---------------------------------------------------------------
    // Edit scope
    // ---------------------------------------------------------------

    /// Open a transaction under a fresh process-wide id. An open
    /// transaction is committed first.
    pub fn open_transaction(&mut self, name: impl Into<String>) -> TransactionId {
        self.open_transaction_with_id(name, TransactionId::next())
    }

    /// Open a transaction under a caller-chosen id, so one user action can
    /// span several documents.
    pub fn open_transaction_with_id(&mut self, name: impl Into<String>, id: TransactionId) -> TransactionId {
        self.commit_transaction();
        let tx = Transaction::new(id, name);
        debug!(document = %self.uid(), transaction = %id, name = tx.name(), "transaction opened");
        self.active = Some(tx);
        id
    }

    /// Commit the open transaction onto the undo stack. Returns `None`
    /// when nothing was open or the transaction recorded no net change.
    pub fn commit_transaction(&mut self) -> Option<TransactionId> {
        let mut tx = self.active.take()?;
        tx.finalize(self);
        if tx.is_empty() {
            debug!(document = %self.uid(), transaction = %tx.id(), "empty transaction discarded");
            return None;
        }

        let id = tx.id();
        info!(
            document = %self.uid(),
            transaction = %id,
            name = tx.name(),
            objects = tx.entries().len(),
            "transaction committed"
        );
        self.redo_stack.clear();
        self.undo_stack.push(tx);
        let limit = self.config.undo_limit;
        if limit > 0 && self.undo_stack.len() > limit {
            let excess = self.undo_stack.len() - limit;
            self.undo_stack.drain(..excess);
            debug!(dropped = excess, limit, "undo history trimmed");
        }
        Some(id)
    }

    /// The transaction currently capturing mutations.
    pub fn active_transaction(&self) -> Option<&Transaction> {
        self.active.as_ref()
    }

    pub fn has_open_transaction(&self) -> bool {
        self.active.is_some()
    }

    // ---------------------------------------------------------------
    // Recording
    // ---------------------------------------------------------------

    /// Whether a mutation happening now must be recorded. Opens the
    /// implicit transaction if configured; otherwise an untracked edit
    /// invalidates the redo stack.
    fn capturing(&mut self) -> bool {
        if self.untracked {
            return false;
        }
        if self.active.is_none() {
            if !self.config.auto_transaction {
                if !self.redo_stack.is_empty() {
                    debug!(document = %self.uid(), "untracked edit cleared redo history");
                    self.redo_stack.clear();
                }
                return false;
            }
            self.open_transaction(AUTO_TRANSACTION_NAME);
        }
        true
    }

    /// Capture the pre-value of `name` on `id` unless already captured.
    pub(crate) fn record_change(&mut self, id: ObjectId, name: &str) {
        if !self.capturing() {
            return;
        }
        if self.active.as_ref().is_some_and(|tx| tx.has_captured(id, name)) {
            return;
        }
        let Some(snapshot) = self.attribute(id, name).map(AttributeSnapshot::of) else {
            return;
        };
        if let Some(tx) = self.active.as_mut() {
            tx.capture(id, snapshot);
        }
    }

    pub(crate) fn record_creation(&mut self, id: ObjectId) {
        if !self.capturing() {
            return;
        }
        if let Some(tx) = self.active.as_mut() {
            tx.record_new(id);
        }
    }

    pub(crate) fn record_deletion(&mut self, id: ObjectId) {
        if !self.capturing() {
            return;
        }
        let Some(current) = self.object(id).map(ObjectSnapshot::of) else {
            return;
        };
        if let Some(tx) = self.active.as_mut() {
            tx.record_deleted(id, current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentConfig;
    use crate::test_support::{document, WALL};
    use docgraph_registry::builtin::LABEL;

    #[test]
    fn repeated_writes_coalesce_into_one_snapshot() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 2.5).unwrap();
        doc.commit_transaction().unwrap();

        doc.open_transaction("Drag height");
        for i in 0..10 {
            doc.set(wall, "Height", 3.0 + i as f64).unwrap();
        }
        let tx = doc.active_transaction().unwrap();
        let entry = tx.entry(wall).unwrap();
        assert_eq!(entry.state, ObjectState::Changed);
        assert_eq!(entry.before.len(), 1);
        assert_eq!(entry.before[0].value, Value::Float(2.5));

        doc.commit_transaction().unwrap();
        let top = doc.undo_stack.last().unwrap();
        let entry = top.entry(wall).unwrap();
        assert_eq!(entry.after.len(), 1);
        assert_eq!(entry.after[0].value, Value::Float(12.0));
    }

    #[test]
    fn writes_to_new_objects_are_not_captured_separately() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 2.5).unwrap();
        doc.set(wall, LABEL, "W1").unwrap();
        let tx = doc.active_transaction().unwrap();
        assert_eq!(tx.entries().len(), 1);
        assert_eq!(tx.entries()[0].state, ObjectState::New);

        doc.commit_transaction().unwrap();
        let snapshot = doc.undo_stack[0].entries()[0].snapshot.as_ref().unwrap();
        assert_eq!(snapshot.attribute("Height").unwrap().value, Value::Float(2.5));
        assert_eq!(snapshot.attribute(LABEL).unwrap().value, Value::from("W1"));
    }

    #[test]
    fn create_then_delete_is_a_no_op() {
        let mut doc = document();
        doc.open_transaction("Scratch");
        let wall = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 1.0).unwrap();
        doc.remove_object(wall).unwrap();
        assert!(doc.active_transaction().unwrap().is_empty());
        assert_eq!(doc.commit_transaction(), None);
        assert!(!doc.can_undo());
    }

    #[test]
    fn deletion_snapshot_holds_pre_transaction_values() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 2.0).unwrap();
        doc.commit_transaction();

        doc.open_transaction("Edit then delete");
        doc.set(wall, "Height", 9.0).unwrap();
        doc.remove_object(wall).unwrap();
        let entry = doc.active_transaction().unwrap().entry(wall).unwrap().clone();
        assert_eq!(entry.state, ObjectState::Deleted);
        let snapshot = entry.snapshot.unwrap();
        assert_eq!(snapshot.attribute("Height").unwrap().value, Value::Float(2.0));
    }

    #[test]
    fn net_zero_changes_are_discarded() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.commit_transaction();

        doc.open_transaction("Wiggle");
        doc.set(wall, "Height", 1.0).unwrap();
        doc.set(wall, "Height", 0.0).unwrap();
        assert_eq!(doc.commit_transaction(), None);
        assert_eq!(doc.undo_names(), vec!["Edit"]);
    }

    #[test]
    fn opening_commits_the_previous_transaction() {
        let mut doc = document();
        let first = doc.open_transaction("First");
        doc.create_object(WALL).unwrap();
        let second = doc.open_transaction("Second");
        assert!(second > first);
        assert_eq!(doc.undo_names(), vec!["First"]);
        assert_eq!(doc.active_transaction().unwrap().name(), "Second");
    }

    #[test]
    fn first_mutation_opens_an_implicit_transaction() {
        let mut doc = document();
        assert!(!doc.has_open_transaction());
        doc.create_object(WALL).unwrap();
        assert_eq!(doc.active_transaction().unwrap().name(), AUTO_TRANSACTION_NAME);
    }

    #[test]
    fn untracked_mode_records_nothing() {
        let config = DocumentConfig {
            auto_transaction: false,
            ..DocumentConfig::default()
        };
        let mut doc = crate::test_support::document_with(config);
        let wall = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 3.0).unwrap();
        assert!(!doc.has_open_transaction());
        assert!(!doc.can_undo());
    }

    #[test]
    fn undo_limit_drops_oldest() {
        let config = DocumentConfig {
            undo_limit: 2,
            ..DocumentConfig::default()
        };
        let mut doc = crate::test_support::document_with(config);
        for name in ["a", "b", "c"] {
            doc.open_transaction(name);
            doc.create_object(WALL).unwrap();
        }
        doc.commit_transaction();
        assert_eq!(doc.undo_names(), vec!["c", "b"]);
    }

    #[test]
    fn journal_round_trip() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 4.0).unwrap();
        doc.commit_transaction();
        let tx = doc.undo_stack[0].clone();

        let mut buf = Vec::new();
        tx.save(&mut buf).unwrap();
        let back = Transaction::restore(buf.as_slice()).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn journal_from_format_one_drops_flags() {
        let mut tx = Transaction::new(TransactionId::from_raw(7), "Old");
        let mut entry = TransactionObject::new(ObjectId::new(0, 0), ObjectState::Changed);
        entry.before.push(AttributeSnapshot {
            name: "Height".into(),
            type_name: "AttributeFloat".into(),
            dynamic: false,
            meta: AttributeMeta {
                flags: AttributeFlags::read_only(),
                ..AttributeMeta::default()
            },
            value: Value::Float(1.0),
        });
        tx.entries.push(entry);

        let mut buf = Vec::new();
        bincode::serialize_into(&mut buf, &VersionInfo::new(1)).unwrap();
        bincode::serialize_into(&mut buf, &tx).unwrap();
        let back = Transaction::restore(buf.as_slice()).unwrap();
        assert_eq!(back.entries()[0].before[0].meta.flags, AttributeFlags::default());
    }

    #[test]
    fn truncated_journal_is_an_error() {
        let err = Transaction::restore(&[1u8, 2, 3][..]).unwrap_err();
        assert!(matches!(err, PersistError::Binary(_)));
    }
}
