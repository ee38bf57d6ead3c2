//! Undo, redo and abort: replaying transactions against a document.
//!
//! Replay puts structure in place before values that reference it:
//!
//! | direction | 1st                     | 2nd                 | 3rd               |
//! |-----------|-------------------------|---------------------|-------------------|
//! | backward  | re-create `Deleted`     | remove `New`        | restore `Changed` |
//! | forward   | re-create `New`         | apply `Changed`     | remove `Deleted`  |
//!
//! Re-created objects are inserted as shells first and receive their values
//! only once every shell exists, so links among them resolve.
//!
//! A failing step aborts the replay and marks the document inconsistent;
//! nothing is retried, since a half-applied transaction cannot be safely
//! applied again.

use tracing::{error, info};

use docgraph_types::TransactionId;

use crate::document::Document;
use crate::error::{DocResult, DocumentError, TransactionError};
use crate::transaction::{ObjectState, Transaction, TransactionObject};

impl Transaction {
    /// Replay this transaction: backward (undo) or forward (redo).
    ///
    /// Bypasses the undo/redo stacks. Object handles in the transaction
    /// must come from this document's session.
    pub fn apply(&self, doc: &mut Document, forward: bool) -> DocResult<()> {
        if doc.inconsistent {
            return Err(TransactionError::Inconsistent.into());
        }
        let result = doc.untracked(|doc| {
            if forward {
                self.apply_forward(doc)
            } else {
                self.apply_backward(doc)
            }
        });
        result.map_err(|e| {
            doc.inconsistent = true;
            error!(transaction = %self.id(), forward, error = %e, "replay failed; document is inconsistent");
            TransactionError::ReplayFailed {
                id: self.id(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn with_state(&self, state: ObjectState) -> impl Iterator<Item = &TransactionObject> {
        self.entries().iter().filter(move |e| e.state == state)
    }

    fn apply_backward(&self, doc: &mut Document) -> DocResult<()> {
        self.recreate(doc, ObjectState::Deleted)?;
        for entry in self.with_state(ObjectState::New) {
            doc.detach_and_remove(entry.object)?;
        }
        for entry in self.with_state(ObjectState::Changed) {
            doc.write_snapshots(entry.object, &entry.before)?;
        }
        Ok(())
    }

    fn apply_forward(&self, doc: &mut Document) -> DocResult<()> {
        self.recreate(doc, ObjectState::New)?;
        for entry in self.with_state(ObjectState::Changed) {
            doc.write_snapshots(entry.object, &entry.after)?;
            for name in &entry.removed_after {
                doc.remove_dynamic_attribute(entry.object, name)?;
            }
        }
        for entry in self.with_state(ObjectState::Deleted) {
            doc.detach_and_remove(entry.object)?;
        }
        Ok(())
    }

    /// Re-instate every object in `state` from its snapshot: shells first,
    /// then values.
    fn recreate(&self, doc: &mut Document, state: ObjectState) -> DocResult<()> {
        for entry in self.with_state(state) {
            let snapshot = entry.snapshot.as_ref().ok_or_else(|| {
                DocumentError::Integrity(format!("no snapshot recorded for {}", entry.object))
            })?;
            doc.reinstate(entry.object, snapshot)?;
        }
        for entry in self.with_state(state) {
            if let Some(snapshot) = entry.snapshot.as_ref() {
                doc.write_snapshots(entry.object, &snapshot.attributes)?;
            }
        }
        Ok(())
    }
}

impl Document {
    fn ensure_consistent(&self) -> DocResult<()> {
        if self.inconsistent {
            return Err(TransactionError::Inconsistent.into());
        }
        Ok(())
    }

    /// Undo the most recent transaction. An open transaction is committed
    /// first. Returns the id undone, or `None` with nothing to undo.
    pub fn undo(&mut self) -> DocResult<Option<TransactionId>> {
        self.ensure_consistent()?;
        self.commit_transaction();
        let Some(tx) = self.undo_stack.pop() else {
            return Ok(None);
        };
        tx.apply(self, false)?;
        let id = tx.id();
        info!(document = %self.uid(), transaction = %id, name = tx.name(), "undo");
        self.redo_stack.push(tx);
        Ok(Some(id))
    }

    /// Redo the most recently undone transaction.
    pub fn redo(&mut self) -> DocResult<Option<TransactionId>> {
        self.ensure_consistent()?;
        self.commit_transaction();
        let Some(tx) = self.redo_stack.pop() else {
            return Ok(None);
        };
        tx.apply(self, true)?;
        let id = tx.id();
        info!(document = %self.uid(), transaction = %id, name = tx.name(), "redo");
        self.undo_stack.push(tx);
        Ok(Some(id))
    }

    /// Roll back and discard the open transaction.
    pub fn abort_transaction(&mut self) -> DocResult<()> {
        let Some(tx) = self.active.take() else {
            return Ok(());
        };
        tx.apply(self, false)?;
        info!(document = %self.uid(), transaction = %tx.id(), name = tx.name(), "transaction aborted");
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.inconsistent
            && (!self.undo_stack.is_empty() || self.active.as_ref().is_some_and(|tx| !tx.is_empty()))
    }

    pub fn can_redo(&self) -> bool {
        !self.inconsistent && !self.redo_stack.is_empty()
    }

    /// Names of undoable transactions, most recent first.
    pub fn undo_names(&self) -> Vec<&str> {
        self.undo_stack.iter().rev().map(Transaction::name).collect()
    }

    /// Names of redoable transactions, next first.
    pub fn redo_names(&self) -> Vec<&str> {
        self.redo_stack.iter().rev().map(Transaction::name).collect()
    }

    /// Drop all history, including an open transaction. Also acknowledges
    /// a failed replay: the document becomes usable again as it stands.
    pub fn clear_history(&mut self) {
        self.active = None;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.objects.release_retained();
        if std::mem::replace(&mut self.inconsistent, false) {
            info!(document = %self.uid(), "inconsistent state acknowledged; history cleared");
        }
    }

    fn top_undo_id(&self) -> Option<TransactionId> {
        self.undo_stack.last().map(Transaction::id)
    }

    fn top_redo_id(&self) -> Option<TransactionId> {
        self.redo_stack.last().map(Transaction::id)
    }

    /// Undo, in every document, the transaction carrying the highest id on
    /// top of any undo stack. Documents whose top differs are untouched.
    pub fn undo_group(docs: &mut [&mut Document]) -> DocResult<Option<TransactionId>> {
        for doc in docs.iter_mut() {
            doc.ensure_consistent()?;
            doc.commit_transaction();
        }
        let Some(id) = docs.iter().filter_map(|d| d.top_undo_id()).max() else {
            return Ok(None);
        };
        for doc in docs.iter_mut() {
            if doc.top_undo_id() == Some(id) {
                doc.undo()?;
            }
        }
        Ok(Some(id))
    }

    /// Redo, in every document, the transaction carrying the lowest id on
    /// top of any redo stack.
    pub fn redo_group(docs: &mut [&mut Document]) -> DocResult<Option<TransactionId>> {
        for doc in docs.iter_mut() {
            doc.ensure_consistent()?;
            doc.commit_transaction();
        }
        let Some(id) = docs.iter().filter_map(|d| d.top_redo_id()).min() else {
            return Ok(None);
        };
        for doc in docs.iter_mut() {
            if doc.top_redo_id() == Some(id) {
                doc.redo()?;
            }
        }
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeSpec;
    use crate::test_support::{document, OPENING, WALL};
    use docgraph_registry::builtin::{ATTRIBUTE_LINK, ATTRIBUTE_STRING};
    use docgraph_types::{ObjectId, Value};

    #[test]
    fn undo_redo_round_trip() {
        let mut doc = document();

        doc.open_transaction("T1");
        let o1 = doc.create_object(WALL).unwrap();
        doc.set(o1, "Height", 5.0).unwrap();
        doc.commit_transaction().unwrap();
        let after_t1 = doc.digest();

        doc.open_transaction("T2");
        let o2 = doc.create_object(OPENING).unwrap();
        doc.set_link(o2, "Wall", Some(o1)).unwrap();
        doc.commit_transaction().unwrap();
        let after_t2 = doc.digest();

        doc.undo().unwrap();
        assert!(!doc.contains(o2));
        assert!(doc.back_links(o1).is_empty());
        assert_eq!(doc.digest(), after_t1);

        doc.undo().unwrap();
        assert!(!doc.contains(o1));
        assert!(doc.is_empty());

        doc.redo().unwrap();
        assert_eq!(doc.get(o1, "Height"), Some(&Value::Float(5.0)));
        doc.redo().unwrap();
        assert_eq!(doc.digest(), after_t2);
        assert_eq!(doc.link(o2, "Wall"), Some(o1));
        assert_eq!(doc.back_links(o1), vec![o2]);
        assert!(!doc.can_redo());
    }

    #[test]
    fn undo_of_deletion_restores_links_both_ways() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        let a = doc.create_object(OPENING).unwrap();
        let b = doc.create_object(OPENING).unwrap();
        doc.set_link(a, "Wall", Some(wall)).unwrap();
        doc.add_link(wall, "Openings", a).unwrap();
        doc.add_link(wall, "Openings", b).unwrap();
        doc.commit_transaction();
        let before = doc.digest();

        doc.open_transaction("Delete wall");
        doc.remove_object(wall).unwrap();
        doc.commit_transaction();
        assert_eq!(doc.link(a, "Wall"), None);

        doc.undo().unwrap();
        assert_eq!(doc.digest(), before);
        assert_eq!(doc.link(a, "Wall"), Some(wall));
        assert_eq!(doc.links(wall, "Openings").unwrap(), vec![a, b]);
        assert_eq!(doc.back_links(wall), vec![a]);
        assert_eq!(doc.back_links(b), vec![wall]);

        doc.redo().unwrap();
        assert!(!doc.contains(wall));
        assert_eq!(doc.link(a, "Wall"), None);
        assert!(doc.verify_back_links().is_empty());
    }

    #[test]
    fn deleting_several_linked_objects_undoes_cleanly() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        let a = doc.create_object(OPENING).unwrap();
        doc.set_link(a, "Wall", Some(wall)).unwrap();
        doc.add_link(wall, "Openings", a).unwrap();
        doc.commit_transaction();
        let before = doc.digest();

        doc.open_transaction("Delete both");
        doc.remove_object(a).unwrap();
        doc.remove_object(wall).unwrap();
        doc.commit_transaction();
        assert!(doc.is_empty());

        doc.undo().unwrap();
        assert_eq!(doc.digest(), before);
        assert!(doc.verify_back_links().is_empty());
    }

    #[test]
    fn abort_rolls_back_the_open_transaction() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 3.0).unwrap();
        doc.commit_transaction();
        let before = doc.digest();

        doc.open_transaction("Scratch");
        doc.set(wall, "Height", 8.0).unwrap();
        let extra = doc.create_object(OPENING).unwrap();
        doc.set_link(extra, "Wall", Some(wall)).unwrap();
        doc.abort_transaction().unwrap();

        assert!(!doc.has_open_transaction());
        assert!(!doc.contains(extra));
        assert_eq!(doc.digest(), before);
        assert_eq!(doc.undo_names(), vec!["Edit"]);
    }

    #[test]
    fn removed_dynamic_attribute_returns_on_undo() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        let name = doc
            .add_dynamic_attribute(wall, &AttributeSpec::new(ATTRIBUTE_STRING, "Finish").group("Ifc"))
            .unwrap();
        doc.set(wall, &name, "Plaster").unwrap();
        doc.commit_transaction();

        doc.open_transaction("Drop finish");
        assert!(doc.remove_dynamic_attribute(wall, &name).unwrap());
        doc.commit_transaction();
        assert!(doc.attribute(wall, &name).is_none());

        doc.undo().unwrap();
        let attr = doc.attribute(wall, &name).unwrap();
        assert!(attr.is_dynamic());
        assert_eq!(attr.meta().group, "Ifc");
        assert_eq!(attr.value(), &Value::from("Plaster"));

        doc.redo().unwrap();
        assert!(doc.attribute(wall, &name).is_none());
    }

    #[test]
    fn removed_dynamic_link_returns_with_its_back_link() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        let o = doc.create_object(OPENING).unwrap();
        let name = doc
            .add_dynamic_attribute(o, &AttributeSpec::new(ATTRIBUTE_LINK, "Anchor"))
            .unwrap();
        doc.set_link(o, &name, Some(wall)).unwrap();
        doc.commit_transaction();

        doc.remove_dynamic_attribute(o, &name).unwrap();
        doc.commit_transaction();
        assert!(doc.back_links(wall).is_empty());

        doc.undo().unwrap();
        assert_eq!(doc.link(o, &name), Some(wall));
        assert_eq!(doc.back_links(wall), vec![o]);
    }

    #[test]
    fn new_edit_invalidates_redo() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.commit_transaction();
        doc.set(wall, "Height", 1.0).unwrap();
        doc.commit_transaction();
        doc.undo().unwrap();
        assert!(doc.can_redo());

        doc.set(wall, "Height", 2.0).unwrap();
        doc.commit_transaction();
        assert!(!doc.can_redo());
        assert_eq!(doc.redo().unwrap(), None);
    }

    #[test]
    fn undo_commits_the_open_transaction_first() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        assert!(doc.can_undo());
        let id = doc.undo().unwrap().unwrap();
        assert!(!doc.contains(wall));
        assert_eq!(doc.redo().unwrap(), Some(id));
        assert!(doc.contains(wall));
    }

    #[test]
    fn empty_history_is_a_no_op() {
        let mut doc = document();
        assert_eq!(doc.undo().unwrap(), None);
        assert_eq!(doc.redo().unwrap(), None);
        assert!(!doc.can_undo());
    }

    #[test]
    fn an_empty_open_transaction_is_not_undoable() {
        let mut doc = document();
        doc.open_transaction("Nothing yet");
        assert!(!doc.can_undo());
        let wall = doc.create_object(WALL).unwrap();
        assert!(doc.can_undo());
        doc.commit_transaction();
        doc.undo().unwrap();
        assert!(!doc.contains(wall));
    }

    fn replace_fixture() -> (Document, ObjectId, ObjectId) {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        let keep = doc.create_object(WALL).unwrap();
        doc.set(wall, "Height", 2.0).unwrap();
        doc.set_link(wall, "Host", Some(keep)).unwrap();
        doc.commit_transaction();
        (doc, wall, keep)
    }

    #[test]
    fn replacing_an_object_undoes_and_redoes() {
        let (mut doc, wall, keep) = replace_fixture();
        let before = doc.digest();

        doc.open_transaction("Replace");
        doc.remove_object(wall).unwrap();
        let opening = doc.create_object(OPENING).unwrap();
        doc.set_link(opening, "Wall", Some(keep)).unwrap();
        doc.set(keep, "Height", 9.0).unwrap();
        doc.commit_transaction().unwrap();
        assert_ne!(opening.index(), wall.index());
        let after = doc.digest();

        doc.undo().unwrap();
        assert!(!doc.is_inconsistent());
        assert!(doc.contains(wall));
        assert!(!doc.contains(opening));
        assert_eq!(doc.link(wall, "Host"), Some(keep));
        assert_eq!(doc.back_links(keep), vec![wall]);
        assert_eq!(doc.digest(), before);

        doc.redo().unwrap();
        assert!(!doc.contains(wall));
        assert!(doc.contains(opening));
        assert_eq!(doc.back_links(keep), vec![opening]);
        assert_eq!(doc.digest(), after);

        doc.undo().unwrap();
        assert_eq!(doc.digest(), before);
        assert!(doc.verify_back_links().is_empty());
    }

    #[test]
    fn aborting_a_replacement_restores_the_original() {
        let (mut doc, wall, keep) = replace_fixture();
        let before = doc.digest();

        doc.open_transaction("Replace");
        doc.remove_object(wall).unwrap();
        let opening = doc.create_object(OPENING).unwrap();
        doc.set_link(opening, "Wall", Some(keep)).unwrap();
        doc.abort_transaction().unwrap();

        assert!(!doc.is_inconsistent());
        assert!(doc.contains(wall));
        assert!(!doc.contains(opening));
        assert_eq!(doc.digest(), before);
    }

    #[test]
    fn replacement_slots_are_free_again_after_clearing_history() {
        let (mut doc, wall, _) = replace_fixture();
        doc.open_transaction("Replace");
        doc.remove_object(wall).unwrap();
        doc.create_object(OPENING).unwrap();
        doc.commit_transaction();

        doc.clear_history();
        let fresh = doc.create_object(WALL).unwrap();
        assert_eq!(fresh.index(), wall.index());
        assert_ne!(fresh, wall);
    }

    #[test]
    fn failed_replay_marks_the_document_inconsistent() {
        let mut doc = document();
        let wall = doc.create_object(WALL).unwrap();
        doc.commit_transaction();
        doc.set(wall, "Height", 1.0).unwrap();
        doc.commit_transaction();

        // Remove the object behind the history's back.
        doc.untracked(|d| d.remove_object(wall)).unwrap();
        assert!(!doc.contains(wall));

        let err = doc.undo().unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Transaction(TransactionError::ReplayFailed { .. })
        ));
        assert!(doc.is_inconsistent());
        assert!(!doc.can_undo());
        assert!(matches!(
            doc.undo(),
            Err(DocumentError::Transaction(TransactionError::Inconsistent))
        ));
        assert!(matches!(
            doc.redo(),
            Err(DocumentError::Transaction(TransactionError::Inconsistent))
        ));

        doc.clear_history();
        assert!(!doc.is_inconsistent());
        assert_eq!(doc.undo().unwrap(), None);
    }

    #[test]
    fn grouped_undo_spans_documents() {
        let mut a = document();
        let mut b = document();

        let solo = a.open_transaction("Solo");
        a.create_object(WALL).unwrap();
        a.commit_transaction();

        let shared = TransactionId::next();
        a.open_transaction_with_id("Shared", shared);
        b.open_transaction_with_id("Shared", shared);
        let wa = a.create_object(WALL).unwrap();
        let wb = b.create_object(WALL).unwrap();

        let undone = Document::undo_group(&mut [&mut a, &mut b]).unwrap();
        assert_eq!(undone, Some(shared));
        assert!(!a.contains(wa));
        assert!(!b.contains(wb));
        assert_eq!(a.undo_names(), vec!["Solo"]);

        let redone = Document::redo_group(&mut [&mut a, &mut b]).unwrap();
        assert_eq!(redone, Some(shared));
        assert!(a.contains(wa) && b.contains(wb));

        Document::undo_group(&mut [&mut a, &mut b]).unwrap();
        assert_eq!(Document::undo_group(&mut [&mut a, &mut b]).unwrap(), Some(solo));
        assert!(a.is_empty() && b.is_empty());
    }
}
