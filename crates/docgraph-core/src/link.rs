//! Links between objects and their back-link mirror.
//!
//! Links are attributes, so every mutation here ends in the document's
//! single write path, which records the change and keeps back-links in
//! step. Persisted links are stored as serials; after a load they sit in a
//! pending list until [`Document::resolve_links`] rebinds them.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use docgraph_types::{ObjectId, Value, ValueKind};

use crate::document::Document;
use crate::error::{DocResult, DocumentError, LinkError};

/// A reference that still has to be rebound after a load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PendingLink {
    pub(crate) owner: ObjectId,
    pub(crate) attribute: String,
    pub(crate) serials: Vec<u64>,
}

/// A persisted reference whose target does not exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub owner_serial: u64,
    pub attribute: String,
    pub missing_serial: u64,
}

/// Outcome of rebinding persisted links.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LinkResolution {
    /// Link attributes whose every target was found.
    pub resolved: usize,
    pub broken: Vec<BrokenLink>,
}

impl LinkResolution {
    pub fn is_clean(&self) -> bool {
        self.broken.is_empty()
    }
}

/// A breach of the back-link mirror invariant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum LinkViolation {
    /// A forward link targets an object that is not live.
    Dangling {
        source: ObjectId,
        attribute: String,
        target: ObjectId,
    },
    /// The back-link count of `source` on `target` differs from the number
    /// of forward link attributes on `source` referencing `target`.
    CountMismatch {
        source: ObjectId,
        target: ObjectId,
        forward: u32,
        back: u32,
    },
}

impl fmt::Display for LinkViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dangling {
                source,
                attribute,
                target,
            } => write!(f, "{source}.{attribute} references dead object {target}"),
            Self::CountMismatch {
                source,
                target,
                forward,
                back,
            } => write!(
                f,
                "{source} -> {target}: {forward} forward link(s) but {back} back-link(s)"
            ),
        }
    }
}

impl Document {
    // ---------------------------------------------------------------
    // Forward links
    // ---------------------------------------------------------------

    /// Point a single link attribute at `target` (or clear it).
    pub fn set_link(&mut self, id: ObjectId, name: &str, target: Option<ObjectId>) -> DocResult<()> {
        if self.require_attribute(id, name)?.kind() != ValueKind::Link {
            return Err(LinkError::NotALink {
                name: name.to_string(),
            }
            .into());
        }
        self.store_value(id, name, Value::Link(target))?;
        Ok(())
    }

    /// Target of a single link attribute.
    pub fn link(&self, id: ObjectId, name: &str) -> Option<ObjectId> {
        self.get(id, name)?.as_link().flatten()
    }

    /// Append `target` to a link list. Adding a present target is a no-op
    /// returning `false`.
    pub fn add_link(&mut self, id: ObjectId, name: &str, target: ObjectId) -> DocResult<bool> {
        let mut targets = self.link_list(id, name)?;
        if targets.contains(&target) {
            return Ok(false);
        }
        targets.push(target);
        self.store_value(id, name, Value::LinkList(targets))
    }

    /// Remove `target` from a link list. Removing an absent target is a
    /// no-op returning `false`.
    pub fn remove_link(&mut self, id: ObjectId, name: &str, target: ObjectId) -> DocResult<bool> {
        let mut targets = self.link_list(id, name)?;
        let before = targets.len();
        targets.retain(|t| *t != target);
        if targets.len() == before {
            return Ok(false);
        }
        self.store_value(id, name, Value::LinkList(targets))
    }

    /// Targets of a link or link-list attribute, in order.
    pub fn links(&self, id: ObjectId, name: &str) -> DocResult<Vec<ObjectId>> {
        let attr = self.require_attribute(id, name)?;
        if !attr.is_link() {
            return Err(LinkError::NotALink {
                name: name.to_string(),
            }
            .into());
        }
        Ok(attr.value().link_targets())
    }

    fn link_list(&self, id: ObjectId, name: &str) -> DocResult<Vec<ObjectId>> {
        self.require_attribute(id, name)?
            .value()
            .as_link_list()
            .map(<[ObjectId]>::to_vec)
            .ok_or_else(|| {
                LinkError::NotALinkList {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Distinct objects `id` links to, sorted.
    pub fn out_links(&self, id: ObjectId) -> Vec<ObjectId> {
        self.object(id).map(|obj| obj.link_targets()).unwrap_or_default()
    }

    /// Distinct objects holding a link to `id`, sorted.
    pub fn back_links(&self, id: ObjectId) -> Vec<ObjectId> {
        self.object(id)
            .map(|obj| obj.back_links().sources())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Mirror invariant
    // ---------------------------------------------------------------

    /// Check forward links against back-links across the whole document.
    pub fn verify_back_links(&self) -> Vec<LinkViolation> {
        let mut violations = Vec::new();
        // (target, source) -> forward link attributes
        let mut expected: BTreeMap<(ObjectId, ObjectId), u32> = BTreeMap::new();

        for obj in self.objects() {
            for attr in obj.attributes().iter().filter(|a| a.is_link()) {
                for target in attr.value().link_targets() {
                    if self.contains(target) {
                        *expected.entry((target, obj.id())).or_insert(0) += 1;
                    } else {
                        violations.push(LinkViolation::Dangling {
                            source: obj.id(),
                            attribute: attr.name().to_string(),
                            target,
                        });
                    }
                }
            }
        }

        for obj in self.objects() {
            for (source, back) in obj.back_links().iter() {
                let forward = expected.remove(&(obj.id(), source)).unwrap_or(0);
                if forward != back {
                    violations.push(LinkViolation::CountMismatch {
                        source,
                        target: obj.id(),
                        forward,
                        back,
                    });
                }
            }
        }
        for ((target, source), forward) in expected {
            violations.push(LinkViolation::CountMismatch {
                source,
                target,
                forward,
                back: 0,
            });
        }
        violations
    }

    /// Check the mirror around one object after a write of its links:
    /// every current target of `source`, and every target it `released`,
    /// must count `source` exactly as often as `source` references it.
    pub(crate) fn check_links_around(&self, source: ObjectId, released: &[ObjectId]) -> DocResult<()> {
        let Some(obj) = self.object(source) else {
            return Ok(());
        };
        let mut forward: BTreeMap<ObjectId, u32> = BTreeMap::new();
        for attr in obj.attributes().iter().filter(|a| a.is_link()) {
            for target in attr.value().link_targets() {
                *forward.entry(target).or_insert(0) += 1;
            }
        }

        let mut targets: Vec<ObjectId> = forward.keys().copied().collect();
        targets.extend_from_slice(released);
        for target in targets {
            let expected = forward.get(&target).copied().unwrap_or(0);
            let back = match self.object(target) {
                Some(t) => t.back_links().count(source),
                None if expected == 0 => continue,
                None => {
                    return Err(DocumentError::Integrity(format!(
                        "{source} references dead object {target}"
                    )))
                }
            };
            if back != expected {
                let violation = LinkViolation::CountMismatch {
                    source,
                    target,
                    forward: expected,
                    back,
                };
                return Err(DocumentError::Integrity(violation.to_string()));
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Resolution after load
    // ---------------------------------------------------------------

    /// Number of persisted links still waiting to be rebound.
    pub fn pending_link_count(&self) -> usize {
        self.pending_links.len()
    }

    /// Rebind one persisted link attribute. Targets that no longer exist
    /// are dropped and reported; returns `false` if any was missing.
    /// An attribute with nothing pending reports `true` if it is a link.
    pub fn resolve_link(&mut self, owner: ObjectId, attribute: &str) -> bool {
        let position = self
            .pending_links
            .iter()
            .position(|p| p.owner == owner && p.attribute == attribute);
        match position {
            Some(i) => {
                let pending = self.pending_links.remove(i);
                let mut report = LinkResolution::default();
                self.resolve_pending(pending, &mut report)
            }
            None => self.attribute(owner, attribute).is_some_and(|a| a.is_link()),
        }
    }

    /// Rebind every pending link. Each broken target is reported once.
    pub fn resolve_links(&mut self) -> LinkResolution {
        let mut report = LinkResolution::default();
        for pending in std::mem::take(&mut self.pending_links) {
            self.resolve_pending(pending, &mut report);
        }
        if !report.broken.is_empty() {
            info!(
                resolved = report.resolved,
                broken = report.broken.len(),
                "link resolution finished with broken links"
            );
        }
        report
    }

    fn resolve_pending(&mut self, pending: PendingLink, report: &mut LinkResolution) -> bool {
        let Some(owner_serial) = self.object(pending.owner).map(|o| o.serial()) else {
            return false;
        };
        let mut targets = Vec::with_capacity(pending.serials.len());
        let mut complete = true;
        for serial in &pending.serials {
            match self.find_by_serial(*serial) {
                Some(target) => targets.push(target),
                None => {
                    warn!(
                        owner = owner_serial,
                        attribute = %pending.attribute,
                        missing = serial,
                        "broken link left empty"
                    );
                    report.broken.push(BrokenLink {
                        owner_serial,
                        attribute: pending.attribute.clone(),
                        missing_serial: *serial,
                    });
                    complete = false;
                }
            }
        }

        let value = match self.attribute(pending.owner, &pending.attribute).map(|a| a.kind()) {
            Some(ValueKind::Link) => Value::Link(targets.first().copied()),
            Some(ValueKind::LinkList) => Value::LinkList(targets),
            _ => return false,
        };
        let owner = pending.owner;
        if let Err(e) = self.untracked(|doc| doc.store_value(owner, &pending.attribute, value)) {
            warn!(owner = owner_serial, attribute = %pending.attribute, error = %e, "link could not be rebound");
            return false;
        }
        if complete {
            report.resolved += 1;
        }
        complete
    }
}
