//! Saving and restoring documents.
//!
//! A document is written as a JSON [`DocumentRecord`]. Links are stored as
//! object serials and rebound after all objects are loaded. Restoring is
//! forgiving: objects and attributes of types this build does not know
//! are skipped with a warning and counted in the [`LoadReport`], so
//! documents written by other application versions still open.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docgraph_registry::{AttributeFlags, TypeRegistry};
use docgraph_types::{ObjectId, Value, ValueKind, VersionInfo};

use crate::attribute::{Attribute, AttributeMeta};
use crate::config::DocumentConfig;
use crate::document::Document;
use crate::error::PersistError;
use crate::link::{LinkResolution, PendingLink};
use crate::object::DocObject;

/// Domain tag mixed into document digests.
const DIGEST_DOMAIN: &str = "docgraph-document-v1";

/// Persisted attribute value; links are object serials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum StoredValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    Vector([f64; 3]),
    Link(Option<u64>),
    LinkList(Vec<u64>),
}

impl StoredValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::StringList(_) => ValueKind::StringList,
            Self::Vector(_) => ValueKind::Vector,
            Self::Link(_) => ValueKind::Link,
            Self::LinkList(_) => ValueKind::LinkList,
        }
    }

    /// Referenced serials; empty for non-link values.
    pub fn serials(&self) -> Vec<u64> {
        match self {
            Self::Link(target) => target.iter().copied().collect(),
            Self::LinkList(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// The in-memory value of a non-link record.
    fn into_plain_value(self) -> Option<Value> {
        Some(match self {
            Self::Bool(v) => Value::Bool(v),
            Self::Integer(v) => Value::Integer(v),
            Self::Float(v) => Value::Float(v),
            Self::String(v) => Value::String(v),
            Self::StringList(v) => Value::StringList(v),
            Self::Vector(v) => Value::Vector(v),
            Self::Link(_) | Self::LinkList(_) => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub doc: String,
    /// Written since format 2.
    #[serde(default)]
    pub flags: AttributeFlags,
    pub value: StoredValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub serial: u64,
    pub type_name: String,
    pub attributes: Vec<AttributeRecord>,
}

/// A saved document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub version: VersionInfo,
    pub uid: Uuid,
    pub saved_at: DateTime<Utc>,
    pub next_serial: u64,
    pub objects: Vec<ObjectRecord>,
}

/// What a restore had to leave out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Version the document was written with.
    pub version: VersionInfo,
    /// Objects loaded.
    pub objects: usize,
    /// Objects of unknown, abstract or non-object types, or duplicate serials.
    pub skipped_objects: usize,
    /// Dynamic attributes of unknown types.
    pub skipped_attributes: usize,
    /// Recorded static attributes the type no longer declares.
    pub ignored_fields: usize,
    /// Values whose kind differs from the attribute's.
    pub mismatched_values: usize,
    pub links: LinkResolution,
}

impl LoadReport {
    fn new(version: VersionInfo) -> Self {
        Self {
            version,
            objects: 0,
            skipped_objects: 0,
            skipped_attributes: 0,
            ignored_fields: 0,
            mismatched_values: 0,
            links: LinkResolution::default(),
        }
    }

    /// Whether everything in the record was loaded.
    pub fn is_clean(&self) -> bool {
        self.skipped_objects == 0
            && self.skipped_attributes == 0
            && self.ignored_fields == 0
            && self.mismatched_values == 0
            && self.links.is_clean()
    }
}

impl Document {
    // ---------------------------------------------------------------
    // Save
    // ---------------------------------------------------------------

    /// The persisted form of the document. Transient attributes are left out.
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            version: VersionInfo::current(),
            uid: self.uid,
            saved_at: Utc::now(),
            next_serial: self.next_serial,
            objects: self.object_records(),
        }
    }

    pub fn save<W: Write>(&self, writer: W) -> Result<(), PersistError> {
        let record = self.to_record();
        serde_json::to_writer_pretty(writer, &record)?;
        debug!(document = %self.uid, objects = record.objects.len(), "document saved");
        Ok(())
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// BLAKE3 digest (hex) of the persisted object records. Equal digests
    /// mean value-for-value equal documents, independent of uid and save
    /// time.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DIGEST_DOMAIN.as_bytes());
        hasher.update(b":");
        if let Err(e) = serde_json::to_writer(&mut hasher, &self.object_records()) {
            warn!(error = %e, "object records could not be encoded for digest");
        }
        hex::encode(hasher.finalize().as_bytes())
    }

    fn object_records(&self) -> Vec<ObjectRecord> {
        let mut records: Vec<ObjectRecord> = self.objects().map(|obj| self.object_record(obj)).collect();
        records.sort_by_key(|r| r.serial);
        records
    }

    fn object_record(&self, obj: &DocObject) -> ObjectRecord {
        ObjectRecord {
            serial: obj.serial(),
            type_name: obj.type_name().to_string(),
            attributes: obj
                .attributes()
                .iter()
                .filter(|a| !a.flags().transient)
                .map(|a| self.attribute_record(a))
                .collect(),
        }
    }

    fn attribute_record(&self, attr: &Attribute) -> AttributeRecord {
        let meta = attr.meta();
        AttributeRecord {
            name: attr.name().to_string(),
            type_name: attr.type_name().to_string(),
            dynamic: attr.is_dynamic(),
            group: meta.group.clone(),
            doc: meta.doc.clone(),
            flags: meta.flags,
            value: self.stored_value(attr.value()),
        }
    }

    fn stored_value(&self, value: &Value) -> StoredValue {
        let serial = |id: &ObjectId| self.object(*id).map(DocObject::serial);
        match value {
            Value::Bool(v) => StoredValue::Bool(*v),
            Value::Integer(v) => StoredValue::Integer(*v),
            Value::Float(v) => StoredValue::Float(*v),
            Value::String(v) => StoredValue::String(v.clone()),
            Value::StringList(v) => StoredValue::StringList(v.clone()),
            Value::Vector(v) => StoredValue::Vector(*v),
            Value::Link(target) => StoredValue::Link(target.as_ref().and_then(serial)),
            Value::LinkList(targets) => StoredValue::LinkList(targets.iter().filter_map(serial).collect()),
        }
    }

    // ---------------------------------------------------------------
    // Restore
    // ---------------------------------------------------------------

    /// Read a document written by [`Document::save`]. Only malformed input
    /// fails; unknown content is skipped and reported.
    pub fn restore<R: Read>(
        registry: Arc<TypeRegistry>,
        config: DocumentConfig,
        reader: R,
    ) -> Result<(Self, LoadReport), PersistError> {
        let record: DocumentRecord = serde_json::from_reader(reader)?;
        Ok(Self::from_record(registry, config, record))
    }

    pub fn open_path(
        registry: Arc<TypeRegistry>,
        config: DocumentConfig,
        path: impl AsRef<Path>,
    ) -> Result<(Self, LoadReport), PersistError> {
        let reader = BufReader::new(File::open(path)?);
        Self::restore(registry, config, reader)
    }

    /// Build a document from its record. The result has no history.
    pub fn from_record(
        registry: Arc<TypeRegistry>,
        config: DocumentConfig,
        record: DocumentRecord,
    ) -> (Self, LoadReport) {
        let version = record.version;
        if version.is_newer_than_current() {
            warn!(
                format = version.format,
                producer = %version.producer,
                "document written by a newer format; loading best-effort"
            );
        }
        let flags_known = version.has_attribute_flags();
        let mut report = LoadReport::new(version);

        let mut doc = Document::new(registry, config);
        doc.uid = record.uid;
        doc.untracked(|doc| {
            for object in record.objects {
                doc.restore_object(object, flags_known, &mut report);
            }
        });
        let highest = doc.objects().map(DocObject::serial).max().unwrap_or(0);
        doc.next_serial = record.next_serial.max(highest.saturating_add(1));

        report.links = doc.resolve_links();
        report.objects = doc.len();
        info!(
            document = %doc.uid,
            objects = report.objects,
            skipped_objects = report.skipped_objects,
            skipped_attributes = report.skipped_attributes,
            broken_links = report.links.broken.len(),
            "document loaded"
        );
        (doc, report)
    }

    fn restore_object(&mut self, record: ObjectRecord, flags_known: bool, report: &mut LoadReport) {
        if self.serials.contains_key(&record.serial) {
            warn!(serial = record.serial, "duplicate object serial skipped");
            report.skipped_objects += 1;
            return;
        }
        let (type_id, attributes) = match self.build_object(&record.type_name) {
            Ok(built) => built,
            Err(e) => {
                warn!(serial = record.serial, type_name = %record.type_name, error = %e, "object skipped");
                report.skipped_objects += 1;
                return;
            }
        };
        let serial = record.serial;
        let type_name = record.type_name;
        let id = self
            .objects
            .insert_with(|id| DocObject::new(id, serial, type_id, type_name, attributes));
        self.serials.insert(serial, id);

        for attr in record.attributes {
            self.restore_attribute(id, serial, attr, flags_known, report);
        }
    }

    fn restore_attribute(
        &mut self,
        id: ObjectId,
        serial: u64,
        record: AttributeRecord,
        flags_known: bool,
        report: &mut LoadReport,
    ) {
        if self.attribute(id, &record.name).is_none() {
            if !record.dynamic {
                debug!(serial, attribute = %record.name, "undeclared static attribute ignored");
                report.ignored_fields += 1;
                return;
            }
            let meta = AttributeMeta {
                group: record.group,
                doc: record.doc,
                flags: if flags_known { record.flags } else { AttributeFlags::default() },
            };
            let added = Attribute::instantiate(&self.registry, &record.type_name, record.name.clone(), meta)
                .and_then(|attr| match self.objects.get_mut(id) {
                    Some(obj) => obj.attributes_mut().insert_dynamic(attr).map(|_| ()),
                    None => Ok(()),
                });
            if let Err(e) = added {
                warn!(serial, attribute = %record.name, type_name = %record.type_name, error = %e, "attribute skipped");
                report.skipped_attributes += 1;
                return;
            }
        }

        let Some(kind) = self.attribute(id, &record.name).map(Attribute::kind) else {
            return;
        };
        if kind != record.value.kind() {
            warn!(
                serial,
                attribute = %record.name,
                expected = %kind,
                actual = %record.value.kind(),
                "value of the wrong kind skipped"
            );
            report.mismatched_values += 1;
            return;
        }

        if kind.is_link() {
            let serials = record.value.serials();
            if !serials.is_empty() {
                self.pending_links.push(PendingLink {
                    owner: id,
                    attribute: record.name,
                    serials,
                });
            }
            return;
        }
        if let Some(value) = record.value.into_plain_value() {
            if let Err(e) = self.store_value(id, &record.name, value) {
                warn!(serial, attribute = %record.name, error = %e, "value skipped");
                report.mismatched_values += 1;
            }
        }
    }
}
