//! Fixture types shared by the unit tests.

use std::sync::Arc;

use docgraph_registry::builtin::{
    document_object_schema, ATTRIBUTE_FLOAT, ATTRIBUTE_LINK, ATTRIBUTE_LINK_LIST, ATTRIBUTE_LINK_LIST_OWNED,
    DOCUMENT_OBJECT,
};
use docgraph_registry::{Instance, ObjectSchema, TypeDecl, TypeRegistry};

use crate::config::DocumentConfig;
use crate::document::Document;

pub(crate) const ELEMENT: &str = "Element";
pub(crate) const WALL: &str = "Wall";
pub(crate) const OPENING: &str = "Opening";

fn wall() -> Instance {
    Instance::Object(
        ObjectSchema::extend(document_object_schema())
            .attribute("Height", ATTRIBUTE_FLOAT)
            .attribute("Host", ATTRIBUTE_LINK)
            .attribute("Refs", ATTRIBUTE_LINK_LIST)
            .attribute("Openings", ATTRIBUTE_LINK_LIST_OWNED),
    )
}

fn opening() -> Instance {
    Instance::Object(
        ObjectSchema::extend(document_object_schema())
            .attribute("Width", ATTRIBUTE_FLOAT)
            .attribute("Wall", ATTRIBUTE_LINK),
    )
}

static TEST_TYPES: &[TypeDecl] = &[
    TypeDecl::abstract_type(ELEMENT, DOCUMENT_OBJECT),
    TypeDecl::concrete(WALL, ELEMENT, wall),
    TypeDecl::concrete(OPENING, ELEMENT, opening),
];

pub(crate) fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::with_builtins();
    let report = registry.register_table(TEST_TYPES);
    assert!(report.is_clean(), "{report:?}");
    Arc::new(registry)
}

pub(crate) fn document_with(config: DocumentConfig) -> Document {
    Document::new(registry(), config)
}

/// A document over the fixture types with invariants checked on every
/// link write.
pub(crate) fn document() -> Document {
    document_with(DocumentConfig::strict())
}
