//! Built-in types every document relies on.
//!
//! ```text
//! Base
//! ├── Attribute
//! │   ├── AttributeBool, AttributeInteger, AttributeFloat, AttributeString,
//! │   │   AttributeStringList, AttributeVector
//! │   ├── AttributeLink
//! │   │   └── AttributeLinkOwned
//! │   └── AttributeLinkList
//! │       └── AttributeLinkListOwned
//! └── DocumentObject
//! ```
//!
//! The `Owned` link kinds model composition (a group and its members); the
//! plain kinds model references between independent objects. The two
//! families differ in how deep copies treat targets outside the copied set.

use docgraph_types::Value;

use crate::registry::TypeRegistry;
use crate::schema::{AttributeDecl, Instance, ObjectSchema};
use crate::table::TypeDecl;

pub const BASE: &str = "Base";
pub const ATTRIBUTE: &str = "Attribute";
pub const ATTRIBUTE_BOOL: &str = "AttributeBool";
pub const ATTRIBUTE_INTEGER: &str = "AttributeInteger";
pub const ATTRIBUTE_FLOAT: &str = "AttributeFloat";
pub const ATTRIBUTE_STRING: &str = "AttributeString";
pub const ATTRIBUTE_STRING_LIST: &str = "AttributeStringList";
pub const ATTRIBUTE_VECTOR: &str = "AttributeVector";
pub const ATTRIBUTE_LINK: &str = "AttributeLink";
pub const ATTRIBUTE_LINK_OWNED: &str = "AttributeLinkOwned";
pub const ATTRIBUTE_LINK_LIST: &str = "AttributeLinkList";
pub const ATTRIBUTE_LINK_LIST_OWNED: &str = "AttributeLinkListOwned";
pub const DOCUMENT_OBJECT: &str = "DocumentObject";

/// Static attribute every document object carries.
pub const LABEL: &str = "Label";

fn bool_attribute() -> Instance {
    Instance::Attribute(Value::Bool(false))
}

fn integer_attribute() -> Instance {
    Instance::Attribute(Value::Integer(0))
}

fn float_attribute() -> Instance {
    Instance::Attribute(Value::Float(0.0))
}

fn string_attribute() -> Instance {
    Instance::Attribute(Value::String(String::new()))
}

fn string_list_attribute() -> Instance {
    Instance::Attribute(Value::StringList(Vec::new()))
}

fn vector_attribute() -> Instance {
    Instance::Attribute(Value::Vector([0.0; 3]))
}

fn link_attribute() -> Instance {
    Instance::Attribute(Value::Link(None))
}

fn link_list_attribute() -> Instance {
    Instance::Attribute(Value::LinkList(Vec::new()))
}

fn document_object() -> Instance {
    Instance::Object(document_object_schema())
}

/// Schema of the root object type; derived object schemas start from it.
pub fn document_object_schema() -> ObjectSchema {
    ObjectSchema::new().with(
        AttributeDecl::new(LABEL, ATTRIBUTE_STRING)
            .group("Base")
            .doc("User visible name of the object"),
    )
}

pub static BUILTIN_TYPES: &[TypeDecl] = &[
    TypeDecl::root(BASE),
    TypeDecl::abstract_type(ATTRIBUTE, BASE),
    TypeDecl::concrete(ATTRIBUTE_BOOL, ATTRIBUTE, bool_attribute),
    TypeDecl::concrete(ATTRIBUTE_INTEGER, ATTRIBUTE, integer_attribute),
    TypeDecl::concrete(ATTRIBUTE_FLOAT, ATTRIBUTE, float_attribute),
    TypeDecl::concrete(ATTRIBUTE_STRING, ATTRIBUTE, string_attribute),
    TypeDecl::concrete(ATTRIBUTE_STRING_LIST, ATTRIBUTE, string_list_attribute),
    TypeDecl::concrete(ATTRIBUTE_VECTOR, ATTRIBUTE, vector_attribute),
    TypeDecl::concrete(ATTRIBUTE_LINK, ATTRIBUTE, link_attribute),
    TypeDecl::concrete(ATTRIBUTE_LINK_OWNED, ATTRIBUTE_LINK, link_attribute),
    TypeDecl::concrete(ATTRIBUTE_LINK_LIST, ATTRIBUTE, link_list_attribute),
    TypeDecl::concrete(ATTRIBUTE_LINK_LIST_OWNED, ATTRIBUTE_LINK_LIST, link_list_attribute),
    TypeDecl::concrete(DOCUMENT_OBJECT, BASE, document_object),
];

impl TypeRegistry {
    /// A registry holding the built-in types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_table(BUILTIN_TYPES);
        registry
    }
}
