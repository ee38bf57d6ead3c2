//! What factories produce.
//!
//! An attribute type's factory yields [`Instance::Attribute`] with the
//! default value of the new attribute. An object type's factory yields
//! [`Instance::Object`] with the static attribute declarations every object
//! of that type starts with.

use serde::{Deserialize, Serialize};

use docgraph_types::Value;

/// Editor hints attached to an attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeFlags {
    /// Not meant to be edited by the user.
    pub read_only: bool,
    /// Not shown in attribute editors.
    pub hidden: bool,
    /// Not persisted.
    pub transient: bool,
    /// Computed by the object itself; changing it does not invalidate it.
    pub output: bool,
}

impl AttributeFlags {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::default()
        }
    }
}

/// Static declaration of one attribute in an [`ObjectSchema`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    /// Registered attribute type name, e.g. `AttributeFloat`.
    pub type_name: String,
    pub group: String,
    pub doc: String,
    pub flags: AttributeFlags,
}

impl AttributeDecl {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
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

    pub fn flags(mut self, flags: AttributeFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Ordered static attribute declarations of an object type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub attributes: Vec<AttributeDecl>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a derived schema from its parent's declarations.
    pub fn extend(parent: ObjectSchema) -> Self {
        parent
    }

    /// Append a declaration with empty group/doc and default flags.
    pub fn attribute(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.with(AttributeDecl::new(name, type_name))
    }

    /// Append a fully specified declaration. A later declaration with the
    /// same name replaces the earlier one in place, so derived schemas can
    /// override an inherited declaration.
    pub fn with(mut self, decl: AttributeDecl) -> Self {
        match self.attributes.iter_mut().find(|d| d.name == decl.name) {
            Some(existing) => *existing = decl,
            None => self.attributes.push(decl),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|d| d.name == name)
    }
}

/// The product of a type factory.
#[derive(Clone, Debug, PartialEq)]
pub enum Instance {
    /// A new attribute, carrying its default value.
    Attribute(Value),
    /// A new document object, carrying its static attribute declarations.
    Object(ObjectSchema),
}

impl Instance {
    pub fn as_attribute(&self) -> Option<&Value> {
        match self {
            Self::Attribute(v) => Some(v),
            Self::Object(_) => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectSchema> {
        match self {
            Self::Object(schema) => Some(schema),
            Self::Attribute(_) => None,
        }
    }
}
