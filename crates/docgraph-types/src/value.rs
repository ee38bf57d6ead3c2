//! Attribute values.
//!
//! [`Value`] is a closed variant over every concrete attribute kind the
//! document core understands. Callers query capabilities (`as_link`,
//! `link_targets`, ...) instead of downcasting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;

/// Discriminant of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    String,
    StringList,
    Vector,
    Link,
    LinkList,
}

impl ValueKind {
    /// Returns `true` for the two reference kinds.
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link | Self::LinkList)
    }

    /// The default value of this kind.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Integer => Value::Integer(0),
            Self::Float => Value::Float(0.0),
            Self::String => Value::String(String::new()),
            Self::StringList => Value::StringList(Vec::new()),
            Self::Vector => Value::Vector([0.0; 3]),
            Self::Link => Value::Link(None),
            Self::LinkList => Value::LinkList(Vec::new()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::StringList => "string-list",
            Self::Vector => "vector",
            Self::Link => "link",
            Self::LinkList => "link-list",
        };
        f.write_str(name)
    }
}

/// The value held by an attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    Vector([f64; 3]),
    /// Single non-owning reference.
    Link(Option<ObjectId>),
    /// Ordered set of non-owning references.
    LinkList(Vec<ObjectId>),
}

impl Value {
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

    /// Fails unless this value is of `expected` kind.
    pub fn expect_kind(&self, expected: ValueKind) -> Result<(), TypeError> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(TypeError::KindMismatch {
                expected: expected.to_string(),
                actual: self.kind().to_string(),
            })
        }
    }

    pub fn is_link(&self) -> bool {
        self.kind().is_link()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The target of a single link. `Some(None)` is an empty link.
    pub fn as_link(&self) -> Option<Option<ObjectId>> {
        match self {
            Self::Link(target) => Some(*target),
            _ => None,
        }
    }

    pub fn as_link_list(&self) -> Option<&[ObjectId]> {
        match self {
            Self::LinkList(targets) => Some(targets),
            _ => None,
        }
    }

    /// Every object referenced by this value, in order. Empty for
    /// non-link kinds.
    pub fn link_targets(&self) -> Vec<ObjectId> {
        match self {
            Self::Link(Some(target)) => vec![*target],
            Self::LinkList(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Rewrite every referenced handle through `f`; a `None` result drops
    /// the reference. Non-link values are returned unchanged.
    pub fn remap_links(&self, mut f: impl FnMut(ObjectId) -> Option<ObjectId>) -> Value {
        match self {
            Self::Link(target) => Self::Link(target.and_then(&mut f)),
            Self::LinkList(targets) => {
                let mut out: Vec<ObjectId> = Vec::with_capacity(targets.len());
                for mapped in targets.iter().filter_map(|t| f(*t)) {
                    if !out.contains(&mapped) {
                        out.push(mapped);
                    }
                }
                Self::LinkList(out)
            }
            other => other.clone(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Self::Vector(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Self::Link(Some(v))
    }
}
