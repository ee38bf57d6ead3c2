//! The [`TypeRegistry`] and its handles.
//!
//! # Invariants
//!
//! - Type names are unique within one registry.
//! - A descriptor's parent is registered before the descriptor, so the
//!   parent graph is a forest and can never contain a cycle.
//! - Descriptors are never re-parented or removed.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use tracing::{debug, warn};

use docgraph_types::ValueKind;

use crate::error::RegistryError;
use crate::names::validate_type_name;
use crate::schema::Instance;

/// No-argument constructor stored with a type.
pub type Factory = fn() -> Instance;

/// Handle of a registered type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// The bad-type sentinel returned by failed lookups and registrations.
    pub const BAD: TypeId = TypeId(u32::MAX);

    pub fn is_bad(&self) -> bool {
        *self == Self::BAD
    }

    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bad() {
            write!(f, "TypeId(BAD)")
        } else {
            write!(f, "TypeId({})", self.0)
        }
    }
}

/// A registered type.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    name: String,
    parent: Option<TypeId>,
    factory: Option<Factory>,
    children: Vec<TypeId>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }

    /// A type without a factory cannot be instantiated by name.
    pub fn is_abstract(&self) -> bool {
        self.factory.is_none()
    }

    /// Directly derived types, in registration order.
    pub fn children(&self) -> &[TypeId] {
        &self.children
    }
}

/// Catalog of type descriptors.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    descriptors: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    // ---------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------

    /// Register `name` as a child of `parent` (or as a root).
    ///
    /// Re-registering the same `(name, parent)` pair returns the existing
    /// handle: independently loaded modules may declare the same type, and
    /// consistent duplicates are tolerated. A conflicting registration
    /// (same name, different parent), an invalid name or an unknown parent
    /// yields [`TypeId::BAD`].
    pub fn create_type(
        &mut self,
        parent: Option<TypeId>,
        name: &str,
        factory: Option<Factory>,
    ) -> TypeId {
        match self.try_create_type(parent, name, factory) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "type registration refused");
                TypeId::BAD
            }
        }
    }

    /// Like [`create_type`](Self::create_type), but reports why a
    /// registration was refused.
    pub fn try_create_type(
        &mut self,
        parent: Option<TypeId>,
        name: &str,
        factory: Option<Factory>,
    ) -> Result<TypeId, RegistryError> {
        validate_type_name(name)?;

        if let Some(p) = parent {
            if self.descriptor(p).is_none() {
                return Err(RegistryError::UnknownParent {
                    name: name.to_string(),
                });
            }
        }

        if let Some(&existing) = self.by_name.get(name) {
            let current_parent = self.descriptors[existing.index()].parent;
            if current_parent == parent {
                return Ok(existing);
            }
            return Err(RegistryError::ParentConflict {
                name: name.to_string(),
                existing: self.parent_label(current_parent),
                requested: self.parent_label(parent),
            });
        }

        let id = TypeId(self.descriptors.len() as u32);
        self.descriptors.push(TypeDescriptor {
            name: name.to_string(),
            parent,
            factory,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.descriptors[p.index()].children.push(id);
        }
        self.by_name.insert(name.to_string(), id);

        debug!(name, parent = %self.parent_label(parent), "registered type");
        Ok(id)
    }

    fn parent_label(&self, parent: Option<TypeId>) -> String {
        match parent {
            Some(p) => self.name(p).unwrap_or("<bad>").to_string(),
            None => "<root>".to_string(),
        }
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// O(1) lookup by name; [`TypeId::BAD`] if unknown.
    pub fn from_name(&self, name: &str) -> TypeId {
        self.by_name.get(name).copied().unwrap_or(TypeId::BAD)
    }

    pub fn descriptor(&self, id: TypeId) -> Option<&TypeDescriptor> {
        if id.is_bad() {
            return None;
        }
        self.descriptors.get(id.index())
    }

    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.descriptor(id).map(TypeDescriptor::name)
    }

    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.descriptor(id).and_then(TypeDescriptor::parent)
    }

    /// Unknown types count as abstract: they cannot be instantiated.
    pub fn is_abstract(&self, id: TypeId) -> bool {
        self.descriptor(id).map_or(true, TypeDescriptor::is_abstract)
    }

    /// Whether `id` is `ancestor` or lies below it. Walks the parent
    /// chain, O(depth). A bad handle is derived from nothing.
    pub fn is_derived_from(&self, id: TypeId, ancestor: TypeId) -> bool {
        if self.descriptor(ancestor).is_none() {
            return false;
        }
        let mut current = self.descriptor(id).map(|_| id);
        while let Some(t) = current {
            if t == ancestor {
                return true;
            }
            current = self.parent(t);
        }
        false
    }

    /// Name-based convenience for [`is_derived_from`](Self::is_derived_from).
    pub fn is_derived_from_name(&self, name: &str, ancestor: &str) -> bool {
        self.is_derived_from(self.from_name(name), self.from_name(ancestor))
    }

    /// The subtree rooted at `id`, breadth-first over registered children.
    /// `id` itself comes first. Empty for a bad handle.
    pub fn all_derived_from(&self, id: TypeId) -> Vec<TypeId> {
        let mut result = Vec::new();
        if self.descriptor(id).is_none() {
            return result;
        }
        let mut queue = VecDeque::from([id]);
        while let Some(t) = queue.pop_front() {
            result.push(t);
            queue.extend(self.descriptors[t.index()].children.iter().copied());
        }
        result
    }

    /// Root types, in registration order.
    pub fn roots(&self) -> Vec<TypeId> {
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.parent.is_none())
            .map(|(i, _)| TypeId(i as u32))
            .collect()
    }

    // ---------------------------------------------------------------
    // Instantiation
    // ---------------------------------------------------------------

    /// Invoke the factory of `id`; `None` for abstract or unknown types.
    pub fn instantiate(&self, id: TypeId) -> Option<Instance> {
        self.descriptor(id).and_then(|d| d.factory).map(|f| f())
    }

    /// Invoke the factory registered under `name`; `None` if the type is
    /// unknown or abstract.
    pub fn create_instance_by_name(&self, name: &str) -> Option<Instance> {
        self.instantiate(self.from_name(name))
    }

    /// The value kind of an attribute type, if `id` can be instantiated as
    /// an attribute.
    pub fn attribute_kind(&self, id: TypeId) -> Option<ValueKind> {
        match self.instantiate(id)? {
            Instance::Attribute(value) => Some(value.kind()),
            Instance::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectSchema;
    use docgraph_types::Value;
    use proptest::prelude::*;

    fn float_attr() -> Instance {
        Instance::Attribute(Value::Float(0.0))
    }

    fn wall() -> Instance {
        Instance::Object(ObjectSchema::new().attribute("Height", "AttributeFloat"))
    }

    /// Base -> {Attribute -> AttributeFloat, DocumentObject -> Wall}
    fn sample() -> (TypeRegistry, [TypeId; 5]) {
        let mut reg = TypeRegistry::new();
        let base = reg.create_type(None, "Base", None);
        let attr = reg.create_type(Some(base), "Attribute", None);
        let float = reg.create_type(Some(attr), "AttributeFloat", Some(float_attr));
        let obj = reg.create_type(Some(base), "DocumentObject", None);
        let wall = reg.create_type(Some(obj), "Wall", Some(wall));
        (reg, [base, attr, float, obj, wall])
    }

    #[test]
    fn register_and_lookup() {
        let (reg, [base, _, float, _, wall]) = sample();
        assert_eq!(reg.len(), 5);
        assert_eq!(reg.from_name("Wall"), wall);
        assert_eq!(reg.name(float), Some("AttributeFloat"));
        assert_eq!(reg.parent(base), None);
        assert_eq!(reg.roots(), vec![base]);
    }

    #[test]
    fn unknown_name_is_bad() {
        let (reg, _) = sample();
        let id = reg.from_name("Ifc::Unheard");
        assert!(id.is_bad());
        assert!(reg.descriptor(id).is_none());
        assert!(reg.create_instance_by_name("Ifc::Unheard").is_none());
    }

    #[test]
    fn consistent_reregistration_is_idempotent() {
        let (mut reg, [_, attr, float, _, _]) = sample();
        let again = reg.create_type(Some(attr), "AttributeFloat", Some(float_attr));
        assert_eq!(again, float);
        assert_eq!(reg.len(), 5);
        assert_eq!(reg.descriptor(attr).unwrap().children(), &[float]);
    }

    #[test]
    fn conflicting_parent_is_refused() {
        let (mut reg, [base, _, float, _, _]) = sample();
        assert!(reg.create_type(Some(base), "AttributeFloat", None).is_bad());
        let err = reg.try_create_type(None, "AttributeFloat", None).unwrap_err();
        assert!(matches!(err, RegistryError::ParentConflict { .. }));
        // Original registration is untouched.
        assert_eq!(reg.from_name("AttributeFloat"), float);
    }

    #[test]
    fn bad_parent_or_name_is_refused() {
        let mut reg = TypeRegistry::new();
        assert!(reg.create_type(Some(TypeId::BAD), "Orphan", None).is_bad());
        assert!(reg.create_type(None, "not valid", None).is_bad());
        assert!(reg.is_empty());
    }

    #[test]
    fn derivation_is_reflexive_and_follows_the_chain() {
        let (reg, [base, attr, float, obj, wall]) = sample();
        assert!(reg.is_derived_from(wall, wall));
        assert!(reg.is_derived_from(wall, obj));
        assert!(reg.is_derived_from(wall, base));
        assert!(reg.is_derived_from(float, attr));
        assert!(!reg.is_derived_from(wall, attr));
        assert!(!reg.is_derived_from(obj, wall));
        assert!(!reg.is_derived_from(TypeId::BAD, TypeId::BAD));
        assert!(reg.is_derived_from_name("Wall", "Base"));
    }

    #[test]
    fn derived_enumeration_is_breadth_first() {
        let (reg, [base, attr, float, obj, wall]) = sample();
        assert_eq!(reg.all_derived_from(base), vec![base, attr, obj, float, wall]);
        assert_eq!(reg.all_derived_from(obj), vec![obj, wall]);
        assert!(reg.all_derived_from(TypeId::BAD).is_empty());
    }

    #[test]
    fn abstract_types_do_not_instantiate() {
        let (reg, [_, attr, float, _, wall]) = sample();
        assert!(reg.is_abstract(attr));
        assert!(reg.instantiate(attr).is_none());
        assert_eq!(reg.attribute_kind(float), Some(ValueKind::Float));
        assert_eq!(reg.attribute_kind(wall), None);
        let schema = reg.create_instance_by_name("Wall").and_then(Instance::into_object).unwrap();
        assert_eq!(schema.attributes[0].name, "Height");
    }

    /// Build a random forest: type `i` is a root or a child of some `j < i`.
    fn forest(parents: &[Option<usize>]) -> (TypeRegistry, Vec<TypeId>) {
        let mut reg = TypeRegistry::new();
        let mut ids: Vec<TypeId> = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            let parent = match parent {
                Some(p) if !ids.is_empty() => Some(ids[p % ids.len()]),
                _ => None,
            };
            ids.push(reg.create_type(parent, &format!("T{i}"), None));
        }
        (reg, ids)
    }

    proptest! {
        #[test]
        fn derivation_is_reflexive_and_transitive(
            parents in prop::collection::vec(prop::option::of(0usize..32), 1..24)
        ) {
            let (reg, ids) = forest(&parents);
            for &t in &ids {
                prop_assert!(reg.is_derived_from(t, t));
            }
            for &t in &ids {
                for &u in &ids {
                    for &v in &ids {
                        if reg.is_derived_from(t, u) && reg.is_derived_from(u, v) {
                            prop_assert!(reg.is_derived_from(t, v));
                        }
                    }
                }
            }
        }

        #[test]
        fn subtree_matches_derivation(
            parents in prop::collection::vec(prop::option::of(0usize..32), 1..24)
        ) {
            let (reg, ids) = forest(&parents);
            for &root in &ids {
                let subtree = reg.all_derived_from(root);
                for &t in &ids {
                    prop_assert_eq!(subtree.contains(&t), reg.is_derived_from(t, root));
                }
            }
        }
    }
}
