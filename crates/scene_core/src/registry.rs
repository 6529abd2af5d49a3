//! Component type registry.
//!
//! Collaborator modules register component types by supplying a type name, a
//! numeric type id and an attribute blueprint; entities then instantiate
//! components through the registry so identity allocation and registration
//! are never skipped. Unknown types encountered in documents are registered
//! as placeholder types on the fly, so their data survives a round trip even
//! in a process that can not interpret it.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::attribute::AttributeSpec;
use crate::attribute::AttributeValue;
use crate::component::{
    Component, ComponentStructure, DYNAMIC_COMPONENT_TYPE_ID, NAME_COMPONENT_TYPE_ID,
};
use crate::entity::strip_legacy_prefix;

/// Errors from type registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("component type name {0:?} is already registered")]
    DuplicateTypeName(String),
    #[error("component type id {0} is already registered")]
    DuplicateTypeId(u32),
    #[error("component type name must not be empty")]
    EmptyTypeName,
    #[error("placeholder type id {type_id} hash collision: old name {old:?}, new name {new:?}")]
    PlaceholderIdCollision { type_id: u32, old: String, new: String },
}

/// Definition of a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentTypeDef {
    pub type_id: u32,
    pub type_name: String,
    pub structure: ComponentStructure,
    pub attributes: Vec<AttributeSpec>,
}

impl ComponentTypeDef {
    #[must_use]
    pub fn new(type_id: u32, type_name: &str, attributes: Vec<AttributeSpec>) -> Self {
        Self {
            type_id,
            type_name: type_name.to_string(),
            structure: ComponentStructure::Static,
            attributes,
        }
    }
}

/// One attribute of a placeholder type, preserved verbatim from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderAttr {
    pub id: String,
    pub name: String,
    pub type_name: String,
    pub value: String,
}

/// A placeholder component type derived from literal document data.
#[derive(Debug, Clone)]
pub struct PlaceholderDef {
    /// Type id from the document; zero or `u32::MAX` means "derive from the
    /// type name hash".
    pub type_id: u32,
    pub type_name: String,
    pub attributes: Vec<PlaceholderAttr>,
}

/// Registry of component types known to one scene.
#[derive(Debug)]
pub struct ComponentRegistry {
    defs: HashMap<u32, ComponentTypeDef>,
    ids_by_name: HashMap<String, u32>,
    placeholders: HashMap<u32, PlaceholderDef>,
    placeholder_ids_by_name: HashMap<String, u32>,
}

impl ComponentRegistry {
    /// A registry with the built-in types: the schema-less
    /// `DynamicComponent` and the `Name` component.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            defs: HashMap::new(),
            ids_by_name: HashMap::new(),
            placeholders: HashMap::new(),
            placeholder_ids_by_name: HashMap::new(),
        };
        let mut dynamic = ComponentTypeDef::new(DYNAMIC_COMPONENT_TYPE_ID, "DynamicComponent", Vec::new());
        dynamic.structure = ComponentStructure::Dynamic;
        registry.register(dynamic).expect("built-in type");
        registry
            .register(ComponentTypeDef::new(
                NAME_COMPONENT_TYPE_ID,
                "Name",
                vec![
                    AttributeSpec::new("name", "Name", AttributeValue::String(String::new())),
                    AttributeSpec::new(
                        "description",
                        "Description",
                        AttributeValue::String(String::new()),
                    ),
                    AttributeSpec::new("group", "Group", AttributeValue::String(String::new())),
                ],
            ))
            .expect("built-in type");
        registry
    }

    /// Registers a component type. Both the type name and the type id must
    /// be unique; re-registration is rejected.
    pub fn register(&mut self, mut def: ComponentTypeDef) -> Result<(), RegistryError> {
        def.type_name = strip_legacy_prefix(&def.type_name).to_string();
        if def.type_name.is_empty() {
            return Err(RegistryError::EmptyTypeName);
        }
        let key = def.type_name.to_ascii_lowercase();
        if self.ids_by_name.contains_key(&key) {
            error!(r#type = %def.type_name, "component type name already registered");
            return Err(RegistryError::DuplicateTypeName(def.type_name));
        }
        if self.defs.contains_key(&def.type_id) {
            error!(type_id = def.type_id, "component type id already registered");
            return Err(RegistryError::DuplicateTypeId(def.type_id));
        }
        self.ids_by_name.insert(key, def.type_id);
        self.defs.insert(def.type_id, def);
        Ok(())
    }

    /// Registers a placeholder type from literal document data, deriving a
    /// type id from the type name hash when the document supplies none.
    pub fn register_placeholder(&mut self, mut def: PlaceholderDef) -> Result<u32, RegistryError> {
        def.type_name = strip_legacy_prefix(&def.type_name).to_string();
        if def.type_name.is_empty() {
            return Err(RegistryError::EmptyTypeName);
        }
        if def.type_id == 0 || def.type_id == u32::MAX {
            def.type_id = (fnv1a_hash(&def.type_name) as u32 & 0xffff) | 0x10000;
        }
        if self.defs.contains_key(&def.type_id) {
            error!(
                type_id = def.type_id,
                "a native component type already uses this id, can not register placeholder"
            );
            return Err(RegistryError::DuplicateTypeId(def.type_id));
        }
        // Attributes without a type name can not be reconstructed.
        def.attributes.retain(|attr| {
            if attr.type_name.is_empty() {
                warn!(
                    attribute = %attr.name,
                    "can not store placeholder component attribute, no type specified"
                );
                false
            } else {
                true
            }
        });
        match self.placeholders.get(&def.type_id) {
            None => info!(r#type = %def.type_name, "registering placeholder component type"),
            Some(existing) if !existing.type_name.eq_ignore_ascii_case(&def.type_name) => {
                error!(
                    type_id = def.type_id,
                    old = %existing.type_name,
                    new = %def.type_name,
                    "placeholder component type id hash collision"
                );
                return Err(RegistryError::PlaceholderIdCollision {
                    type_id: def.type_id,
                    old: existing.type_name.clone(),
                    new: def.type_name,
                });
            }
            Some(_) => warn!(r#type = %def.type_name, "re-registering placeholder component type"),
        }
        self.placeholder_ids_by_name
            .insert(def.type_name.to_ascii_lowercase(), def.type_id);
        let type_id = def.type_id;
        self.placeholders.insert(type_id, def);
        Ok(type_id)
    }

    /// Whether the type name resolves to a native or placeholder type.
    #[must_use]
    pub fn is_type_registered(&self, type_name: &str) -> bool {
        let key = strip_legacy_prefix(type_name).to_ascii_lowercase();
        self.ids_by_name.contains_key(&key) || self.placeholder_ids_by_name.contains_key(&key)
    }

    #[must_use]
    pub fn type_id_for_name(&self, type_name: &str) -> Option<u32> {
        let key = strip_legacy_prefix(type_name).to_ascii_lowercase();
        self.ids_by_name
            .get(&key)
            .or_else(|| self.placeholder_ids_by_name.get(&key))
            .copied()
    }

    #[must_use]
    pub fn type_name_for_id(&self, type_id: u32) -> Option<&str> {
        self.defs
            .get(&type_id)
            .map(|d| d.type_name.as_str())
            .or_else(|| self.placeholders.get(&type_id).map(|d| d.type_name.as_str()))
    }

    /// All registered native type names.
    #[must_use]
    pub fn component_type_names(&self) -> Vec<&str> {
        self.defs.values().map(|d| d.type_name.as_str()).collect()
    }

    /// Instantiates a component by type name. Falls back to a registered
    /// placeholder type when no native definition exists.
    #[must_use]
    pub fn create_component_by_name(&self, type_name: &str, instance_name: &str) -> Option<Component> {
        let type_id = self.type_id_for_name(type_name)?;
        self.create_component_by_id(type_id, instance_name)
    }

    /// Instantiates a component by type id.
    #[must_use]
    pub fn create_component_by_id(&self, type_id: u32, instance_name: &str) -> Option<Component> {
        if let Some(def) = self.defs.get(&type_id) {
            let mut comp = Component::new(def.type_id, &def.type_name, def.structure);
            comp.set_name(instance_name);
            for spec in &def.attributes {
                comp.add_attribute(spec.instantiate());
            }
            return Some(comp);
        }
        if let Some(def) = self.placeholders.get(&type_id) {
            let mut comp = Component::new(def.type_id, &def.type_name, ComponentStructure::Placeholder);
            comp.set_name(instance_name);
            for attr in &def.attributes {
                comp.create_attribute_verbatim(&attr.type_name, &attr.id, &attr.name, &attr.value);
            }
            return Some(comp);
        }
        error!(type_id, "unknown component type, can not create component");
        None
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a 64-bit hash; deterministic and language-neutral, used to derive
/// placeholder type ids from type names.
#[must_use]
pub(crate) fn fnv1a_hash(name: &str) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
