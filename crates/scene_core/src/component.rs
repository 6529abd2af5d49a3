//! Components: typed bundles of attributes attached to entities.
//!
//! A component's class identity is its (type name, numeric type id) pair;
//! the optional instance name distinguishes multiple components of the same
//! type on one entity. The attribute list is ordered and may contain holes
//! once dynamic attributes have been removed — indices are part of the wire
//! protocol and must never shift.

use thiserror::Error;
use tracing::{error, warn};

use crate::attribute::{Attribute, AttributeError, AttributeTypeId, AttributeValue};
use crate::change::AttributeChange;
use crate::events::{EventQueue, SceneEvent};
use crate::ids::{ComponentId, EntityId};
use crate::wire::{WireError, WireReader, WireWriter};

/// Type id of the built-in schema-less component.
pub const DYNAMIC_COMPONENT_TYPE_ID: u32 = 25;
/// Type id of the built-in naming component (attributes `name`,
/// `description`, `group`).
pub const NAME_COMPONENT_TYPE_ID: u32 = 26;

/// How a component's attribute list is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStructure {
    /// Attribute list is fixed by the registered type definition.
    Static,
    /// Attributes are added and removed at runtime (schema-less data).
    Dynamic,
    /// Stand-in for a type unknown to this process; attributes were built
    /// verbatim from document data and are reported as static so protocol
    /// code that branches on static-vs-dynamic treats the component like any
    /// compiled-in one.
    Placeholder,
}

/// Errors from component-level operations. All of them are logged at the
/// call site and leave the component state untouched.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("component type {0:?} does not support dynamic attributes")]
    DynamicAttributesUnsupported(String),
    #[error("attribute {0:?} not found")]
    AttributeNotFound(String),
    #[error("attribute {0:?} is static and can not be removed")]
    StaticAttributeImmutable(String),
    #[error("unknown attribute type {0:?}")]
    UnknownAttributeType(String),
    #[error("binary data holds {got} attributes, component has {expected}")]
    AttributeCountMismatch { expected: usize, got: usize },
    #[error("component type {0:?} can not be deserialized from binary")]
    BinaryUnsupported(String),
    #[error("replication mode can not be changed after an id has been assigned")]
    ReplicationFrozen,
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// One attribute's worth of document data, used by the textual
/// deserialization paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUpdate {
    /// Stable property key. Legacy documents may only carry a name; the
    /// reader substitutes it here.
    pub id: String,
    pub type_name: String,
    pub value: String,
    pub name: String,
}

/// A typed bundle of attributes.
#[derive(Debug)]
pub struct Component {
    id: ComponentId,
    parent_entity: Option<EntityId>,
    type_id: u32,
    type_name: String,
    name: String,
    replicated: bool,
    temporary: bool,
    update_mode: AttributeChange,
    structure: ComponentStructure,
    attributes: Vec<Option<Attribute>>,
}

impl Component {
    pub(crate) fn new(type_id: u32, type_name: &str, structure: ComponentStructure) -> Self {
        Self {
            id: ComponentId::ZERO,
            parent_entity: None,
            type_id,
            type_name: type_name.to_string(),
            name: String::new(),
            replicated: true,
            temporary: false,
            update_mode: AttributeChange::Replicate,
            structure,
            attributes: Vec::new(),
        }
    }

    // -- Identity & flags --

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ComponentId) {
        self.id = id;
    }

    #[must_use]
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The user-assigned instance name; may be empty.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// The entity this component is attached to, if any.
    #[must_use]
    pub fn parent_entity(&self) -> Option<EntityId> {
        self.parent_entity
    }

    pub(crate) fn set_parent_entity(&mut self, entity: Option<EntityId>) {
        self.parent_entity = entity;
    }

    #[must_use]
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        !self.replicated
    }

    /// True while the component waits for the authority to assign a final id.
    #[must_use]
    pub fn is_unacked(&self) -> bool {
        self.id.is_unacked()
    }

    /// Enables or disables replication. Only possible before the component
    /// is attached, because the replication mode selects the id range.
    pub fn set_replicated(&mut self, enable: bool) -> Result<(), ComponentError> {
        if self.id.is_assigned() {
            error!(
                component = %self.type_name,
                "replication mode can not be changed after an id has been assigned"
            );
            return Err(ComponentError::ReplicationFrozen);
        }
        self.replicated = enable;
        Ok(())
    }

    /// Forces the replication flag from an id's range; used when a manual
    /// id dictates the mode. Only valid while unattached.
    pub(crate) fn force_replicated(&mut self, enable: bool) {
        self.replicated = enable;
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Temporary components are excluded from persistence.
    pub fn set_temporary(&mut self, enable: bool) {
        self.temporary = enable;
    }

    /// Default intent used when a mutation passes [`AttributeChange::Default`].
    #[must_use]
    pub fn update_mode(&self) -> AttributeChange {
        self.update_mode
    }

    /// Sets the default change mode; `Default` itself would be meaningless
    /// and is rejected with a warning.
    pub fn set_update_mode(&mut self, mode: AttributeChange) {
        if mode == AttributeChange::Default {
            warn!(component = %self.type_name, "refusing to set update mode to Default");
            return;
        }
        self.update_mode = mode;
    }

    #[must_use]
    pub fn structure(&self) -> ComponentStructure {
        self.structure
    }

    #[must_use]
    pub fn supports_dynamic_attributes(&self) -> bool {
        self.structure == ComponentStructure::Dynamic
    }

    // -- Attribute access --

    /// The raw slot list. Holes stay behind when dynamic attributes are
    /// removed, so expect `None` entries.
    #[must_use]
    pub fn attributes(&self) -> &[Option<Attribute>] {
        &self.attributes
    }

    /// Live attributes in index order.
    pub fn live_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter_map(Option::as_ref)
    }

    pub(crate) fn live_attributes_mut(&mut self) -> impl Iterator<Item = &mut Attribute> {
        self.attributes.iter_mut().filter_map(Option::as_mut)
    }

    /// Number of live attributes (holes not counted).
    #[must_use]
    pub fn num_attributes(&self) -> usize {
        self.live_attributes().count()
    }

    /// Number of compiled-in attributes at the head of the list. Placeholder
    /// components report every attribute as static.
    #[must_use]
    pub fn num_static_attributes(&self) -> usize {
        if self.structure == ComponentStructure::Placeholder {
            return self.num_attributes();
        }
        let mut count = 0;
        for slot in &self.attributes {
            match slot {
                Some(attr) if !attr.is_dynamic() => count += 1,
                _ => break,
            }
        }
        count
    }

    /// Case-insensitive lookup by attribute id.
    #[must_use]
    pub fn attribute_by_id(&self, id: &str) -> Option<&Attribute> {
        self.live_attributes().find(|a| a.id().eq_ignore_ascii_case(id))
    }

    /// Case-insensitive lookup by human-readable name.
    #[must_use]
    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        self.live_attributes().find(|a| a.name().eq_ignore_ascii_case(name))
    }

    fn attribute_slot_by_id(&mut self, id: &str) -> Option<&mut Attribute> {
        self.attributes
            .iter_mut()
            .filter_map(Option::as_mut)
            .find(|a| a.id().eq_ignore_ascii_case(id))
    }

    /// Adds an attribute cell, reusing the first hole for dynamic cells so
    /// indices stay compact. Returns the assigned index.
    pub(crate) fn add_attribute(&mut self, mut attr: Attribute) -> u8 {
        if attr.is_dynamic() {
            if let Some(hole) = self.attributes.iter().position(Option::is_none) {
                attr.set_index(hole as u8);
                self.attributes[hole] = Some(attr);
                return hole as u8;
            }
        }
        let index = self.attributes.len() as u8;
        attr.set_index(index);
        self.attributes.push(Some(attr));
        index
    }

    // -- Mutation --

    fn emit_attribute_changed(
        &self,
        attr_id: &str,
        change: AttributeChange,
        events: &mut EventQueue,
    ) {
        let Some(entity) = self.parent_entity else {
            return;
        };
        if let Some(change) = change.resolved(self.update_mode) {
            events.push(SceneEvent::AttributeChanged {
                entity,
                component: self.id,
                attribute: attr_id.to_string(),
                change,
            });
        }
    }

    /// Assigns a value to an attribute, recording an `AttributeChanged`
    /// event with the resolved intent. Wrong-kind assignment is a
    /// programmer error: logged, value unchanged.
    pub fn set_attr(
        &mut self,
        id: &str,
        value: AttributeValue,
        change: AttributeChange,
        events: &mut EventQueue,
    ) -> Result<(), ComponentError> {
        let type_name = self.type_name.clone();
        let attr = self
            .attribute_slot_by_id(id)
            .ok_or_else(|| ComponentError::AttributeNotFound(id.to_string()))?;
        if let Err(err) = attr.set_value(value) {
            error!(component = %type_name, attribute = id, %err, "attribute assignment rejected");
            return Err(err.into());
        }
        let attr_id = attr.id().to_string();
        self.emit_attribute_changed(&attr_id, change, events);
        Ok(())
    }

    /// Parses and assigns an attribute's string form.
    pub fn set_attr_str(
        &mut self,
        id: &str,
        value: &str,
        change: AttributeChange,
        events: &mut EventQueue,
    ) -> Result<(), ComponentError> {
        let attr = self
            .attribute_slot_by_id(id)
            .ok_or_else(|| ComponentError::AttributeNotFound(id.to_string()))?;
        attr.parse_assign(value);
        let attr_id = attr.id().to_string();
        self.emit_attribute_changed(&attr_id, change, events);
        Ok(())
    }

    /// Creates a dynamic attribute with the given type and id (the name is
    /// the id). Permitted only on dynamic-structure components. If an
    /// attribute with the id already exists it is returned as-is.
    pub fn create_attribute(
        &mut self,
        type_name: &str,
        id: &str,
        change: AttributeChange,
        events: &mut EventQueue,
    ) -> Result<u8, ComponentError> {
        if !self.supports_dynamic_attributes() {
            error!(
                component = %self.type_name,
                "create_attribute called on a component that does not support dynamic attributes"
            );
            return Err(ComponentError::DynamicAttributesUnsupported(
                self.type_name.clone(),
            ));
        }
        if let Some(existing) = self.attribute_by_id(id) {
            return Ok(existing.index());
        }
        let type_id = AttributeTypeId::from_type_name(type_name).ok_or_else(|| {
            error!(
                component = %self.type_name,
                attribute = id,
                r#type = type_name,
                "failed to create attribute of unknown type"
            );
            ComponentError::UnknownAttributeType(type_name.to_string())
        })?;
        let attr = Attribute::new_dynamic(id, AttributeValue::default_for(type_id));
        let index = self.add_attribute(attr);
        if let Some(entity) = self.parent_entity {
            // Stealth creation is not supported: additions always signal.
            let resolved = change
                .resolved(self.update_mode)
                .unwrap_or(AttributeChange::LocalOnly);
            events.push(SceneEvent::AttributeAdded {
                entity,
                component: self.id,
                attribute: id.to_string(),
                change: resolved,
            });
        }
        self.emit_attribute_changed(id, change, events);
        Ok(index)
    }

    /// Creates an attribute cell verbatim from document data, preserving the
    /// declared type name, the raw value string and the human-readable name.
    /// Used when constructing placeholder components; no events are emitted
    /// (the cells behave like compiled-in attributes filled at construction).
    pub(crate) fn create_attribute_verbatim(
        &mut self,
        type_name: &str,
        id: &str,
        name: &str,
        value: &str,
    ) {
        if self.attribute_by_id(id).is_some() {
            return;
        }
        let attr = match AttributeTypeId::from_type_name(type_name) {
            // A known kind still parses normally so typed access works.
            Some(type_id) => {
                let mut attr =
                    Attribute::new_dynamic(id, AttributeValue::from_string(type_id, value));
                attr.set_name(name);
                attr
            }
            None => Attribute::new_verbatim(id, name, type_name, value),
        };
        self.add_attribute(attr);
    }

    /// Removes a dynamic attribute, leaving a hole so sibling indices do not
    /// shift. Static attributes can never be removed.
    pub fn remove_attribute(
        &mut self,
        id: &str,
        change: AttributeChange,
        events: &mut EventQueue,
    ) -> Result<(), ComponentError> {
        if !self.supports_dynamic_attributes() {
            error!(
                component = %self.type_name,
                "remove_attribute called on a component that does not support dynamic attributes"
            );
            return Err(ComponentError::DynamicAttributesUnsupported(
                self.type_name.clone(),
            ));
        }
        let index = match self.attribute_by_id(id) {
            Some(attr) if attr.is_dynamic() => attr.index() as usize,
            Some(attr) => {
                error!(attribute = %attr.id(), "can not remove static attribute");
                return Err(ComponentError::StaticAttributeImmutable(
                    attr.id().to_string(),
                ));
            }
            None => {
                error!(attribute = id, "can not remove nonexisting attribute");
                return Err(ComponentError::AttributeNotFound(id.to_string()));
            }
        };
        if let Some(entity) = self.parent_entity {
            let resolved = change
                .resolved(self.update_mode)
                .unwrap_or(AttributeChange::LocalOnly);
            events.push(SceneEvent::AttributeRemoved {
                entity,
                component: self.id,
                attribute: id.to_string(),
                change: resolved,
            });
        }
        self.attributes[index] = None;
        Ok(())
    }

    /// Forces a change notification for every live attribute; used for bulk
    /// "this component has been fully replaced" signaling.
    pub fn component_changed(&mut self, change: AttributeChange, events: &mut EventQueue) {
        let ids: Vec<String> = self.live_attributes().map(|a| a.id().to_string()).collect();
        for id in ids {
            self.emit_attribute_changed(&id, change, events);
        }
        for attr in self.live_attributes_mut() {
            attr.clear_changed();
        }
    }

    // -- Textual (document) deserialization --

    /// Applies document data to this component by structure kind: dynamic
    /// components diff, everything else delta-applies.
    pub fn deserialize_attributes(
        &mut self,
        updates: Vec<AttributeUpdate>,
        change: AttributeChange,
        events: &mut EventQueue,
    ) {
        match self.structure {
            ComponentStructure::Dynamic => self.apply_dynamic_diff(updates, change, events),
            _ => self.apply_attribute_updates(&updates, change, events),
        }
    }

    /// Delta-apply: only the attributes present in `updates` change; the
    /// rest keep their current value. This lets partial and legacy documents
    /// update only what they mention. Lookup prefers the id and falls back
    /// to the legacy human-readable name.
    pub fn apply_attribute_updates(
        &mut self,
        updates: &[AttributeUpdate],
        change: AttributeChange,
        events: &mut EventQueue,
    ) {
        for update in updates {
            let key = if !update.id.is_empty()
                && self.attribute_by_id(&update.id).is_some()
            {
                Some(update.id.clone())
            } else {
                self.attribute_by_name(&update.name)
                    .map(|a| a.id().to_string())
            };
            match key {
                Some(key) => {
                    // set_attr_str can only fail on a missing id, which the
                    // lookup above just ruled out.
                    let _ = self.set_attr_str(&key, &update.value, change, events);
                }
                None => warn!(
                    component = %self.type_name,
                    attribute = %update.id,
                    "document mentions an attribute this component does not have"
                ),
            }
        }
    }

    /// Three-way diff for schema-less components, keyed by attribute id with
    /// both sides sorted alphabetically: ids present in both are updated in
    /// place, ids only in the old set are removed, ids only in the incoming
    /// set are created. The attribute vector is never torn down wholesale,
    /// so other holders' indices stay valid.
    pub fn apply_dynamic_diff(
        &mut self,
        mut updates: Vec<AttributeUpdate>,
        change: AttributeChange,
        events: &mut EventQueue,
    ) {
        let mut old_ids: Vec<String> = self.live_attributes().map(|a| a.id().to_string()).collect();
        old_ids.sort_by(|a, b| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()));
        updates.sort_by(|a, b| a.id.to_ascii_lowercase().cmp(&b.id.to_ascii_lowercase()));

        let mut to_add: Vec<AttributeUpdate> = Vec::new();
        let mut to_remove: Vec<String> = Vec::new();

        let mut old_iter = old_ids.iter().peekable();
        let mut new_iter = updates.iter().peekable();
        loop {
            match (old_iter.peek(), new_iter.peek()) {
                (None, None) => break,
                (None, Some(_)) => {
                    to_add.extend(new_iter.by_ref().cloned());
                }
                (Some(_), None) => {
                    to_remove.extend(old_iter.by_ref().cloned());
                }
                (Some(old_id), Some(update)) => {
                    let ord = old_id
                        .to_ascii_lowercase()
                        .cmp(&update.id.to_ascii_lowercase());
                    match ord {
                        std::cmp::Ordering::Equal => {
                            let _ = self.set_attr_str(&update.id, &update.value, change, events);
                            old_iter.next();
                            new_iter.next();
                        }
                        std::cmp::Ordering::Greater => {
                            to_add.push((*update).clone());
                            new_iter.next();
                        }
                        std::cmp::Ordering::Less => {
                            to_remove.push((*old_id).clone());
                            old_iter.next();
                        }
                    }
                }
            }
        }

        // Additions apply from the back of the sorted list, matching the
        // stack-based construction order of the replication protocol.
        for update in to_add.iter().rev() {
            if self
                .create_attribute(&update.type_name, &update.id, change, events)
                .is_ok()
            {
                let _ = self.set_attr_str(&update.id, &update.value, change, events);
            }
        }
        for id in to_remove {
            let _ = self.remove_attribute(&id, change, events);
        }
    }

    // -- Binary serialization --

    /// Writes the live attribute count followed by each attribute's binary
    /// encoding in index order. Dynamic components transmit all values as
    /// (id, type, value) string triplets instead, since their schema is not
    /// shared knowledge.
    pub fn write_binary(&self, w: &mut WireWriter) {
        w.write_u8(self.num_attributes().min(255) as u8);
        match self.structure {
            ComponentStructure::Dynamic => {
                for attr in self.live_attributes().take(255) {
                    w.write_str8(attr.id());
                    w.write_str8(attr.type_name());
                    w.write_str16(&attr.to_string_value());
                }
            }
            _ => {
                for attr in self.live_attributes().take(255) {
                    attr.write_binary(w);
                }
            }
        }
    }

    /// Reads the binary encoding written by [`Component::write_binary`].
    ///
    /// Static components require the attribute count to match exactly —
    /// there is no per-record length, so a mismatch would desynchronize the
    /// stream. Placeholder components refuse binary data outright: without
    /// the originating type's schema the stream can not be parsed.
    pub fn read_binary(
        &mut self,
        r: &mut WireReader<'_>,
        change: AttributeChange,
        events: &mut EventQueue,
    ) -> Result<(), ComponentError> {
        match self.structure {
            ComponentStructure::Placeholder => {
                error!(
                    component = %self.type_name,
                    "placeholder component can not be deserialized from binary"
                );
                Err(ComponentError::BinaryUnsupported(self.type_name.clone()))
            }
            ComponentStructure::Dynamic => {
                let count = r.read_u8()? as usize;
                let mut updates = Vec::with_capacity(count);
                for _ in 0..count {
                    let id = r.read_str8()?;
                    let type_name = r.read_str8()?;
                    let value = r.read_str16()?;
                    updates.push(AttributeUpdate {
                        name: id.clone(),
                        id,
                        type_name,
                        value,
                    });
                }
                self.apply_dynamic_diff(updates, change, events);
                Ok(())
            }
            ComponentStructure::Static => {
                let count = r.read_u8()? as usize;
                if count != self.num_attributes() {
                    error!(
                        component = %self.type_name,
                        expected = self.num_attributes(),
                        got = count,
                        "wrong number of attributes in binary data"
                    );
                    return Err(ComponentError::AttributeCountMismatch {
                        expected: self.num_attributes(),
                        got: count,
                    });
                }
                let mut changed_ids = Vec::with_capacity(count);
                for attr in self.live_attributes_mut() {
                    attr.read_binary_assign(r)?;
                    changed_ids.push(attr.id().to_string());
                }
                for id in changed_ids {
                    self.emit_attribute_changed(&id, change, events);
                }
                Ok(())
            }
        }
    }

    /// Whether this component belongs in a persisted document, given the
    /// serialization options and the owning entity's temporary flag.
    #[must_use]
    pub fn should_be_serialized(
        &self,
        serialize_temporary: bool,
        serialize_local: bool,
        entity_temporary: bool,
    ) -> bool {
        if (self.temporary || entity_temporary) && !serialize_temporary {
            return false;
        }
        if self.is_local() && !serialize_local {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_component() -> Component {
        let mut comp = Component::new(DYNAMIC_COMPONENT_TYPE_ID, "DynamicComponent", ComponentStructure::Dynamic);
        comp.set_id(ComponentId(1));
        comp.set_parent_entity(Some(EntityId(1)));
        comp
    }

    fn update(id: &str, type_name: &str, value: &str) -> AttributeUpdate {
        AttributeUpdate {
            id: id.to_string(),
            type_name: type_name.to_string(),
            value: value.to_string(),
            name: id.to_string(),
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut comp = dynamic_component();
        let mut events = EventQueue::new();
        comp.create_attribute("real", "Health", AttributeChange::Disconnected, &mut events)
            .unwrap();
        assert!(comp.attribute_by_id("health").is_some());
        assert!(comp.attribute_by_name("HEALTH").is_some());
        assert!(comp.attribute_by_id("mana").is_none());
    }

    #[test]
    fn test_create_attribute_requires_dynamic_structure() {
        let mut comp = Component::new(7, "Rigid", ComponentStructure::Static);
        let mut events = EventQueue::new();
        let err = comp
            .create_attribute("real", "mass", AttributeChange::Default, &mut events)
            .unwrap_err();
        assert!(matches!(err, ComponentError::DynamicAttributesUnsupported(_)));
    }

    #[test]
    fn test_holes_reused_before_appending() {
        let mut comp = dynamic_component();
        let mut events = EventQueue::new();
        comp.create_attribute("real", "a", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.create_attribute("real", "b", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.create_attribute("real", "c", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.remove_attribute("b", AttributeChange::Disconnected, &mut events)
            .unwrap();
        assert_eq!(comp.attributes().len(), 3);
        assert_eq!(comp.num_attributes(), 2);
        // The hole at index 1 is filled first.
        let index = comp
            .create_attribute("int", "d", AttributeChange::Disconnected, &mut events)
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(comp.attributes().len(), 3);
    }

    #[test]
    fn test_dynamic_diff_updates_removes_creates() {
        let mut comp = dynamic_component();
        let mut events = EventQueue::new();
        comp.create_attribute("string", "a", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.set_attr_str("a", "1", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.create_attribute("string", "b", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.set_attr_str("b", "2", AttributeChange::Disconnected, &mut events)
            .unwrap();

        comp.apply_dynamic_diff(
            vec![update("b", "string", "3"), update("c", "string", "4")],
            AttributeChange::LocalOnly,
            &mut events,
        );

        assert!(comp.attribute_by_id("a").is_none());
        assert_eq!(comp.attribute_by_id("b").unwrap().to_string_value(), "3");
        assert_eq!(comp.attribute_by_id("c").unwrap().to_string_value(), "4");
        assert_eq!(comp.num_attributes(), 2);
    }

    #[test]
    fn test_delta_apply_leaves_unmentioned_attributes() {
        let mut comp = Component::new(7, "Stats", ComponentStructure::Static);
        comp.set_parent_entity(Some(EntityId(1)));
        comp.add_attribute(Attribute::new("health", "Health", AttributeValue::Real(10.0)));
        comp.add_attribute(Attribute::new("mana", "Mana", AttributeValue::Real(20.0)));
        let mut events = EventQueue::new();
        comp.apply_attribute_updates(
            &[update("health", "real", "99")],
            AttributeChange::Disconnected,
            &mut events,
        );
        assert_eq!(
            comp.attribute_by_id("health").unwrap().value(),
            &AttributeValue::Real(99.0)
        );
        assert_eq!(
            comp.attribute_by_id("mana").unwrap().value(),
            &AttributeValue::Real(20.0)
        );
    }

    #[test]
    fn test_legacy_name_fallback() {
        let mut comp = Component::new(7, "Stats", ComponentStructure::Static);
        comp.add_attribute(Attribute::new("health", "Hit Points", AttributeValue::Real(10.0)));
        let mut events = EventQueue::new();
        let legacy = AttributeUpdate {
            id: String::new(),
            type_name: "real".into(),
            value: "50".into(),
            name: "Hit Points".into(),
        };
        comp.apply_attribute_updates(&[legacy], AttributeChange::Disconnected, &mut events);
        assert_eq!(
            comp.attribute_by_id("health").unwrap().value(),
            &AttributeValue::Real(50.0)
        );
    }

    #[test]
    fn test_binary_roundtrip_static() {
        let mut comp = Component::new(7, "Stats", ComponentStructure::Static);
        comp.add_attribute(Attribute::new("health", "Health", AttributeValue::Real(42.0)));
        comp.add_attribute(Attribute::new("tag", "Tag", AttributeValue::String("boss".into())));
        let mut w = WireWriter::new();
        comp.write_binary(&mut w);
        let bytes = w.into_bytes();

        let mut other = Component::new(7, "Stats", ComponentStructure::Static);
        other.add_attribute(Attribute::new("health", "Health", AttributeValue::Real(0.0)));
        other.add_attribute(Attribute::new("tag", "Tag", AttributeValue::String(String::new())));
        let mut events = EventQueue::new();
        other
            .read_binary(
                &mut WireReader::new(&bytes),
                AttributeChange::Disconnected,
                &mut events,
            )
            .unwrap();
        assert_eq!(
            other.attribute_by_id("health").unwrap().value(),
            &AttributeValue::Real(42.0)
        );
        assert_eq!(
            other.attribute_by_id("tag").unwrap().value(),
            &AttributeValue::String("boss".into())
        );
    }

    #[test]
    fn test_binary_count_mismatch_is_hard_error() {
        let mut comp = Component::new(7, "Stats", ComponentStructure::Static);
        comp.add_attribute(Attribute::new("health", "Health", AttributeValue::Real(42.0)));
        let mut w = WireWriter::new();
        comp.write_binary(&mut w);
        let bytes = w.into_bytes();

        let mut other = Component::new(7, "Stats", ComponentStructure::Static);
        other.add_attribute(Attribute::new("health", "Health", AttributeValue::Real(0.0)));
        other.add_attribute(Attribute::new("mana", "Mana", AttributeValue::Real(0.0)));
        let mut events = EventQueue::new();
        let err = other
            .read_binary(
                &mut WireReader::new(&bytes),
                AttributeChange::Disconnected,
                &mut events,
            )
            .unwrap_err();
        assert!(matches!(err, ComponentError::AttributeCountMismatch { .. }));
    }

    #[test]
    fn test_binary_roundtrip_dynamic() {
        let mut comp = dynamic_component();
        let mut events = EventQueue::new();
        comp.create_attribute("real", "speed", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.set_attr_str("speed", "12.5", AttributeChange::Disconnected, &mut events)
            .unwrap();
        let mut w = WireWriter::new();
        comp.write_binary(&mut w);
        let bytes = w.into_bytes();

        let mut other = dynamic_component();
        other
            .read_binary(
                &mut WireReader::new(&bytes),
                AttributeChange::Disconnected,
                &mut events,
            )
            .unwrap();
        assert_eq!(
            other.attribute_by_id("speed").unwrap().value(),
            &AttributeValue::Real(12.5)
        );
    }

    #[test]
    fn test_placeholder_refuses_binary() {
        let mut comp = Component::new(0x1_0001, "Unknown", ComponentStructure::Placeholder);
        let mut events = EventQueue::new();
        let err = comp
            .read_binary(
                &mut WireReader::new(&[0]),
                AttributeChange::Disconnected,
                &mut events,
            )
            .unwrap_err();
        assert!(matches!(err, ComponentError::BinaryUnsupported(_)));
    }

    #[test]
    fn test_placeholder_reports_all_attributes_static() {
        let mut comp = Component::new(0x1_0001, "Unknown", ComponentStructure::Placeholder);
        comp.create_attribute_verbatim("BitField", "mask", "mask", "0xFF");
        comp.create_attribute_verbatim("real", "weight", "Weight", "2.5");
        assert_eq!(comp.num_static_attributes(), 2);
    }

    #[test]
    fn test_events_carry_resolved_intent() {
        let mut comp = dynamic_component();
        comp.set_update_mode(AttributeChange::LocalOnly);
        let mut events = EventQueue::new();
        comp.create_attribute("real", "x", AttributeChange::Disconnected, &mut events)
            .unwrap();
        let _ = events.drain();
        comp.set_attr("x", AttributeValue::Real(1.0), AttributeChange::Default, &mut events)
            .unwrap();
        match &events.drain()[..] {
            [SceneEvent::AttributeChanged { change, .. }] => {
                assert_eq!(*change, AttributeChange::LocalOnly);
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_component_changed_signals_every_attribute() {
        let mut comp = dynamic_component();
        let mut events = EventQueue::new();
        comp.create_attribute("real", "a", AttributeChange::Disconnected, &mut events)
            .unwrap();
        comp.create_attribute("real", "b", AttributeChange::Disconnected, &mut events)
            .unwrap();
        let _ = events.drain();
        comp.component_changed(AttributeChange::Replicate, &mut events);
        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained
            .iter()
            .all(|e| matches!(e, SceneEvent::AttributeChanged { .. })));
    }
}
