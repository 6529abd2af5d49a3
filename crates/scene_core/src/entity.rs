//! Entities: identity plus a set of components plus tree links.
//!
//! The parent/child links form a tree that is independent of any component's
//! own notion of spatial parenting; links are stored as ids and resolved
//! through the owning [`Scene`](crate::Scene) (reparenting lives there, since
//! the cycle check needs the whole entity map).

use std::collections::{BTreeMap, HashMap};

use tracing::{error, warn};

use crate::action::{EntityAction, ExecScope};
use crate::change::AttributeChange;
use crate::component::{Component, NAME_COMPONENT_TYPE_ID};
use crate::events::{EventQueue, SceneEvent};
use crate::ids::{ComponentId, EntityId, IdAllocator};
use crate::scene::SceneError;

/// An identity-bearing container of components.
pub struct Entity {
    id: EntityId,
    temporary: bool,
    components: BTreeMap<ComponentId, Component>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    actions: HashMap<String, EntityAction>,
    id_alloc: IdAllocator,
}

impl Entity {
    pub(crate) fn new(id: EntityId, temporary: bool) -> Self {
        Self {
            id,
            temporary,
            components: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            actions: HashMap::new(),
            id_alloc: IdAllocator::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
        for comp in self.components.values_mut() {
            comp.set_parent_entity(Some(id));
        }
    }

    /// An entity is replicated unless its id lies in the local range.
    #[must_use]
    pub fn is_replicated(&self) -> bool {
        !self.id.is_local()
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.id.is_local()
    }

    /// True while the entity waits for the authority to assign a final id.
    #[must_use]
    pub fn is_unacked(&self) -> bool {
        self.id.is_unacked()
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Temporary entities are excluded from persistence. Emits a toggle
    /// event (entity-lifecycle default resolution).
    pub fn set_temporary(&mut self, enable: bool, change: AttributeChange, events: &mut EventQueue) {
        if self.temporary == enable {
            return;
        }
        self.temporary = enable;
        if let Some(change) = change.resolved_for_entity() {
            events.push(SceneEvent::EntityTemporaryToggled {
                entity: self.id,
                temporary: enable,
                change,
            });
        }
    }

    // -- Tree links --

    #[must_use]
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub(crate) fn set_parent_link(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }

    #[must_use]
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    #[must_use]
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn add_child_link(&mut self, child: EntityId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child_link(&mut self, child: EntityId) {
        self.children.retain(|c| *c != child);
    }

    // -- Components --

    #[must_use]
    pub fn components(&self) -> &BTreeMap<ComponentId, Component> {
        &self.components
    }

    pub(crate) fn components_mut(&mut self) -> &mut BTreeMap<ComponentId, Component> {
        &mut self.components
    }

    #[must_use]
    pub fn component_by_id(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn component_by_id_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_mut(&id)
    }

    /// First component of the given type.
    #[must_use]
    pub fn component(&self, type_id: u32) -> Option<&Component> {
        self.components.values().find(|c| c.type_id() == type_id)
    }

    pub fn component_mut(&mut self, type_id: u32) -> Option<&mut Component> {
        self.components.values_mut().find(|c| c.type_id() == type_id)
    }

    /// First component of the given type name (case-insensitive, legacy
    /// `EC_` prefix tolerated).
    #[must_use]
    pub fn component_by_type_name(&self, type_name: &str) -> Option<&Component> {
        let wanted = strip_legacy_prefix(type_name);
        self.components
            .values()
            .find(|c| c.type_name().eq_ignore_ascii_case(wanted))
    }

    /// First component matching both type and instance name.
    #[must_use]
    pub fn component_named(&self, type_id: u32, name: &str) -> Option<&Component> {
        self.components
            .values()
            .find(|c| c.type_id() == type_id && c.name() == name)
    }

    pub fn component_named_mut(&mut self, type_id: u32, name: &str) -> Option<&mut Component> {
        self.components
            .values_mut()
            .find(|c| c.type_id() == type_id && c.name() == name)
    }

    /// All components of the given type.
    #[must_use]
    pub fn components_of_type(&self, type_id: u32) -> Vec<&Component> {
        self.components
            .values()
            .filter(|c| c.type_id() == type_id)
            .collect()
    }

    /// Attaches a component.
    ///
    /// The component must be currently unattached. With `id` zero an id is
    /// auto-allocated: the local range for non-replicated components,
    /// otherwise the replicated or unacked range depending on `authority`.
    /// A non-zero `id` that is already occupied is a caller error — logged,
    /// and the component is not attached. Manually assigned replicated-range
    /// ids advance the allocator high-water mark.
    pub fn add_component(
        &mut self,
        id: ComponentId,
        mut component: Component,
        change: AttributeChange,
        authority: bool,
        events: &mut EventQueue,
    ) -> Result<ComponentId, SceneError> {
        if component.parent_entity().is_some() {
            error!(
                entity = %self.id,
                component = component.type_name(),
                "component is already attached to an entity"
            );
            return Err(SceneError::ComponentAlreadyAttached);
        }

        let id = if !id.is_assigned() {
            let components = &self.components;
            let raw = if component.is_replicated() {
                if authority {
                    self.id_alloc
                        .allocate_replicated(|raw| components.contains_key(&ComponentId(raw)))
                } else {
                    self.id_alloc
                        .allocate_unacked(|raw| components.contains_key(&ComponentId(raw)))
                }
            } else {
                self.id_alloc
                    .allocate_local(|raw| components.contains_key(&ComponentId(raw)))
            };
            ComponentId(raw)
        } else {
            if self.components.contains_key(&id) {
                error!(
                    entity = %self.id,
                    component = %id,
                    "can not add component: id already exists in entity"
                );
                return Err(SceneError::ComponentIdInUse {
                    entity: self.id,
                    component: id,
                });
            }
            // A manual id dictates the replication mode.
            component.force_replicated(id.is_replicated());
            if id.is_replicated() {
                self.id_alloc.reset_replicated(id.value());
            }
            id
        };

        component.set_id(id);
        component.set_parent_entity(Some(self.id));
        if let Some(change) = change.resolved(component.update_mode()) {
            events.push(SceneEvent::ComponentAdded {
                entity: self.id,
                component: id,
                type_id: component.type_id(),
                change,
            });
        }
        self.components.insert(id, component);
        Ok(id)
    }

    /// Detaches and returns a component. The removal event is recorded
    /// before detachment, so dependents still have live access during
    /// cleanup.
    pub fn remove_component(
        &mut self,
        id: ComponentId,
        change: AttributeChange,
        events: &mut EventQueue,
    ) -> Option<Component> {
        if !self.components.contains_key(&id) {
            warn!(entity = %self.id, component = %id, "failed to find component to remove");
            return None;
        }
        let comp = self.components.get(&id).expect("checked above");
        if let Some(change) = change.resolved(comp.update_mode()) {
            events.push(SceneEvent::ComponentRemoved {
                entity: self.id,
                component: id,
                type_id: comp.type_id(),
                change,
            });
        }
        let mut comp = self.components.remove(&id).expect("checked above");
        comp.set_parent_entity(None);
        Some(comp)
    }

    /// Removes every component, signaling each removal.
    pub fn remove_all_components(&mut self, change: AttributeChange, events: &mut EventQueue) {
        let ids: Vec<ComponentId> = self.components.keys().copied().collect();
        for id in ids {
            self.remove_component(id, change, events);
        }
    }

    /// Removes every component of the given type. Returns the removed count.
    pub fn remove_components_of_type(
        &mut self,
        type_id: u32,
        change: AttributeChange,
        events: &mut EventQueue,
    ) -> usize {
        let ids: Vec<ComponentId> = self
            .components
            .values()
            .filter(|c| c.type_id() == type_id)
            .map(|c| c.id())
            .collect();
        let count = ids.len();
        for id in ids {
            self.remove_component(id, change, events);
        }
        count
    }

    /// Forcibly re-keys a component id; any occupant of the new id is
    /// purged first. Called by the sync layer on server acknowledgment.
    pub fn change_component_id(&mut self, old_id: ComponentId, new_id: ComponentId) {
        if old_id == new_id || !self.components.contains_key(&old_id) {
            return;
        }
        if self.components.contains_key(&new_id) {
            warn!(
                entity = %self.id,
                component = %new_id,
                "purged component to make room for a change_component_id request, this should not happen"
            );
            let mut scratch = EventQueue::new();
            self.remove_component(new_id, AttributeChange::LocalOnly, &mut scratch);
        }
        if let Some(mut comp) = self.components.remove(&old_id) {
            comp.set_id(new_id);
            self.components.insert(new_id, comp);
        }
    }

    // -- Naming (via the built-in Name component) --

    /// The entity's name, stored in a `Name` component; empty when absent.
    #[must_use]
    pub fn name(&self) -> String {
        self.name_attribute("name")
    }

    /// The entity's group, stored in a `Name` component; empty when absent.
    #[must_use]
    pub fn group(&self) -> String {
        self.name_attribute("group")
    }

    fn name_attribute(&self, attr: &str) -> String {
        self.component(NAME_COMPONENT_TYPE_ID)
            .and_then(|c| c.attribute_by_id(attr))
            .map(|a| a.to_string_value())
            .unwrap_or_default()
    }

    /// A human-readable description for log messages.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        let name = self.name();
        if name.trim().is_empty() {
            format!("Entity ID {}", self.id)
        } else {
            format!("Entity \"{}\" (ID: {})", name, self.id)
        }
    }

    // -- Actions --

    /// Looks up or lazily creates an action by case-insensitive name.
    pub fn action_mut(&mut self, name: &str) -> &mut EntityAction {
        let key = name.to_ascii_lowercase();
        self.actions
            .entry(key)
            .or_insert_with(|| EntityAction::new(name))
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&EntityAction> {
        self.actions.get(&name.to_ascii_lowercase())
    }

    pub fn remove_action(&mut self, name: &str) {
        self.actions.remove(&name.to_ascii_lowercase());
    }

    /// Executes an action: local handlers run when `scope` contains
    /// [`ExecScope::LOCAL`]; the triggering is always recorded as a scene
    /// event so the sync layer can forward remote scopes.
    pub fn exec(
        &mut self,
        scope: ExecScope,
        name: &str,
        params: &[String],
        events: &mut EventQueue,
    ) {
        if scope.contains(ExecScope::LOCAL) {
            self.action_mut(name).trigger(params);
        }
        events.push(SceneEvent::ActionTriggered {
            entity: self.id,
            action: name.to_string(),
            params: params.to_vec(),
            scope,
        });
    }

    /// Whether this entity belongs in a persisted document.
    #[must_use]
    pub fn should_be_serialized(
        &self,
        serialize_temporary: bool,
        serialize_local: bool,
        serialize_children: bool,
    ) -> bool {
        if self.is_temporary() && !serialize_temporary {
            return false;
        }
        if self.is_local() && !serialize_local {
            return false;
        }
        if self.parent.is_some() && !serialize_children {
            return false;
        }
        true
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("temporary", &self.temporary)
            .field("components", &self.components.len())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

/// Strips the deprecated `EC_` type-name prefix kept for legacy documents.
#[must_use]
pub(crate) fn strip_legacy_prefix(type_name: &str) -> &str {
    if type_name.len() >= 3 && type_name[..3].eq_ignore_ascii_case("EC_") {
        &type_name[3..]
    } else {
        type_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentStructure;
    use crate::ids::{FIRST_LOCAL_ID, FIRST_REPLICATED_ID, FIRST_UNACKED_ID};

    fn component(replicated: bool) -> Component {
        let mut comp = Component::new(7, "Stats", ComponentStructure::Static);
        comp.set_replicated(replicated).unwrap();
        comp
    }

    #[test]
    fn test_auto_id_ranges() {
        let mut ent = Entity::new(EntityId(1), false);
        let mut events = EventQueue::new();

        let replicated = ent
            .add_component(ComponentId::ZERO, component(true), AttributeChange::Disconnected, true, &mut events)
            .unwrap();
        assert_eq!(replicated.value(), FIRST_REPLICATED_ID);

        let local = ent
            .add_component(ComponentId::ZERO, component(false), AttributeChange::Disconnected, true, &mut events)
            .unwrap();
        assert_eq!(local.value(), FIRST_LOCAL_ID);

        let unacked = ent
            .add_component(ComponentId::ZERO, component(true), AttributeChange::Disconnected, false, &mut events)
            .unwrap();
        assert_eq!(unacked.value(), FIRST_UNACKED_ID);
    }

    #[test]
    fn test_manual_id_collision_rejected() {
        let mut ent = Entity::new(EntityId(1), false);
        let mut events = EventQueue::new();
        ent.add_component(ComponentId(5), component(true), AttributeChange::Disconnected, true, &mut events)
            .unwrap();
        let err = ent
            .add_component(ComponentId(5), component(true), AttributeChange::Disconnected, true, &mut events)
            .unwrap_err();
        assert!(matches!(err, SceneError::ComponentIdInUse { .. }));
        assert_eq!(ent.components().len(), 1);
    }

    #[test]
    fn test_manual_id_dictates_replication_and_high_water() {
        let mut ent = Entity::new(EntityId(1), false);
        let mut events = EventQueue::new();
        ent.add_component(ComponentId(100), component(false), AttributeChange::Disconnected, true, &mut events)
            .unwrap();
        // The id lies in the replicated range, so the flag is forced on.
        assert!(ent.component_by_id(ComponentId(100)).unwrap().is_replicated());
        // And the next auto id continues past the manual one.
        let next = ent
            .add_component(ComponentId::ZERO, component(true), AttributeChange::Disconnected, true, &mut events)
            .unwrap();
        assert_eq!(next.value(), 101);
    }

    #[test]
    fn test_remove_signals_before_detach() {
        let mut ent = Entity::new(EntityId(1), false);
        let mut events = EventQueue::new();
        let id = ent
            .add_component(ComponentId::ZERO, component(true), AttributeChange::Default, true, &mut events)
            .unwrap();
        let _ = events.drain();
        let removed = ent.remove_component(id, AttributeChange::Default, &mut events);
        assert!(removed.is_some());
        assert!(removed.unwrap().parent_entity().is_none());
        match &events.drain()[..] {
            [SceneEvent::ComponentRemoved { component, .. }] => assert_eq!(*component, id),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_change_component_id_purges_occupant() {
        let mut ent = Entity::new(EntityId(1), false);
        let mut events = EventQueue::new();
        let a = ent
            .add_component(ComponentId(1), component(true), AttributeChange::Disconnected, true, &mut events)
            .unwrap();
        ent.add_component(ComponentId(2), component(true), AttributeChange::Disconnected, true, &mut events)
            .unwrap();
        ent.change_component_id(a, ComponentId(2));
        assert_eq!(ent.components().len(), 1);
        assert_eq!(ent.component_by_id(ComponentId(2)).unwrap().id(), ComponentId(2));
    }

    #[test]
    fn test_actions_case_insensitive() {
        let mut ent = Entity::new(EntityId(1), false);
        ent.action_mut("Jump");
        assert!(ent.action("jump").is_some());
        assert!(ent.action("JUMP").is_some());
        ent.remove_action("jUmP");
        assert!(ent.action("Jump").is_none());
    }

    #[test]
    fn test_exec_records_event_and_runs_local_handlers() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut ent = Entity::new(EntityId(1), false);
        let hits = Rc::new(Cell::new(0));
        let hits2 = hits.clone();
        ent.action_mut("Greet").connect(move |_| hits2.set(hits2.get() + 1));

        let mut events = EventQueue::new();
        ent.exec(ExecScope::LOCAL | ExecScope::PEERS, "greet", &["hi".into()], &mut events);
        assert_eq!(hits.get(), 1);
        match &events.drain()[..] {
            [SceneEvent::ActionTriggered { action, scope, .. }] => {
                assert_eq!(action, "greet");
                assert!(scope.contains(ExecScope::PEERS));
            }
            other => panic!("unexpected events {other:?}"),
        }

        // Server-only scope skips local handlers but still records.
        ent.exec(ExecScope::SERVER, "greet", &[], &mut events);
        assert_eq!(hits.get(), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_strip_legacy_prefix() {
        assert_eq!(strip_legacy_prefix("EC_Mesh"), "Mesh");
        assert_eq!(strip_legacy_prefix("ec_mesh"), "mesh");
        assert_eq!(strip_legacy_prefix("Mesh"), "Mesh");
    }
}
