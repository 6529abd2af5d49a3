//! The scene: root registry and lifecycle authority for entities.
//!
//! All structural mutation routes through the scene so that identity
//! allocation, registration and event recording are never skipped. The
//! embedding application drives deferred work (end-of-frame creation events
//! and attribute interpolation) through [`Scene::update`] once per frame.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::action::ExecScope;
use crate::attribute::{AttributeValue, EntityReference};
use crate::change::AttributeChange;
use crate::component::{Component, ComponentError};
use crate::entity::Entity;
use crate::events::{EventQueue, SceneEvent};
use crate::ids::{ComponentId, EntityId, IdAllocator};
use crate::registry::ComponentRegistry;
use crate::tracker::ParentingTracker;

/// Errors from scene-level operations. Every error is logged where it
/// occurs and leaves the scene state untouched; a live world keeps running
/// even when one malformed request is rejected.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("entity {0} does not exist")]
    EntityNotFound(EntityId),
    #[error("entity id {0} is already in use")]
    EntityIdInUse(EntityId),
    #[error("component {component} does not exist on entity {entity}")]
    ComponentNotFound {
        entity: EntityId,
        component: ComponentId,
    },
    #[error("component id {component} is already in use on entity {entity}")]
    ComponentIdInUse {
        entity: EntityId,
        component: ComponentId,
    },
    #[error("component is already attached to an entity")]
    ComponentAlreadyAttached,
    #[error("entity {0} can not be its own parent")]
    SelfParenting(EntityId),
    #[error("parenting entity {entity} under {parent} would create a cycle")]
    CyclicParenting { entity: EntityId, parent: EntityId },
    #[error("unknown component type {0:?}")]
    UnknownComponentType(String),
    #[error(transparent)]
    Component(#[from] ComponentError),
}

/// One running attribute interpolation.
///
/// Lifecycle: interpolating while `time <= length`, then a bookkeeping-only
/// grace hold up to `2 * length` (so "was this interpolating recently" stays
/// a cheap query), then discarded.
#[derive(Debug)]
struct AttributeInterpolation {
    entity: EntityId,
    component: ComponentId,
    attribute: String,
    start: AttributeValue,
    end: AttributeValue,
    time: f32,
    length: f32,
}

/// A collection of entities forming an observable world.
pub struct Scene {
    name: String,
    authority: bool,
    view_enabled: bool,
    id_alloc: IdAllocator,
    entities: HashMap<EntityId, Entity>,
    events: EventQueue,
    interpolations: Vec<AttributeInterpolation>,
    interpolating: bool,
    created_this_frame: Vec<(EntityId, AttributeChange)>,
    tracker: ParentingTracker,
    registry: ComponentRegistry,
}

impl Scene {
    /// Creates an empty scene.
    ///
    /// `authority` is true for server and standalone scenes, false for
    /// network client scenes (which allocate pending ids from the unacked
    /// range until the server confirms them).
    #[must_use]
    pub fn new(name: &str, view_enabled: bool, authority: bool) -> Self {
        Self {
            name: name.to_string(),
            authority,
            view_enabled,
            id_alloc: IdAllocator::new(),
            entities: HashMap::new(),
            events: EventQueue::new(),
            interpolations: Vec::new(),
            interpolating: false,
            created_this_frame: Vec::new(),
            tracker: ParentingTracker::new(),
            registry: ComponentRegistry::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_authority(&self) -> bool {
        self.authority
    }

    /// Whether rendering-related collaborators actually create visuals for
    /// this scene.
    #[must_use]
    pub fn is_view_enabled(&self) -> bool {
        self.view_enabled
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn tracker(&self) -> &ParentingTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut ParentingTracker {
        &mut self.tracker
    }

    /// Registers an imported entity for server-ack reconciliation. Called by
    /// content loaders on non-authority scenes.
    pub fn track_imported_entity(&mut self, entity: EntityId) {
        self.tracker_mut().track(entity);
    }

    /// Takes all pending change events. Collaborators call this once per
    /// frame.
    #[must_use]
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain()
    }

    #[must_use]
    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    // -- Entity lifecycle --

    /// Creates a new entity holding the named component types.
    ///
    /// With `id` zero the next free id is allocated: the local range if
    /// `replicated` is false, otherwise the replicated or unacked range
    /// depending on authority. A non-zero id that is already in use is a
    /// caller error. The creation event is deferred to the end of the frame
    /// so the whole initial component batch is attached before observers
    /// react.
    pub fn create_entity(
        &mut self,
        id: EntityId,
        component_type_names: &[&str],
        change: AttributeChange,
        replicated: bool,
        components_replicated: bool,
        temporary: bool,
    ) -> Result<EntityId, SceneError> {
        let id = if !id.is_assigned() {
            let entities = &self.entities;
            let raw = if replicated {
                if self.authority {
                    self.id_alloc
                        .allocate_replicated(|raw| entities.contains_key(&EntityId(raw)))
                } else {
                    self.id_alloc
                        .allocate_unacked(|raw| entities.contains_key(&EntityId(raw)))
                }
            } else {
                self.id_alloc
                    .allocate_local(|raw| entities.contains_key(&EntityId(raw)))
            };
            EntityId(raw)
        } else {
            if self.entities.contains_key(&id) {
                error!(entity = %id, "can not create entity, id is already in use");
                return Err(SceneError::EntityIdInUse(id));
            }
            // Keep the generator ahead of manually assigned replicated ids.
            if id.is_replicated() {
                self.id_alloc.reset_replicated(id.value());
            }
            id
        };

        let mut entity = Entity::new(id, temporary);
        for type_name in component_type_names {
            match self.registry.create_component_by_name(type_name, "") {
                Some(mut comp) => {
                    let _ = comp.set_replicated(components_replicated);
                    let _ = entity.add_component(
                        ComponentId::ZERO,
                        comp,
                        change,
                        self.authority,
                        &mut self.events,
                    );
                }
                None => error!(
                    r#type = %type_name,
                    "failed to create component while creating entity"
                ),
            }
        }
        self.entities.insert(id, entity);
        self.created_this_frame.push((id, change));
        Ok(id)
    }

    /// Creates an entity in the local id range.
    pub fn create_local_entity(
        &mut self,
        component_type_names: &[&str],
        change: AttributeChange,
        temporary: bool,
    ) -> Result<EntityId, SceneError> {
        self.create_entity(EntityId::ZERO, component_type_names, change, false, false, temporary)
    }

    /// Creates a replicated entity that is excluded from persistence.
    pub fn create_temporary_entity(
        &mut self,
        component_type_names: &[&str],
        change: AttributeChange,
    ) -> Result<EntityId, SceneError> {
        self.create_entity(EntityId::ZERO, component_type_names, change, true, true, true)
    }

    /// Allocates the next free entity id in the replicated (or, on clients,
    /// unacked) range.
    pub fn next_free_id(&mut self) -> EntityId {
        let entities = &self.entities;
        let raw = if self.authority {
            self.id_alloc
                .allocate_replicated(|raw| entities.contains_key(&EntityId(raw)))
        } else {
            self.id_alloc
                .allocate_unacked(|raw| entities.contains_key(&EntityId(raw)))
        };
        EntityId(raw)
    }

    /// Allocates the next free entity id in the local range.
    pub fn next_free_id_local(&mut self) -> EntityId {
        let entities = &self.entities;
        EntityId(
            self.id_alloc
                .allocate_local(|raw| entities.contains_key(&EntityId(raw))),
        )
    }

    /// Removes an entity: the removal event is recorded first (dependents
    /// may need live state for cleanup), then components are removed with
    /// individual events, then children are removed recursively.
    pub fn remove_entity(&mut self, id: EntityId, change: AttributeChange) -> bool {
        let Some(mut entity) = self.entities.remove(&id) else {
            return false;
        };
        if let Some(resolved) = change.resolved_for_entity() {
            self.events.push(SceneEvent::EntityRemoved {
                entity: id,
                change: resolved,
            });
        }
        entity.remove_all_components(change, &mut self.events);
        if let Some(parent_id) = entity.parent() {
            if let Some(parent) = self.entities.get_mut(&parent_id) {
                parent.remove_child_link(id);
            }
        }
        for child in entity.children().to_vec() {
            self.remove_entity(child, change);
        }
        self.interpolations.retain(|i| i.entity != id);
        self.created_this_frame.retain(|(e, _)| *e != id);
        true
    }

    /// Removes all entities. Only root-level entities are walked; parented
    /// ones are cleaned up transitively. Resets the id allocator.
    pub fn remove_all_entities(&mut self, signal: bool, change: AttributeChange) {
        let change = if signal { change } else { AttributeChange::Disconnected };
        let roots: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.parent().is_none())
            .map(Entity::id)
            .collect();
        for id in roots {
            self.remove_entity(id, change);
        }
        if !self.entities.is_empty() {
            warn!(
                leftover = self.entities.len(),
                "entity map was not empty after removing all entities, clearing manually"
            );
            self.entities.clear();
        }
        if signal {
            self.events.push(SceneEvent::SceneCleared);
        }
        self.created_this_frame.clear();
        self.interpolations.clear();
        self.id_alloc.reset();
    }

    /// Forcibly changes an existing entity's id. Any occupant of the new id
    /// is purged first (logged as a warning — expected under network races,
    /// not a bug). No events are recorded; called by the sync layer.
    pub fn change_entity_id(&mut self, old_id: EntityId, new_id: EntityId) {
        if old_id == new_id || !self.entities.contains_key(&old_id) {
            return;
        }
        if self.entities.contains_key(&new_id) {
            warn!(
                entity = %new_id,
                "purged entity to make room for a change_entity_id request, this should not happen"
            );
            self.remove_entity(new_id, AttributeChange::LocalOnly);
        }
        let mut entity = self.entities.remove(&old_id).expect("checked above");
        entity.set_id(new_id);
        let parent = entity.parent();
        let children = entity.children().to_vec();
        self.entities.insert(new_id, entity);

        // Tree links and interpolation bookkeeping refer to entities by id,
        // so the rename has to be mirrored there.
        if let Some(parent_id) = parent {
            if let Some(parent) = self.entities.get_mut(&parent_id) {
                parent.remove_child_link(old_id);
                parent.add_child_link(new_id);
            }
        }
        for child in children {
            if let Some(child) = self.entities.get_mut(&child) {
                child.set_parent_link(Some(new_id));
            }
        }
        for interp in &mut self.interpolations {
            if interp.entity == old_id {
                interp.entity = new_id;
            }
        }
        for (id, _) in &mut self.created_this_frame {
            if *id == old_id {
                *id = new_id;
            }
        }
    }

    // -- Entity access --

    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    #[must_use]
    pub fn has_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    #[must_use]
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Finds an entity by the name stored in its `Name` component.
    #[must_use]
    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        if name.is_empty() {
            return None;
        }
        self.entities.values().find(|e| e.name() == name)
    }

    /// Whether a name occurs at most once in the scene.
    #[must_use]
    pub fn is_unique_name(&self, name: &str) -> bool {
        self.entity_by_name(name).is_none()
    }

    /// All entities whose name matches exactly.
    #[must_use]
    pub fn find_entities_by_name(&self, name: &str) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.name() == name)
            .map(Entity::id)
            .collect()
    }

    /// All entities belonging to the given group.
    #[must_use]
    pub fn entities_of_group(&self, group: &str) -> Vec<EntityId> {
        if group.is_empty() {
            return Vec::new();
        }
        self.entities
            .values()
            .filter(|e| e.group() == group)
            .map(Entity::id)
            .collect()
    }

    /// All entities holding a component of the given type (and instance
    /// name, when given).
    #[must_use]
    pub fn entities_with_component(&self, type_id: u32, name: Option<&str>) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| match name {
                Some(name) => e.component_named(type_id, name).is_some(),
                None => e.component(type_id).is_some(),
            })
            .map(Entity::id)
            .collect()
    }

    /// Entities with no tree parent, in ascending id order.
    #[must_use]
    pub fn root_level_entities(&self) -> Vec<EntityId> {
        let mut roots: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.parent().is_none())
            .map(Entity::id)
            .collect();
        roots.sort();
        roots
    }

    // -- Components --

    /// Instantiates a registered component type and attaches it.
    pub fn create_component(
        &mut self,
        entity: EntityId,
        type_name: &str,
        instance_name: &str,
        change: AttributeChange,
        replicated: bool,
    ) -> Result<ComponentId, SceneError> {
        let Some(mut comp) = self.registry.create_component_by_name(type_name, instance_name)
        else {
            error!(r#type = type_name, "failed to create component of unknown type");
            return Err(SceneError::UnknownComponentType(type_name.to_string()));
        };
        let _ = comp.set_replicated(replicated);
        let authority = self.authority;
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        ent.add_component(ComponentId::ZERO, comp, change, authority, &mut self.events)
    }

    /// Returns the existing component of the given type and instance name,
    /// or creates one.
    pub fn get_or_create_component(
        &mut self,
        entity: EntityId,
        type_name: &str,
        instance_name: &str,
        change: AttributeChange,
        replicated: bool,
    ) -> Result<ComponentId, SceneError> {
        let existing = self.entity(entity).and_then(|e| {
            e.components()
                .values()
                .find(|c| {
                    c.type_name().eq_ignore_ascii_case(
                        crate::entity::strip_legacy_prefix(type_name),
                    ) && c.name() == instance_name
                })
                .map(Component::id)
        });
        match existing {
            Some(id) => Ok(id),
            None => self.create_component(entity, type_name, instance_name, change, replicated),
        }
    }

    /// Attaches an already-constructed component, auto-allocating an id
    /// when `id` is zero.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        id: ComponentId,
        component: Component,
        change: AttributeChange,
    ) -> Result<ComponentId, SceneError> {
        let authority = self.authority;
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        ent.add_component(id, component, change, authority, &mut self.events)
    }

    /// Removes a component; the removal event precedes detachment.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        change: AttributeChange,
    ) -> bool {
        let Some(ent) = self.entities.get_mut(&entity) else {
            return false;
        };
        ent.remove_component(component, change, &mut self.events).is_some()
    }

    // -- Attributes --

    /// Assigns an attribute value, recording the change with its resolved
    /// intent.
    pub fn set_attr(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        attribute: &str,
        value: AttributeValue,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        let Some(comp) = ent.component_by_id_mut(component) else {
            return Err(SceneError::ComponentNotFound { entity, component });
        };
        comp.set_attr(attribute, value, change, &mut self.events)?;
        Ok(())
    }

    /// Parses and assigns an attribute's string form.
    pub fn set_attr_str(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        attribute: &str,
        value: &str,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        let Some(comp) = ent.component_by_id_mut(component) else {
            return Err(SceneError::ComponentNotFound { entity, component });
        };
        comp.set_attr_str(attribute, value, change, &mut self.events)?;
        Ok(())
    }

    /// Applies document data (attribute updates) to a component by its
    /// structure kind: schema-less components diff, everything else
    /// delta-applies. Used by the content loaders.
    pub fn apply_component_updates(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        updates: Vec<crate::component::AttributeUpdate>,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        let Some(comp) = ent.component_by_id_mut(component) else {
            return Err(SceneError::ComponentNotFound { entity, component });
        };
        comp.deserialize_attributes(updates, change, &mut self.events);
        Ok(())
    }

    /// Forces a change notification for every attribute of a component,
    /// used for "this component has been fully replaced" signaling.
    pub fn component_changed(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        let Some(comp) = ent.component_by_id_mut(component) else {
            return Err(SceneError::ComponentNotFound { entity, component });
        };
        comp.component_changed(change, &mut self.events);
        Ok(())
    }

    /// Sets the entity's name, creating the `Name` component on demand.
    pub fn set_entity_name(
        &mut self,
        entity: EntityId,
        name: &str,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        let comp = self.get_or_create_component(entity, "Name", "", change, true)?;
        self.set_attr(
            entity,
            comp,
            "name",
            AttributeValue::String(name.to_string()),
            change,
        )
    }

    /// Toggles the entity's temporary flag.
    pub fn set_entity_temporary(
        &mut self,
        entity: EntityId,
        enable: bool,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        ent.set_temporary(enable, change, &mut self.events);
        Ok(())
    }

    // -- Parenting --

    /// Reparents an entity. Self-parenting and cycles are rejected; the
    /// unlink from the old parent and the link to the new one are performed
    /// together, so no observer sees partial state.
    pub fn set_parent(
        &mut self,
        child: EntityId,
        new_parent: Option<EntityId>,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        let Some(ent) = self.entities.get(&child) else {
            return Err(SceneError::EntityNotFound(child));
        };
        let old_parent = ent.parent();
        if old_parent == new_parent {
            return Ok(());
        }
        if new_parent == Some(child) {
            error!(entity = %child, "self parenting attempted");
            return Err(SceneError::SelfParenting(child));
        }
        if let Some(parent_id) = new_parent {
            if !self.entities.contains_key(&parent_id) {
                return Err(SceneError::EntityNotFound(parent_id));
            }
            // Walk the candidate's ancestor chain to reject cycles.
            let mut cursor = Some(parent_id);
            while let Some(current) = cursor {
                if current == child {
                    error!(entity = %child, parent = %parent_id, "cyclic parenting attempted");
                    return Err(SceneError::CyclicParenting {
                        entity: child,
                        parent: parent_id,
                    });
                }
                cursor = self.entities.get(&current).and_then(Entity::parent);
            }
        }

        if let Some(old_id) = old_parent {
            if let Some(old) = self.entities.get_mut(&old_id) {
                old.remove_child_link(child);
            }
        }
        if let Some(new_id) = new_parent {
            self.entities
                .get_mut(&new_id)
                .expect("presence checked above")
                .add_child_link(child);
        }
        let ent = self.entities.get_mut(&child).expect("presence checked above");
        ent.set_parent_link(new_parent);
        let entity_is_local = ent.is_local();
        if let Some(resolved) = change.resolved_for_parenting(entity_is_local) {
            self.events.push(SceneEvent::EntityParentChanged {
                entity: child,
                new_parent,
                change: resolved,
            });
        }
        Ok(())
    }

    /// Creates a new entity parented under `parent`. The parent link is set
    /// silently to match entity creation signaling, which happens at the end
    /// of the frame.
    pub fn create_child(
        &mut self,
        parent: EntityId,
        component_type_names: &[&str],
        change: AttributeChange,
        replicated: bool,
        components_replicated: bool,
        temporary: bool,
    ) -> Result<EntityId, SceneError> {
        if !self.entities.contains_key(&parent) {
            return Err(SceneError::EntityNotFound(parent));
        }
        let child = self.create_entity(
            EntityId::ZERO,
            component_type_names,
            change,
            replicated,
            components_replicated,
            temporary,
        )?;
        self.set_parent(child, Some(parent), AttributeChange::Disconnected)?;
        Ok(child)
    }

    /// Removes a child entity from the scene entirely.
    pub fn remove_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        if self.entity(child).and_then(Entity::parent) != Some(parent) {
            warn!(parent = %parent, child = %child, "entity is not parented to this entity");
            return Err(SceneError::EntityNotFound(child));
        }
        self.remove_entity(child, change);
        Ok(())
    }

    /// Detaches a child from its parent, making it a root-level entity.
    pub fn detach_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        change: AttributeChange,
    ) -> Result<(), SceneError> {
        if self.entity(child).and_then(Entity::parent) != Some(parent) {
            warn!(parent = %parent, child = %child, "entity is not parented to this entity");
            return Err(SceneError::EntityNotFound(child));
        }
        self.set_parent(child, None, change)
    }

    /// The entity's effective parent id: the tree parent when present,
    /// otherwise a component-expressed `parentRef` attribute.
    #[must_use]
    pub fn entity_parent_id(&self, id: EntityId) -> Option<EntityId> {
        let ent = self.entities.get(&id)?;
        if let Some(parent) = ent.parent() {
            return Some(parent);
        }
        component_parent_ref(ent)
    }

    /// Sorts entities so every parent precedes its children, honoring both
    /// tree parenting and component-expressed parent references (tree
    /// parenting takes precedence). This is a linear-scan insertion, not a
    /// full graph sort — it exists to avoid "parent appeared after child"
    /// transients when signaling batch imports.
    #[must_use]
    pub fn sort_entities_by_hierarchy(&self, ids: &[EntityId]) -> Vec<EntityId> {
        let mut sorted: Vec<EntityId> = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.entity_insert_index(id, &sorted) {
                Some(index) => sorted.insert(index, id),
                None => sorted.push(id),
            }
        }
        sorted
    }

    fn entity_insert_index(&self, id: EntityId, container: &[EntityId]) -> Option<usize> {
        let ent = self.entities.get(&id)?;
        let parent_id = self.entity_parent_id(id);
        let bounded = |index: usize| {
            if index < container.len() {
                Some(index)
            } else {
                None
            }
        };

        if let Some(parent_id) = parent_id {
            // Parent already placed? Insert right after it.
            if let Some(pos) = container.iter().position(|c| *c == parent_id) {
                return bounded(pos + 1);
            }
        }
        if ent.num_children() > 0 {
            // A parent entity goes before the first childless entry.
            let pos = container.iter().position(|c| {
                self.entities.get(c).map_or(true, |e| e.num_children() == 0)
            })?;
            bounded(pos)
        } else {
            // A leaf goes after the first childless, unparented entry.
            let pos = container.iter().position(|c| {
                self.entities.get(c).is_some_and(|e| e.num_children() == 0)
                    && self.entity_parent_id(*c).is_none()
            })?;
            bounded(pos + 1)
        }
    }

    /// Rewrites component-expressed parent references through an old→new id
    /// map. Returns the number of fixed references.
    pub fn fix_parent_refs(
        &mut self,
        targets: &[EntityId],
        mapping: &HashMap<EntityId, EntityId>,
        change: AttributeChange,
    ) -> usize {
        let mut fixed = 0;
        for entity_id in targets {
            let Some(entity) = self.entities.get_mut(entity_id) else {
                warn!(entity = %entity_id, "failed to find entity for parent ref fix-up");
                continue;
            };
            for comp in entity.components_mut().values_mut() {
                let referenced = comp.attribute_by_id("parentRef").and_then(|attr| {
                    match attr.value() {
                        AttributeValue::EntityReference(r) => r.entity_id(),
                        _ => None,
                    }
                });
                let Some(raw) = referenced else { continue };
                if let Some(new_id) = mapping.get(&EntityId(raw)) {
                    let _ = comp.set_attr(
                        "parentRef",
                        AttributeValue::EntityReference(EntityReference(new_id.to_string())),
                        change,
                        &mut self.events,
                    );
                    fixed += 1;
                }
            }
        }
        fixed
    }

    // -- Actions --

    /// Executes an entity action; local handlers run when the scope includes
    /// [`ExecScope::LOCAL`], and the trigger is always recorded for remote
    /// propagation.
    pub fn exec_action(
        &mut self,
        entity: EntityId,
        scope: ExecScope,
        name: &str,
        params: &[String],
    ) -> Result<(), SceneError> {
        let Some(ent) = self.entities.get_mut(&entity) else {
            return Err(SceneError::EntityNotFound(entity));
        };
        ent.exec(scope, name, params, &mut self.events);
        Ok(())
    }

    // -- Server acknowledgments --

    /// Notifies that the authority acked an entity creation under a final
    /// id. Call after [`Scene::change_entity_id`]. On clients this feeds the
    /// parenting tracker; once the whole import batch is acked, stale parent
    /// references are rewritten with a replicate intent so every peer
    /// converges on the same final references.
    pub fn entity_acked(&mut self, entity: EntityId, old_id: EntityId) {
        if !self.entities.contains_key(&entity) {
            return;
        }
        self.events.push(SceneEvent::EntityAcked { entity, old_id });
        if !self.authority && self.tracker.ack(entity, old_id) {
            let mapping = self.tracker.take_mapping();
            let targets: Vec<EntityId> = mapping.values().copied().collect();
            info!(
                count = mapping.len(),
                "received new ids for all tracked entities, fixing parent references"
            );
            self.fix_parent_refs(&targets, &mapping, AttributeChange::Replicate);
        }
    }

    /// Notifies that the authority acked a component creation under a final
    /// id. Call after [`Entity::change_component_id`].
    pub fn component_acked(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        old_id: ComponentId,
    ) {
        self.events.push(SceneEvent::ComponentAcked {
            entity,
            component,
            old_id,
        });
    }

    // -- Deferred creation signaling --

    /// Emits the creation event for an entity right away instead of at the
    /// end of the frame.
    pub fn emit_entity_created(&mut self, entity: EntityId, change: AttributeChange) {
        self.created_this_frame.retain(|(id, _)| *id != entity);
        if !self.entities.contains_key(&entity) {
            return;
        }
        if let Some(resolved) = change.resolved_for_entity() {
            self.events.push(SceneEvent::EntityCreated {
                entity,
                change: resolved,
            });
        }
    }

    /// Per-frame driver: flushes the deferred entity-created queue, then
    /// advances attribute interpolations.
    pub fn update(&mut self, dt: f32) {
        let pending = std::mem::take(&mut self.created_this_frame);
        for (id, change) in pending {
            if !self.entities.contains_key(&id) {
                continue;
            }
            if let Some(resolved) = change.resolved_for_entity() {
                self.events.push(SceneEvent::EntityCreated {
                    entity: id,
                    change: resolved,
                });
            }
        }
        self.update_attribute_interpolations(dt);
    }

    // -- Attribute interpolation --

    /// Starts interpolating an attribute towards `end` over `length`
    /// seconds.
    ///
    /// The attribute must declare itself interpolatable through its
    /// metadata and belong to a component in this scene. A running
    /// interpolation for the same attribute is replaced and continues
    /// smoothly from the current value; otherwise the value first snaps to
    /// the end value, so consumers always observe a change when the
    /// interpolation starts. Returns false when any requirement fails.
    pub fn start_attribute_interpolation(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        attribute: &str,
        end: AttributeValue,
        length: f32,
    ) -> bool {
        if length <= 0.0 {
            return false;
        }
        let Some(attr) = self
            .entities
            .get(&entity)
            .and_then(|e| e.component_by_id(component))
            .and_then(|c| c.attribute_by_id(attribute))
        else {
            return false;
        };
        if !attr.is_interpolated() || attr.type_id() != end.type_id() {
            return false;
        }
        let attr_id = attr.id().to_string();
        let start = attr.value().clone();

        let previous = self.end_attribute_interpolation(entity, component, &attr_id);
        if !previous {
            let comp = self
                .entities
                .get_mut(&entity)
                .and_then(|e| e.component_by_id_mut(component))
                .expect("presence checked above");
            let _ = comp.set_attr(&attr_id, end.clone(), AttributeChange::LocalOnly, &mut self.events);
        }
        self.interpolations.push(AttributeInterpolation {
            entity,
            component,
            attribute: attr_id,
            start,
            end,
            time: 0.0,
            length,
        });
        true
    }

    /// Cancels a running interpolation, keeping the last set value. Returns
    /// whether one existed.
    pub fn end_attribute_interpolation(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        attribute: &str,
    ) -> bool {
        let before = self.interpolations.len();
        self.interpolations.retain(|i| {
            !(i.entity == entity
                && i.component == component
                && i.attribute.eq_ignore_ascii_case(attribute))
        });
        self.interpolations.len() != before
    }

    /// Cancels every running interpolation.
    pub fn end_all_attribute_interpolations(&mut self) {
        self.interpolations.clear();
    }

    /// True while an interpolation update pass is applying values, letting
    /// observers tell interpolative changes apart from direct ones.
    #[must_use]
    pub fn is_interpolating(&self) -> bool {
        self.interpolating
    }

    /// Whether any interpolation entry (running or in grace hold) exists
    /// for the attribute.
    #[must_use]
    pub fn has_attribute_interpolation(
        &self,
        entity: EntityId,
        component: ComponentId,
        attribute: &str,
    ) -> bool {
        self.interpolations.iter().any(|i| {
            i.entity == entity
                && i.component == component
                && i.attribute.eq_ignore_ascii_case(attribute)
        })
    }

    /// Advances every running interpolation and applies the interpolated
    /// values with a local-only intent. A finished interpolation is kept as
    /// a bookkeeping entry for twice its length before being discarded; an
    /// interpolation whose owner died is discarded immediately.
    pub fn update_attribute_interpolations(&mut self, dt: f32) {
        self.interpolating = true;
        let mut interpolations = std::mem::take(&mut self.interpolations);
        interpolations.retain_mut(|interp| {
            let alive = self
                .entities
                .get(&interp.entity)
                .and_then(|e| e.component_by_id(interp.component))
                .and_then(|c| c.attribute_by_id(&interp.attribute))
                .is_some();
            if !alive {
                return false;
            }
            if interp.time <= interp.length {
                interp.time += dt;
                let t = (interp.time / interp.length).min(1.0);
                if let Some(value) = AttributeValue::interpolate(&interp.start, &interp.end, t) {
                    let comp = self
                        .entities
                        .get_mut(&interp.entity)
                        .and_then(|e| e.component_by_id_mut(interp.component))
                        .expect("liveness checked above");
                    let _ = comp.set_attr(
                        &interp.attribute,
                        value,
                        AttributeChange::LocalOnly,
                        &mut self.events,
                    );
                }
                true
            } else {
                // Grace hold: no longer mutating, kept alive so "was this
                // interpolating recently" stays answerable.
                interp.time += dt;
                interp.time < interp.length * 2.0
            }
        });
        self.interpolations = interpolations;
        self.interpolating = false;
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("authority", &self.authority)
            .field("entities", &self.entities.len())
            .field("interpolations", &self.interpolations.len())
            .finish()
    }
}

/// The first component-expressed parent reference on the entity, when it
/// parses as an entity id.
fn component_parent_ref(entity: &Entity) -> Option<EntityId> {
    for comp in entity.components().values() {
        if let Some(attr) = comp.attribute_by_id("parentRef") {
            if let AttributeValue::EntityReference(r) = attr.value() {
                if let Some(raw) = r.entity_id() {
                    return Some(EntityId(raw));
                }
            }
        }
    }
    None
}
