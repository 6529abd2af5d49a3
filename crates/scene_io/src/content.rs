//! Content instantiation: one algorithm for every source format.
//!
//! All three load paths (scene description, XML, binary) funnel through
//! [`create_content_from_desc`]:
//!
//! 1. sort the descriptions so parents precede children,
//! 2. resolve each entity id per the `use_original_ids` policy, recording
//!    old→new remappings when fresh ids are allocated,
//! 3. register placeholder types for unknown component type names,
//! 4. apply all attribute values with a disconnected intent while the
//!    subtree is structurally incomplete,
//! 5. rewrite parent-reference attributes through the remap table,
//! 6. only then emit the deferred creation events and a full
//!    component-changed pass, in sorted order.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{error, warn};

use scene_core::wire::WireError;
use scene_core::{
    AttributeChange, AttributeUpdate, ComponentId, EntityId, PlaceholderAttr, PlaceholderDef,
    Scene,
};

use crate::desc::{ComponentDesc, EntityDesc, SceneDesc};

/// Errors that abort a whole load operation. No entities are reported
/// created when one of these is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not find scene element in document")]
    MissingSceneRoot,
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("truncated binary stream: {0}")]
    Truncated(#[from] WireError),
    #[error("a previous content creation is still waiting for server acknowledgment")]
    ReconciliationPending,
}

/// Creates scene content from a description.
///
/// With `use_original_ids` the entities keep their ids from the
/// description, force-removing any conflicting occupants; otherwise fresh
/// ids are allocated and every component-expressed parent reference is
/// rewritten through the old→new map. Returns the created entities in
/// parent-before-child order.
pub fn create_content_from_desc(
    scene: &mut Scene,
    desc: &SceneDesc,
    use_original_ids: bool,
    change: AttributeChange,
) -> Result<Vec<EntityId>, LoadError> {
    if desc.is_empty() {
        error!("empty scene description");
        return Ok(Vec::new());
    }
    if !scene.is_authority() && scene.tracker().is_tracking() {
        error!(
            "still waiting for a previous content creation to be acknowledged by the server, \
             try again after it completes"
        );
        return Err(LoadError::ReconciliationPending);
    }

    let sorted = crate::desc::sort_entity_descs(&desc.entities);
    let mut old_to_new: HashMap<EntityId, EntityId> = HashMap::new();
    let mut created: Vec<EntityId> = Vec::new();
    for entity_desc in &sorted {
        create_entity_from_desc(
            scene,
            None,
            entity_desc,
            use_original_ids,
            &mut created,
            &mut old_to_new,
        );
    }

    // Fix parent refs before any events fire, so observers never see
    // references into the stale id space.
    if !use_original_ids && !old_to_new.is_empty() {
        scene.fix_parent_refs(&created, &old_to_new, AttributeChange::Disconnected);
    }

    for id in &created {
        if !scene.is_authority() {
            scene.track_imported_entity(*id);
        }
        scene.emit_entity_created(*id, change);
        let component_ids: Vec<ComponentId> = scene
            .entity(*id)
            .map(|e| e.components().keys().copied().collect())
            .unwrap_or_default();
        for comp in component_ids {
            let _ = scene.component_changed(*id, comp, change);
        }
    }

    // Observers may have removed entities in response; report survivors.
    created.retain(|id| scene.has_entity(*id));
    Ok(created)
}

fn create_entity_from_desc(
    scene: &mut Scene,
    parent: Option<EntityId>,
    desc: &EntityDesc,
    use_original_ids: bool,
    created: &mut Vec<EntityId>,
    old_to_new: &mut HashMap<EntityId, EntityId>,
) {
    let original_id = desc.id.trim().parse::<u32>().unwrap_or(0);
    let id = if desc.id.is_empty() || !use_original_ids || original_id == 0 {
        let fresh = if desc.local {
            scene.next_free_id_local()
        } else {
            scene.next_free_id()
        };
        if original_id != 0 {
            old_to_new.entry(EntityId(original_id)).or_insert(fresh);
        }
        fresh
    } else {
        EntityId(original_id)
    };

    if scene.has_entity(id) {
        // Conflicting occupants make room for the incoming entity.
        warn!(entity = %id, "destroying previous entity to avoid conflict with created entity");
        scene.remove_entity(id, AttributeChange::Replicate);
    }

    let id = match scene.create_entity(
        id,
        &[],
        AttributeChange::Default,
        !desc.local,
        true,
        desc.temporary,
    ) {
        Ok(id) => id,
        Err(err) => {
            error!(%err, "failed to create entity from description");
            return;
        }
    };
    if let Some(parent) = parent {
        // Silent, to match entity creation signaling at the end of the load.
        let _ = scene.set_parent(id, Some(parent), AttributeChange::Disconnected);
    }

    for comp_desc in &desc.components {
        if comp_desc.type_name.is_empty() {
            continue;
        }
        if !scene.registry().is_type_registered(&comp_desc.type_name) {
            // The document holds everything needed to preserve the data.
            let _ = scene
                .registry_mut()
                .register_placeholder(placeholder_def_from(comp_desc));
        }
        let comp = match scene.get_or_create_component(
            id,
            &comp_desc.type_name,
            &comp_desc.name,
            AttributeChange::Default,
            comp_desc.sync,
        ) {
            Ok(comp) => comp,
            Err(err) => {
                error!(r#type = %comp_desc.type_name, %err, "failed to create component");
                continue;
            }
        };
        let updates: Vec<AttributeUpdate> = comp_desc
            .attributes
            .iter()
            .map(|a| AttributeUpdate {
                id: a.id.clone(),
                type_name: a.type_name.clone(),
                value: a.value.clone(),
                name: a.name.clone(),
            })
            .collect();
        // No signals while the subtree is structurally incomplete.
        let _ = scene.apply_component_updates(id, comp, updates, AttributeChange::Disconnected);
    }

    created.push(id);

    for child in &desc.children {
        create_entity_from_desc(scene, Some(id), child, use_original_ids, created, old_to_new);
    }
}

pub(crate) fn placeholder_def_from(desc: &ComponentDesc) -> PlaceholderDef {
    PlaceholderDef {
        type_id: desc.type_id.unwrap_or(u32::MAX),
        type_name: desc.type_name.clone(),
        attributes: desc
            .attributes
            .iter()
            .map(|a| PlaceholderAttr {
                id: if a.id.is_empty() { a.name.clone() } else { a.id.clone() },
                name: a.name.clone(),
                type_name: a.type_name.clone(),
                value: a.value.clone(),
            })
            .collect(),
    }
}
