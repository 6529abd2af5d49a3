//! Binary scene codec.
//!
//! Layout (little-endian): u32 root-entity count, then per entity
//! { u32 id, u8 replicated, u32 packed counts (components in the low 16
//! bits, child entities in the high 16) }, then per component { u32 type
//! id, u8-length name, u8 replicated, u32 payload length, payload }, then
//! the child entity records recursively. The length-prefixed component
//! payload lets an unrecognized component type be skipped by byte length
//! instead of corrupting the rest of the stream.

use tracing::{error, warn};

use scene_core::wire::{WireReader, WireWriter};
use scene_core::{
    AttributeChange, Component, ComponentRegistry, Entity, EntityId, EventQueue, Scene,
    NAME_COMPONENT_TYPE_ID,
};

use crate::content::{create_content_from_desc, LoadError};
use crate::desc::{component_desc_from, EntityDesc, SceneDesc};

/// Serializes the scene to the binary format.
#[must_use]
pub fn to_binary(scene: &Scene, serialize_temporary: bool, serialize_local: bool) -> Vec<u8> {
    let mut w = WireWriter::new();
    let roots: Vec<&Entity> = scene
        .root_level_entities()
        .into_iter()
        .filter_map(|id| scene.entity(id))
        .filter(|e| e.should_be_serialized(serialize_temporary, serialize_local, true))
        .collect();
    w.write_u32(roots.len() as u32);
    for ent in roots {
        write_entity(&mut w, scene, ent, serialize_temporary, serialize_local);
    }
    w.into_bytes()
}

fn write_entity(
    w: &mut WireWriter,
    scene: &Scene,
    entity: &Entity,
    serialize_temporary: bool,
    serialize_local: bool,
) {
    w.write_u32(entity.id().value());
    w.write_u8(u8::from(entity.is_replicated()));

    let components: Vec<&Component> = entity
        .components()
        .values()
        .filter(|c| {
            c.should_be_serialized(serialize_temporary, serialize_local, entity.is_temporary())
        })
        .collect();
    let children: Vec<&Entity> = entity
        .children()
        .iter()
        .filter_map(|id| scene.entity(*id))
        .filter(|e| e.should_be_serialized(serialize_temporary, serialize_local, true))
        .collect();
    // The packed count field caps both at 65535.
    if components.len() > 0xffff {
        error!(entity = %entity.id(), "entity holds more than 65535 components, binary save will be erroneous");
    }
    if children.len() > 0xffff {
        error!(entity = %entity.id(), "entity holds more than 65535 child entities, binary save will be erroneous");
    }
    w.write_u32((components.len() as u32 & 0xffff) | ((children.len() as u32 & 0xffff) << 16));

    for comp in components {
        w.write_u32(comp.type_id());
        w.write_str8(comp.name());
        w.write_u8(u8::from(comp.is_replicated()));
        // Each component payload goes into its own buffer so the record can
        // be skipped by length on read.
        let mut payload = WireWriter::new();
        comp.write_binary(&mut payload);
        let payload = payload.into_bytes();
        w.write_u32(payload.len() as u32);
        w.write_bytes(&payload);
    }

    for child in children {
        write_entity(w, scene, child, serialize_temporary, serialize_local);
    }
}

/// Parses a binary scene into a description. Component payloads are decoded
/// through blueprint instances from the registry; unknown component types
/// are skipped by their byte length. A truncated stream aborts the whole
/// load.
pub fn scene_desc_from_binary(
    data: &[u8],
    registry: &ComponentRegistry,
) -> Result<SceneDesc, LoadError> {
    let mut r = WireReader::new(data);
    let mut desc = SceneDesc::default();
    let count = r.read_u32()?;
    for _ in 0..count {
        let entity = read_entity_desc(&mut r, registry)?;
        desc.entities.push(entity);
    }
    Ok(desc)
}

fn read_entity_desc(
    r: &mut WireReader<'_>,
    registry: &ComponentRegistry,
) -> Result<EntityDesc, LoadError> {
    let id = r.read_u32()?;
    let replicated = r.read_u8()? != 0;
    let packed = r.read_u32()?;
    let num_components = packed & 0xffff;
    let num_children = packed >> 16;

    let mut entity = EntityDesc {
        id: id.to_string(),
        local: !replicated,
        ..EntityDesc::default()
    };

    for _ in 0..num_components {
        let type_id = r.read_u32()?;
        let name = r.read_str8()?;
        let sync = r.read_u8()? != 0;
        let payload_len = r.read_u32()? as usize;
        let payload = r.read_exact(payload_len)?;

        let Some(mut comp) = registry.create_component_by_id(type_id, &name) else {
            warn!(type_id, "unknown component type in binary scene, skipping by length");
            continue;
        };
        let _ = comp.set_replicated(sync);
        let mut payload_reader = WireReader::new(payload);
        let mut scratch = EventQueue::new();
        if let Err(err) = comp.read_binary(
            &mut payload_reader,
            AttributeChange::Disconnected,
            &mut scratch,
        ) {
            // The stream is already positioned past the payload, so one bad
            // component does not desync the rest of the document.
            error!(r#type = comp.type_name(), %err, "failed to load component from binary scene");
            continue;
        }
        let mut scratch_assets = std::collections::BTreeMap::new();
        let comp_desc = component_desc_from(&comp, &mut scratch_assets);
        if entity.name.is_empty() && type_id == NAME_COMPONENT_TYPE_ID {
            for attr in &comp_desc.attributes {
                if attr.id.eq_ignore_ascii_case("name") {
                    entity.name = attr.value.clone();
                } else if attr.id.eq_ignore_ascii_case("group") {
                    entity.group = attr.value.clone();
                }
            }
        }
        entity.components.push(comp_desc);
    }

    for _ in 0..num_children {
        let child = read_entity_desc(r, registry)?;
        entity.children.push(child);
    }
    Ok(entity)
}

/// Creates scene content from binary data: parse into a description, then
/// instantiate through the common algorithm.
pub fn load_binary(
    scene: &mut Scene,
    data: &[u8],
    use_original_ids: bool,
    change: AttributeChange,
) -> Result<Vec<EntityId>, LoadError> {
    let desc = scene_desc_from_binary(data, scene.registry())?;
    create_content_from_desc(scene, &desc, use_original_ids, change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_core::{AttributeSpec, AttributeValue, ComponentTypeDef, EntityId};

    fn register_stats(scene: &mut Scene) {
        scene
            .registry_mut()
            .register(ComponentTypeDef::new(
                40,
                "Stats",
                vec![AttributeSpec::new(
                    "health",
                    "Health",
                    AttributeValue::Real(100.0),
                )],
            ))
            .unwrap();
    }

    #[test]
    fn test_roundtrip_simple_scene() {
        let mut scene = Scene::new("test", false, true);
        register_stats(&mut scene);
        let ent = scene
            .create_entity(EntityId::ZERO, &["Stats"], AttributeChange::Default, true, true, false)
            .unwrap();
        let comp = scene.entity(ent).unwrap().component(40).unwrap().id();
        scene
            .set_attr(ent, comp, "health", AttributeValue::Real(55.0), AttributeChange::Default)
            .unwrap();

        let bytes = to_binary(&scene, false, false);

        let mut other = Scene::new("other", false, true);
        register_stats(&mut other);
        let created = load_binary(&mut other, &bytes, true, AttributeChange::Default).unwrap();
        assert_eq!(created, vec![ent]);
        let health = other
            .entity(ent)
            .unwrap()
            .component(40)
            .unwrap()
            .attribute_by_id("health")
            .unwrap()
            .to_string_value();
        assert_eq!(health, "55");
    }

    #[test]
    fn test_truncated_stream_aborts() {
        let mut scene = Scene::new("test", false, true);
        register_stats(&mut scene);
        scene
            .create_entity(EntityId::ZERO, &["Stats"], AttributeChange::Default, true, true, false)
            .unwrap();
        let bytes = to_binary(&scene, false, false);

        let mut other = Scene::new("other", false, true);
        register_stats(&mut other);
        let err = load_binary(&mut other, &bytes[..bytes.len() - 3], true, AttributeChange::Default);
        assert!(matches!(err, Err(LoadError::Truncated(_))));
        assert_eq!(other.num_entities(), 0);
    }

    #[test]
    fn test_unknown_component_skipped_by_length() {
        let mut scene = Scene::new("test", false, true);
        register_stats(&mut scene);
        let ent = scene
            .create_entity(EntityId::ZERO, &["Stats", "Name"], AttributeChange::Default, true, true, false)
            .unwrap();

        let bytes = to_binary(&scene, false, false);

        // The loading process does not know "Stats".
        let mut other = Scene::new("other", false, true);
        let created = load_binary(&mut other, &bytes, true, AttributeChange::Default).unwrap();
        assert_eq!(created.len(), 1);
        let loaded = other.entity(ent).unwrap();
        // Stats was skipped, Name survived.
        assert!(loaded.component(40).is_none());
        assert!(loaded.component(NAME_COMPONENT_TYPE_ID).is_some());
    }
}
