//! XML scene codec.
//!
//! Document schema: a root `<scene>` element containing `<entity>` elements
//! (attributes: numeric `id`, `sync`, optional `temporary`), each containing
//! `<component>` elements (`type` without the legacy prefix, numeric
//! `typeId`, optional `name`, `sync`, optional `temporary`) and nested
//! `<entity>` elements for children; each component contains `<attribute>`
//! elements (`id`, `name`, `value`, `type` — the `name` doubles as a legacy
//! fallback key when `id` is absent).

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::error;

use scene_core::{AttributeChange, Entity, EntityId, Scene, NAME_COMPONENT_TYPE_ID};

use crate::content::{create_content_from_desc, LoadError};
use crate::desc::{AttributeDesc, ComponentDesc, EntityDesc, SceneDesc};

/// Serializes the scene to an XML string.
pub fn to_xml_string(scene: &Scene, serialize_temporary: bool, serialize_local: bool) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
    let _ = writer.write_event(Event::Start(BytesStart::new("scene")));
    for root in scene.root_level_entities() {
        let Some(ent) = scene.entity(root) else { continue };
        if ent.should_be_serialized(serialize_temporary, serialize_local, true) {
            write_entity(&mut writer, scene, ent, serialize_temporary, serialize_local);
        }
    }
    let _ = writer.write_event(Event::End(BytesEnd::new("scene")));
    String::from_utf8(writer.into_inner()).unwrap_or_default()
}

fn write_entity(
    writer: &mut Writer<Vec<u8>>,
    scene: &Scene,
    entity: &Entity,
    serialize_temporary: bool,
    serialize_local: bool,
) {
    let id_str = entity.id().to_string();
    let mut elem = BytesStart::new("entity");
    elem.push_attribute(("id", id_str.as_str()));
    elem.push_attribute(("sync", bool_str(entity.is_replicated())));
    if serialize_temporary {
        elem.push_attribute(("temporary", bool_str(entity.is_temporary())));
    }
    let _ = writer.write_event(Event::Start(elem));

    for comp in entity.components().values() {
        if !comp.should_be_serialized(serialize_temporary, serialize_local, entity.is_temporary())
        {
            continue;
        }
        let type_id_str = comp.type_id().to_string();
        let mut comp_elem = BytesStart::new("component");
        comp_elem.push_attribute(("type", comp.type_name()));
        comp_elem.push_attribute(("typeId", type_id_str.as_str()));
        if !comp.name().is_empty() {
            comp_elem.push_attribute(("name", comp.name()));
        }
        comp_elem.push_attribute(("sync", bool_str(comp.is_replicated())));
        if serialize_temporary {
            comp_elem.push_attribute(("temporary", bool_str(comp.is_temporary())));
        }
        let _ = writer.write_event(Event::Start(comp_elem));
        for attr in comp.live_attributes() {
            let value = attr.to_string_value();
            let mut attr_elem = BytesStart::new("attribute");
            attr_elem.push_attribute(("name", attr.name()));
            attr_elem.push_attribute(("id", attr.id()));
            attr_elem.push_attribute(("value", value.as_str()));
            attr_elem.push_attribute(("type", attr.type_name()));
            let _ = writer.write_event(Event::Empty(attr_elem));
        }
        let _ = writer.write_event(Event::End(BytesEnd::new("component")));
    }

    for child_id in entity.children() {
        let Some(child) = scene.entity(*child_id) else { continue };
        if child.should_be_serialized(serialize_temporary, serialize_local, true) {
            write_entity(writer, scene, child, serialize_temporary, serialize_local);
        }
    }
    let _ = writer.write_event(Event::End(BytesEnd::new("entity")));
}

fn bool_str(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}

/// Parses an XML document into a scene description. A missing `<scene>`
/// root or malformed XML aborts the load.
pub fn scene_desc_from_xml(xml: &str) -> Result<SceneDesc, LoadError> {
    let mut reader = Reader::from_str(xml);
    let mut desc = SceneDesc::default();
    let mut entity_stack: Vec<EntityDesc> = Vec::new();
    let mut current_component: Option<ComponentDesc> = None;
    let mut seen_scene = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| LoadError::Malformed(err.to_string()))?;
        match event {
            Event::Start(elem) => match elem.name().as_ref() {
                b"scene" => seen_scene = true,
                b"entity" => {
                    require_scene(seen_scene)?;
                    entity_stack.push(read_entity_open(&elem)?);
                }
                b"component" => {
                    require_scene(seen_scene)?;
                    current_component = Some(read_component_open(&elem)?);
                }
                b"attribute" => {
                    if let Some(comp) = current_component.as_mut() {
                        comp.attributes.push(read_attribute(&elem)?);
                    }
                }
                _ => {}
            },
            Event::Empty(elem) => match elem.name().as_ref() {
                b"attribute" => {
                    if let Some(comp) = current_component.as_mut() {
                        comp.attributes.push(read_attribute(&elem)?);
                    }
                }
                b"component" => {
                    require_scene(seen_scene)?;
                    let comp = read_component_open(&elem)?;
                    close_component(comp, &mut entity_stack);
                }
                b"entity" => {
                    require_scene(seen_scene)?;
                    let ent = read_entity_open(&elem)?;
                    close_entity(ent, &mut entity_stack, &mut desc);
                }
                _ => {}
            },
            Event::End(elem) => match elem.name().as_ref() {
                b"component" => {
                    if let Some(comp) = current_component.take() {
                        close_component(comp, &mut entity_stack);
                    }
                }
                b"entity" => {
                    if let Some(ent) = entity_stack.pop() {
                        close_entity(ent, &mut entity_stack, &mut desc);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_scene {
        error!("could not find scene element in XML document");
        return Err(LoadError::MissingSceneRoot);
    }
    Ok(desc)
}

fn require_scene(seen_scene: bool) -> Result<(), LoadError> {
    if seen_scene {
        Ok(())
    } else {
        error!("could not find scene element in XML document");
        Err(LoadError::MissingSceneRoot)
    }
}

fn close_component(comp: ComponentDesc, entity_stack: &mut Vec<EntityDesc>) {
    let Some(entity) = entity_stack.last_mut() else {
        return;
    };
    // The entity's name and group live in its Name component.
    if entity.name.is_empty() && is_name_component(&comp) {
        for attr in &comp.attributes {
            if attr.id.eq_ignore_ascii_case("name") {
                entity.name = attr.value.clone();
            } else if attr.id.eq_ignore_ascii_case("group") {
                entity.group = attr.value.clone();
            }
        }
    }
    entity.components.push(comp);
}

fn is_name_component(comp: &ComponentDesc) -> bool {
    comp.type_id == Some(NAME_COMPONENT_TYPE_ID) || comp.type_name.eq_ignore_ascii_case("Name")
}

fn close_entity(ent: EntityDesc, entity_stack: &mut Vec<EntityDesc>, desc: &mut SceneDesc) {
    match entity_stack.last_mut() {
        Some(parent) => parent.children.push(ent),
        None => desc.entities.push(ent),
    }
}

fn read_entity_open(elem: &BytesStart<'_>) -> Result<EntityDesc, LoadError> {
    let sync = attr_str(elem, "sync")?.map_or(true, |v| parse_bool(&v));
    Ok(EntityDesc {
        id: attr_str(elem, "id")?.unwrap_or_default(),
        local: !sync,
        temporary: attr_str(elem, "temporary")?.map_or(false, |v| parse_bool(&v)),
        ..EntityDesc::default()
    })
}

fn read_component_open(elem: &BytesStart<'_>) -> Result<ComponentDesc, LoadError> {
    Ok(ComponentDesc {
        type_id: attr_str(elem, "typeId")?.and_then(|v| v.trim().parse::<u32>().ok()),
        type_name: attr_str(elem, "type")?.unwrap_or_default(),
        name: attr_str(elem, "name")?.unwrap_or_default(),
        sync: attr_str(elem, "sync")?.map_or(true, |v| parse_bool(&v)),
        attributes: Vec::new(),
    })
}

fn read_attribute(elem: &BytesStart<'_>) -> Result<AttributeDesc, LoadError> {
    let name = attr_str(elem, "name")?.unwrap_or_default();
    // Older documents carry only the human-readable name.
    let id = attr_str(elem, "id")?.unwrap_or_else(|| name.clone());
    Ok(AttributeDesc {
        type_name: attr_str(elem, "type")?.unwrap_or_default(),
        name,
        value: attr_str(elem, "value")?.unwrap_or_default(),
        id,
    })
}

fn attr_str(elem: &BytesStart<'_>, name: &str) -> Result<Option<String>, LoadError> {
    match elem.try_get_attribute(name) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|err| LoadError::Malformed(err.to_string())),
        Ok(None) => Ok(None),
        Err(err) => Err(LoadError::Malformed(err.to_string())),
    }
}

fn parse_bool(v: &str) -> bool {
    v.trim().eq_ignore_ascii_case("true") || v.trim() == "1"
}

/// Creates scene content from an XML document: parse into a description,
/// then instantiate through the common algorithm.
pub fn load_xml(
    scene: &mut Scene,
    xml: &str,
    use_original_ids: bool,
    change: AttributeChange,
) -> Result<Vec<EntityId>, LoadError> {
    let desc = scene_desc_from_xml(xml)?;
    create_content_from_desc(scene, &desc, use_original_ids, change)
}
