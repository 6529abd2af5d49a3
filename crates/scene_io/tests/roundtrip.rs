//! End-to-end persistence tests: save → load → save must reproduce the same
//! entity/component/attribute data, modulo id remapping when original ids
//! are not kept.

use scene_core::{
    AttributeChange, AttributeSpec, AttributeValue, ComponentTypeDef, EntityId, EntityReference,
    Scene,
};
use scene_io::{
    create_content_from_desc, load_binary, load_xml, scene_desc_from_xml, to_binary,
    to_xml_string, SceneDesc,
};

fn register_world_types(scene: &mut Scene) {
    scene
        .registry_mut()
        .register(ComponentTypeDef::new(
            20,
            "Spatial",
            vec![
                AttributeSpec::new(
                    "transform",
                    "Transform",
                    AttributeValue::Transform(scene_math::Transform::IDENTITY),
                )
                .interpolated(),
                AttributeSpec::new(
                    "parentRef",
                    "Parent entity ref",
                    AttributeValue::EntityReference(EntityReference::default()),
                ),
            ],
        ))
        .unwrap();
    scene
        .registry_mut()
        .register(ComponentTypeDef::new(
            21,
            "MeshView",
            vec![
                AttributeSpec::new(
                    "meshRef",
                    "Mesh ref",
                    AttributeValue::AssetReference(scene_core::AssetReference::default()),
                ),
                AttributeSpec::new("castShadows", "Cast shadows", AttributeValue::Bool(false)),
            ],
        ))
        .unwrap();
}

fn build_scene() -> Scene {
    let mut scene = Scene::new("world", false, true);
    register_world_types(&mut scene);

    let root = scene
        .create_entity(EntityId::ZERO, &["Spatial"], AttributeChange::Default, true, true, false)
        .unwrap();
    scene
        .set_entity_name(root, "root", AttributeChange::Default)
        .unwrap();

    let child = scene
        .create_child(root, &["Spatial", "MeshView"], AttributeChange::Default, true, true, false)
        .unwrap();
    let mesh = scene.entity(child).unwrap().component(21).unwrap().id();
    scene
        .set_attr(
            child,
            mesh,
            "meshRef",
            AttributeValue::AssetReference(scene_core::AssetReference("local://tree.mesh".into())),
            AttributeChange::Default,
        )
        .unwrap();
    scene
        .set_attr(
            child,
            mesh,
            "castShadows",
            AttributeValue::Bool(true),
            AttributeChange::Default,
        )
        .unwrap();

    let dynamic = scene
        .create_entity(
            EntityId::ZERO,
            &["DynamicComponent"],
            AttributeChange::Default,
            true,
            true,
            false,
        )
        .unwrap();
    let dyn_comp = scene.entity(dynamic).unwrap().component(25).unwrap().id();
    {
        let ent = scene.entity_mut(dynamic).unwrap();
        let comp = ent.component_by_id_mut(dyn_comp).unwrap();
        let mut scratch = scene_core::EventQueue::new();
        comp.create_attribute("string", "label", AttributeChange::Disconnected, &mut scratch)
            .unwrap();
        comp.set_attr_str("label", "dyn", AttributeChange::Disconnected, &mut scratch)
            .unwrap();
    }
    scene
}

/// Signature of a scene's contents that must survive persistence: id,
/// component type/name pairs and attribute id/value strings, plus tree
/// parenting.
fn signature(scene: &Scene) -> Vec<String> {
    let mut lines = Vec::new();
    let mut ids: Vec<EntityId> = scene.entities().map(|e| e.id()).collect();
    ids.sort();
    for id in ids {
        let ent = scene.entity(id).unwrap();
        lines.push(format!("entity {} parent={:?}", id, ent.parent()));
        for comp in ent.components().values() {
            let mut attrs: Vec<String> = comp
                .live_attributes()
                .map(|a| format!("{}={}", a.id(), a.to_string_value()))
                .collect();
            attrs.sort();
            lines.push(format!(
                "  {}:{} [{}]",
                comp.type_name(),
                comp.name(),
                attrs.join(",")
            ));
        }
    }
    lines
}

#[test]
fn test_xml_roundtrip_with_original_ids() {
    let scene = build_scene();
    let xml = to_xml_string(&scene, true, true);

    let mut restored = Scene::new("restored", false, true);
    register_world_types(&mut restored);
    let created = load_xml(&mut restored, &xml, true, AttributeChange::Default).unwrap();
    assert_eq!(created.len(), 3);
    assert_eq!(signature(&scene), signature(&restored));

    // Idempotence: a second save produces the same document.
    assert_eq!(xml, to_xml_string(&restored, true, true));
}

#[test]
fn test_binary_roundtrip_with_original_ids() {
    let scene = build_scene();
    let bytes = to_binary(&scene, true, true);

    let mut restored = Scene::new("restored", false, true);
    register_world_types(&mut restored);
    let created = load_binary(&mut restored, &bytes, true, AttributeChange::Default).unwrap();
    assert_eq!(created.len(), 3);
    assert_eq!(signature(&scene), signature(&restored));
    assert_eq!(bytes, to_binary(&restored, true, true));
}

#[test]
fn test_fresh_id_load_remaps_parent_refs() {
    let mut source = Scene::new("source", false, true);
    register_world_types(&mut source);
    let parent = source
        .create_entity(EntityId::ZERO, &["Spatial"], AttributeChange::Default, true, true, false)
        .unwrap();
    let child = source
        .create_entity(EntityId::ZERO, &["Spatial"], AttributeChange::Default, true, true, false)
        .unwrap();
    let spatial = source.entity(child).unwrap().component(20).unwrap().id();
    source
        .set_attr(
            child,
            spatial,
            "parentRef",
            AttributeValue::EntityReference(EntityReference(parent.to_string())),
            AttributeChange::Default,
        )
        .unwrap();
    let xml = to_xml_string(&source, true, true);

    // Loading into a scene where those ids are taken, without original ids.
    let mut target = Scene::new("target", false, true);
    register_world_types(&mut target);
    target
        .create_entity(parent, &[], AttributeChange::Default, true, true, false)
        .unwrap();
    target
        .create_entity(child, &[], AttributeChange::Default, true, true, false)
        .unwrap();
    let created = load_xml(&mut target, &xml, false, AttributeChange::Default).unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|id| *id != parent && *id != child));

    // The parent ref follows the remap.
    let new_parent = created[0];
    let loaded_child = target.entity(created[1]).unwrap();
    let parent_ref = loaded_child
        .component(20)
        .unwrap()
        .attribute_by_id("parentRef")
        .unwrap()
        .to_string_value();
    assert_eq!(parent_ref, new_parent.to_string());
}

#[test]
fn test_placeholder_component_roundtrips_verbatim() {
    let xml = r#"<scene>
 <entity id="7" sync="true">
  <component type="WaterVolume" typeId="77" sync="true">
   <attribute name="Flow map" id="flowMap" value="maps/flow #02.bin" type="FlowField"/>
   <attribute name="Depth" id="depth" value="4.5" type="real"/>
  </component>
 </entity>
</scene>"#;

    let mut scene = Scene::new("test", false, true);
    let created = load_xml(&mut scene, xml, true, AttributeChange::Default).unwrap();
    assert_eq!(created.len(), 1);
    assert!(scene.registry().is_type_registered("WaterVolume"));

    let saved = to_xml_string(&scene, false, false);
    let desc = scene_desc_from_xml(&saved).unwrap();
    let comp = &desc.entities[0].components[0];
    assert_eq!(comp.type_name, "WaterVolume");
    assert_eq!(comp.type_id, Some(77));
    let flow = comp
        .attributes
        .iter()
        .find(|a| a.id == "flowMap")
        .unwrap();
    // The unknown-typed attribute survives byte for byte.
    assert_eq!(flow.value, "maps/flow #02.bin");
    assert_eq!(flow.type_name, "FlowField");
    assert_eq!(flow.name, "Flow map");
}

#[test]
fn test_dynamic_component_diff_on_reload() {
    let first = r#"<scene>
 <entity id="1" sync="true">
  <component type="DynamicComponent" typeId="25" sync="true">
   <attribute name="a" id="a" value="1" type="string"/>
   <attribute name="b" id="b" value="2" type="string"/>
  </component>
 </entity>
</scene>"#;
    let second = r#"<scene>
 <entity id="1" sync="true">
  <component type="DynamicComponent" typeId="25" sync="true">
   <attribute name="b" id="b" value="3" type="string"/>
   <attribute name="c" id="c" value="4" type="string"/>
  </component>
 </entity>
</scene>"#;

    let mut scene = Scene::new("test", false, true);
    load_xml(&mut scene, first, true, AttributeChange::Default).unwrap();
    // Reloading with original ids replaces the occupant entity wholesale,
    // so diff through the component directly to model a replicated update.
    let ent = EntityId(1);
    let comp = scene.entity(ent).unwrap().component(25).unwrap().id();
    let desc = scene_desc_from_xml(second).unwrap();
    let updates: Vec<scene_core::AttributeUpdate> = desc.entities[0].components[0]
        .attributes
        .iter()
        .map(|a| scene_core::AttributeUpdate {
            id: a.id.clone(),
            type_name: a.type_name.clone(),
            value: a.value.clone(),
            name: a.name.clone(),
        })
        .collect();
    scene
        .apply_component_updates(ent, comp, updates, AttributeChange::Default)
        .unwrap();

    let comp = scene.entity(ent).unwrap().component(25).unwrap();
    assert!(comp.attribute_by_id("a").is_none());
    assert_eq!(comp.attribute_by_id("b").unwrap().to_string_value(), "3");
    assert_eq!(comp.attribute_by_id("c").unwrap().to_string_value(), "4");
    assert_eq!(comp.num_attributes(), 2);
}

#[test]
fn test_client_import_tracks_and_converges() {
    let mut server = Scene::new("server", false, true);
    register_world_types(&mut server);
    let a = server
        .create_entity(EntityId::ZERO, &["Spatial"], AttributeChange::Default, true, true, false)
        .unwrap();
    let b = server
        .create_entity(EntityId::ZERO, &["Spatial"], AttributeChange::Default, true, true, false)
        .unwrap();
    let spatial_b = server.entity(b).unwrap().component(20).unwrap().id();
    server
        .set_attr(
            b,
            spatial_b,
            "parentRef",
            AttributeValue::EntityReference(EntityReference(a.to_string())),
            AttributeChange::Default,
        )
        .unwrap();
    let xml = to_xml_string(&server, true, true);

    // A client imports the same content; entities land in the unacked range
    // and the import is tracked.
    let mut client = Scene::new("client", false, false);
    register_world_types(&mut client);
    let created = load_xml(&mut client, &xml, false, AttributeChange::Default).unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|id| id.is_unacked()));
    assert!(client.tracker().is_tracking());

    // The server acks both entities under authoritative ids.
    let (unacked_a, unacked_b) = (created[0], created[1]);
    client.change_entity_id(unacked_a, EntityId(1000));
    client.entity_acked(EntityId(1000), unacked_a);
    client.change_entity_id(unacked_b, EntityId(1001));
    client.entity_acked(EntityId(1001), unacked_b);

    assert!(!client.tracker().is_tracking());
    let parent_ref = client
        .entity(EntityId(1001))
        .unwrap()
        .component(20)
        .unwrap()
        .attribute_by_id("parentRef")
        .unwrap()
        .to_string_value();
    assert_eq!(parent_ref, "1000");
}

#[test]
fn test_desc_export_collects_assets() {
    let scene = build_scene();
    let desc = SceneDesc::from_scene(&scene, true, true);
    assert_eq!(desc.entities.len(), 2);
    let key = ("local://tree.mesh".to_string(), String::new());
    let asset = desc.assets.get(&key).expect("asset collected");
    assert_eq!(asset.destination_name, "tree.mesh");
}

#[test]
fn test_desc_load_equals_xml_load() {
    let scene = build_scene();
    let xml = to_xml_string(&scene, true, true);
    let desc = scene_desc_from_xml(&xml).unwrap();

    let mut via_desc = Scene::new("via-desc", false, true);
    register_world_types(&mut via_desc);
    create_content_from_desc(&mut via_desc, &desc, true, AttributeChange::Default).unwrap();

    let mut via_xml = Scene::new("via-xml", false, true);
    register_world_types(&mut via_xml);
    load_xml(&mut via_xml, &xml, true, AttributeChange::Default).unwrap();

    assert_eq!(signature(&via_desc), signature(&via_xml));
}

#[test]
fn test_temporary_entities_excluded_unless_requested() {
    let mut scene = Scene::new("test", false, true);
    register_world_types(&mut scene);
    scene
        .create_entity(EntityId::ZERO, &["Spatial"], AttributeChange::Default, true, true, false)
        .unwrap();
    scene
        .create_temporary_entity(&["Spatial"], AttributeChange::Default)
        .unwrap();

    let without = scene_desc_from_xml(&to_xml_string(&scene, false, false)).unwrap();
    assert_eq!(without.entities.len(), 1);
    let with = scene_desc_from_xml(&to_xml_string(&scene, true, false)).unwrap();
    assert_eq!(with.entities.len(), 2);
}
