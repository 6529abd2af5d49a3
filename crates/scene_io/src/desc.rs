//! Light-weight structures describing a scene and its contents.
//!
//! A [`SceneDesc`] is a pure value tree — entities, components, attributes
//! and asset references — with no back-references, safe to move across
//! format boundaries. Tooling uses it to convert between formats and to
//! defer asset resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use scene_core::{AttributeTypeId, AttributeValue, Component, Entity, EntityId, Scene};

/// Description of an attribute: type, names and the value in string form.
///
/// Type name, name and id compare case-insensitively; the value compares
/// case-sensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeDesc {
    pub type_name: String,
    pub name: String,
    pub value: String,
    pub id: String,
}

impl PartialEq for AttributeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.type_name.eq_ignore_ascii_case(&other.type_name)
            && self.name.eq_ignore_ascii_case(&other.name)
            && self.id.eq_ignore_ascii_case(&other.id)
            && self.value == other.value
    }
}

impl Eq for AttributeDesc {}

/// Description of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDesc {
    /// Numeric type id when available.
    pub type_id: Option<u32>,
    pub type_name: String,
    /// Instance name, if any.
    pub name: String,
    /// Whether the component is synchronized (replicated).
    pub sync: bool,
    pub attributes: Vec<AttributeDesc>,
}

impl Default for ComponentDesc {
    fn default() -> Self {
        Self {
            type_id: None,
            type_name: String::new(),
            name: String::new(),
            sync: true,
            attributes: Vec::new(),
        }
    }
}

/// Description of an entity with its components and child entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDesc {
    /// Original entity id as a decimal string; may be empty.
    pub id: String,
    pub name: String,
    pub group: String,
    pub local: bool,
    pub temporary: bool,
    pub components: Vec<ComponentDesc>,
    pub children: Vec<EntityDesc>,
}

impl EntityDesc {
    /// Whether `other` is a direct child of this description.
    #[must_use]
    pub fn is_parent_for(&self, other: &EntityDesc) -> bool {
        if other.id.is_empty() {
            return false;
        }
        self.children.iter().any(|c| c.id == other.id)
    }
}

/// Description of a referenced asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDesc {
    /// Source location of the asset data.
    pub source: String,
    /// Name within the source when it is a container for multiple files.
    pub subname: String,
    pub type_name: String,
    /// Name for the asset in the destination storage.
    pub destination_name: String,
}

/// A source-agnostic description of a whole scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDesc {
    pub name: String,
    pub view_enabled: bool,
    /// Root-level entities; children are nested.
    pub entities: Vec<EntityDesc>,
    /// Unique referenced assets keyed by (source, subname).
    pub assets: BTreeMap<(String, String), AssetDesc>,
}

impl SceneDesc {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Builds a description of the live scene, honoring the temporary/local
    /// serialization filters and collecting referenced assets.
    #[must_use]
    pub fn from_scene(scene: &Scene, serialize_temporary: bool, serialize_local: bool) -> SceneDesc {
        let mut desc = SceneDesc {
            name: scene.name().to_string(),
            view_enabled: scene.is_view_enabled(),
            entities: Vec::new(),
            assets: BTreeMap::new(),
        };
        for root in scene.root_level_entities() {
            let Some(ent) = scene.entity(root) else { continue };
            if ent.should_be_serialized(serialize_temporary, serialize_local, true) {
                let entity_desc = entity_desc_from(
                    scene,
                    ent,
                    serialize_temporary,
                    serialize_local,
                    &mut desc.assets,
                );
                desc.entities.push(entity_desc);
            }
        }
        desc
    }
}

fn entity_desc_from(
    scene: &Scene,
    entity: &Entity,
    serialize_temporary: bool,
    serialize_local: bool,
    assets: &mut BTreeMap<(String, String), AssetDesc>,
) -> EntityDesc {
    let mut desc = EntityDesc {
        id: entity.id().to_string(),
        name: entity.name(),
        group: entity.group(),
        local: entity.is_local(),
        temporary: entity.is_temporary(),
        components: Vec::new(),
        children: Vec::new(),
    };
    for comp in entity.components().values() {
        if comp.should_be_serialized(serialize_temporary, serialize_local, entity.is_temporary()) {
            desc.components.push(component_desc_from(comp, assets));
        }
    }
    for child_id in entity.children() {
        let Some(child) = scene.entity(*child_id) else { continue };
        if child.should_be_serialized(serialize_temporary, serialize_local, true) {
            desc.children.push(entity_desc_from(
                scene,
                child,
                serialize_temporary,
                serialize_local,
                assets,
            ));
        }
    }
    desc
}

pub(crate) fn component_desc_from(
    comp: &Component,
    assets: &mut BTreeMap<(String, String), AssetDesc>,
) -> ComponentDesc {
    let mut desc = ComponentDesc {
        type_id: Some(comp.type_id()),
        type_name: comp.type_name().to_string(),
        name: comp.name().to_string(),
        sync: comp.is_replicated(),
        attributes: Vec::new(),
    };
    for attr in comp.live_attributes() {
        let value = attr.to_string_value();
        if matches!(
            attr.value(),
            AttributeValue::AssetReference(_) | AttributeValue::AssetReferenceList(_)
        ) && !value.is_empty()
        {
            for asset_ref in value.split(';').filter(|r| !r.trim().is_empty()) {
                let asset = AssetDesc {
                    source: asset_ref.to_string(),
                    subname: String::new(),
                    type_name: attr.name().to_string(),
                    destination_name: filename_of(asset_ref),
                };
                assets.insert((asset.source.clone(), asset.subname.clone()), asset);
            }
        }
        desc.attributes.push(AttributeDesc {
            type_name: attr.type_name().to_string(),
            name: attr.name().to_string(),
            value,
            id: attr.id().to_string(),
        });
    }
    desc
}

fn filename_of(asset_ref: &str) -> String {
    asset_ref
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(asset_ref)
        .to_string()
}

/// The parent entity id a description expresses through a component-level
/// `parentRef` attribute, when it parses as an id.
#[must_use]
pub(crate) fn desc_parent_ref(desc: &EntityDesc) -> Option<EntityId> {
    for comp in &desc.components {
        for attr in &comp.attributes {
            if attr.id.eq_ignore_ascii_case("parentRef")
                && AttributeTypeId::from_type_name(&attr.type_name)
                    == Some(AttributeTypeId::EntityReference)
            {
                return match attr.value.trim().parse::<u32>() {
                    Ok(raw) if raw != 0 => Some(EntityId(raw)),
                    _ => None,
                };
            }
        }
    }
    None
}

/// Sorts root-level entity descriptions so that parents come before their
/// children: descriptions holding child entities first (tree parenting),
/// then component-expressed parent references. Linear-scan insertion; if
/// the result would lose information, the input order is returned.
#[must_use]
pub fn sort_entity_descs(entities: &[EntityDesc]) -> Vec<EntityDesc> {
    let mut remaining: Vec<EntityDesc> = entities.to_vec();
    let mut sorted: Vec<EntityDesc> = Vec::with_capacity(entities.len());

    // Entities with children first; a deeper parent-of-parent goes before
    // its parented subtree holder.
    let mut i = 0;
    while i < remaining.len() {
        if remaining[i].children.is_empty() {
            i += 1;
            continue;
        }
        let ent = remaining.remove(i);
        let insert = sorted
            .iter()
            .position(|cand| cand.is_parent_for(&ent))
            .map(|pos| pos + 1);
        match insert {
            Some(pos) if pos < sorted.len() => sorted.insert(pos, ent),
            _ => sorted.push(ent),
        }
    }

    // Then parent-reference ordering among the rest.
    let children_start = sorted.len();
    while !remaining.is_empty() {
        let ent = remaining.remove(0);
        let mut insert = None;
        if let Some(parent_id) = desc_parent_ref(&ent) {
            let parent_str = parent_id.to_string();
            if let Some(pos) = sorted
                .iter()
                .skip(children_start)
                .position(|cand| cand.id == parent_str)
            {
                insert = Some(children_start + pos + 1);
            }
        }
        match insert {
            Some(pos) if pos < sorted.len() => sorted.insert(pos, ent),
            _ => sorted.push(ent),
        }
    }

    if sorted.len() != entities.len() {
        tracing::error!(
            sorted = sorted.len(),
            original = entities.len(),
            "entity sort lost information, using original order"
        );
        return entities.to_vec();
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(id: &str) -> EntityDesc {
        EntityDesc {
            id: id.to_string(),
            ..EntityDesc::default()
        }
    }

    fn desc_with_parent_ref(id: &str, parent: &str) -> EntityDesc {
        let mut d = desc(id);
        d.components.push(ComponentDesc {
            type_id: None,
            type_name: "Spatial".into(),
            name: String::new(),
            sync: true,
            attributes: vec![AttributeDesc {
                type_name: "EntityReference".into(),
                name: "Parent".into(),
                value: parent.to_string(),
                id: "parentRef".into(),
            }],
        });
        d
    }

    #[test]
    fn test_attribute_desc_eq_case_insensitive() {
        let a = AttributeDesc {
            type_name: "Color".into(),
            name: "Ambient".into(),
            value: "1,1,1,1".into(),
            id: "ambient".into(),
        };
        let mut b = a.clone();
        b.type_name = "color".into();
        b.id = "AMBIENT".into();
        assert_eq!(a, b);
        b.value = "0,0,0,1".into();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sort_tree_holders_first() {
        let mut parent = desc("1");
        parent.children.push(desc("2"));
        let lone = desc("3");
        let sorted = sort_entity_descs(&[lone.clone(), parent.clone()]);
        assert_eq!(sorted[0].id, "1");
        assert_eq!(sorted[1].id, "3");
    }

    #[test]
    fn test_sort_by_parent_ref() {
        let parent = desc("10");
        let child = desc_with_parent_ref("11", "10");
        let sorted = sort_entity_descs(&[child.clone(), parent.clone()]);
        let parent_pos = sorted.iter().position(|e| e.id == "10").unwrap();
        let child_pos = sorted.iter().position(|e| e.id == "11").unwrap();
        assert!(parent_pos < child_pos);
    }

    #[test]
    fn test_desc_parent_ref_ignores_names() {
        // A parent ref holding an entity name, not an id, resolves to none.
        let by_name = desc_with_parent_ref("5", "lobby");
        assert_eq!(desc_parent_ref(&by_name), None);
        let by_id = desc_parent_ref(&desc_with_parent_ref("5", "77"));
        assert_eq!(by_id, Some(EntityId(77)));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut root = desc("1");
        root.components.push(ComponentDesc::default());
        let json = serde_json::to_string(&root).unwrap();
        let back: EntityDesc = serde_json::from_str(&json).unwrap();
        assert_eq!(root, back);
    }
}
