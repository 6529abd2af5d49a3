//! Typed attribute cells.
//!
//! An attribute is a named, indexed, replicable data cell inside a component.
//! The payload is a closed sum type over a fixed set of kinds with stable
//! numeric ids; all serialization and interpolation logic dispatches on the
//! tag, never on runtime introspection, which keeps the wire protocol's
//! fixed-width assumptions intact.

use glam::{IVec2, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scene_math::{Color, Transform};

use crate::wire::{WireError, WireReader, WireWriter};

/// Reference to an asset by its ref string (URL or storage-relative name).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetReference(pub String);

/// An ordered list of asset references. The textual form joins refs with
/// `";"`, so the separator cannot appear inside a ref.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetReferenceList(pub Vec<AssetReference>);

/// Reference to an entity, either by decimal id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityReference(pub String);

impl EntityReference {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The referenced entity id, when the ref is a decimal id.
    #[must_use]
    pub fn entity_id(&self) -> Option<u32> {
        self.0.trim().parse::<u32>().ok().filter(|id| *id != 0)
    }
}

/// A schema-less value. Deserialization always produces the string form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Variant(pub String);

/// Numeric type tags of the closed attribute kind set.
///
/// The values are part of the wire protocol and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum AttributeTypeId {
    String = 1,
    Int = 2,
    Real = 3,
    Color = 4,
    Float2 = 5,
    Float3 = 6,
    Float4 = 7,
    Bool = 8,
    UInt = 9,
    Quat = 10,
    AssetReference = 11,
    AssetReferenceList = 12,
    EntityReference = 13,
    Variant = 14,
    VariantList = 15,
    Transform = 16,
    Point = 17,
}

const TYPE_TABLE: [(AttributeTypeId, &str); 17] = [
    (AttributeTypeId::String, "string"),
    (AttributeTypeId::Int, "int"),
    (AttributeTypeId::Real, "real"),
    (AttributeTypeId::Color, "Color"),
    (AttributeTypeId::Float2, "float2"),
    (AttributeTypeId::Float3, "float3"),
    (AttributeTypeId::Float4, "float4"),
    (AttributeTypeId::Bool, "bool"),
    (AttributeTypeId::UInt, "uint"),
    (AttributeTypeId::Quat, "Quat"),
    (AttributeTypeId::AssetReference, "AssetReference"),
    (AttributeTypeId::AssetReferenceList, "AssetReferenceList"),
    (AttributeTypeId::EntityReference, "EntityReference"),
    (AttributeTypeId::Variant, "Variant"),
    (AttributeTypeId::VariantList, "VariantList"),
    (AttributeTypeId::Transform, "Transform"),
    (AttributeTypeId::Point, "Point"),
];

impl AttributeTypeId {
    /// The canonical type name, as written into scene documents.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        TYPE_TABLE
            .iter()
            .find(|(id, _)| *id == self)
            .map(|(_, name)| *name)
            .unwrap_or("")
    }

    /// Case-insensitive lookup by type name.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<AttributeTypeId> {
        TYPE_TABLE
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    #[must_use]
    pub fn from_u32(raw: u32) -> Option<AttributeTypeId> {
        TYPE_TABLE.iter().find(|(id, _)| *id as u32 == raw).map(|(id, _)| *id)
    }
}

/// All attribute type names accepted by dynamic attribute creation.
#[must_use]
pub fn attribute_type_names() -> Vec<&'static str> {
    TYPE_TABLE.iter().map(|(_, name)| *name).collect()
}

/// The payload of an attribute: a closed tagged union over the kind set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Int(i32),
    Real(f32),
    Color(Color),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Bool(bool),
    UInt(u32),
    Quat(Quat),
    AssetReference(AssetReference),
    AssetReferenceList(AssetReferenceList),
    EntityReference(EntityReference),
    Variant(Variant),
    VariantList(Vec<Variant>),
    Transform(Transform),
    Point(IVec2),
}

impl AttributeValue {
    #[must_use]
    pub fn type_id(&self) -> AttributeTypeId {
        match self {
            AttributeValue::String(_) => AttributeTypeId::String,
            AttributeValue::Int(_) => AttributeTypeId::Int,
            AttributeValue::Real(_) => AttributeTypeId::Real,
            AttributeValue::Color(_) => AttributeTypeId::Color,
            AttributeValue::Float2(_) => AttributeTypeId::Float2,
            AttributeValue::Float3(_) => AttributeTypeId::Float3,
            AttributeValue::Float4(_) => AttributeTypeId::Float4,
            AttributeValue::Bool(_) => AttributeTypeId::Bool,
            AttributeValue::UInt(_) => AttributeTypeId::UInt,
            AttributeValue::Quat(_) => AttributeTypeId::Quat,
            AttributeValue::AssetReference(_) => AttributeTypeId::AssetReference,
            AttributeValue::AssetReferenceList(_) => AttributeTypeId::AssetReferenceList,
            AttributeValue::EntityReference(_) => AttributeTypeId::EntityReference,
            AttributeValue::Variant(_) => AttributeTypeId::Variant,
            AttributeValue::VariantList(_) => AttributeTypeId::VariantList,
            AttributeValue::Transform(_) => AttributeTypeId::Transform,
            AttributeValue::Point(_) => AttributeTypeId::Point,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_id().type_name()
    }

    /// The zero/empty default for a kind.
    #[must_use]
    pub fn default_for(type_id: AttributeTypeId) -> AttributeValue {
        match type_id {
            AttributeTypeId::String => AttributeValue::String(String::new()),
            AttributeTypeId::Int => AttributeValue::Int(0),
            AttributeTypeId::Real => AttributeValue::Real(0.0),
            AttributeTypeId::Color => AttributeValue::Color(Color::default()),
            AttributeTypeId::Float2 => AttributeValue::Float2(Vec2::ZERO),
            AttributeTypeId::Float3 => AttributeValue::Float3(Vec3::ZERO),
            AttributeTypeId::Float4 => AttributeValue::Float4(Vec4::ZERO),
            AttributeTypeId::Bool => AttributeValue::Bool(false),
            AttributeTypeId::UInt => AttributeValue::UInt(0),
            AttributeTypeId::Quat => AttributeValue::Quat(Quat::IDENTITY),
            AttributeTypeId::AssetReference => {
                AttributeValue::AssetReference(AssetReference::default())
            }
            AttributeTypeId::AssetReferenceList => {
                AttributeValue::AssetReferenceList(AssetReferenceList::default())
            }
            AttributeTypeId::EntityReference => {
                AttributeValue::EntityReference(EntityReference::default())
            }
            AttributeTypeId::Variant => AttributeValue::Variant(Variant::default()),
            AttributeTypeId::VariantList => AttributeValue::VariantList(Vec::new()),
            AttributeTypeId::Transform => AttributeValue::Transform(Transform::IDENTITY),
            AttributeTypeId::Point => AttributeValue::Point(IVec2::ZERO),
        }
    }

    /// The canonical, locale-independent string form of the value.
    #[must_use]
    pub fn to_string_value(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Int(v) => v.to_string(),
            AttributeValue::Real(v) => v.to_string(),
            AttributeValue::Color(c) => c.to_string(),
            AttributeValue::Float2(v) => scene_math::vec2_to_string(*v),
            AttributeValue::Float3(v) => scene_math::vec3_to_string(*v),
            AttributeValue::Float4(v) => scene_math::vec4_to_string(*v),
            AttributeValue::Bool(v) => if *v { "true" } else { "false" }.to_string(),
            AttributeValue::UInt(v) => v.to_string(),
            AttributeValue::Quat(q) => scene_math::quat_to_string(*q),
            AttributeValue::AssetReference(r) => r.0.clone(),
            AttributeValue::AssetReferenceList(list) => list
                .0
                .iter()
                .map(|r| r.0.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            AttributeValue::EntityReference(r) => r.0.clone(),
            AttributeValue::Variant(v) => v.0.clone(),
            AttributeValue::VariantList(list) => list
                .iter()
                .map(|v| v.0.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            AttributeValue::Transform(t) => t.to_string(),
            AttributeValue::Point(p) => scene_math::point_to_string(*p),
        }
    }

    /// Parses the string form of a kind. Parsing is lossy in the same way
    /// the textual scene format has always been: unparseable numerics fall
    /// back to the kind's default rather than failing the whole document.
    #[must_use]
    pub fn from_string(type_id: AttributeTypeId, s: &str) -> AttributeValue {
        match type_id {
            AttributeTypeId::String => AttributeValue::String(s.to_string()),
            AttributeTypeId::Int => AttributeValue::Int(s.trim().parse().unwrap_or(0)),
            AttributeTypeId::Real => AttributeValue::Real(s.trim().parse().unwrap_or(0.0)),
            AttributeTypeId::Color => {
                AttributeValue::Color(Color::from_str_lossy(s).unwrap_or_default())
            }
            AttributeTypeId::Float2 => {
                AttributeValue::Float2(scene_math::vec2_from_str(s).unwrap_or(Vec2::ZERO))
            }
            AttributeTypeId::Float3 => {
                AttributeValue::Float3(scene_math::vec3_from_str(s).unwrap_or(Vec3::ZERO))
            }
            AttributeTypeId::Float4 => {
                AttributeValue::Float4(scene_math::vec4_from_str(s).unwrap_or(Vec4::ZERO))
            }
            AttributeTypeId::Bool => {
                let t = s.trim();
                AttributeValue::Bool(t.eq_ignore_ascii_case("true") || t == "1")
            }
            AttributeTypeId::UInt => AttributeValue::UInt(s.trim().parse().unwrap_or(0)),
            AttributeTypeId::Quat => {
                AttributeValue::Quat(scene_math::quat_from_str(s).unwrap_or(Quat::IDENTITY))
            }
            AttributeTypeId::AssetReference => {
                AttributeValue::AssetReference(AssetReference(s.to_string()))
            }
            AttributeTypeId::AssetReferenceList => {
                AttributeValue::AssetReferenceList(AssetReferenceList(
                    split_list(s).map(|e| AssetReference(e.to_string())).collect(),
                ))
            }
            AttributeTypeId::EntityReference => {
                AttributeValue::EntityReference(EntityReference(s.to_string()))
            }
            AttributeTypeId::Variant => AttributeValue::Variant(Variant(s.to_string())),
            AttributeTypeId::VariantList => AttributeValue::VariantList(
                split_list(s).map(|e| Variant(e.to_string())).collect(),
            ),
            AttributeTypeId::Transform => {
                AttributeValue::Transform(Transform::from_str_lossy(s).unwrap_or_default())
            }
            AttributeTypeId::Point => {
                AttributeValue::Point(scene_math::point_from_str(s).unwrap_or(IVec2::ZERO))
            }
        }
    }

    /// Writes the fixed-width/length-prefixed binary encoding of the value.
    pub fn write_binary(&self, w: &mut WireWriter) {
        match self {
            AttributeValue::String(s) => w.write_str16(s),
            AttributeValue::Int(v) => w.write_i32(*v),
            AttributeValue::Real(v) => w.write_f32(*v),
            AttributeValue::Color(c) => {
                w.write_f32(c.r);
                w.write_f32(c.g);
                w.write_f32(c.b);
                w.write_f32(c.a);
            }
            AttributeValue::Float2(v) => {
                w.write_f32(v.x);
                w.write_f32(v.y);
            }
            AttributeValue::Float3(v) => {
                w.write_f32(v.x);
                w.write_f32(v.y);
                w.write_f32(v.z);
            }
            AttributeValue::Float4(v) => {
                w.write_f32(v.x);
                w.write_f32(v.y);
                w.write_f32(v.z);
                w.write_f32(v.w);
            }
            AttributeValue::Bool(v) => w.write_u8(u8::from(*v)),
            AttributeValue::UInt(v) => w.write_u32(*v),
            AttributeValue::Quat(q) => {
                w.write_f32(q.x);
                w.write_f32(q.y);
                w.write_f32(q.z);
                w.write_f32(q.w);
            }
            AttributeValue::AssetReference(r) => w.write_str8(&r.0),
            AttributeValue::AssetReferenceList(list) => {
                w.write_u8(list.0.len().min(255) as u8);
                for r in list.0.iter().take(255) {
                    w.write_str8(&r.0);
                }
            }
            AttributeValue::EntityReference(r) => w.write_str8(&r.0),
            AttributeValue::Variant(v) => w.write_str8(&v.0),
            AttributeValue::VariantList(list) => {
                w.write_u8(list.len().min(255) as u8);
                for v in list.iter().take(255) {
                    w.write_str8(&v.0);
                }
            }
            AttributeValue::Transform(t) => {
                for f in [
                    t.pos.x, t.pos.y, t.pos.z, t.rot.x, t.rot.y, t.rot.z, t.scale.x, t.scale.y,
                    t.scale.z,
                ] {
                    w.write_f32(f);
                }
            }
            AttributeValue::Point(p) => {
                w.write_i32(p.x);
                w.write_i32(p.y);
            }
        }
    }

    /// Reads the binary encoding of a kind.
    pub fn read_binary(
        type_id: AttributeTypeId,
        r: &mut WireReader<'_>,
    ) -> Result<AttributeValue, WireError> {
        Ok(match type_id {
            AttributeTypeId::String => AttributeValue::String(r.read_str16()?),
            AttributeTypeId::Int => AttributeValue::Int(r.read_i32()?),
            AttributeTypeId::Real => AttributeValue::Real(r.read_f32()?),
            AttributeTypeId::Color => AttributeValue::Color(Color::new(
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
            )),
            AttributeTypeId::Float2 => {
                AttributeValue::Float2(Vec2::new(r.read_f32()?, r.read_f32()?))
            }
            AttributeTypeId::Float3 => {
                AttributeValue::Float3(Vec3::new(r.read_f32()?, r.read_f32()?, r.read_f32()?))
            }
            AttributeTypeId::Float4 => AttributeValue::Float4(Vec4::new(
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
            )),
            AttributeTypeId::Bool => AttributeValue::Bool(r.read_u8()? != 0),
            AttributeTypeId::UInt => AttributeValue::UInt(r.read_u32()?),
            AttributeTypeId::Quat => AttributeValue::Quat(Quat::from_xyzw(
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
                r.read_f32()?,
            )),
            AttributeTypeId::AssetReference => {
                AttributeValue::AssetReference(AssetReference(r.read_str8()?))
            }
            AttributeTypeId::AssetReferenceList => {
                let count = r.read_u8()?;
                let mut list = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    list.push(AssetReference(r.read_str8()?));
                }
                AttributeValue::AssetReferenceList(AssetReferenceList(list))
            }
            AttributeTypeId::EntityReference => {
                AttributeValue::EntityReference(EntityReference(r.read_str8()?))
            }
            AttributeTypeId::Variant => AttributeValue::Variant(Variant(r.read_str8()?)),
            AttributeTypeId::VariantList => {
                let count = r.read_u8()?;
                let mut list = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    list.push(Variant(r.read_str8()?));
                }
                AttributeValue::VariantList(list)
            }
            AttributeTypeId::Transform => {
                let mut f = [0f32; 9];
                for slot in &mut f {
                    *slot = r.read_f32()?;
                }
                AttributeValue::Transform(Transform::new(
                    Vec3::new(f[0], f[1], f[2]),
                    Vec3::new(f[3], f[4], f[5]),
                    Vec3::new(f[6], f[7], f[8]),
                ))
            }
            AttributeTypeId::Point => {
                AttributeValue::Point(IVec2::new(r.read_i32()?, r.read_i32()?))
            }
        })
    }

    /// Interpolates between two endpoint values of the same kind.
    ///
    /// Linear for scalars/vectors, shortest-arc spherical for quaternions
    /// and transform orientations. Returns `None` for kinds that do not
    /// interpolate (strings, references, variants, lists) and when the
    /// endpoint kinds disagree.
    #[must_use]
    pub fn interpolate(start: &AttributeValue, end: &AttributeValue, t: f32) -> Option<AttributeValue> {
        use AttributeValue as V;
        Some(match (start, end) {
            (V::Int(a), V::Int(b)) => {
                V::Int((*a as f32 + (*b as f32 - *a as f32) * t).round() as i32)
            }
            (V::UInt(a), V::UInt(b)) => {
                V::UInt((*a as f32 + (*b as f32 - *a as f32) * t).round().max(0.0) as u32)
            }
            (V::Real(a), V::Real(b)) => V::Real(a + (b - a) * t),
            (V::Color(a), V::Color(b)) => V::Color(a.lerp(*b, t)),
            (V::Float2(a), V::Float2(b)) => V::Float2(a.lerp(*b, t)),
            (V::Float3(a), V::Float3(b)) => V::Float3(a.lerp(*b, t)),
            (V::Float4(a), V::Float4(b)) => V::Float4(a.lerp(*b, t)),
            (V::Quat(a), V::Quat(b)) => V::Quat(a.slerp(*b, t)),
            (V::Transform(a), V::Transform(b)) => V::Transform(Transform::interpolate(a, b, t)),
            (V::Point(a), V::Point(b)) => V::Point(IVec2::new(
                (a.x as f32 + (b.x as f32 - a.x as f32) * t).round() as i32,
                (a.y as f32 + (b.y as f32 - a.y as f32) * t).round() as i32,
            )),
            _ => return None,
        })
    }

    /// Whether the kind supports interpolation at all.
    #[must_use]
    pub fn is_interpolable_kind(type_id: AttributeTypeId) -> bool {
        !matches!(
            type_id,
            AttributeTypeId::String
                | AttributeTypeId::Bool
                | AttributeTypeId::AssetReference
                | AttributeTypeId::AssetReferenceList
                | AttributeTypeId::EntityReference
                | AttributeTypeId::Variant
                | AttributeTypeId::VariantList
        )
    }
}

/// Splits a `";"`-joined list value; a single empty element means an empty
/// list, so `""` round-trips to zero elements.
fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(';').filter(move |e| !(s.len() == e.len() && e.trim().is_empty()))
}

/// Errors from attribute-level operations.
#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("type mismatch: attribute is {expected}, assigned value is {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
}

/// How the scene interpolation scheduler may treat an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// The attribute snaps to set values directly.
    #[default]
    None,
    /// The attribute may be driven by [`Scene::start_attribute_interpolation`](crate::Scene::start_attribute_interpolation).
    Interpolate,
}

/// Static metadata attached to an attribute cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeMetadata {
    pub interpolation: InterpolationMode,
}

impl AttributeMetadata {
    #[must_use]
    pub fn interpolated() -> Self {
        Self {
            interpolation: InterpolationMode::Interpolate,
        }
    }
}

/// A typed, named, indexed cell inside a component.
///
/// The `id` is the stable property key used by serialization; `name` is the
/// human-readable label shown in editors. For dynamically created attributes
/// the two are the same. The type tag is fixed at construction: assignment
/// of a differently tagged value is rejected.
#[derive(Debug, Clone)]
pub struct Attribute {
    id: String,
    name: String,
    index: u8,
    dynamic: bool,
    value_changed: bool,
    metadata: AttributeMetadata,
    /// Declared type name of a placeholder cell whose payload is kept as an
    /// uninterpreted string; `None` for ordinary typed cells.
    declared_type: Option<String>,
    value: AttributeValue,
}

impl Attribute {
    /// A compiled-in (static) attribute cell.
    #[must_use]
    pub fn new(id: &str, name: &str, value: AttributeValue) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            index: 0,
            dynamic: false,
            value_changed: true,
            metadata: AttributeMetadata::default(),
            declared_type: None,
            value,
        }
    }

    /// A runtime-created attribute cell; name is the same as the id.
    #[must_use]
    pub fn new_dynamic(id: &str, value: AttributeValue) -> Self {
        Self {
            dynamic: true,
            ..Self::new(id, id, value)
        }
    }

    /// A cell preserving unknown data verbatim: the declared type name and
    /// the raw value string are kept as-is so the document round-trips even
    /// though no native kind interprets it.
    #[must_use]
    pub fn new_verbatim(id: &str, name: &str, declared_type: &str, raw_value: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            index: 0,
            dynamic: true,
            value_changed: true,
            metadata: AttributeMetadata::default(),
            declared_type: Some(declared_type.to_string()),
            value: AttributeValue::String(raw_value.to_string()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Needed when attributes are constructed from document data and the
    /// human-readable name differs from the id.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Index of the cell in the owning component's attribute list.
    #[must_use]
    pub fn index(&self) -> u8 {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: u8) {
        self.index = index;
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    #[must_use]
    pub fn metadata(&self) -> &AttributeMetadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: AttributeMetadata) {
        self.metadata = metadata;
    }

    #[must_use]
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    #[must_use]
    pub fn type_id(&self) -> AttributeTypeId {
        self.value.type_id()
    }

    /// The serialized type name; for verbatim cells this is the declared
    /// name from the source document, not the storage kind.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.declared_type
            .as_deref()
            .unwrap_or_else(|| self.value.type_name())
    }

    /// Assigns a value of the same kind; marks the change bit.
    pub fn set_value(&mut self, value: AttributeValue) -> Result<(), AttributeError> {
        if value.type_id() != self.value.type_id() {
            return Err(AttributeError::TypeMismatch {
                expected: self.value.type_name(),
                got: value.type_name(),
            });
        }
        self.value = value;
        self.value_changed = true;
        Ok(())
    }

    /// Parses and assigns the canonical string form, preserving the kind.
    pub fn parse_assign(&mut self, s: &str) {
        if self.declared_type.is_some() {
            // Verbatim cells keep the raw text untouched.
            self.value = AttributeValue::String(s.to_string());
        } else {
            self.value = AttributeValue::from_string(self.value.type_id(), s);
        }
        self.value_changed = true;
    }

    /// The canonical string form of the current value.
    #[must_use]
    pub fn to_string_value(&self) -> String {
        self.value.to_string_value()
    }

    pub fn write_binary(&self, w: &mut WireWriter) {
        self.value.write_binary(w);
    }

    /// Reads and assigns the binary form, preserving the kind.
    pub fn read_binary_assign(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.value = AttributeValue::read_binary(self.value.type_id(), r)?;
        self.value_changed = true;
        Ok(())
    }

    /// Whether the scene may animate this attribute.
    #[must_use]
    pub fn is_interpolated(&self) -> bool {
        self.metadata.interpolation == InterpolationMode::Interpolate
            && AttributeValue::is_interpolable_kind(self.value.type_id())
    }

    /// True if the value changed and the owning component has not yet
    /// reacted to the change.
    #[must_use]
    pub fn value_changed(&self) -> bool {
        self.value_changed
    }

    /// Acknowledges that the owner has caught up with the current value.
    pub fn clear_changed(&mut self) {
        self.value_changed = false;
    }
}

/// Blueprint for one static attribute of a registered component type.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub id: String,
    pub name: String,
    pub default: AttributeValue,
    pub metadata: AttributeMetadata,
}

impl AttributeSpec {
    #[must_use]
    pub fn new(id: &str, name: &str, default: AttributeValue) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            default,
            metadata: AttributeMetadata::default(),
        }
    }

    #[must_use]
    pub fn interpolated(mut self) -> Self {
        self.metadata = AttributeMetadata::interpolated();
        self
    }

    pub(crate) fn instantiate(&self) -> Attribute {
        let mut attr = Attribute::new(&self.id, &self.name, self.default.clone());
        attr.set_metadata(self.metadata);
        attr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_lookup_case_insensitive() {
        assert_eq!(
            AttributeTypeId::from_type_name("quat"),
            Some(AttributeTypeId::Quat)
        );
        assert_eq!(
            AttributeTypeId::from_type_name("ASSETREFERENCE"),
            Some(AttributeTypeId::AssetReference)
        );
        assert_eq!(AttributeTypeId::from_type_name("matrix4"), None);
    }

    #[test]
    fn test_string_roundtrip_all_kinds() {
        let samples = [
            AttributeValue::String("hello world".into()),
            AttributeValue::Int(-5),
            AttributeValue::Real(2.5),
            AttributeValue::Color(Color::new(0.25, 0.5, 0.75, 1.0)),
            AttributeValue::Float2(Vec2::new(1.0, 2.0)),
            AttributeValue::Float3(Vec3::new(1.0, 2.0, 3.0)),
            AttributeValue::Float4(Vec4::new(1.0, 2.0, 3.0, 4.0)),
            AttributeValue::Bool(true),
            AttributeValue::UInt(7),
            AttributeValue::Quat(Quat::from_xyzw(0.0, 1.0, 0.0, 0.0)),
            AttributeValue::AssetReference(AssetReference("local://mesh.dae".into())),
            AttributeValue::AssetReferenceList(AssetReferenceList(vec![
                AssetReference("a.png".into()),
                AssetReference("b.png".into()),
            ])),
            AttributeValue::EntityReference(EntityReference("42".into())),
            AttributeValue::Variant(Variant("free form".into())),
            AttributeValue::VariantList(vec![Variant("x".into()), Variant("y".into())]),
            AttributeValue::Transform(Transform::IDENTITY),
            AttributeValue::Point(IVec2::new(3, -4)),
        ];
        for value in samples {
            let text = value.to_string_value();
            let parsed = AttributeValue::from_string(value.type_id(), &text);
            assert_eq!(parsed, value, "kind {:?}", value.type_id());
        }
    }

    #[test]
    fn test_empty_list_roundtrip() {
        let empty = AttributeValue::AssetReferenceList(AssetReferenceList(Vec::new()));
        let text = empty.to_string_value();
        assert_eq!(text, "");
        assert_eq!(
            AttributeValue::from_string(AttributeTypeId::AssetReferenceList, &text),
            empty
        );
    }

    #[test]
    fn test_binary_roundtrip_all_kinds() {
        let samples = [
            AttributeValue::String("payload äöü".into()),
            AttributeValue::Int(i32::MIN),
            AttributeValue::Real(-0.125),
            AttributeValue::Color(Color::RED),
            AttributeValue::Float3(Vec3::new(-1.0, 0.5, 100.0)),
            AttributeValue::Bool(true),
            AttributeValue::UInt(u32::MAX),
            AttributeValue::Quat(Quat::IDENTITY),
            AttributeValue::AssetReferenceList(AssetReferenceList(vec![AssetReference(
                "x.mesh".into(),
            )])),
            AttributeValue::VariantList(vec![Variant("1".into()), Variant("2".into())]),
            AttributeValue::Transform(Transform::IDENTITY),
            AttributeValue::Point(IVec2::new(-7, 9)),
        ];
        for value in samples {
            let mut w = WireWriter::new();
            value.write_binary(&mut w);
            let bytes = w.into_bytes();
            let mut r = WireReader::new(&bytes);
            let back = AttributeValue::read_binary(value.type_id(), &mut r).unwrap();
            assert_eq!(back, value, "kind {:?}", value.type_id());
            assert!(r.is_at_end());
        }
    }

    #[test]
    fn test_set_value_rejects_wrong_kind() {
        let mut attr = Attribute::new("health", "Health", AttributeValue::Real(1.0));
        let err = attr.set_value(AttributeValue::Int(2)).unwrap_err();
        assert!(matches!(err, AttributeError::TypeMismatch { .. }));
        assert_eq!(attr.value(), &AttributeValue::Real(1.0));
    }

    #[test]
    fn test_change_bit() {
        let mut attr = Attribute::new("health", "Health", AttributeValue::Real(1.0));
        attr.clear_changed();
        assert!(!attr.value_changed());
        attr.set_value(AttributeValue::Real(2.0)).unwrap();
        assert!(attr.value_changed());
    }

    #[test]
    fn test_interpolate_scalar_and_quat() {
        let five = AttributeValue::interpolate(
            &AttributeValue::Real(0.0),
            &AttributeValue::Real(10.0),
            0.5,
        );
        assert_eq!(five, Some(AttributeValue::Real(5.0)));

        let half_turn = AttributeValue::interpolate(
            &AttributeValue::Quat(Quat::IDENTITY),
            &AttributeValue::Quat(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
            0.5,
        );
        match half_turn {
            Some(AttributeValue::Quat(q)) => {
                let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
                assert!(q.angle_between(expected) < 1e-4);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_interpolate_undefined_for_strings() {
        assert_eq!(
            AttributeValue::interpolate(
                &AttributeValue::String("a".into()),
                &AttributeValue::String("b".into()),
                0.5
            ),
            None
        );
    }

    #[test]
    fn test_verbatim_cell_preserves_raw_text() {
        let mut attr = Attribute::new_verbatim("mask", "mask", "BitField", "0xFF 0x0F");
        assert_eq!(attr.type_name(), "BitField");
        assert_eq!(attr.to_string_value(), "0xFF 0x0F");
        attr.parse_assign("0x00");
        assert_eq!(attr.to_string_value(), "0x00");
        assert_eq!(attr.type_name(), "BitField");
    }
}
