//! Value types and string forms used by scene attributes.
//!
//! Attribute payloads that are not plain primitives live here: [`Color`] and
//! [`Transform`], plus the locale-independent parse/format helpers shared by
//! every vector-like attribute type. All numeric formatting uses Rust's
//! shortest-round-trip float display, so a value survives a
//! format-then-parse cycle exactly regardless of system locale.

mod color;
mod parse;
mod transform;

pub use color::Color;
pub use parse::{format_floats, parse_floats, parse_ints};
pub use transform::Transform;

use glam::{IVec2, Quat, Vec2, Vec3, Vec4};

/// Formats a `Vec2` as a space-separated component list, e.g. `"1 2"`.
pub fn vec2_to_string(v: Vec2) -> String {
    format_floats(&[v.x, v.y], ' ')
}

/// Formats a `Vec3` as a space-separated component list, e.g. `"1 2 3"`.
pub fn vec3_to_string(v: Vec3) -> String {
    format_floats(&[v.x, v.y, v.z], ' ')
}

/// Formats a `Vec4` as a space-separated component list.
pub fn vec4_to_string(v: Vec4) -> String {
    format_floats(&[v.x, v.y, v.z, v.w], ' ')
}

/// Formats a quaternion as `"x y z w"`.
pub fn quat_to_string(q: Quat) -> String {
    format_floats(&[q.x, q.y, q.z, q.w], ' ')
}

/// Formats an integer point as `"x y"`.
pub fn point_to_string(p: IVec2) -> String {
    format!("{} {}", p.x, p.y)
}

/// Parses a `Vec2` from a whitespace/comma separated component list.
pub fn vec2_from_str(s: &str) -> Option<Vec2> {
    match parse_floats(s)[..] {
        [x, y, ..] => Some(Vec2::new(x, y)),
        _ => None,
    }
}

/// Parses a `Vec3` from a whitespace/comma separated component list.
pub fn vec3_from_str(s: &str) -> Option<Vec3> {
    match parse_floats(s)[..] {
        [x, y, z, ..] => Some(Vec3::new(x, y, z)),
        _ => None,
    }
}

/// Parses a `Vec4` from a whitespace/comma separated component list.
pub fn vec4_from_str(s: &str) -> Option<Vec4> {
    match parse_floats(s)[..] {
        [x, y, z, w, ..] => Some(Vec4::new(x, y, z, w)),
        _ => None,
    }
}

/// Parses a quaternion from `"x y z w"` (separators as for vectors).
pub fn quat_from_str(s: &str) -> Option<Quat> {
    match parse_floats(s)[..] {
        [x, y, z, w, ..] => Some(Quat::from_xyzw(x, y, z, w)),
        _ => None,
    }
}

/// Parses an integer point from `"x y"`.
pub fn point_from_str(s: &str) -> Option<IVec2> {
    match parse_ints(s)[..] {
        [x, y, ..] => Some(IVec2::new(x, y)),
        _ => None,
    }
}
