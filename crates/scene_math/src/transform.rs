//! Rigid transform attribute payload.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::parse::{format_floats, parse_floats};

/// Position, rotation and scale of an object.
///
/// Rotation is stored as Euler angles in degrees (XYZ order), which is what
/// the textual scene format carries; [`Transform::orientation`] converts to a
/// quaternion for composition and interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World-space position.
    pub pos: Vec3,
    /// Euler rotation in degrees, XYZ order.
    pub rot: Vec3,
    /// Per-axis scale factor.
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        pos: Vec3::ZERO,
        rot: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new(pos: Vec3, rot: Vec3, scale: Vec3) -> Self {
        Self { pos, rot, scale }
    }

    /// Returns the rotation as a unit quaternion.
    #[must_use]
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rot.x.to_radians(),
            self.rot.y.to_radians(),
            self.rot.z.to_radians(),
        )
    }

    /// Sets the rotation from a unit quaternion.
    pub fn set_orientation(&mut self, q: Quat) {
        let (x, y, z) = q.to_euler(EulerRot::XYZ);
        self.rot = Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees());
    }

    /// Interpolates between two transforms: position and scale lerp,
    /// orientation slerps along the shortest arc.
    #[must_use]
    pub fn interpolate(start: &Transform, end: &Transform, t: f32) -> Transform {
        let mut result = Transform::new(
            start.pos.lerp(end.pos, t),
            Vec3::ZERO,
            start.scale.lerp(end.scale, t),
        );
        result.set_orientation(start.orientation().slerp(end.orientation(), t));
        result
    }

    /// Parses the nine-float comma list produced by [`Display`](std::fmt::Display).
    pub fn from_str_lossy(s: &str) -> Option<Transform> {
        match parse_floats(s)[..] {
            [px, py, pz, rx, ry, rz, sx, sy, sz, ..] => Some(Transform::new(
                Vec3::new(px, py, pz),
                Vec3::new(rx, ry, rz),
                Vec3::new(sx, sy, sz),
            )),
            _ => None,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::fmt::Display for Transform {
    /// Canonical form: `"px,py,pz,rx,ry,rz,sx,sy,sz"`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_floats(
            &[
                self.pos.x,
                self.pos.y,
                self.pos.z,
                self.rot.x,
                self.rot.y,
                self.rot.z,
                self.scale.x,
                self.scale.y,
                self.scale.z,
            ],
            ',',
        ))
    }
}
