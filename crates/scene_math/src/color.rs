//! RGBA color attribute payload.

use serde::{Deserialize, Serialize};

use crate::parse::{format_floats, parse_floats};

/// A 4-component color; component values are floating points in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);
    pub const GRAY: Color = Color::new(0.5, 0.5, 0.5, 1.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parses a color from `"r,g,b,a"` or `"r,g,b"` (alpha defaults to 1),
    /// with the usual tolerant separators.
    pub fn from_str_lossy(s: &str) -> Option<Color> {
        match parse_floats(s)[..] {
            [r, g, b, a, ..] => Some(Color::new(r, g, b, a)),
            [r, g, b] => Some(Color::new(r, g, b, 1.0)),
            _ => None,
        }
    }

    /// Componentwise linear interpolation.
    #[must_use]
    pub fn lerp(self, rhs: Color, t: f32) -> Color {
        Color::new(
            self.r + (rhs.r - self.r) * t,
            self.g + (rhs.g - self.g) * t,
            self.b + (rhs.b - self.b) * t,
            self.a + (rhs.a - self.a) * t,
        )
    }
}

impl Default for Color {
    /// Opaque black.
    fn default() -> Self {
        Color::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl std::fmt::Display for Color {
    /// Canonical serialized form: `"r,g,b,a"`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_floats(&[self.r, self.g, self.b, self.a], ','))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_opaque_black() {
        let c = Color::default();
        assert_eq!(c, Color::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_string_roundtrip() {
        let c = Color::new(0.333, 0.667, 0.333, 1.0);
        assert_eq!(Color::from_str_lossy(&c.to_string()), Some(c));
    }

    #[test]
    fn test_three_component_form() {
        assert_eq!(
            Color::from_str_lossy("1 0 0"),
            Some(Color::new(1.0, 0.0, 0.0, 1.0))
        );
    }

    #[test]
    fn test_lerp_midpoint() {
        let mid = Color::BLACK.lerp(Color::WHITE, 0.5);
        assert!((mid.r - 0.5).abs() < 1e-6);
        assert!((mid.a - 1.0).abs() < 1e-6);
    }
}
