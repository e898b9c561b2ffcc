//! Member identity and its derived display color.
//!
//! A room member is known only by the username it joined with. The color is
//! a pure function of that string, so every client renders the same member
//! with the same avatar color without exchanging anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::ValidationError;

/// Saturation used for every avatar color.
const SATURATION: f32 = 0.7;
/// Lightness used for every avatar color.
const LIGHTNESS: f32 = 0.6;

/// A member's username inside a room.
///
/// Uniqueness within a room is not enforced here; two members may share a
/// name and will then share a color too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Build an identity from a username. Blank names are rejected.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two characters, upper-cased, for the avatar badge.
    pub fn initials(&self) -> String {
        self.0.chars().take(2).flat_map(char::to_uppercase).collect()
    }

    /// Display color for this identity.
    pub fn color(&self) -> Color {
        color_of(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ValidationError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 8-bit RGB color for avatar rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS-style `#rrggbb` string.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Map a username to its display color.
///
/// The hue comes from a 32-bit rolling hash over the UTF-16 code units of
/// the name (`h = c + (h << 5) - h`, wrapping), so the result is the same in
/// every process and on every platform. Saturation and lightness are fixed.
/// Distinct names may collide; never use the color as a key.
pub fn color_of(identity: &str) -> Color {
    let hash = identity.encode_utf16().fold(0i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    let hue = hash.rem_euclid(360) as f32 / 360.0;

    let (r, g, b) = hsl_to_rgb(hue, SATURATION, LIGHTNESS);
    Color::rgb(to_channel(r), to_channel(g), to_channel(b))
}

fn to_channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// HSL to RGB conversion helper.
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l); // Achromatic
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (r, g, b)
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 { t += 1.0; }
    if t > 1.0 { t -= 1.0; }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_of_is_deterministic() {
        assert_eq!(color_of("alice"), color_of("alice"));
        assert_eq!(color_of("Bob the builder"), color_of("Bob the builder"));
    }

    #[test]
    fn test_color_of_known_value() {
        // "a" hashes to 97, a yellow-green hue.
        let c = color_of("a");
        assert!(c.g > c.r && c.g > c.b, "expected green-dominant, got {c}");
    }

    #[test]
    fn test_color_of_distinct_names_usually_differ() {
        assert_ne!(color_of("alice"), color_of("bob"));
    }

    #[test]
    fn test_color_of_handles_non_ascii() {
        let c1 = color_of("日本語");
        let c2 = color_of("日本語");
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_color_to_hex() {
        assert_eq!(Color::rgb(255, 0, 16).to_hex(), "#ff0010");
        assert_eq!(Color::rgb(0, 0, 0).to_string(), "#000000");
    }

    #[test]
    fn test_hsl_to_rgb_red() {
        let (r, g, b) = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((r - 1.0).abs() < 0.01);
        assert!(g.abs() < 0.01);
        assert!(b.abs() < 0.01);
    }

    #[test]
    fn test_hsl_to_rgb_achromatic() {
        let (r, g, b) = hsl_to_rgb(0.5, 0.0, 0.4);
        assert_eq!((r, g, b), (0.4, 0.4, 0.4));
    }

    #[test]
    fn test_identity_rejects_blank() {
        assert_eq!(Identity::new(""), Err(ValidationError::EmptyIdentity));
        assert_eq!(Identity::new("   "), Err(ValidationError::EmptyIdentity));
        assert!(Identity::new("alice").is_ok());
    }

    #[test]
    fn test_identity_initials() {
        assert_eq!(Identity::new("alice").unwrap().initials(), "AL");
        assert_eq!(Identity::new("x").unwrap().initials(), "X");
        assert_eq!(Identity::new("élan").unwrap().initials(), "ÉL");
    }

    #[test]
    fn test_identity_color_matches_free_function() {
        let id = Identity::new("carol").unwrap();
        assert_eq!(id.color(), color_of("carol"));
    }

    #[test]
    fn test_identity_serializes_as_plain_string() {
        let id = Identity::new("dave").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dave\"");
        let back: Identity = serde_json::from_str("\"dave\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_identity_deserialize_rejects_blank() {
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
        assert!(serde_json::from_str::<Identity>("\"  \"").is_err());
    }
}
