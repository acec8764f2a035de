//! Background color parsing and FFmpeg color formatting.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors from color parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("Color must be six hex digits (e.g. #112233), got '{0}'")]
    Invalid(String),
}

/// A validated 6-hex-digit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const BLACK: HexColor = HexColor { r: 0, g: 0, b: 0 };

    /// Parse `#RRGGBB` or `RRGGBB`, case-insensitive.
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::Invalid(input.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| ColorError::Invalid(input.to_string()))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// FFmpeg color syntax (`0xRRGGBB`).
    pub fn to_ffmpeg(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HexColor::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for HexColor {
    fn schema_name() -> String {
        "HexColor".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// An explicit fill color with alpha, used by fixed decorative regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Alpha (0.0 transparent .. 1.0 opaque)
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// FFmpeg color syntax with alpha (`0xRRGGBB@0.50`).
    pub fn to_ffmpeg(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}@{:.2}", self.r, self.g, self.b, self.a.clamp(0.0, 1.0))
    }
}

impl From<HexColor> for Rgba {
    fn from(c: HexColor) -> Self {
        Rgba::new(c.r, c.g, c.b, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_hash() {
        assert_eq!(HexColor::parse("#112233").unwrap(), HexColor { r: 0x11, g: 0x22, b: 0x33 });
        assert_eq!(HexColor::parse("aabbcc").unwrap(), HexColor { r: 0xaa, g: 0xbb, b: 0xcc });
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(HexColor::parse("#12345").is_err());
        assert!(HexColor::parse("#1234567").is_err());
        assert!(HexColor::parse("#GG0000").is_err());
        assert!(HexColor::parse("red").is_err());
        assert!(HexColor::parse("").is_err());
    }

    #[test]
    fn test_formatting() {
        let color = HexColor::parse("#0a0B0c").unwrap();
        assert_eq!(color.to_string(), "#0A0B0C");
        assert_eq!(color.to_ffmpeg(), "0x0A0B0C");
        assert_eq!(Rgba::new(255, 255, 255, 0.5).to_ffmpeg(), "0xFFFFFF@0.50");
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = serde_json::to_string(&HexColor::parse("#112233").unwrap()).unwrap();
        assert_eq!(json, "\"#112233\"");
        assert!(serde_json::from_str::<HexColor>("\"nope\"").is_err());
    }
}
