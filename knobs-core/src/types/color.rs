//! Packed ARGB color values.
//!
//! [`Color`] stores a color as a single `0xAARRGGBB` word, the same shape
//! settings backends persist it in. Colors parse from and serialize to hex
//! strings (`#RGB`, `#RRGGBB` or `#AARRGGBB`).
//!
//! ```
//! use knobs_core::types::Color;
//! use std::str::FromStr;
//!
//! let accent = Color::from_str("#3366ff").unwrap();
//! assert_eq!(accent.argb(), 0xFF3366FF);
//! assert_eq!(accent.to_hex(), "#ff3366ff");
//!
//! let translucent = Color::from_argb(0x80, 0, 0, 0);
//! assert_eq!(translucent.alpha(), 0x80);
//! ```

use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// Error type for color parsing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    /// Missing leading '#' or otherwise malformed input.
    #[error("Invalid hex color string format: '{0}'. Expected #RGB, #RRGGBB, or #AARRGGBB.")]
    InvalidHexFormat(String),

    /// A component contained a non-hex digit.
    #[error("Invalid hex digit in '{input_str}': {source}")]
    InvalidHexDigit {
        input_str: String,
        #[source]
        source: ParseIntError,
    },

    /// Wrong number of digits after '#'.
    #[error("Invalid hex color string length: '{0}'. Expected 3, 6, or 8 characters after '#'.")]
    InvalidHexLength(String),

    /// A packed integer does not fit in 32 bits.
    #[error("Color value out of range: {0}")]
    OutOfRange(i64),
}

/// An sRGB color with alpha, packed as `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const TRANSPARENT: Color = Color(0x0000_0000);

    /// Wraps a packed `0xAARRGGBB` value.
    pub const fn from_u32(argb: u32) -> Self {
        Color(argb)
    }

    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Opaque color from 8-bit channels.
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(0xFF, r, g, b)
    }

    /// Converts a persisted integer back into a color.
    ///
    /// # Errors
    ///
    /// [`ColorParseError::OutOfRange`] when `value` is negative or wider than 32 bits.
    pub fn try_from_i64(value: i64) -> Result<Self, ColorParseError> {
        u32::try_from(value)
            .map(Color)
            .map_err(|_| ColorParseError::OutOfRange(value))
    }

    pub const fn argb(&self) -> u32 {
        self.0
    }

    /// The packed value widened for integer storage backends.
    pub const fn to_i64(&self) -> i64 {
        self.0 as i64
    }

    pub const fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(&self) -> u8 {
        self.0 as u8
    }

    /// Returns the same color with a different alpha channel.
    pub const fn with_alpha(&self, alpha: u8) -> Self {
        Color((self.0 & 0x00FF_FFFF) | ((alpha as u32) << 24))
    }

    /// Lowercase `#aarrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:08x}", self.0)
    }

    /// Parses `#RGB`, `#RRGGBB` (opaque) or `#AARRGGBB`.
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::InvalidHexFormat(hex.to_string()))?;

        let parse = |s: &str| {
            u32::from_str_radix(s, 16).map_err(|source| ColorParseError::InvalidHexDigit {
                input_str: hex.to_string(),
                source,
            })
        };

        match digits.len() {
            3 => {
                // Each nibble is doubled: #abc -> #aabbcc.
                let mut expanded = String::with_capacity(6);
                for c in digits.chars() {
                    expanded.push(c);
                    expanded.push(c);
                }
                Ok(Color(0xFF00_0000 | parse(&expanded)?))
            }
            6 => Ok(Color(0xFF00_0000 | parse(digits)?)),
            8 => Ok(Color(parse(digits)?)),
            _ => Err(ColorParseError::InvalidHexLength(hex.to_string())),
        }
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<u32> for Color {
    fn from(argb: u32) -> Self {
        Color(argb)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(D::Error::custom)
    }
}
