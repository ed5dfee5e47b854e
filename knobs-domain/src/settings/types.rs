//! Setting value types and their storage codecs.
//!
//! A [`SettingValue`] is the in-memory form of a setting; a [`StoredValue`] is
//! the primitive form a [`SettingsStorage`](super::storage::SettingsStorage)
//! backend accepts. Every [`SettingType`] owns exactly one codec pair,
//! [`SettingType::to_stored`] and [`SettingType::from_stored`].

use knobs_core::types::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of types a setting can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingType {
    String,
    Int,
    Double,
    Bool,
    StringList,
    Color,
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingType::String => "String",
            SettingType::Int => "Int",
            SettingType::Double => "Double",
            SettingType::Bool => "Bool",
            SettingType::StringList => "StringList",
            SettingType::Color => "Color",
        };
        f.write_str(name)
    }
}

/// A live setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum SettingValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    StringList(Vec<String>),
    Color(Color),
}

impl SettingValue {
    pub fn setting_type(&self) -> SettingType {
        match self {
            SettingValue::String(_) => SettingType::String,
            SettingValue::Int(_) => SettingType::Int,
            SettingValue::Double(_) => SettingType::Double,
            SettingValue::Bool(_) => SettingType::Bool,
            SettingValue::StringList(_) => SettingType::StringList,
            SettingValue::Color(_) => SettingType::Color,
        }
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Double(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        SettingValue::StringList(value)
    }
}

impl From<Color> for SettingValue {
    fn from(value: Color) -> Self {
        SettingValue::Color(value)
    }
}

/// The primitive kinds a storage backend holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoredKind {
    String,
    Int,
    Double,
    Bool,
    StringList,
}

impl fmt::Display for StoredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoredKind::String => "String",
            StoredKind::Int => "Int",
            StoredKind::Double => "Double",
            StoredKind::Bool => "Bool",
            StoredKind::StringList => "StringList",
        };
        f.write_str(name)
    }
}

/// A value in storable form.
///
/// Serialized untagged, so an exported map reads as plain JSON:
/// `{"theme_mode": "dark", "font_size": 14}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    StringList(Vec<String>),
}

impl StoredValue {
    pub fn kind(&self) -> StoredKind {
        match self {
            StoredValue::String(_) => StoredKind::String,
            StoredValue::Int(_) => StoredKind::Int,
            StoredValue::Double(_) => StoredKind::Double,
            StoredValue::Bool(_) => StoredKind::Bool,
            StoredValue::StringList(_) => StoredKind::StringList,
        }
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::String(value.to_string())
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        StoredValue::Int(value)
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        StoredValue::Bool(value)
    }
}

impl SettingType {
    /// The kind this type is persisted as. Colors are packed into an `Int`.
    pub fn stored_kind(&self) -> StoredKind {
        match self {
            SettingType::String => StoredKind::String,
            SettingType::Int | SettingType::Color => StoredKind::Int,
            SettingType::Double => StoredKind::Double,
            SettingType::Bool => StoredKind::Bool,
            SettingType::StringList => StoredKind::StringList,
        }
    }

    /// Encodes `value` for storage, or `None` when it is not of this type.
    pub fn to_stored(&self, value: &SettingValue) -> Option<StoredValue> {
        match (self, value) {
            (SettingType::String, SettingValue::String(s)) => Some(StoredValue::String(s.clone())),
            (SettingType::Int, SettingValue::Int(i)) => Some(StoredValue::Int(*i)),
            (SettingType::Double, SettingValue::Double(d)) => Some(StoredValue::Double(*d)),
            (SettingType::Bool, SettingValue::Bool(b)) => Some(StoredValue::Bool(*b)),
            (SettingType::StringList, SettingValue::StringList(l)) => {
                Some(StoredValue::StringList(l.clone()))
            }
            (SettingType::Color, SettingValue::Color(c)) => Some(StoredValue::Int(c.to_i64())),
            _ => None,
        }
    }

    /// Decodes a stored value, or `None` when it cannot represent this type.
    ///
    /// Only lossless widening is accepted: an `Int` decodes as a `Double`.
    pub fn from_stored(&self, stored: &StoredValue) -> Option<SettingValue> {
        match (self, stored) {
            (SettingType::String, StoredValue::String(s)) => Some(SettingValue::String(s.clone())),
            (SettingType::Int, StoredValue::Int(i)) => Some(SettingValue::Int(*i)),
            (SettingType::Double, StoredValue::Double(d)) => Some(SettingValue::Double(*d)),
            (SettingType::Double, StoredValue::Int(i)) => Some(SettingValue::Double(*i as f64)),
            (SettingType::Bool, StoredValue::Bool(b)) => Some(SettingValue::Bool(*b)),
            (SettingType::StringList, StoredValue::StringList(l)) => {
                Some(SettingValue::StringList(l.clone()))
            }
            (SettingType::Color, StoredValue::Int(i)) => {
                Color::try_from_i64(*i).ok().map(SettingValue::Color)
            }
            _ => None,
        }
    }
}
