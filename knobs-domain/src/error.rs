//! Error types for the Knobs domain layer.

use knobs_core::error::CoreError;
use std::path::PathBuf;
use thiserror::Error;

use crate::settings::types::{SettingType, StoredKind};

/// Errors raised by the registry, controller and search index.
///
/// Validation rejections and storage failures during `set()` or
/// `import_all()` are reported as `false` or skipped entries, not as errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings controller has not been initialized")]
    NotInitialized,

    #[error("Settings controller has been disposed")]
    Disposed,

    #[error("Setting not found: '{key}'")]
    NotFound { key: String },

    #[error("Setting '{key}' has type {actual}, requested {expected}")]
    TypeMismatch {
        key: String,
        expected: SettingType,
        actual: SettingType,
    },

    #[error("Search index has not been built")]
    NotBuilt,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Underlying Core Error: {0}")]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Serialization(e.to_string())
    }
}

/// Errors raised by [`SettingsStorage`](crate::settings::storage::SettingsStorage) backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize settings data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored value for '{key}' is not of kind {expected}")]
    WrongKind { key: String, expected: StoredKind },

    #[error("Cannot store non-finite value {value} for '{key}'")]
    NonFiniteDouble { key: String, value: f64 },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::TypeMismatch {
            key: "theme_mode".to_string(),
            expected: SettingType::Bool,
            actual: SettingType::String,
        };
        assert_eq!(
            err.to_string(),
            "Setting 'theme_mode' has type String, requested Bool"
        );
        assert_eq!(
            SettingsError::NotFound { key: "x".into() }.to_string(),
            "Setting not found: 'x'"
        );
    }

    #[test]
    fn test_storage_error_converts_into_settings_error() {
        let storage = StorageError::Unavailable("backend offline".into());
        let err: SettingsError = storage.into();
        assert!(matches!(err, SettingsError::Storage(StorageError::Unavailable(ref m)) if m == "backend offline"));
    }

    #[test]
    fn test_wrong_kind_display() {
        let err = StorageError::WrongKind {
            key: "font_size".into(),
            expected: StoredKind::Int,
        };
        assert_eq!(err.to_string(), "Stored value for 'font_size' is not of kind Int");
    }
}
