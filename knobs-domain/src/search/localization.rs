//! Localization lookup used by the search index.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::fs as tokio_fs;

use crate::error::{SettingsError, StorageError};

/// Resolves title and subtitle keys to display text.
pub trait LocalizationProvider: Send + Sync {
    /// Locale codes this provider can translate into.
    fn supported_locales(&self) -> Vec<String>;

    /// Display text for `key` in `locale`, if known.
    fn translate(&self, key: &str, locale: &str) -> Option<String>;

    /// Whether translations are loaded. The index skips providers that are not.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Table-driven provider: locale -> (key -> text).
///
/// JSON tables have the shape `{"en": {"settings.theme": "Theme"}}`.
#[derive(Debug, Clone, Default)]
pub struct StaticLocalizationProvider {
    tables: BTreeMap<String, HashMap<String, String>>,
}

impl StaticLocalizationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: impl Into<String>, key: impl Into<String>, text: impl Into<String>) {
        self.tables
            .entry(locale.into())
            .or_default()
            .insert(key.into(), text.into());
    }

    pub fn with_translation(
        mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.insert(locale, key, text);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let tables: BTreeMap<String, HashMap<String, String>> = serde_json::from_str(json)?;
        Ok(Self { tables })
    }

    pub async fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let content = tokio_fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Self::from_json(&content)
    }
}

impl LocalizationProvider for StaticLocalizationProvider {
    fn supported_locales(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn translate(&self, key: &str, locale: &str) -> Option<String> {
        self.tables.get(locale)?.get(key).cloned()
    }

    fn is_ready(&self) -> bool {
        !self.tables.is_empty()
    }
}
