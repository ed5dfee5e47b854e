//! The setting catalog.
//!
//! [`SettingsRegistry`] indexes definitions by key and by section. It does no
//! locking of its own; the controller and the search index share it as a
//! [`SharedRegistry`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::definition::{Section, Setting, SettingDefinition, SettingKind};
use crate::error::SettingsError;

/// Registry handle shared between the controller and the search index.
pub type SharedRegistry = Arc<RwLock<SettingsRegistry>>;

impl<T: SettingKind> From<&Setting<T>> for Arc<SettingDefinition> {
    fn from(setting: &Setting<T>) -> Self {
        Arc::clone(setting.definition())
    }
}

impl<T: SettingKind> From<Setting<T>> for Arc<SettingDefinition> {
    fn from(setting: Setting<T>) -> Self {
        Arc::clone(setting.definition())
    }
}

#[derive(Debug)]
struct Registered {
    /// Registration sequence number; later registrations sort after earlier ones.
    ordinal: u64,
    definition: Arc<SettingDefinition>,
}

#[derive(Debug, Default)]
pub struct SettingsRegistry {
    settings: HashMap<String, Registered>,
    next_ordinal: u64,
    /// Section key to member setting keys.
    section_members: HashMap<String, HashSet<String>>,
    sections: Vec<Section>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the registry for sharing.
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Inserts a definition, replacing any earlier one with the same key.
    ///
    /// A replaced definition is removed from its section first, so a
    /// re-registration can move a setting between sections.
    pub fn register(
        &mut self,
        definition: impl Into<Arc<SettingDefinition>>,
    ) -> Option<Arc<SettingDefinition>> {
        let definition = definition.into();
        let key = definition.key().to_string();

        let previous = self.unregister(&key);
        if previous.is_some() {
            debug!("Registry: replacing definition for '{}'", key);
        }

        if let Some(section) = definition.section() {
            self.section_members
                .entry(section.to_string())
                .or_default()
                .insert(key.clone());
        }
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.settings.insert(key, Registered { ordinal, definition });
        previous
    }

    pub fn register_all<I, D>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = D>,
        D: Into<Arc<SettingDefinition>>,
    {
        for definition in definitions {
            self.register(definition);
        }
    }

    /// Inserts or replaces a section. A replaced section keeps its position
    /// among sections of equal order.
    pub fn register_section(&mut self, section: Section) {
        match self.sections.iter_mut().find(|s| s.key == section.key) {
            Some(existing) => {
                debug!("Registry: replacing section '{}'", section.key);
                *existing = section;
            }
            None => self.sections.push(section),
        }
    }

    pub fn register_sections(&mut self, sections: impl IntoIterator<Item = Section>) {
        for section in sections {
            self.register_section(section);
        }
    }

    /// Removes a definition and its section membership.
    pub fn unregister(&mut self, key: &str) -> Option<Arc<SettingDefinition>> {
        let removed = self.settings.remove(key)?.definition;
        if let Some(section) = removed.section() {
            if let Some(members) = self.section_members.get_mut(section) {
                members.remove(key);
                if members.is_empty() {
                    self.section_members.remove(section);
                }
            }
        }
        Some(removed)
    }

    /// Type-checked lookup. `None` when absent or registered under another type.
    pub fn get<T: SettingKind>(&self, key: &str) -> Option<Setting<T>> {
        self.settings
            .get(key)
            .and_then(|entry| Setting::from_definition(Arc::clone(&entry.definition)))
    }

    /// Type-checked lookup that reports why it failed.
    pub fn require<T: SettingKind>(&self, key: &str) -> Result<Setting<T>, SettingsError> {
        let definition = self
            .settings
            .get(key)
            .map(|entry| &entry.definition)
            .ok_or_else(|| SettingsError::NotFound {
                key: key.to_string(),
            })?;
        Setting::from_definition(Arc::clone(definition)).ok_or_else(|| SettingsError::TypeMismatch {
            key: key.to_string(),
            expected: T::TYPE,
            actual: definition.setting_type(),
        })
    }

    pub fn definition(&self, key: &str) -> Option<Arc<SettingDefinition>> {
        self.settings.get(key).map(|entry| Arc::clone(&entry.definition))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    /// All definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<SettingDefinition>> + '_ {
        let mut entries: Vec<&Registered> = self.settings.values().collect();
        entries.sort_unstable_by_key(|entry| entry.ordinal);
        entries.into_iter().map(|entry| &entry.definition)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Definitions of a section by ascending `order`, registration order on ties.
    pub fn settings_in_section(&self, section_key: &str) -> Vec<Arc<SettingDefinition>> {
        let mut members: Vec<&Registered> = self
            .section_members
            .get(section_key)
            .map(|keys| keys.iter().filter_map(|k| self.settings.get(k)).collect())
            .unwrap_or_default();
        members.sort_unstable_by_key(|entry| (entry.definition.order(), entry.ordinal));
        members
            .into_iter()
            .map(|entry| Arc::clone(&entry.definition))
            .collect()
    }

    pub fn settings_in_sub_section(
        &self,
        section_key: &str,
        sub_section: &str,
    ) -> Vec<Arc<SettingDefinition>> {
        self.settings_in_section(section_key)
            .into_iter()
            .filter(|def| def.sub_section() == Some(sub_section))
            .collect()
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.key == key)
    }

    /// Sections by ascending `order`, registration order on ties.
    pub fn sorted_sections(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.order);
        sections
    }

    pub fn child_sections(&self, parent_key: &str) -> Vec<&Section> {
        let mut children: Vec<&Section> = self
            .sections
            .iter()
            .filter(|s| s.parent_key.as_deref() == Some(parent_key))
            .collect();
        children.sort_by_key(|s| s.order);
        children
    }

    /// Union with `other`; `other` wins on key collisions.
    pub fn merge(&mut self, other: SettingsRegistry) {
        let SettingsRegistry {
            settings, sections, ..
        } = other;
        let mut incoming: Vec<Registered> = settings.into_values().collect();
        incoming.sort_unstable_by_key(|entry| entry.ordinal);
        for entry in incoming {
            self.register(entry.definition);
        }
        self.register_sections(sections);
    }
}
