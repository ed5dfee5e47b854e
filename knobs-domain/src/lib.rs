//! # Knobs Domain Library (`knobs-domain`)
//!
//! The settings engine built on `knobs-core`:
//!
//! - [`settings`]: typed setting definitions, the [`SettingsRegistry`], the
//!   [`SettingsStorage`] interface with in-memory and JSON file backends, and
//!   the [`SettingsController`] that caches, validates, persists, undoes and
//!   broadcasts values.
//! - [`search`]: the [`SearchIndex`] over keys, search terms and translated
//!   titles.
//!
//! ```rust,ignore
//! use knobs_domain::settings::{InMemoryStorage, Setting, SettingsController, SettingsRegistry};
//! use std::sync::Arc;
//!
//! let dark_mode = Setting::<bool>::builder("dark_mode", false).build();
//! let mut registry = SettingsRegistry::new();
//! registry.register(&dark_mode);
//!
//! let controller = SettingsController::new(registry.into_shared(), Arc::new(InMemoryStorage::new()), 64);
//! controller.init().await?;
//! controller.set(&dark_mode, true).await?;
//! ```

pub mod error;
pub mod search;
pub mod settings;

pub use error::{SettingsError, StorageError};
pub use search::{LocalizationProvider, SearchIndex, SearchResult, StaticLocalizationProvider};
pub use settings::{
    Section, SetOutcome, Setting, SettingChangedEvent, SettingDefinition, SettingKind, SettingStream,
    SettingType, SettingValue, SettingsController, SettingsRegistry, SettingsStorage, SharedRegistry,
    StoredValue,
};
