//! Setting catalog, storage and the value controller.

pub mod controller;
pub mod definition;
pub mod events;
pub mod registry;
pub mod storage;
pub mod types;
pub mod undo;

pub use controller::{SetOutcome, SettingsController};
pub use definition::{Section, Setting, SettingBuilder, SettingDefinition, SettingKind, ValueConstraint};
pub use events::{ListenerId, SettingChangedEvent, SettingStream};
pub use registry::{SettingsRegistry, SharedRegistry};
pub use storage::{InMemoryStorage, JsonFileStorage, SettingsStorage};
pub use types::{SettingType, SettingValue, StoredKind, StoredValue};
pub use undo::{UndoEntry, UndoStack, UNDO_CAPACITY};

#[cfg(test)]
mod registry_tests;

#[cfg(test)]
mod controller_tests;
