//! Configuration management for Knobs.
//!
//! - [`types`]: [`CoreConfig`] and its sections ([`LoggingConfig`],
//!   [`StorageConfig`], [`EventsConfig`]).
//! - [`defaults`]: default values used by serde for missing fields.
//! - [`loader`]: [`ConfigLoader`], which locates, parses and validates `config.toml`.

pub mod defaults;
pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{CoreConfig, EventsConfig, LoggingConfig, StorageConfig};
