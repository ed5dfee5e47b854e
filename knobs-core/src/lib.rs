//! # Knobs Core Library (`knobs-core`)
//!
//! `knobs-core` is the foundational layer of the Knobs settings engine. It
//! carries everything the domain layer needs but that is not about settings
//! themselves:
//!
//! - **Error Handling**: [`CoreError`] with the more specific [`ConfigError`]
//!   and [`LoggingError`].
//! - **Configuration**: TOML-based [`CoreConfig`] loaded and validated by
//!   [`ConfigLoader`], with defaults for every missing field.
//! - **Logging**: `tracing` subscriber setup with console and optional rolling
//!   file output, text or JSON.
//! - **Types**: the packed ARGB [`Color`] used by color-valued settings.
//! - **Utilities**: directory helpers and XDG path resolution.
//!
//! ```rust,ignore
//! use knobs_core::config::ConfigLoader;
//! use knobs_core::logging::init_logging;
//! use knobs_core::error::CoreError;
//!
//! fn main() -> Result<(), CoreError> {
//!     let config = ConfigLoader::load()?;
//!     init_logging(&config.logging, false)?;
//!     tracing::info!("Knobs core initialized.");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod utils;

pub use config::{ConfigLoader, CoreConfig, EventsConfig, LoggingConfig, StorageConfig};
pub use error::{ConfigError, CoreError, LoggingError};
pub use logging::{init_logging, init_minimal_logging};
pub use types::{Color, ColorParseError};
