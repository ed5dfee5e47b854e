//! Configuration loading for Knobs.
//!
//! [`ConfigLoader`] locates `config.toml`, parses it, fills in defaults and
//! validates the result.
//!
//! ```rust,ignore
//! use knobs_core::config::ConfigLoader;
//!
//! match ConfigLoader::load() {
//!     Ok(config) => println!("Logging level: {}", config.logging.level),
//!     Err(e) => {
//!         knobs_core::logging::init_minimal_logging();
//!         tracing::error!("Configuration loading failed: {}", e);
//!     }
//! }
//! ```
//!
//! ## File location
//!
//! `$KNOBS_CONFIG` when set, otherwise `config.toml` inside the app config
//! directory (see [`crate::utils::paths::get_app_config_dir`]). A missing file
//! yields the default configuration.
//!
//! ## Validation
//!
//! - log level and format are lowercased and checked against the known values;
//! - relative log file paths are resolved against the app state directory;
//! - `events.broadcast_capacity` must be greater than zero.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::defaults::{CONFIG_FILE_NAME, CONFIG_PATH_ENV, DEFAULT_STORAGE_FILE_NAME};
use super::types::{CoreConfig, StorageConfig};
use crate::error::{ConfigError, CoreError};
use crate::utils::paths::{get_app_config_dir, get_app_state_dir};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Namespace for configuration loading.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates the configuration from its default location.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DirectoryUnavailable`] when no config directory can be determined
    ///   and `$KNOBS_CONFIG` is unset;
    /// - [`ConfigError::ReadError`] / [`ConfigError::ParseError`] for unreadable or malformed files;
    /// - [`ConfigError::ValidationError`] for unacceptable values.
    pub fn load() -> Result<CoreConfig, CoreError> {
        let path = match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => get_app_config_dir()?.join(CONFIG_FILE_NAME),
        };
        Self::load_from_path(&path)
    }

    /// Loads the configuration from `path`, falling back to defaults when the file does not exist.
    pub fn load_from_path(path: &Path) -> Result<CoreConfig, CoreError> {
        let config = match fs::read_to_string(path) {
            Ok(content) => {
                debug!("Read configuration from {:?}", path);
                Self::parse(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration file at {:?}, using defaults", path);
                CoreConfig::default()
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                }
                .into());
            }
        };
        Self::validate_config(config)
    }

    /// Parses and validates a TOML string.
    pub fn load_from_str(content: &str) -> Result<CoreConfig, CoreError> {
        Self::validate_config(Self::parse(content)?)
    }

    fn parse(content: &str) -> Result<CoreConfig, CoreError> {
        if content.trim().is_empty() {
            return Ok(CoreConfig::default());
        }
        toml::from_str(content).map_err(|e| CoreError::Config(ConfigError::ParseError(e)))
    }

    /// Normalizes and checks a parsed configuration.
    pub fn validate_config(mut config: CoreConfig) -> Result<CoreConfig, CoreError> {
        let level = config.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}",
                config.logging.level
            ))
            .into());
        }
        config.logging.level = level;

        let format = config.logging.format.to_lowercase();
        if !VALID_LOG_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log format: {}",
                config.logging.format
            ))
            .into());
        }
        config.logging.format = format;

        if let Some(log_path) = config.logging.file_path.take() {
            config.logging.file_path = Some(if log_path.is_relative() {
                get_app_state_dir()?.join(log_path)
            } else {
                log_path
            });
        }

        if config.events.broadcast_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "events.broadcast_capacity must be greater than zero".to_string(),
            )
            .into());
        }

        Ok(config)
    }

    /// Returns the settings file path, defaulting to `<app config dir>/settings.json`.
    pub fn resolve_storage_path(storage: &StorageConfig) -> Result<PathBuf, CoreError> {
        match &storage.file_path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_app_config_dir()?.join(DEFAULT_STORAGE_FILE_NAME)),
        }
    }
}
