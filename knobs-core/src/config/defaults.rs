//! Default configuration values.
//!
//! Referenced from `#[serde(default = "...")]` attributes in [`super::types`].

use std::path::PathBuf;

/// Returns the default log level string (`"info"`).
pub(super) fn default_log_level() -> String {
    "info".to_string()
}

/// No log file by default.
pub(super) fn default_log_file_path() -> Option<PathBuf> {
    None
}

/// Returns the default log format string (`"text"`).
pub(super) fn default_log_format() -> String {
    "text".to_string()
}

/// Resolved lazily against the app config directory.
pub(super) fn default_storage_file_path() -> Option<PathBuf> {
    None
}

pub(super) fn default_broadcast_capacity() -> usize {
    64
}

/// File name used when [`super::StorageConfig::file_path`] is unset.
pub const DEFAULT_STORAGE_FILE_NAME: &str = "settings.json";

/// Name of the configuration file inside the app config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "KNOBS_CONFIG";
