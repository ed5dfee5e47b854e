//! Error handling for the Knobs core layer.
//!
//! The main error type for this crate is [`CoreError`], which wraps the more
//! specific [`ConfigError`] and [`LoggingError`]. Domain crates define their own
//! error enums and convert from `CoreError` where a core facility is involved.
//!
//! # Examples
//!
//! ```rust
//! use knobs_core::error::{ConfigError, CoreError};
//!
//! fn check_capacity(capacity: usize) -> Result<(), CoreError> {
//!     if capacity == 0 {
//!         return Err(ConfigError::ValidationError("capacity must be > 0".into()).into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_capacity(0).is_err());
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for Knobs.
///
/// Used as the common error type of everything in `knobs-core`, usually by
/// wrapping a more specific error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration loading, parsing or validation failed.
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),

    /// Setting up the logging system failed.
    #[error("Logging Error: {0}")]
    Logging(#[from] LoggingError),

    /// A filesystem operation failed on a known path.
    #[error("Filesystem Error: {message} (Path: {path:?})")]
    Filesystem {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// General I/O errors not covered by other specific variants.
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided to a function or method.
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// Catch-all for unexpected internal errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Error type for configuration-related operations.
///
/// Typically wrapped by [`CoreError::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a configuration file failed.
    #[error("Failed to read configuration file from {path:?}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Values parsed fine but are not acceptable.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// A configuration file was required but not found at any of the checked locations.
    #[error("Configuration file not found at expected locations: {locations:?}")]
    NotFound { locations: Vec<PathBuf> },

    /// A base directory (config/data/state home) could not be determined.
    #[error("Could not determine base directory for {dir_type}")]
    DirectoryUnavailable { dir_type: String },
}

/// Error type for logging-related operations.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// The global subscriber could not be installed or the configuration is unusable.
    #[error("Failed to initialize logging: {0}")]
    InitializationFailure(String),

    /// A log filter directive could not be parsed.
    #[error("Failed to set log filter: {0}")]
    FilterError(String),

    /// Writing to a log file failed.
    #[error("Logging I/O error: {0}")]
    IoError(#[from] io::Error),
}
