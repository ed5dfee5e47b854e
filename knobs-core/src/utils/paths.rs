//! Application directory resolution.
//!
//! Resolves XDG-style base directories and the Knobs-specific directories
//! below them using `directories-next`. Every function returns
//! [`ConfigError::DirectoryUnavailable`] (wrapped in [`CoreError::Config`]) when
//! the directory cannot be determined, e.g. when no home directory is set.

use directories_next::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

use crate::error::{ConfigError, CoreError};

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "Knobs";
const APPLICATION: &str = "Knobs";

fn unavailable(dir_type: &str) -> CoreError {
    CoreError::Config(ConfigError::DirectoryUnavailable {
        dir_type: dir_type.to_string(),
    })
}

/// Returns the user configuration base directory (`$XDG_CONFIG_HOME` on Linux).
pub fn get_config_base_dir() -> Result<PathBuf, CoreError> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| unavailable("Config Base"))
}

/// Returns the user state base directory.
///
/// On Linux this honours `$XDG_STATE_HOME` and falls back to `~/.local/state`;
/// elsewhere the local data directory is used.
pub fn get_state_base_dir() -> Result<PathBuf, CoreError> {
    BaseDirs::new()
        .map(|dirs| {
            #[cfg(target_os = "linux")]
            {
                match std::env::var("XDG_STATE_HOME") {
                    Ok(state_home) if !state_home.is_empty() => PathBuf::from(state_home),
                    _ => dirs.home_dir().join(".local/state"),
                }
            }
            #[cfg(not(target_os = "linux"))]
            {
                dirs.data_local_dir().to_path_buf()
            }
        })
        .ok_or_else(|| unavailable("State Base"))
}

/// Returns the Knobs configuration directory, e.g. `~/.config/knobs` on Linux.
///
/// ```
/// match knobs_core::utils::paths::get_app_config_dir() {
///     Ok(path) => println!("App config directory: {}", path.display()),
///     Err(e) => eprintln!("Error getting app config dir: {}", e),
/// }
/// ```
pub fn get_app_config_dir() -> Result<PathBuf, CoreError> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| unavailable("App Config"))
}

/// Returns the Knobs state directory (`<state base>/Knobs/Knobs`), used for log files.
pub fn get_app_state_dir() -> Result<PathBuf, CoreError> {
    get_state_base_dir().map(|base| base.join(ORGANIZATION).join(APPLICATION))
}
