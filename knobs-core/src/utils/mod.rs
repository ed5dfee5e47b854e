//! General utilities for Knobs core.
//!
//! - [`fs`]: directory creation helpers returning [`crate::error::CoreError`].
//! - [`paths`]: XDG base directories and Knobs-specific directories.

pub mod fs;
pub mod paths;

pub use fs::{ensure_dir_exists, ensure_parent_dir_exists};
