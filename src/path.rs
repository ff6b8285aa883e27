// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations of files that hyprrelease reads or writes:
//! its own configuration file, the clone cache for dotfile working copies,
//! the Hyprland configuration directory, and the two well-known metadata
//! files. None of these functions check if the path returned actually
//! exists.

use std::path::{Path, PathBuf};

/// System-scoped release identity metadata file.
pub const SYSTEM_RELEASE_FILE: &str = "/etc/hyprland-release";

/// System-scoped component metadata file.
pub const SYSTEM_COMPONENTS_FILE: &str = "/etc/hyprland-system-release";

/// Local model directory shipped by distribution packages.
pub const SYSTEM_MODEL_DIR: &str = "/usr/share/hypr-release/ai/LLM";

/// Determine absolute path to user's home directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default path to hyprrelease configuration file.
///
/// Uses `$XDG_CONFIG_HOME/hyprrelease/config.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("hyprrelease").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default directory to clone dotfile working copies into.
///
/// Uses `$XDG_CACHE_HOME/hyprrelease/dotfiles`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_work_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|path| path.join("hyprrelease").join("dotfiles"))
        .ok_or(NoWayHome)
}

/// Determine default Hyprland configuration directory to install into.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_target_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("hypr"))
        .ok_or(NoWayHome)
}

/// Preference order of release identity metadata files.
///
/// User-scoped file comes first, system-scoped file is the fallback.
pub fn default_release_metadata_paths() -> Vec<PathBuf> {
    metadata_paths_with(dirs::config_dir(), "hyprland-release", SYSTEM_RELEASE_FILE)
}

/// Preference order of system component metadata files.
///
/// User-scoped file comes first, system-scoped file is the fallback.
pub fn default_system_metadata_paths() -> Vec<PathBuf> {
    metadata_paths_with(
        dirs::config_dir(),
        "hyprland-system-release",
        SYSTEM_COMPONENTS_FILE,
    )
}

/// Default directories scanned for local model artifacts.
pub fn default_model_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("hyprrelease").join("models"));
    }
    dirs.push(PathBuf::from(SYSTEM_MODEL_DIR));
    dirs
}

fn metadata_paths_with(
    config_dir: Option<PathBuf>,
    file_name: &str,
    system: impl AsRef<Path>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config) = config_dir {
        paths.push(config.join("hypr-release").join(file_name));
    }
    paths.push(system.as_ref().to_path_buf());
    paths
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
