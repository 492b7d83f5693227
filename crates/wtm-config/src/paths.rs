//! Platform directory resolution.

use std::path::PathBuf;

use wtm_common::StorageError;

const APP_NAME: &str = "wtm";

/// Returns the platform-specific configuration directory.
///
/// - macOS: `~/Library/Application Support/wtm`
/// - Linux: `$XDG_CONFIG_HOME/wtm` (defaults to `~/.config/wtm`)
/// - Windows: `%APPDATA%\wtm`
pub fn config_dir() -> Result<PathBuf, StorageError> {
    Ok(dirs::config_dir()
        .ok_or_else(|| StorageError::PathError("could not determine config directory".into()))?
        .join(APP_NAME))
}

/// Returns the platform-specific data directory.
///
/// - macOS: `~/Library/Application Support/wtm`
/// - Linux: `$XDG_DATA_HOME/wtm` (defaults to `~/.local/share/wtm`)
/// - Windows: `%APPDATA%\wtm`
pub fn data_dir() -> Result<PathBuf, StorageError> {
    Ok(dirs::data_dir()
        .ok_or_else(|| StorageError::PathError("could not determine data directory".into()))?
        .join(APP_NAME))
}

/// Location of the persisted presence seed (`data_dir()/presence_seed.json`).
pub fn seed_file() -> Result<PathBuf, StorageError> {
    Ok(data_dir()?.join("presence_seed.json"))
}

/// Location of the persisted user toggles (`data_dir()/settings.toml`).
pub fn settings_file() -> Result<PathBuf, StorageError> {
    Ok(data_dir()?.join("settings.toml"))
}
