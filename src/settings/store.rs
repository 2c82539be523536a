//! Settings persistence
//!
//! Settings and credentials live as JSON documents in the user's config
//! directory, `<config_dir>/cam-recorder/`.

use super::schema::Settings;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "cam-recorder";

pub const SETTINGS_FILE: &str = "settings.json";

pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Settings-related errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

/// `<config_dir>/cam-recorder`
pub fn default_config_dir() -> Result<PathBuf, SettingsError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(SettingsError::NoConfigDir)
}

/// Read settings from `path`; a missing file yields the defaults
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        tracing::debug!("No settings at {:?}, using defaults", path);
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    tracing::debug!("Loaded settings from {:?}", path);

    Ok(settings)
}

/// Replace `path` wholesale; readers never observe a half-written file
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), SettingsError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut file = tempfile::NamedTempFile::new_in(&dir)?;
    file.write_all(content)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
