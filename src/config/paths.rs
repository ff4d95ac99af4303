//! Data directory layout
//!
//! Location: ~/.docamy on macOS/Linux, %APPDATA%\DocAmy on Windows,
//! unless overridden by `DOCAMY_DATA_DIR`.

use std::path::{Path, PathBuf};

use super::ConfigError;

/// Get the default DocAmy data directory
/// Returns %APPDATA%\DocAmy on Windows, ~/.docamy on macOS/Linux
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("DocAmy"));
        }
        dirs::home_dir()
            .map(|home| home.join(".docamy"))
            .ok_or(ConfigError::NoDataDir)
    }

    #[cfg(not(windows))]
    {
        dirs::home_dir()
            .map(|home| home.join(".docamy"))
            .ok_or(ConfigError::NoDataDir)
    }
}

/// Directory used by the file substrate (one JSON file per key)
pub fn state_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("state")
}

/// Database file used by the redb substrate
pub fn database_file(data_dir: &Path) -> PathBuf {
    data_dir.join("app_storage.redb")
}
