//! Runtime settings read from the environment
//!
//! | Variable                 | Default                    |
//! |--------------------------|----------------------------|
//! | `DOCAMY_DATA_DIR`        | see `paths::default_data_dir` |
//! | `DOCAMY_STORAGE_BACKEND` | `file` (`file` or `redb`)  |
//! | `TAVUS_API_BASE`         | `https://tavusapi.com/v2`  |
//! | `TAVUS_API_KEY`          | unset (falls back to the stored key) |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::paths::default_data_dir;
use super::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://tavusapi.com/v2";

pub const ENV_DATA_DIR: &str = "DOCAMY_DATA_DIR";
pub const ENV_STORAGE_BACKEND: &str = "DOCAMY_STORAGE_BACKEND";
pub const ENV_API_BASE: &str = "TAVUS_API_BASE";
pub const ENV_API_KEY: &str = "TAVUS_API_KEY";

/// Which substrate holds the app state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// One JSON file per key under `<data_dir>/state`
    #[default]
    File,
    /// Embedded redb database at `<data_dir>/app_storage.redb`
    Redb,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "redb" => Ok(Self::Redb),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Redb => f.write_str("redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    pub api_base: String,
    /// Overrides the key stored in `tavusSettings.apiKey` when set
    pub api_key: Option<String>,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = match var(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let backend = match var(ENV_STORAGE_BACKEND) {
            Some(kind) => kind.parse()?,
            None => BackendKind::default(),
        };
        let api_base = var(ENV_API_BASE)
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            data_dir,
            backend,
            api_base,
            api_key: var(ENV_API_KEY),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_explicit_values() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/docamy"),
            (ENV_STORAGE_BACKEND, "REDB"),
            (ENV_API_BASE, "http://127.0.0.1:9000/v2/"),
            (ENV_API_KEY, "tvs-123"),
        ]))
        .unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/tmp/docamy"));
        assert_eq!(settings.backend, BackendKind::Redb);
        assert_eq!(settings.api_base, "http://127.0.0.1:9000/v2");
        assert_eq!(settings.api_key.as_deref(), Some("tvs-123"));
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::from_lookup(lookup(&[(ENV_DATA_DIR, "/tmp/docamy"), (ENV_API_KEY, "  ")]))
                .unwrap();

        assert_eq!(settings.backend, BackendKind::File);
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.api_key, None);
    }

    #[test]
    fn test_invalid_backend() {
        let err = Settings::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/docamy"),
            (ENV_STORAGE_BACKEND, "sqlite"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidBackend(ref kind) if kind == "sqlite"));
    }

    #[test]
    fn test_backend_display_round_trips() {
        for kind in [BackendKind::File, BackendKind::Redb] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }
}
