//! Configuration
//!
//! Resolves the data directory, the storage substrate and remote API settings,
//! and opens the app store they describe.

pub mod paths;
pub mod settings;

use std::sync::Arc;

use tracing::info;

use crate::persistence::{FileStorage, RedbStorage, StorageBackend, StorageError};
use crate::state::AppStore;

pub use paths::{database_file, default_data_dir, state_dir};
pub use settings::{BackendKind, Settings, DEFAULT_API_BASE};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to determine data directory")]
    NoDataDir,

    #[error("Unknown storage backend '{0}' (expected 'file' or 'redb')")]
    InvalidBackend(String),
}

/// Store over the substrate selected by `settings`
pub type SharedStore = AppStore<Arc<dyn StorageBackend>>;

/// Open the configured substrate and wrap it in an `AppStore` (not yet initialized)
pub fn open_store(settings: &Settings) -> Result<SharedStore, StorageError> {
    let backend: Arc<dyn StorageBackend> = match settings.backend {
        BackendKind::File => Arc::new(FileStorage::new(state_dir(&settings.data_dir))),
        BackendKind::Redb => Arc::new(RedbStorage::open(database_file(&settings.data_dir))?),
    };
    info!(
        backend = %settings.backend,
        data_dir = %settings.data_dir.display(),
        "Opened app storage"
    );
    Ok(AppStore::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(dir: &std::path::Path, backend: BackendKind) -> Settings {
        Settings {
            data_dir: dir.to_path_buf(),
            backend,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
        }
    }

    #[test]
    fn test_open_store_each_backend() {
        for backend in [BackendKind::File, BackendKind::Redb] {
            let dir = tempdir().unwrap();
            let config = {
                let store = open_store(&settings(dir.path(), backend)).unwrap();
                store.init().config
            };

            let reopened = open_store(&settings(dir.path(), backend)).unwrap();
            assert_eq!(reopened.get_state().config, config);
        }
    }
}
