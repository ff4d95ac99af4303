//! Embedded database substrate using redb
//!
//! Database: app_storage.redb
//! Tables:
//!   - app_storage: key -> JSON document (text)

use std::path::PathBuf;

use redb::{Database, ReadableTable, TableDefinition};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::{notify, StorageBackend, StorageChange, StorageError, StorageEvent, CHANGE_FEED_CAPACITY};

/// Table: app_storage (key: storage key, value: JSON document)
const STORAGE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("app_storage");

pub struct RedbStorage {
    db: Database,
    changes: broadcast::Sender<StorageEvent>,
}

impl RedbStorage {
    /// Open (or create) the database at `path`.
    ///
    /// A file that cannot be opened is moved aside to `<path>.backup` and a fresh
    /// database is created in its place.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::create(&path) {
            Ok(db) => {
                info!("App storage database opened at {:?}", path);
                db
            }
            Err(e) => {
                warn!("Failed to open app storage database: {:?}, attempting recovery", e);

                let backup_path = path.with_extension("redb.backup");
                if let Err(e) = std::fs::rename(&path, &backup_path) {
                    error!("Failed to backup corrupted app storage database: {:?}", e);
                } else {
                    info!("Backed up corrupted app storage database to {:?}", backup_path);
                }

                Database::create(&path).map_err(redb::Error::from)?
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)) {
                warn!("Failed to set app storage database permissions: {}", e);
            }
        }

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let storage = Self { db, changes };
        storage.initialize()?;
        Ok(storage)
    }

    /// Create the table so read transactions never see it missing
    fn initialize(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let _ = write_txn
                .open_table(STORAGE_TABLE)
                .map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}

impl StorageBackend for RedbStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = read_txn
            .open_table(STORAGE_TABLE)
            .map_err(redb::Error::from)?;
        let value = table
            .get(key)
            .map_err(redb::Error::from)?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = write_txn
                .open_table(STORAGE_TABLE)
                .map_err(redb::Error::from)?;
            table.insert(key, value).map_err(redb::Error::from)?;
        }
        write_txn.commit().map_err(redb::Error::from)?;

        notify(&self.changes, key, StorageChange::Set);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(redb::Error::from)?;
        let removed = {
            let mut table = write_txn
                .open_table(STORAGE_TABLE)
                .map_err(redb::Error::from)?;
            let previous = table.remove(key).map_err(redb::Error::from)?;
            previous.is_some()
        };
        write_txn.commit().map_err(redb::Error::from)?;

        if removed {
            notify(&self.changes, key, StorageChange::Removed);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.changes.subscribe()
    }
}
