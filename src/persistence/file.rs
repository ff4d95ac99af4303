//! Directory substrate: one `<key>.json` file per key.
//!
//! Writes go to a temp file first and are renamed into place, so a crash never
//! leaves a half-written document behind.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;

use super::{notify, StorageBackend, StorageChange, StorageError, StorageEvent, CHANGE_FEED_CAPACITY};

pub struct FileStorage {
    dir: PathBuf,
    changes: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    /// Create a substrate rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            dir: dir.into(),
            changes,
        }
    }

    /// File backing `key`.
    ///
    /// Bytes outside `[A-Za-z0-9._-]` (including `%`) are written as `%XX`, so
    /// distinct keys always map to distinct files.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("%{:02X}", byte));
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

/// Write `value` to `path` and flush it to disk, owner read/write only
fn write_synced(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()?;

    // Credentials live in this document
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            tracing::warn!("Failed to set storage file permissions: {}", e);
        }
    }
    Ok(())
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        let written = write_synced(&temp_path, value).and_then(|()| fs::rename(&temp_path, &path));
        if let Err(e) = written {
            // Never leave a partial temp file behind
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::Io(e));
        }

        notify(&self.changes, key, StorageChange::Set);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                notify(&self.changes, key, StorageChange::Removed);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.changes.subscribe()
    }
}
