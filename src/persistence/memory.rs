//! In-memory substrate with an optional byte quota.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{notify, StorageBackend, StorageChange, StorageError, StorageEvent, CHANGE_FEED_CAPACITY};

pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
    /// Total bytes (keys + values) the substrate accepts, `None` = unlimited
    quota: Option<usize>,
    changes: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: None,
            changes,
        }
    }

    /// Create a substrate that rejects writes pushing it past `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }

    /// Bytes currently in use
    #[cfg(test)]
    pub(crate) fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.entries.write();
            if let Some(quota) = self.quota {
                let others: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let needed = others + key.len() + value.len();
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { needed, quota });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }
        notify(&self.changes, key, StorageChange::Set);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            notify(&self.changes, key, StorageChange::Removed);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.changes.subscribe()
    }
}
