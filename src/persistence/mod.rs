//! Storage substrates
//!
//! A substrate is a synchronous key-value medium holding one JSON document per key.
//! Every substrate publishes a `StorageEvent` on each write or removal so that other
//! consumers sharing it can re-read their state.

pub mod file;
pub mod memory;
pub mod redb_store;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use redb_store::RedbStorage;

/// Capacity of the change feed; slow subscribers see `Lagged` and should re-read.
pub(crate) const CHANGE_FEED_CAPACITY: usize = 64;

/// Storage substrate errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} bytes available")]
    QuotaExceeded { needed: usize, quota: usize },
}

/// What happened to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageChange {
    Set,
    Removed,
}

/// Change notification published by a substrate.
///
/// Carries no payload: subscribers are expected to re-fetch the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageEvent {
    pub key: String,
    pub change: StorageChange,
}

/// Synchronous key-value persistence medium
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, `None` when absent
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to change notifications for every key of this substrate
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        (**self).subscribe()
    }
}

/// Publish a change; having no subscribers is fine.
pub(crate) fn notify(tx: &broadcast::Sender<StorageEvent>, key: &str, change: StorageChange) {
    let _ = tx.send(StorageEvent {
        key: key.to_string(),
        change,
    });
}
