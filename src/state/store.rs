//! Local persistent state store
//!
//! `AppStore` owns one JSON document in a storage substrate and exposes:
//! - `init` / `get_state` (read, validate, merge onto defaults)
//! - targeted mutators, each persisted before returning (write-through)
//! - snapshot export / import, clear, storage info
//!
//! Construct it once at startup and pass it by reference to consumers.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::merge::merge;
use super::migration;
use super::types::{
    AppState, ConversationPatch, ConversationRecord, MessageRecord, PreferencesPatch, StorageInfo,
    TavusSettingsPatch, MAX_CONVERSATIONS, MAX_RECENT_MESSAGES, SCHEMA_VERSION, STORAGE_KEY,
};
use crate::persistence::{StorageBackend, StorageError, StorageEvent};

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of reading the raw document
enum RawDocument {
    Missing,
    Parsed(Value),
    Corrupt { text: String, reason: String },
    Unreadable(StorageError),
}

pub struct AppStore<B: StorageBackend> {
    backend: B,
    key: String,
    /// Serializes read-modify-write cycles of this store object
    write_gate: Mutex<()>,
}

impl<B: StorageBackend> AppStore<B> {
    /// Store using the default storage key
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, STORAGE_KEY)
    }

    pub fn with_key(backend: B, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Load
    // ═══════════════════════════════════════════════════════════════════════

    fn read_raw(&self) -> RawDocument {
        match self.backend.get(&self.key) {
            Ok(None) => RawDocument::Missing,
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => RawDocument::Parsed(value),
                Err(e) => RawDocument::Corrupt {
                    text,
                    reason: e.to_string(),
                },
            },
            Err(e) => RawDocument::Unreadable(e),
        }
    }

    /// Load the state at startup.
    ///
    /// Writes defaults when nothing is stored or the stored document is corrupt
    /// (the corrupt text is kept under a backup key first), and migrates documents
    /// written with another schema version.
    pub fn init(&self) -> AppState {
        let _gate = self.write_gate.lock();

        match self.read_raw() {
            RawDocument::Missing => {
                info!("No stored app state, writing defaults");
                self.write_defaults()
            }
            RawDocument::Corrupt { text, reason } => {
                warn!("Stored app state corrupted: {}", reason);
                match self.backup(&text) {
                    Ok(backup_key) => {
                        warn!("Corrupted app state backed up to {}, using defaults", backup_key)
                    }
                    Err(e) => error!("Failed to backup corrupted app state: {}", e),
                }
                self.write_defaults()
            }
            RawDocument::Unreadable(e) => {
                // Do not overwrite a document we could not read
                error!("Failed to read app state: {}, using defaults", e);
                AppState::default()
            }
            RawDocument::Parsed(raw) => {
                if migration::stored_version(&raw) != SCHEMA_VERSION {
                    self.migrate_locked(raw)
                } else {
                    merge(&raw, &AppState::default())
                }
            }
        }
    }

    /// Current state, merged onto defaults. Never writes and never migrates.
    pub fn get_state(&self) -> AppState {
        match self.read_raw() {
            RawDocument::Missing => AppState::default(),
            RawDocument::Parsed(raw) => merge(&raw, &AppState::default()),
            RawDocument::Corrupt { reason, .. } => {
                error!("Error reading app state: {}", reason);
                AppState::default()
            }
            RawDocument::Unreadable(e) => {
                error!("Error reading app state: {}", e);
                AppState::default()
            }
        }
    }

    /// Upgrade a raw document to the current schema, persist and return it
    pub fn migrate(&self, raw: Value) -> AppState {
        let _gate = self.write_gate.lock();
        self.migrate_locked(raw)
    }

    fn migrate_locked(&self, mut raw: Value) -> AppState {
        let from = migration::stored_version(&raw).to_string();
        let reached = migration::upgrade(&mut raw);
        if reached != SCHEMA_VERSION {
            warn!(
                "No migration path from v{} to v{}, merging onto defaults",
                reached, SCHEMA_VERSION
            );
        }

        let mut state = merge(&raw, &AppState::default());
        state.config.version = SCHEMA_VERSION.to_string();
        if let Err(e) = self.persist(&mut state) {
            error!("Failed to save migrated app state: {}", e);
        }
        info!("App state migrated from v{} to v{}", from, SCHEMA_VERSION);
        state
    }

    fn write_defaults(&self) -> AppState {
        let mut state = AppState::default();
        if let Err(e) = self.persist(&mut state) {
            error!("Failed to save default app state: {}", e);
        }
        state
    }

    /// Keep `text` under `<key>.backup.<timestamp>`, adding `.N` when that key is taken
    fn backup(&self, text: &str) -> Result<String, StorageError> {
        let base = format!("{}.backup.{}", self.key, Utc::now().format("%Y%m%d_%H%M%S"));
        let mut backup_key = base.clone();
        let mut suffix = 1u32;
        while self.backend.get(&backup_key)?.is_some() {
            backup_key = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        self.backend.set(&backup_key, text)?;
        Ok(backup_key)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Save
    // ═══════════════════════════════════════════════════════════════════════

    /// Stamp `config.lastUpdated` and write the whole document
    pub fn save_state(&self, state: &mut AppState) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock();
        self.persist(state)
    }

    fn persist(&self, state: &mut AppState) -> Result<(), StoreError> {
        state.config.last_updated = Utc::now();
        let json = serde_json::to_string(state)?;
        self.backend.set(&self.key, &json)?;
        Ok(())
    }

    /// Read, apply `f`, and persist when `f` reports a change
    fn mutate<F>(&self, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut AppState) -> bool,
    {
        let _gate = self.write_gate.lock();
        let mut state = self.get_state();
        if !f(&mut state) {
            return Ok(false);
        }
        self.persist(&mut state)?;
        Ok(true)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mutators
    // ═══════════════════════════════════════════════════════════════════════

    pub fn update_preferences(&self, patch: &PreferencesPatch) -> Result<(), StoreError> {
        self.mutate(|state| {
            patch.apply(&mut state.user_preferences);
            true
        })?;
        Ok(())
    }

    pub fn update_tavus_settings(&self, patch: &TavusSettingsPatch) -> Result<(), StoreError> {
        self.mutate(|state| {
            patch.apply(&mut state.tavus_settings);
            true
        })?;
        Ok(())
    }

    /// Insert a conversation at the front, or replace the record with the same id
    /// in place. Conversations beyond the limit are evicted from the tail.
    pub fn add_conversation(&self, record: ConversationRecord) -> Result<(), StoreError> {
        self.mutate(|state| {
            if let Some(existing) = state.conversations.iter_mut().find(|c| c.id == record.id) {
                *existing = record;
            } else {
                state.conversations.insert(0, record);
                state.conversations.truncate(MAX_CONVERSATIONS);
            }
            true
        })?;
        Ok(())
    }

    /// Apply `patch` to the conversation `id`; unknown ids are ignored
    pub fn update_conversation(&self, id: &str, patch: &ConversationPatch) -> Result<(), StoreError> {
        let changed = self.mutate(|state| {
            match state.conversations.iter_mut().find(|c| c.id == id) {
                Some(record) => {
                    patch.apply(record);
                    true
                }
                None => false,
            }
        })?;
        if !changed {
            debug!("update_conversation: {} not found", id);
        }
        Ok(())
    }

    /// Remove a conversation and every retained message referencing it
    pub fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        let changed = self.mutate(|state| {
            let before = (state.conversations.len(), state.recent_messages.len());
            state.conversations.retain(|c| c.id != id);
            state.recent_messages.retain(|m| m.conversation_id != id);
            before != (state.conversations.len(), state.recent_messages.len())
        })?;
        if changed {
            info!("Deleted conversation: {}", id);
        }
        Ok(())
    }

    /// Record a message at the front of the recent history.
    ///
    /// The owning conversation (if stored) gets `lastMessageAt` set to the message
    /// timestamp and `messageCount` set to the number of its messages still
    /// retained, so the count only covers the last `MAX_RECENT_MESSAGES` messages
    /// overall.
    pub fn add_message(&self, message: MessageRecord) -> Result<(), StoreError> {
        self.mutate(|state| {
            let conversation_id = message.conversation_id.clone();
            let timestamp = message.timestamp;

            state.recent_messages.insert(0, message);
            state.recent_messages.truncate(MAX_RECENT_MESSAGES);

            let retained = state.messages_for(&conversation_id).count() as u32;
            if let Some(record) = state
                .conversations
                .iter_mut()
                .find(|c| c.id == conversation_id)
            {
                record.last_message_at = timestamp;
                record.message_count = retained;
            }
            true
        })?;
        Ok(())
    }

    /// Retained messages of one conversation, newest first
    pub fn conversation_messages(&self, conversation_id: &str) -> Vec<MessageRecord> {
        let state = self.get_state();
        state.messages_for(conversation_id).cloned().collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Snapshot
    // ═══════════════════════════════════════════════════════════════════════

    /// Pretty-printed JSON of the current state
    pub fn export_snapshot(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.get_state())?)
    }

    /// Replace the stored state with `text`.
    ///
    /// Returns `Ok(false)` without touching storage when `text` is not JSON.
    /// Anything that parses is merged onto defaults, so missing sections are filled in.
    pub fn import_snapshot(&self, text: &str) -> Result<bool, StoreError> {
        let raw = match serde_json::from_str::<Value>(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Rejected snapshot import: {}", e);
                return Ok(false);
            }
        };

        let _gate = self.write_gate.lock();
        let mut state = merge(&raw, &AppState::default());
        self.persist(&mut state)?;
        info!(
            conversations = state.conversations.len(),
            messages = state.recent_messages.len(),
            "Imported app state snapshot"
        );
        Ok(true)
    }

    /// Remove the stored document; call `init` again for a fresh state
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock();
        self.backend.remove(&self.key)?;
        info!("Cleared all app state");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Info
    // ═══════════════════════════════════════════════════════════════════════

    pub fn storage_info(&self) -> StorageInfo {
        let state = self.get_state();
        let bytes = serde_json::to_vec(&state).map(|b| b.len()).unwrap_or(0);

        StorageInfo {
            version: state.config.version.clone(),
            last_updated: state.config.last_updated,
            conversation_count: state.conversations.len(),
            message_count: state.recent_messages.len(),
            data_size_kb: (bytes as f64 / 1024.0).round() as u64,
            has_api_key: state.tavus_settings.has_api_key(),
        }
    }

    /// Change notifications from the substrate; re-fetch `get_state` on each event
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.backend.subscribe()
    }
}

/// File name for an exported snapshot taken on `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("tavus-app-data-{}.json", date.format("%Y-%m-%d"))
}

/// `export_file_name` for the current UTC date
pub fn export_file_name_now() -> String {
    let now: DateTime<Utc> = Utc::now();
    export_file_name(now.date_naive())
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
