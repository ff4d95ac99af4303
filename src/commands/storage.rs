//! Local storage commands
//!
//! Storage info, snapshot export/import, clear, and record listing/editing.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::persistence::StorageBackend;
use crate::state::{
    export_file_name_now, AppState, AppStore, ConversationRecord, MessageRecord, PreferencesPatch,
    StorageInfo, TavusSettingsPatch, UserPreferences,
};

/// Storage summary
pub fn storage_info<B: StorageBackend>(store: &AppStore<B>) -> StorageInfo {
    store.storage_info()
}

/// Full state with the API key masked
pub fn show_state<B: StorageBackend>(store: &AppStore<B>) -> AppState {
    let mut state = store.get_state();
    if state.tavus_settings.has_api_key() {
        state.tavus_settings.api_key = "********".to_string();
    }
    state
}

/// Write a snapshot to `output`, or to `tavus-app-data-<date>.json` inside `dir`
pub fn export_state<B: StorageBackend>(
    store: &AppStore<B>,
    output: Option<PathBuf>,
    dir: &Path,
) -> Result<PathBuf, String> {
    let path = output.unwrap_or_else(|| dir.join(export_file_name_now()));
    let snapshot = store.export_snapshot().map_err(|e| e.to_string())?;
    fs::write(&path, snapshot)
        .map_err(|e| format!("Failed to write snapshot {:?}: {}", path, e))?;

    info!("Exported app state to {:?}", path);
    Ok(path)
}

/// Replace the stored state with the snapshot at `path`.
///
/// Returns `false` when the file is not valid JSON (nothing is changed).
pub fn import_state<B: StorageBackend>(store: &AppStore<B>, path: &Path) -> Result<bool, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read snapshot {:?}: {}", path, e))?;
    store.import_snapshot(&text).map_err(|e| e.to_string())
}

/// Remove everything and start from defaults
pub fn clear_state<B: StorageBackend>(store: &AppStore<B>) -> Result<AppState, String> {
    store.clear_all().map_err(|e| e.to_string())?;
    Ok(store.init())
}

pub fn list_conversations<B: StorageBackend>(store: &AppStore<B>) -> Vec<ConversationRecord> {
    store.get_state().conversations
}

pub fn list_messages<B: StorageBackend>(
    store: &AppStore<B>,
    conversation_id: &str,
) -> Vec<MessageRecord> {
    store.conversation_messages(conversation_id)
}

pub fn delete_conversation<B: StorageBackend>(
    store: &AppStore<B>,
    conversation_id: &str,
) -> Result<(), String> {
    store
        .delete_conversation(conversation_id)
        .map_err(|e| e.to_string())
}

/// Apply a JSON preferences patch such as `{"theme":"dark"}`
pub fn update_preferences<B: StorageBackend>(
    store: &AppStore<B>,
    patch_json: &str,
) -> Result<UserPreferences, String> {
    let patch: PreferencesPatch = serde_json::from_str(patch_json)
        .map_err(|e| format!("Invalid preferences patch: {}", e))?;
    store.update_preferences(&patch).map_err(|e| e.to_string())?;
    Ok(store.get_state().user_preferences)
}

/// Apply a JSON Tavus settings patch such as `{"apiKey":"..."}`
pub fn update_tavus_settings<B: StorageBackend>(
    store: &AppStore<B>,
    patch_json: &str,
) -> Result<(), String> {
    let patch: TavusSettingsPatch = serde_json::from_str(patch_json)
        .map_err(|e| format!("Invalid Tavus settings patch: {}", e))?;
    store.update_tavus_settings(&patch).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;
    use crate::state::{ConversationStatus, Theme};
    use chrono::Utc;
    use tempfile::tempdir;

    fn create_test_store() -> AppStore<MemoryStorage> {
        let store = AppStore::new(MemoryStorage::new());
        store.init();
        store
    }

    fn conversation(id: &str) -> ConversationRecord {
        let now = Utc::now();
        ConversationRecord {
            id: id.to_string(),
            name: "Visit".to_string(),
            created_at: now,
            last_message_at: now,
            message_count: 0,
            status: ConversationStatus::Active,
            video_url: None,
        }
    }

    #[test]
    fn test_export_then_import_file() {
        let dir = tempdir().unwrap();
        let source = create_test_store();
        source.add_conversation(conversation("c1")).unwrap();

        let path = export_state(&source, None, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("tavus-app-data-") && name.ends_with(".json"));

        let target = create_test_store();
        assert!(import_state(&target, &path).unwrap());
        assert_eq!(list_conversations(&target)[0].id, "c1");
    }

    #[test]
    fn test_import_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "][").unwrap();

        let store = create_test_store();
        store.add_conversation(conversation("c1")).unwrap();
        assert!(!import_state(&store, &path).unwrap());
        assert_eq!(list_conversations(&store).len(), 1);

        assert!(import_state(&store, &dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_patches_from_json() {
        let store = create_test_store();

        let prefs = update_preferences(&store, r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert!(update_preferences(&store, r#"{"fontSize":12}"#).is_err());

        update_tavus_settings(&store, r#"{"apiKey":"tvs-secret"}"#).unwrap();
        assert!(storage_info(&store).has_api_key);
        assert_eq!(show_state(&store).tavus_settings.api_key, "********");
    }

    #[test]
    fn test_clear_returns_fresh_state() {
        let store = create_test_store();
        store.add_conversation(conversation("c1")).unwrap();

        let state = clear_state(&store).unwrap();
        assert!(state.conversations.is_empty());
        assert_eq!(storage_info(&store).conversation_count, 0);
    }
}
