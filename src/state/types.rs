//! Persisted application state
//!
//! The JSON shape (camelCase keys, RFC 3339 timestamps) is the document stored
//! under the storage key and the format of export/import files.

use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Current schema version of the persisted document
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Storage key the document lives under
pub const STORAGE_KEY: &str = "tavus_app_data";

/// Maximum conversations to keep (oldest evicted)
pub const MAX_CONVERSATIONS: usize = 50;

/// Maximum messages kept across all conversations (oldest evicted)
pub const MAX_RECENT_MESSAGES: usize = 200;

pub const DEFAULT_REPLICA_ID: &str = "r89d844f2b467046d54fef9d08619d180588edea6160";
pub const DEFAULT_PERSONA_ID: &str = "p38f53895b11";
pub const DEFAULT_MAX_DURATION_SECS: u32 = 30;

// ═══════════════════════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Schema version the document was written with
    pub version: String,
    /// Time of the last write
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub theme: Theme,
    pub language: String,
    pub video_quality: VideoQuality,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub notifications: bool,
    pub auto_start_video: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            language: "en".to_string(),
            video_quality: VideoQuality::High,
            audio_enabled: true,
            video_enabled: true,
            notifications: true,
            auto_start_video: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TavusSettings {
    /// Remote API secret; empty means unconfigured
    pub api_key: String,
    pub replica_id: String,
    pub persona_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_conversation_id: Option<String>,
    /// Maximum call duration in seconds
    pub max_duration: NonZeroU32,
    pub enable_streaming: bool,
    pub video_chat_enabled: bool,
}

impl TavusSettings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl Default for TavusSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            replica_id: DEFAULT_REPLICA_ID.to_string(),
            persona_id: DEFAULT_PERSONA_ID.to_string(),
            last_used_conversation_id: None,
            max_duration: NonZeroU32::new(DEFAULT_MAX_DURATION_SECS).unwrap_or(NonZeroU32::MIN),
            enable_streaming: true,
            video_chat_enabled: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    /// Retained messages of this conversation (see `AppStore::add_message`)
    pub message_count: u32,
    pub status: ConversationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    /// Owning conversation; not required to exist
    pub conversation_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Root
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub config: StorageConfig,
    pub user_preferences: UserPreferences,
    pub tavus_settings: TavusSettings,
    /// Newest first
    pub conversations: Vec<ConversationRecord>,
    /// Newest first
    pub recent_messages: Vec<MessageRecord>,
}

impl AppState {
    /// Default state stamped with `now`
    pub fn defaults_at(now: DateTime<Utc>) -> Self {
        Self {
            config: StorageConfig {
                version: SCHEMA_VERSION.to_string(),
                last_updated: now,
            },
            user_preferences: UserPreferences::default(),
            tavus_settings: TavusSettings::default(),
            conversations: Vec::new(),
            recent_messages: Vec::new(),
        }
    }

    pub fn conversation(&self, id: &str) -> Option<&ConversationRecord> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Retained messages of one conversation, newest first
    pub fn messages_for<'a>(&'a self, conversation_id: &'a str) -> impl Iterator<Item = &'a MessageRecord> + 'a {
        self.recent_messages
            .iter()
            .filter(move |m| m.conversation_id == conversation_id)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::defaults_at(Utc::now())
    }
}

/// Derived summary shown in the storage panel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub conversation_count: usize,
    pub message_count: usize,
    #[serde(rename = "dataSizeKB")]
    pub data_size_kb: u64,
    pub has_api_key: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Partial updates
// ═══════════════════════════════════════════════════════════════════════════

/// Partial update of `UserPreferences`; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreferencesPatch {
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub video_quality: Option<VideoQuality>,
    pub audio_enabled: Option<bool>,
    pub video_enabled: Option<bool>,
    pub notifications: Option<bool>,
    pub auto_start_video: Option<bool>,
}

impl PreferencesPatch {
    pub fn apply(&self, prefs: &mut UserPreferences) {
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        if let Some(language) = &self.language {
            prefs.language = language.clone();
        }
        if let Some(quality) = self.video_quality {
            prefs.video_quality = quality;
        }
        if let Some(v) = self.audio_enabled {
            prefs.audio_enabled = v;
        }
        if let Some(v) = self.video_enabled {
            prefs.video_enabled = v;
        }
        if let Some(v) = self.notifications {
            prefs.notifications = v;
        }
        if let Some(v) = self.auto_start_video {
            prefs.auto_start_video = v;
        }
    }
}

/// Partial update of `TavusSettings`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TavusSettingsPatch {
    pub api_key: Option<String>,
    pub replica_id: Option<String>,
    pub persona_id: Option<String>,
    pub last_used_conversation_id: Option<String>,
    pub max_duration: Option<NonZeroU32>,
    pub enable_streaming: Option<bool>,
    pub video_chat_enabled: Option<bool>,
}

impl TavusSettingsPatch {
    pub fn apply(&self, settings: &mut TavusSettings) {
        if let Some(key) = &self.api_key {
            settings.api_key = key.clone();
        }
        if let Some(id) = &self.replica_id {
            settings.replica_id = id.clone();
        }
        if let Some(id) = &self.persona_id {
            settings.persona_id = id.clone();
        }
        if let Some(id) = &self.last_used_conversation_id {
            settings.last_used_conversation_id = Some(id.clone());
        }
        if let Some(d) = self.max_duration {
            settings.max_duration = d;
        }
        if let Some(v) = self.enable_streaming {
            settings.enable_streaming = v;
        }
        if let Some(v) = self.video_chat_enabled {
            settings.video_chat_enabled = v;
        }
    }
}

/// Partial update of a `ConversationRecord` (the id is never changed)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConversationPatch {
    pub name: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: Option<u32>,
    pub status: Option<ConversationStatus>,
    pub video_url: Option<String>,
}

impl ConversationPatch {
    pub fn status(status: ConversationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut ConversationRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(at) = self.last_message_at {
            record.last_message_at = at;
        }
        if let Some(count) = self.message_count {
            record.message_count = count;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(url) = &self.video_url {
            record.video_url = Some(url.clone());
        }
    }
}
