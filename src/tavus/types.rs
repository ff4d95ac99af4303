//! Wire types of the Tavus Conversation API (snake_case JSON)

use serde::{Deserialize, Serialize};

use crate::state::{ConversationStatus, TavusSettings};

/// Conversation options sent on creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationProperties {
    /// Maximum call duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_streaming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_chat_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    pub replica_id: String,
    pub persona_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_name: Option<String>,
    #[serde(default)]
    pub properties: ConversationProperties,
}

impl CreateConversationRequest {
    /// Request using the replica, persona and call options from `settings`
    pub fn from_settings(settings: &TavusSettings, language: &str) -> Self {
        Self {
            replica_id: settings.replica_id.clone(),
            persona_id: settings.persona_id.clone(),
            conversation_name: None,
            properties: ConversationProperties {
                max_duration: Some(settings.max_duration.get()),
                language: Some(language.to_string()),
                enable_streaming: Some(settings.enable_streaming),
                video_chat_enabled: Some(settings.video_chat_enabled),
            },
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.conversation_name = Some(name.into());
        self
    }
}

/// Conversation as returned by create / get
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConversation {
    #[serde(alias = "id")]
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

impl RemoteConversation {
    /// Local status for the remote one; missing status counts as active
    pub fn local_status(&self) -> ConversationStatus {
        self.status
            .as_deref()
            .map(map_remote_status)
            .unwrap_or(ConversationStatus::Active)
    }
}

/// Reply to a sent message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    #[serde(alias = "replica_id")]
    pub id: String,
    #[serde(default, alias = "replica_name")]
    pub name: String,
    #[serde(default, alias = "thumbnail_video_url", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(alias = "persona_id")]
    pub id: String,
    #[serde(default, alias = "persona_name")]
    pub name: String,
    #[serde(default)]
    pub context: String,
    #[serde(default, alias = "system_prompt")]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// List envelope: `{ "data": [...] }`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// `ended` / `completed` map to completed, `error` to error, anything else is active
pub fn map_remote_status(status: &str) -> ConversationStatus {
    match status {
        "ended" | "completed" => ConversationStatus::Completed,
        "error" => ConversationStatus::Error,
        _ => ConversationStatus::Active,
    }
}
