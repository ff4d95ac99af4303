//! Webhook events pushed by the Tavus API

use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "conversation.video_generated")]
    VideoGenerated,
    #[serde(rename = "conversation.completed")]
    Completed,
    #[serde(rename = "conversation.error")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_type: WebhookEventType,
    pub conversation_id: String,
    pub data: WebhookData,
}

impl WebhookEvent {
    /// Parse a webhook body; unknown event types are rejected
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

pub fn log_webhook_event(event: &WebhookEvent) {
    match event.event_type {
        WebhookEventType::VideoGenerated => info!(
            conversation_id = %event.conversation_id,
            video_url = event.data.video_url.as_deref().unwrap_or(""),
            "Video generated"
        ),
        WebhookEventType::Completed => info!(
            conversation_id = %event.conversation_id,
            status = %event.data.status,
            "Conversation completed"
        ),
        WebhookEventType::Error => error!(
            conversation_id = %event.conversation_id,
            error = event.data.error_message.as_deref().unwrap_or("unknown"),
            "Conversation error"
        ),
    }
}
