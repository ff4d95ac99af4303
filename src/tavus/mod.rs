//! Tavus Conversation API
//!
//! Typed client for the remote video-avatar service plus its webhook payloads.
//! The state store never calls into this module; `session` bridges the two.

pub mod client;
pub mod error;
pub mod types;
pub mod webhook;

pub use client::{ConversationApi, RequestTimeouts, TavusClient};
pub use error::TavusError;
pub use types::{
    map_remote_status, ConversationProperties, CreateConversationRequest, MessageReply, Persona,
    RemoteConversation, Replica,
};
pub use webhook::{log_webhook_event, WebhookData, WebhookEvent, WebhookEventType};
