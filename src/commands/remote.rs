//! Remote API commands

use serde::Serialize;

use crate::config::Settings;
use crate::persistence::StorageBackend;
use crate::session::ConsultationSession;
use crate::state::{AppStore, ConversationRecord, MessageRecord};
use crate::tavus::{Persona, Replica, TavusClient};

/// API key from the environment, else the stored one
pub fn resolve_api_key<B: StorageBackend>(
    settings: &Settings,
    store: &AppStore<B>,
) -> Result<String, String> {
    if let Some(key) = &settings.api_key {
        return Ok(key.clone());
    }
    let stored = store.get_state().tavus_settings.api_key;
    if stored.is_empty() {
        return Err("Tavus API key is not configured (set TAVUS_API_KEY or store one)".to_string());
    }
    Ok(stored)
}

pub fn create_client<B: StorageBackend>(
    settings: &Settings,
    store: &AppStore<B>,
) -> Result<TavusClient, String> {
    let api_key = resolve_api_key(settings, store)?;
    TavusClient::new(settings.api_base.clone(), api_key).map_err(|e| e.to_string())
}

pub async fn test_connection(client: &TavusClient) -> bool {
    client.test_connection().await
}

pub async fn list_replicas(client: &TavusClient) -> Result<Vec<Replica>, String> {
    client.list_replicas().await.map_err(|e| e.to_string())
}

pub async fn list_personas(client: &TavusClient) -> Result<Vec<Persona>, String> {
    client.list_personas().await.map_err(|e| e.to_string())
}

/// Transcript of a one-shot consultation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationTranscript {
    pub conversation: Option<ConversationRecord>,
    pub replies: Vec<MessageRecord>,
}

/// Start a conversation, send each message in order, then end it.
///
/// Stops at the first failed message; the conversation stays marked `error`.
pub async fn run_consultation<B: StorageBackend>(
    client: &TavusClient,
    store: &AppStore<B>,
    name: &str,
    messages: &[String],
) -> Result<ConsultationTranscript, String> {
    let mut session = ConsultationSession::new(client, store);
    let record = session.start(name).await.map_err(|e| e.to_string())?;

    let mut replies = Vec::with_capacity(messages.len());
    for text in messages {
        let reply = session.send(text).await.map_err(|e| e.to_string())?;
        replies.push(reply);
    }
    session.end().await.map_err(|e| e.to_string())?;

    Ok(ConsultationTranscript {
        conversation: store.get_state().conversation(&record.id).cloned(),
        replies,
    })
}

/// Delete a conversation on the remote service and locally
pub async fn discard_conversation<B: StorageBackend>(
    client: &TavusClient,
    store: &AppStore<B>,
    conversation_id: &str,
) -> Result<(), String> {
    let mut session = ConsultationSession::resume(client, store, conversation_id);
    session.discard().await.map_err(|e| e.to_string())
}
