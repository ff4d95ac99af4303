//! Consultation session
//!
//! Drives one remote conversation and records what happens in the app store:
//! the conversation record, every user/agent message, and status changes.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::persistence::StorageBackend;
use crate::state::{
    AppStore, ConversationPatch, ConversationRecord, ConversationStatus, MessageRecord,
    MessageType, StoreError, TavusSettingsPatch,
};
use crate::tavus::{ConversationApi, CreateConversationRequest, TavusError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No conversation started")]
    NotStarted,

    #[error("Remote error: {0}")]
    Remote(#[from] TavusError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct ConsultationSession<'s, A: ?Sized, B: StorageBackend> {
    api: &'s A,
    store: &'s AppStore<B>,
    conversation_id: Option<String>,
}

impl<'s, A: ConversationApi + ?Sized, B: StorageBackend> ConsultationSession<'s, A, B> {
    pub fn new(api: &'s A, store: &'s AppStore<B>) -> Self {
        Self {
            api,
            store,
            conversation_id: None,
        }
    }

    /// Continue an existing conversation
    pub fn resume(api: &'s A, store: &'s AppStore<B>, conversation_id: impl Into<String>) -> Self {
        Self {
            api,
            store,
            conversation_id: Some(conversation_id.into()),
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    fn current(&self) -> Result<&str, SessionError> {
        self.conversation_id.as_deref().ok_or(SessionError::NotStarted)
    }

    /// Create a remote conversation with the stored settings and record it locally
    pub async fn start(&mut self, name: &str) -> Result<ConversationRecord, SessionError> {
        let state = self.store.get_state();
        let request = CreateConversationRequest::from_settings(
            &state.tavus_settings,
            &state.user_preferences.language,
        )
        .named(name);
        let remote = self.api.create_conversation(&request).await?;

        let now = Utc::now();
        let record = ConversationRecord {
            id: remote.conversation_id.clone(),
            name: name.to_string(),
            created_at: now,
            last_message_at: now,
            message_count: 0,
            status: ConversationStatus::Active,
            video_url: remote.video_url.clone(),
        };
        self.store.add_conversation(record.clone())?;
        self.store.update_tavus_settings(&TavusSettingsPatch {
            last_used_conversation_id: Some(record.id.clone()),
            ..Default::default()
        })?;

        info!(conversation_id = %record.id, "Consultation started");
        self.conversation_id = Some(record.id.clone());
        Ok(record)
    }

    /// Record `text` as a user message and forward it.
    ///
    /// On success the agent reply is recorded and returned; on failure the
    /// conversation is marked `error` and the remote error is returned.
    pub async fn send(&self, text: &str) -> Result<MessageRecord, SessionError> {
        let conversation_id = self.current()?.to_string();

        self.store.add_message(MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            content: text.to_string(),
            kind: MessageType::User,
            timestamp: Utc::now(),
            video_url: None,
        })?;

        let reply = match self.api.send_message(&conversation_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(conversation_id = %conversation_id, "Message failed: {}", e);
                self.store.update_conversation(
                    &conversation_id,
                    &ConversationPatch::status(ConversationStatus::Error),
                )?;
                return Err(e.into());
            }
        };

        let agent = MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            content: format!("Medical consultation response generated for: \"{}\"", text),
            kind: MessageType::Agent,
            timestamp: Utc::now(),
            video_url: reply.video_url.clone(),
        };
        self.store.add_message(agent.clone())?;

        if let Some(url) = reply.video_url {
            self.store.update_conversation(
                &conversation_id,
                &ConversationPatch {
                    video_url: Some(url),
                    ..Default::default()
                },
            )?;
        }
        Ok(agent)
    }

    /// Pull the remote status onto the local record
    pub async fn refresh_status(&self) -> Result<ConversationStatus, SessionError> {
        let conversation_id = self.current()?;
        let remote = self.api.get_conversation(conversation_id).await?;
        let status = remote.local_status();

        self.store.update_conversation(
            conversation_id,
            &ConversationPatch {
                status: Some(status),
                video_url: remote.video_url,
                ..Default::default()
            },
        )?;
        Ok(status)
    }

    /// Mark the conversation completed and detach from it
    pub async fn end(&mut self) -> Result<(), SessionError> {
        let conversation_id = self.current()?.to_string();
        self.store.update_conversation(
            &conversation_id,
            &ConversationPatch {
                status: Some(ConversationStatus::Completed),
                last_message_at: Some(Utc::now()),
                ..Default::default()
            },
        )?;
        info!(conversation_id = %conversation_id, "Consultation ended");
        self.conversation_id = None;
        Ok(())
    }

    /// Delete the conversation remotely, then locally with its messages
    pub async fn discard(&mut self) -> Result<(), SessionError> {
        let conversation_id = self.current()?.to_string();
        self.api.delete_conversation(&conversation_id).await?;
        self.store.delete_conversation(&conversation_id)?;
        self.conversation_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;
    use crate::tavus::{MessageReply, RemoteConversation};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeApi {
        fail_send: AtomicBool,
        remote_status: Mutex<Option<String>>,
        requests: Mutex<Vec<CreateConversationRequest>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConversationApi for FakeApi {
        async fn create_conversation(
            &self,
            request: &CreateConversationRequest,
        ) -> Result<RemoteConversation, TavusError> {
            self.requests.lock().push(request.clone());
            Ok(RemoteConversation {
                conversation_id: "remote-1".to_string(),
                conversation_name: request.conversation_name.clone(),
                status: Some("active".to_string()),
                conversation_url: None,
                video_url: None,
                stream_url: None,
            })
        }

        async fn send_message(
            &self,
            _conversation_id: &str,
            _text: &str,
        ) -> Result<MessageReply, TavusError> {
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(TavusError::Timeout);
            }
            Ok(MessageReply {
                video_url: Some("https://cdn.tavus.io/reply.mp4".to_string()),
                status: Some("completed".to_string()),
                ..Default::default()
            })
        }

        async fn get_conversation(
            &self,
            conversation_id: &str,
        ) -> Result<RemoteConversation, TavusError> {
            Ok(RemoteConversation {
                conversation_id: conversation_id.to_string(),
                conversation_name: None,
                status: self.remote_status.lock().clone(),
                conversation_url: None,
                video_url: None,
                stream_url: None,
            })
        }

        async fn delete_conversation(&self, conversation_id: &str) -> Result<(), TavusError> {
            self.deleted.lock().push(conversation_id.to_string());
            Ok(())
        }
    }

    fn create_test_store() -> AppStore<MemoryStorage> {
        let store = AppStore::new(MemoryStorage::new());
        store.init();
        store
    }

    #[tokio::test]
    async fn test_start_records_conversation() {
        let store = create_test_store();
        let api = FakeApi::default();
        let mut session = ConsultationSession::new(&api, &store);

        let record = session.start("Headache").await.unwrap();

        assert_eq!(record.id, "remote-1");
        assert_eq!(session.conversation_id(), Some("remote-1"));

        let state = store.get_state();
        assert_eq!(state.conversations[0].status, ConversationStatus::Active);
        assert_eq!(state.conversations[0].name, "Headache");
        assert_eq!(
            state.tavus_settings.last_used_conversation_id.as_deref(),
            Some("remote-1")
        );

        let request = api.requests.lock()[0].clone();
        assert_eq!(request.replica_id, state.tavus_settings.replica_id);
        assert_eq!(request.properties.max_duration, Some(30));
    }

    #[tokio::test]
    async fn test_send_records_both_messages() {
        let store = create_test_store();
        let api = FakeApi::default();
        let mut session = ConsultationSession::new(&api, &store);
        session.start("Visit").await.unwrap();

        let agent = session.send("I feel dizzy").await.unwrap();
        assert_eq!(agent.kind, MessageType::Agent);

        let state = store.get_state();
        assert_eq!(state.recent_messages.len(), 2);
        assert_eq!(state.recent_messages[0].kind, MessageType::Agent);
        assert_eq!(state.recent_messages[1].content, "I feel dizzy");
        assert_eq!(state.conversations[0].message_count, 2);
        assert_eq!(
            state.conversations[0].video_url.as_deref(),
            Some("https://cdn.tavus.io/reply.mp4")
        );
    }

    #[tokio::test]
    async fn test_send_failure_marks_error() {
        let store = create_test_store();
        let api = FakeApi::default();
        api.fail_send.store(true, Ordering::SeqCst);
        let mut session = ConsultationSession::new(&api, &store);
        session.start("Visit").await.unwrap();

        let err = session.send("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Remote(TavusError::Timeout)));

        let state = store.get_state();
        assert_eq!(state.conversations[0].status, ConversationStatus::Error);
        assert_eq!(state.recent_messages.len(), 1);
    }

    #[tokio::test]
    async fn test_requires_start() {
        let store = create_test_store();
        let api = FakeApi::default();
        let session = ConsultationSession::new(&api, &store);

        assert!(matches!(
            session.send("hello").await,
            Err(SessionError::NotStarted)
        ));
        assert!(store.get_state().recent_messages.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_and_end() {
        let store = create_test_store();
        let api = FakeApi::default();
        let mut session = ConsultationSession::new(&api, &store);
        session.start("Visit").await.unwrap();

        *api.remote_status.lock() = Some("ended".to_string());
        assert_eq!(
            session.refresh_status().await.unwrap(),
            ConversationStatus::Completed
        );

        *api.remote_status.lock() = Some("error".to_string());
        assert_eq!(session.refresh_status().await.unwrap(), ConversationStatus::Error);

        session.end().await.unwrap();
        assert_eq!(session.conversation_id(), None);
        assert_eq!(
            store.get_state().conversations[0].status,
            ConversationStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_discard_cascades() {
        let store = create_test_store();
        let api = FakeApi::default();
        let mut session = ConsultationSession::new(&api, &store);
        session.start("Visit").await.unwrap();
        session.send("hello").await.unwrap();

        session.discard().await.unwrap();

        assert_eq!(api.deleted.lock().as_slice(), ["remote-1".to_string()]);
        let state = store.get_state();
        assert!(state.conversations.is_empty());
        assert!(state.recent_messages.is_empty());
    }
}
