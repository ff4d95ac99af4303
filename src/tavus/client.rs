//! HTTP client for the Tavus Conversation API
//!
//! Every request carries the `x-api-key` header. Timeouts per operation:
//! - connection check: 10 s
//! - sending a message: 60 s
//! - everything else: 30 s

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use super::error::TavusError;
use super::types::{
    CreateConversationRequest, ListResponse, MessageReply, Persona, RemoteConversation, Replica,
};

const API_KEY_HEADER: &str = "x-api-key";

/// Per-operation request timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub check: Duration,
    pub standard: Duration,
    pub message: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            check: Duration::from_secs(10),
            standard: Duration::from_secs(30),
            message: Duration::from_secs(60),
        }
    }
}

/// Remote conversation operations used by a consultation session
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<RemoteConversation, TavusError>;

    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageReply, TavusError>;

    async fn get_conversation(&self, conversation_id: &str)
        -> Result<RemoteConversation, TavusError>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), TavusError>;
}

pub struct TavusClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    timeouts: RequestTimeouts,
}

impl TavusClient {
    /// Client for `base_url` (e.g. `https://tavusapi.com/v2`); an empty key is rejected
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TavusError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TavusError::MissingApiKey);
        }

        let base_url = base_url.into();
        let parsed = Url::parse(&base_url)
            .map_err(|e| TavusError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(TavusError::InvalidBaseUrl(base_url));
        }

        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: parsed,
            api_key,
            timeouts: RequestTimeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL extended by `segments`, each percent-encoded as one path segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str], timeout: Duration) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(segments))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
    }

    /// Fail on non-success status, turning the body into an `Api` error
    async fn check(response: Response) -> Result<Response, TavusError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TavusError::from_response(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, TavusError> {
        let response = Self::check(builder.send().await?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// True when the API answers the replica listing with 200
    pub async fn test_connection(&self) -> bool {
        match self
            .request(Method::GET, &["replicas"], self.timeouts.check)
            .send()
            .await
        {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                error!("Tavus API connection test failed: {}", e);
                false
            }
        }
    }

    pub async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<RemoteConversation, TavusError> {
        let builder = self
            .request(Method::POST, &["conversations"], self.timeouts.standard)
            .json(request);
        let conversation: RemoteConversation = Self::send_json(builder).await.map_err(|e| {
            error!("Error creating conversation: {}", e);
            e
        })?;
        debug!("Created remote conversation {}", conversation.conversation_id);
        Ok(conversation)
    }

    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageReply, TavusError> {
        let builder = self
            .request(
                Method::POST,
                &["conversations", conversation_id],
                self.timeouts.message,
            )
            .json(&serde_json::json!({ "text": text }));
        Self::send_json(builder).await.map_err(|e| {
            error!("Error sending message to {}: {}", conversation_id, e);
            e
        })
    }

    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<RemoteConversation, TavusError> {
        let builder = self.request(
            Method::GET,
            &["conversations", conversation_id],
            self.timeouts.standard,
        );
        Self::send_json(builder).await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), TavusError> {
        let response = self
            .request(
                Method::DELETE,
                &["conversations", conversation_id],
                self.timeouts.standard,
            )
            .send()
            .await?;
        Self::check(response).await.map_err(|e| {
            warn!("Error deleting remote conversation {}: {}", conversation_id, e);
            e
        })?;
        Ok(())
    }

    pub async fn list_replicas(&self) -> Result<Vec<Replica>, TavusError> {
        let builder = self.request(Method::GET, &["replicas"], self.timeouts.standard);
        let list: ListResponse<Replica> = Self::send_json(builder).await?;
        Ok(list.data)
    }

    pub async fn list_personas(&self) -> Result<Vec<Persona>, TavusError> {
        let builder = self.request(Method::GET, &["personas"], self.timeouts.standard);
        let list: ListResponse<Persona> = Self::send_json(builder).await?;
        Ok(list.data)
    }
}

#[async_trait]
impl ConversationApi for TavusClient {
    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<RemoteConversation, TavusError> {
        TavusClient::create_conversation(self, request).await
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageReply, TavusError> {
        TavusClient::send_message(self, conversation_id, text).await
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<RemoteConversation, TavusError> {
        TavusClient::get_conversation(self, conversation_id).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), TavusError> {
        TavusClient::delete_conversation(self, conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode, Uri};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use parking_lot::Mutex;

    /// Request seen by the stub upstream
    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        path: String,
        api_key: Option<String>,
        body: String,
    }

    /// Canned reply; `None` status means hang past any client timeout
    type Reply = (Option<u16>, &'static str);

    #[derive(Clone, Default)]
    struct StubState {
        replies: Arc<Mutex<VecDeque<Reply>>>,
        captured: Arc<Mutex<Vec<Captured>>>,
    }

    async fn upstream(
        State(state): State<StubState>,
        method: axum::http::Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> AxumResponse {
        state.captured.lock().push(Captured {
            method: method.to_string(),
            path: uri.path().to_string(),
            api_key: headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: String::from_utf8_lossy(&body).to_string(),
        });

        let reply = state.replies.lock().pop_front();
        let (status, body) = match reply {
            Some((Some(status), body)) => (status, body),
            Some((None, _)) => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                (200, "{}")
            }
            None => (500, r#"{"message":"no canned reply"}"#),
        };
        (
            StatusCode::from_u16(status).unwrap(),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }

    /// Serve `replies` in order; returns the `/v2` base URL and the captured requests
    async fn stub_server(replies: Vec<Reply>) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let state = StubState {
            replies: Arc::new(Mutex::new(replies.into())),
            captured: Arc::default(),
        };
        let captured = state.captured.clone();

        let app = axum::Router::new().fallback(upstream).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind tavus upstream");
        let addr = listener.local_addr().expect("tavus upstream addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("tavus upstream serve");
        });

        (format!("http://{}/v2", addr), captured)
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            TavusClient::new("https://tavusapi.com/v2", ""),
            Err(TavusError::MissingApiKey)
        ));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            TavusClient::new("not a url", "tvs-key"),
            Err(TavusError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            TavusClient::new("mailto:ops@example.com", "tvs-key"),
            Err(TavusError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = TavusClient::new("https://tavusapi.com/v2/", "tvs-key").unwrap();
        assert_eq!(
            client.endpoint(&["conversations", "c1"]).as_str(),
            "https://tavusapi.com/v2/conversations/c1"
        );
        assert_eq!(
            client.endpoint(&["conversations", "a/b?c#d"]).as_str(),
            "https://tavusapi.com/v2/conversations/a%2Fb%3Fc%23d"
        );
    }

    #[tokio::test]
    async fn test_create_conversation() {
        let (base, captured) = stub_server(vec![(
            Some(200),
            r#"{"conversation_id":"c123","status":"active","conversation_url":"https://tavus.daily.co/c123"}"#,
        )])
        .await;
        let client = TavusClient::new(base, "tvs-key").unwrap();

        let request = CreateConversationRequest::from_settings(&Default::default(), "en");
        let conversation = client.create_conversation(&request).await.unwrap();

        assert_eq!(conversation.conversation_id, "c123");
        assert_eq!(conversation.status.as_deref(), Some("active"));

        let seen = captured.lock()[0].clone();
        assert_eq!(seen.method, "POST");
        assert_eq!(seen.path, "/v2/conversations");
        assert_eq!(seen.api_key.as_deref(), Some("tvs-key"));
        let body: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(body["properties"]["max_duration"], 30);
    }

    #[tokio::test]
    async fn test_send_message() {
        let (base, captured) = stub_server(vec![(
            Some(200),
            r#"{"video_url":"https://cdn.tavus.io/v.mp4","status":"completed"}"#,
        )])
        .await;
        let client = TavusClient::new(base, "tvs-key").unwrap();

        let reply = client.send_message("c123", "I have a headache").await.unwrap();
        assert_eq!(reply.video_url.as_deref(), Some("https://cdn.tavus.io/v.mp4"));
        assert!(!reply.is_live);

        let seen = captured.lock()[0].clone();
        assert_eq!(seen.path, "/v2/conversations/c123");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&seen.body).unwrap(),
            serde_json::json!({ "text": "I have a headache" })
        );
    }

    #[tokio::test]
    async fn test_conversation_id_stays_one_segment() {
        let (base, captured) = stub_server(vec![(Some(204), "")]).await;
        let client = TavusClient::new(base, "tvs-key").unwrap();

        client.delete_conversation("../replicas?x=1").await.unwrap();

        let seen = captured.lock()[0].clone();
        assert_eq!(seen.method, "DELETE");
        assert_eq!(seen.path, "/v2/conversations/..%2Freplicas%3Fx=1");
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let (base, _) = stub_server(vec![(Some(400), r#"{"message":"Invalid persona"}"#)]).await;
        let client = TavusClient::new(base, "tvs-key").unwrap();

        let err = client.get_conversation("c1").await.unwrap_err();
        match err {
            TavusError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid persona");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_and_lists() {
        let (base, captured) = stub_server(vec![
            (Some(204), ""),
            (Some(200), r#"{"data":[{"replica_id":"r1","replica_name":"Amy"}]}"#),
            (Some(200), r#"{"data":[{"persona_id":"p1","persona_name":"GP","context":"clinic"}]}"#),
        ])
        .await;
        let client = TavusClient::new(base, "tvs-key").unwrap();

        client.delete_conversation("c1").await.unwrap();
        let replicas = client.list_replicas().await.unwrap();
        let personas = client.list_personas().await.unwrap();

        assert_eq!(replicas[0].name, "Amy");
        assert_eq!(personas[0].id, "p1");
        assert_eq!(personas[0].context, "clinic");

        let seen = captured.lock().clone();
        assert_eq!(seen[0].method, "DELETE");
        assert_eq!(seen[0].path, "/v2/conversations/c1");
        assert_eq!(seen[1].path, "/v2/replicas");
        assert_eq!(seen[2].path, "/v2/personas");
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let (base, _) = stub_server(vec![(Some(200), "not json")]).await;
        let client = TavusClient::new(base, "tvs-key").unwrap();

        assert!(matches!(
            client.get_conversation("c1").await,
            Err(TavusError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_check() {
        let (base, _) = stub_server(vec![(Some(200), r#"{"data":[]}"#), (Some(401), "{}")]).await;
        let client = TavusClient::new(base, "tvs-key").unwrap();

        assert!(client.test_connection().await);
        assert!(!client.test_connection().await);
    }

    #[tokio::test]
    async fn test_timeout() {
        let (base, _) = stub_server(vec![(None, "")]).await;
        let client = TavusClient::new(base, "tvs-key")
            .unwrap()
            .with_timeouts(RequestTimeouts {
                check: Duration::from_millis(200),
                standard: Duration::from_millis(200),
                message: Duration::from_millis(200),
            });

        assert!(matches!(
            client.send_message("c1", "hello").await,
            Err(TavusError::Timeout)
        ));
    }
}
