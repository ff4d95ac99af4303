//! Remote API errors

/// Errors returned by the Tavus client
#[derive(Debug, thiserror::Error)]
pub enum TavusError {
    #[error("Tavus API key is not configured")]
    MissingApiKey,

    #[error("Invalid Tavus API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Tavus API request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Tavus API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode Tavus API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TavusError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

impl TavusError {
    /// Build an `Api` error from a non-success response body.
    ///
    /// The message comes from the body's `message` or `error` field (string, or
    /// object with `message`), else the status reason phrase.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let from_body = parsed.as_ref().and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .or_else(|| v.get("error").and_then(|e| e.as_str()))
                .or_else(|| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                })
                .map(str::to_string)
        });

        let message = from_body.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

        Self::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn message(err: TavusError) -> String {
        match err {
            TavusError::Api { message, .. } => message,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_message_sources() {
        assert_eq!(
            message(TavusError::from_response(
                StatusCode::BAD_REQUEST,
                r#"{"message":"Invalid replica"}"#
            )),
            "Invalid replica"
        );
        assert_eq!(
            message(TavusError::from_response(
                StatusCode::UNAUTHORIZED,
                r#"{"error":"Invalid access token"}"#
            )),
            "Invalid access token"
        );
        assert_eq!(
            message(TavusError::from_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"error":{"code":"bad","message":"persona_id required"}}"#
            )),
            "persona_id required"
        );
        assert_eq!(
            message(TavusError::from_response(StatusCode::BAD_GATEWAY, "<html>")),
            "Bad Gateway"
        );
    }

    #[test]
    fn test_status_kept() {
        let err = TavusError::from_response(StatusCode::NOT_FOUND, "");
        assert!(matches!(err, TavusError::Api { status: 404, .. }));
        assert_eq!(err.to_string(), "Tavus API error (404): Not Found");
    }
}
