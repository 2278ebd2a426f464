use serde::Deserialize;

/// Failure of a single chat turn.
///
/// Malformed stream events never surface here; they are logged and skipped
/// while the turn keeps reading.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no API key configured")]
    MissingApiKey,

    /// Connection or body stream failure, carrying the transport's own message.
    #[error("{0}")]
    Transport(String),

    /// Structured error payload returned by the provider instead of a stream.
    #[error("GLM-4 API error: {0}")]
    Provider(String),

    #[error("GLM-4 API error: HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("context store failure: {0:#}")]
    Context(anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ChatError {
    /// Map a non-success response to an error, preferring the provider's own message.
    ///
    /// Zhipu reports failures as `{"error":{"code":"1002","message":"..."}}`.
    pub(crate) fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope {
                error:
                    ErrorBody {
                        message: Some(message),
                        code,
                    },
            }) if !message.is_empty() => {
                tracing::debug!(%status, ?code, "provider returned structured error");
                ChatError::Provider(message)
            }
            _ => ChatError::Http {
                status: status.as_u16(),
                body: body.to_string(),
            },
        }
    }

    pub(crate) fn transport(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn structured_error_uses_provider_message() {
        let body = r#"{"error":{"code":"1113","message":"account balance exhausted"}}"#;
        let err = ChatError::from_response(StatusCode::TOO_MANY_REQUESTS, body);
        match &err {
            ChatError::Provider(msg) => assert_eq!(msg, "account balance exhausted"),
            other => panic!("expected Provider, got {other:?}"),
        }
        assert_eq!(err.to_string(), "GLM-4 API error: account balance exhausted");
    }

    #[test]
    fn unstructured_body_keeps_status_and_text() {
        let err = ChatError::from_response(StatusCode::BAD_GATEWAY, "upstream timed out");
        match err {
            ChatError::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream timed out");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn error_object_without_message_falls_back_to_http() {
        let err = ChatError::from_response(StatusCode::UNAUTHORIZED, r#"{"error":{"code":"1000"}}"#);
        assert!(matches!(err, ChatError::Http { status: 401, .. }));
    }

    #[test]
    fn context_error_shows_cause_chain() {
        let cause = anyhow::anyhow!("disk full").context("failed to write context");
        let err = ChatError::Context(cause);
        assert_eq!(
            err.to_string(),
            "context store failure: failed to write context: disk full"
        );
    }
}
