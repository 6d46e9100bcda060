//! Error types and the message normalization shown to users.
//!
//! # Design
//! Every failed execution is folded into one `ApiError`. `user_message`
//! produces the single string a fetch state exposes. A server-supplied
//! `message` wins, then the transport's own text, then a generic fallback.

use std::fmt;

use serde_json::Value;

pub const GENERIC_ERROR: &str = "Something went wrong";

/// Failure reported by a `Transport` when no response came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request never reached the server or no response came back.
    Transport(TransportError),

    /// The server answered with a non-2xx status.
    Server {
        status: u16,
        message: Option<String>,
        body: String,
    },

    /// The payload did not have the expected shape.
    Decode(String),

    /// The request body could not be serialized.
    Serialization(String),
}

impl ApiError {
    /// Build a server error from a non-2xx response, picking up a
    /// `{"message": "..."}` body when present.
    pub fn from_response(status: u16, body: &str) -> Self {
        ApiError::Server {
            status,
            message: server_message(body),
            body: body.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The message surfaced through a fetch state's `error` field.
    pub fn user_message(&self) -> String {
        let message = match self {
            ApiError::Server {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Server { status, .. } => {
                format!("Request failed with status code {status}")
            }
            ApiError::Transport(err) => err.message.trim().to_string(),
            ApiError::Decode(msg) | ApiError::Serialization(msg) => msg.trim().to_string(),
        };
        if message.is_empty() {
            GENERIC_ERROR.to_string()
        } else {
            message
        }
    }
}

fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(err) => write!(f, "transport failed: {err}"),
            ApiError::Server {
                status,
                message: Some(message),
                ..
            } => write!(f, "HTTP {status}: {message}"),
            ApiError::Server { status, body, .. } => write!(f, "HTTP {status}: {body}"),
            ApiError::Decode(msg) => write!(f, "decoding failed: {msg}"),
            ApiError::Serialization(msg) => write!(f, "serialization failed: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_is_used_verbatim() {
        let err = ApiError::from_response(401, r#"{"message":"Invalid key"}"#);
        assert_eq!(err.user_message(), "Invalid key");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn server_without_message_reports_status() {
        let err = ApiError::from_response(500, "<html>oops</html>");
        assert_eq!(err.user_message(), "Request failed with status code 500");
    }

    #[test]
    fn blank_server_message_is_ignored() {
        let err = ApiError::from_response(400, r#"{"message":"  "}"#);
        assert_eq!(err.user_message(), "Request failed with status code 400");
    }

    #[test]
    fn transport_text_is_used() {
        let err = ApiError::from(TransportError::new("connection refused"));
        assert_eq!(err.user_message(), "connection refused");
    }

    #[test]
    fn empty_transport_text_falls_back() {
        let err = ApiError::from(TransportError::new(""));
        assert_eq!(err.user_message(), GENERIC_ERROR);
    }
}
