//! Crate-level error type.

use thiserror::Error;

use crate::exchange::ExchangeStatus;
use crate::protocol::ErrorInfo;

/// Visible text for transport-level failures (connect, read, write).
pub const NETWORK_ERROR: &str = "Network error";
/// Visible text when a terminal payload cannot be decoded.
pub const MALFORMED_ERROR: &str = "Malformed response from server";
/// Visible text when the transport ends without a terminal event.
pub const STREAM_CLOSED_ERROR: &str = "Stream closed before completion";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("an exchange is already streaming")]
    ExchangeActive,

    #[error("no exchange is streaming")]
    NoActiveExchange,

    #[error("cannot {event} an exchange that is {from}")]
    InvalidTransition {
        from: ExchangeStatus,
        event: &'static str,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Application error reported by the backend; `None` when the backend
    /// gave no message.
    #[error("backend error: {}", .0.as_deref().unwrap_or("<none>"))]
    Backend(Option<String>),

    #[error("stream closed before completion")]
    StreamClosed,

    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Convert a failure into the payload shown to the user.
    pub fn to_error_info(&self) -> ErrorInfo {
        let text = match self {
            ChatError::Network(_) | ChatError::WebSocket(_) | ChatError::Io(_) => {
                NETWORK_ERROR.to_string()
            }
            ChatError::Malformed(_) => MALFORMED_ERROR.to_string(),
            ChatError::StreamClosed => STREAM_CLOSED_ERROR.to_string(),
            ChatError::Backend(msg) => return ErrorInfo { error: msg.clone() },
            other => other.to_string(),
        };
        ErrorInfo { error: Some(text) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_passes_message_verbatim() {
        let info = ChatError::Backend(Some("rate limited".to_string())).to_error_info();
        assert_eq!(info.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_backend_error_without_message_stays_empty() {
        let info = ChatError::Backend(None).to_error_info();
        assert!(info.error.is_none());
        assert_eq!(info.display_text(), "Stream error");
    }

    #[test]
    fn test_malformed_maps_to_fixed_text() {
        let err = serde_json::from_str::<ErrorInfo>("{").unwrap_err();
        let info = ChatError::from(err).to_error_info();
        assert_eq!(info.error.as_deref(), Some(MALFORMED_ERROR));
    }

    #[test]
    fn test_io_maps_to_network_error() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let info = ChatError::from(err).to_error_info();
        assert_eq!(info.error.as_deref(), Some(NETWORK_ERROR));
    }

    #[test]
    fn test_stream_closed_text() {
        assert_eq!(
            ChatError::StreamClosed.to_error_info().error.as_deref(),
            Some(STREAM_CLOSED_ERROR)
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = ChatError::InvalidTransition {
            from: ExchangeStatus::Complete,
            event: "apply a chunk to",
        };
        assert_eq!(err.to_string(), "cannot apply a chunk to an exchange that is complete");
    }
}
