//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::MAX_DELIVERY_DETAIL_CHARS;

/// Main error type for TrackRelay
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RelayError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Delivery rejected with HTTP {status}: {body}")]
    Delivery { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Render the detail persisted alongside a failed delivery.
    ///
    /// Partner rejections keep the response body (verbatim when it is JSON,
    /// JSON-quoted otherwise); every other error is stored as a JSON string
    /// holding its message. The result never exceeds
    /// [`MAX_DELIVERY_DETAIL_CHARS`] characters.
    pub fn failure_detail(&self) -> String {
        let detail = match self {
            Self::Delivery { body, .. } => {
                if serde_json::from_str::<serde_json::Value>(body).is_ok() {
                    body.clone()
                } else {
                    serde_json::Value::String(body.clone()).to_string()
                }
            }
            other => serde_json::Value::String(other.to_string()).to_string(),
        };
        truncate_detail(detail)
    }
}

/// Truncate a delivery detail to [`MAX_DELIVERY_DETAIL_CHARS`] characters.
pub fn truncate_detail(detail: String) -> String {
    match detail.char_indices().nth(MAX_DELIVERY_DETAIL_CHARS) {
        Some((byte_idx, _)) => detail[..byte_idx].to_string(),
        None => detail,
    }
}

/// Result type alias for TrackRelay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_detail_keeps_json_body_verbatim() {
        let err = RelayError::Delivery { status: 500, body: r#"{"error":"boom"}"#.to_string() };
        assert_eq!(err.failure_detail(), r#"{"error":"boom"}"#);
    }

    #[test]
    fn delivery_detail_quotes_plain_text_body() {
        let err = RelayError::Delivery { status: 502, body: "Bad Gateway".to_string() };
        assert_eq!(err.failure_detail(), r#""Bad Gateway""#);
    }

    #[test]
    fn non_delivery_detail_is_quoted_message() {
        let err = RelayError::Timeout("delivery exceeded 10000ms".to_string());
        assert_eq!(err.failure_detail(), r#""Timeout: delivery exceeded 10000ms""#);
    }

    #[test]
    fn detail_is_truncated_on_char_boundary() {
        let body = format!("\"{}\"", "ñ".repeat(MAX_DELIVERY_DETAIL_CHARS + 10));
        let err = RelayError::Delivery { status: 500, body };

        let detail = err.failure_detail();
        assert_eq!(detail.chars().count(), MAX_DELIVERY_DETAIL_CHARS);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(RelayError::Database("gone".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "Database", "message": "gone" }));
    }
}
