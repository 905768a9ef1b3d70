//! Stub error types and their HTTP mapping.
//!
//! Handler errors end the single request they occur in; nothing persists
//! across requests.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use crate::domain::config::ConfigError;

/// Content type for plain-text bodies
pub const MIME_TEXT: &str = "text/plain";
/// Content type for JSON bodies
pub const MIME_JSON: &str = "application/json";

/// Request-level error, rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StubError {
    /// Required query parameter absent
    #[error("Parameter {0} missing in request")]
    MissingParameter(&'static str),

    /// Query parameter present but unusable
    #[error("Parameter {name} invalid: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Required field absent from a JSON item
    #[error("Parameter <{0}> missing in json")]
    MissingField(&'static str),

    /// Body is not the JSON shape the endpoint expects
    #[error("Invalid json body: {0}")]
    InvalidJson(String),

    /// Correlation id absent from a response lookup
    #[error("Parameter correlationid missing in request")]
    MissingCorrelationId,

    /// Direct access to a channel the bridge relay owns
    #[error("{0} not available in this mode")]
    NotAvailable(&'static str),

    /// Counter name not recognised
    #[error("Counter not found: {0}")]
    UnknownCounter(String),

    /// Generic topic body could not be parsed
    #[error("Server error: {0}")]
    Publish(String),

    /// Anything else
    #[error("Server error: {0}")]
    Internal(String),
}

impl StubError {
    /// Invalid query parameter
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidParameter { .. }
            | Self::MissingField(_)
            | Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::NotAvailable(_) | Self::UnknownCounter(_) => StatusCode::NOT_FOUND,
            // Reference behavior: a missing correlation id is a server error.
            Self::MissingCorrelationId | Self::Publish(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Publish(_) => {
                let body = serde_json::json!({
                    "message": self.to_string(),
                    "status": status.as_u16().to_string(),
                });
                (status, [(header::CONTENT_TYPE, MIME_JSON)], body.to_string()).into_response()
            }
            _ => (status, [(header::CONTENT_TYPE, MIME_TEXT)], self.to_string()).into_response(),
        }
    }
}

/// Result type for broker operations
pub type StubResult<T> = Result<T, StubError>;

/// Service-level errors (startup and serving, not per request)
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Upstream client could not be built
    #[error("upstream client error: {0}")]
    Upstream(String),

    /// HTTPS certificate or key could not be loaded
    #[error("tls setup error: {0}")]
    Tls(String),

    /// Server stopped with an error
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            StubError::MissingParameter("url").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StubError::MissingField("status").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StubError::NotAvailable("Drain").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StubError::MissingCorrelationId.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StubError::Publish("eof".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_name_the_offender() {
        assert!(StubError::MissingParameter("operation")
            .to_string()
            .contains("operation"));
        assert!(StubError::MissingField("correlationId")
            .to_string()
            .contains("correlationId"));
        assert!(StubError::invalid_parameter("limit", "not an integer")
            .to_string()
            .contains("limit"));
    }

    #[test]
    fn test_publish_error_is_json() {
        let response = StubError::Publish("expected value".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            MIME_JSON
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: ServiceError = ConfigError::SameTopics("t".into()).into();
        assert!(err.to_string().contains("configuration error"));
    }
}
