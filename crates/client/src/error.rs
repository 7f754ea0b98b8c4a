//! Error types for the synchronization layer.
//!
//! None of these are fatal: callers degrade to local state and surface the
//! message inline.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use storefront_sync_core::ValidationErrors;
use thiserror::Error;

/// Problem details returned by the API on non-success responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// Short summary.
    #[serde(default)]
    pub title: Option<String>,
    /// Human-readable explanation.
    #[serde(default)]
    pub detail: Option<String>,
    /// Individual error messages.
    #[serde(default, deserialize_with = "deserialize_errors")]
    pub errors: Vec<String>,
}

impl ProblemDetails {
    /// Problem details carrying only a detail message.
    #[must_use]
    pub fn from_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::default()
        }
    }

    /// The most specific message available.
    #[must_use]
    pub fn message(&self) -> String {
        if !self.errors.is_empty() {
            return self.errors.join("; ");
        }
        self.detail
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "request failed".to_string())
    }
}

/// The API reports errors either as a flat list or keyed by field.
fn deserialize_errors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        List(Vec<String>),
        ByField(BTreeMap<String, Vec<String>>),
        Null,
    }

    Ok(match Shape::deserialize(deserializer)? {
        Shape::List(errors) => errors,
        Shape::ByField(fields) => fields.into_values().flatten().collect(),
        Shape::Null => Vec::new(),
    })
}

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status.
    #[error("API error ({status}): {}", .problem.message())]
    Api {
        /// Response status.
        status: StatusCode,
        /// Decoded error body.
        problem: ProblemDetails,
    },

    /// The request was rejected as unauthenticated.
    #[error("Unauthorized")]
    Unauthorized,

    /// The signed-in user may not perform this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The token refresh failed and the session was cleared.
    #[error("Session expired, sign in again")]
    SessionExpired,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input failed validation before any request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A failed load shared by every caller that was waiting on it.
    #[error("{0}")]
    Shared(Arc<ApiError>),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status associated with the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(e) => e.status(),
            Self::Api { status, .. } => Some(*status),
            Self::Unauthorized | Self::SessionExpired => Some(StatusCode::UNAUTHORIZED),
            Self::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::Shared(inner) => inner.status(),
            Self::Parse(_) | Self::Validation(_) | Self::Url(_) => None,
        }
    }

    /// Whether the error means the user is no longer signed in.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Unauthorized | Self::SessionExpired => true,
            Self::Shared(inner) => inner.is_auth_failure(),
            _ => false,
        }
    }
}

impl From<Arc<Self>> for ApiError {
    fn from(shared: Arc<Self>) -> Self {
        Self::Shared(shared)
    }
}

/// Errors from the real-time hub connection.
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub is offline; calls fail immediately.
    #[error("Hub is not connected")]
    NotConnected,

    /// A pending connection did not settle in time.
    #[error("Timed out waiting for the hub connection")]
    ConnectTimeout,

    /// The connection dropped while the call was outstanding.
    #[error("Hub connection lost")]
    ConnectionLost,

    /// The server rejected the protocol handshake.
    #[error("Hub handshake failed: {0}")]
    Handshake(String),

    /// The server returned an error for an invocation.
    #[error("Hub invocation failed: {0}")]
    Invocation(String),

    /// The server did not complete an invocation in time.
    #[error("Hub invocation {0} timed out")]
    InvocationTimeout(String),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame could not be encoded or decoded.
    #[error("Hub protocol error: {0}")]
    Protocol(String),
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Errors from reading or writing persisted state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_details_list() {
        let problem: ProblemDetails =
            serde_json::from_str(r#"{"detail":"bad","errors":["a","b"]}"#).unwrap();
        assert_eq!(problem.message(), "a; b");
    }

    #[test]
    fn test_problem_details_by_field() {
        let problem: ProblemDetails = serde_json::from_str(
            r#"{"title":"One or more validation errors occurred.","errors":{"Email":["taken"]}}"#,
        )
        .unwrap();
        assert_eq!(problem.errors, vec!["taken".to_string()]);
    }

    #[test]
    fn test_problem_details_fallbacks() {
        let problem: ProblemDetails = serde_json::from_str(r#"{"errors":null}"#).unwrap();
        assert!(problem.errors.is_empty());
        assert_eq!(problem.message(), "request failed");
        assert_eq!(ProblemDetails::from_detail("nope").message(), "nope");
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Api {
            status: StatusCode::CONFLICT,
            problem: ProblemDetails::from_detail("out of stock"),
        };
        assert_eq!(err.to_string(), "API error (409 Conflict): out of stock");
    }

    #[test]
    fn test_shared_error_status() {
        let err = ApiError::from(Arc::new(ApiError::NotFound("product".to_string())));
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "Not found: product");
        assert!(ApiError::Shared(Arc::new(ApiError::SessionExpired)).is_auth_failure());
    }

    #[test]
    fn test_hub_error_display() {
        assert_eq!(HubError::NotConnected.to_string(), "Hub is not connected");
    }
}
