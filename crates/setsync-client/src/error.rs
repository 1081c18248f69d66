//! Audit API client error types.

/// Errors from audit API calls.
#[derive(Debug, thiserror::Error)]
pub enum AuditApiError {
    /// HTTP transport error (connection, timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The API returned a non-2xx status. `detail` is the server's message.
    #[error("audit API {endpoint} returned {status}: {detail}")]
    Api {
        endpoint: String,
        status: u16,
        detail: String,
    },
    /// Response body did not match the endpoint's schema.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Response parsed but violated a boundary rule (e.g. score out of range).
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl AuditApiError {
    /// The endpoint the failing call targeted, when there was one.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Http { endpoint, .. }
            | Self::Api { endpoint, .. }
            | Self::Deserialization { endpoint, .. }
            | Self::Malformed { endpoint, .. } => Some(endpoint),
            Self::Config(_) => None,
        }
    }

    /// The message to show a user: the server's detail verbatim for API
    /// errors, the error text otherwise.
    pub fn detail(&self) -> String {
        match self {
            Self::Api { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepted shapes, in order: `{"detail": "..."}`, `{"detail": {"message":
/// "..."}}`, `{"message": "..."}`, `{"error": {"message": "..."}}`,
/// `{"error": "..."}`. Anything else yields the raw body, or `fallback` when
/// the body is empty.
pub(crate) fn extract_detail(body: &str, fallback: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let text = |v: &serde_json::Value| v.as_str().map(str::to_string);
            let message = |v: &serde_json::Value| v.get("message").and_then(|m| text(m));
            v.get("detail")
                .and_then(|d| text(d).or_else(|| message(d)))
                .or_else(|| message(&v))
                .or_else(|| v.get("error").and_then(|e| message(e).or_else(|| text(e))))
        });
    match from_json {
        Some(detail) => detail,
        None if body.trim().is_empty() => fallback.to_string(),
        None => body.trim().to_string(),
    }
}
