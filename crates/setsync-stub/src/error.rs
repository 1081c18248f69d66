//! # Stub Error Responses
//!
//! Every error body carries a `detail`, either a string or, for a blocked
//! publish, an object listing the violations. Clients surface it verbatim.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use setsync_core::PillarKey;

#[derive(Error, Debug)]
pub enum StubError {
    /// 404.
    #[error("{0}")]
    NotFound(String),

    /// 422.
    #[error("{0}")]
    Validation(String),

    /// 400.
    #[error("{0}")]
    BadRequest(String),

    /// 401.
    #[error("{0}")]
    Unauthorized(String),

    /// 422 with the failing pillars.
    #[error("You must fix compliance violations before publishing.")]
    PublishBlocked { violations: Vec<PillarKey> },
}

impl StubError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::PublishBlocked { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::PublishBlocked { violations } => json!({
                "error": "Publishing Blocked",
                "violations": violations,
                "message": self.to_string(),
            }),
            other => json!(other.to_string()),
        };
        tracing::debug!(status = status.as_u16(), %detail, "stub request rejected");
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<setsync_core::ValidationError> for StubError {
    fn from(err: setsync_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
