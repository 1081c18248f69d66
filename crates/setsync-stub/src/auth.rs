//! Bearer-token check for the stub API.
//!
//! When a token is configured every request must carry
//! `Authorization: Bearer <token>`. Comparison is constant-time.

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::StubError;

/// Token the stub expects, if any.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());
    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => {
            next.run(request).await
        }
        Some(_) => StubError::Unauthorized("Invalid API token".into()).into_response(),
        None => StubError::Unauthorized("Missing bearer token".into()).into_response(),
    }
}
