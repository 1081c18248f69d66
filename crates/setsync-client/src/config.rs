//! Audit API client configuration.
//!
//! One base URL serves every endpoint. Override via environment variables
//! or explicit construction for staging/testing.

use url::Url;
use zeroize::Zeroizing;

/// Default base URL of the audit API.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
/// Lower bound accepted for the request timeout.
pub const MIN_TIMEOUT_SECS: u64 = 10;
/// Upper bound accepted for the request timeout.
pub const MAX_TIMEOUT_SECS: u64 = 30;

/// Configuration for connecting to the audit API.
///
/// Custom `Debug` implementation redacts the credentials to prevent leakage
/// in log output. Both secrets are zeroized on drop.
#[derive(Clone)]
pub struct AuditApiConfig {
    /// Base URL of the audit API.
    pub base_url: Url,
    /// Bearer token sent as `Authorization: Bearer <token>`.
    pub api_token: Zeroizing<String>,
    /// Key sent as `X-API-Key`.
    pub api_key: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AuditApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditApiConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"[REDACTED]")
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AuditApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `SETSYNC_API_URL` (default: `http://localhost:8000`)
    /// - `SETSYNC_API_TOKEN` (required)
    /// - `SETSYNC_API_KEY` (default: the token)
    /// - `SETSYNC_TIMEOUT_SECS` (default: 15, clamped to 10..=30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var("SETSYNC_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let api_key = std::env::var("SETSYNC_API_KEY").unwrap_or_else(|_| api_token.clone());
        let timeout_secs = std::env::var("SETSYNC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            base_url: env_url("SETSYNC_API_URL", DEFAULT_API_URL)?,
            api_token: Zeroizing::new(api_token),
            api_key: Zeroizing::new(api_key),
            timeout_secs: clamp_timeout(timeout_secs),
        })
    }

    /// Configuration for an explicit base URL.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(base_url.to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            api_token: Zeroizing::new(token.to_string()),
            api_key: Zeroizing::new(token.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Configuration pointing at a server on localhost (for testing).
    pub fn local(port: u16, token: &str) -> Result<Self, ConfigError> {
        Self::new(&format!("http://127.0.0.1:{port}"), token)
    }

    /// Override the timeout, clamped to the accepted range.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = clamp_timeout(secs);
        self
    }
}

/// Clamp a timeout into `MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS`.
pub fn clamp_timeout(secs: u64) -> u64 {
    secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SETSYNC_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
}
