//! # setsync-client -- Typed Rust client for the SetSync audit API
//!
//! Provides typed access to every endpoint the compliance engine consumes:
//! - **Audit** (`/audit/...`, `/rerun-audit/...`): run and re-run audits,
//!   list flags, read the compliance score, remediate a flag.
//! - **Campaign** (`/contract`, `/campaign/...`, `/publish-live/...`): the
//!   contract, field rows, field updates and publishing.
//!
//! ## Boundary validation
//!
//! Every response is decoded into an explicit per-endpoint schema. Scores
//! must be integers in 0..=100 whether sent bare or as `{"score": n}`;
//! report pillars with unknown keys are logged and skipped; unknown statuses
//! are rejected. Non-2xx responses surface the server's `detail` verbatim.
//!
//! ## Authentication
//!
//! Every request carries `Authorization: Bearer <token>` and `X-API-Key`.

pub mod audit;
pub mod campaign;
pub mod config;
pub mod error;
pub(crate) mod retry;

pub use audit::{AuditEndpoints, RemediationResponse};
pub use campaign::{CampaignEndpoints, ContractPayload, PublishReceipt};
pub use config::AuditApiConfig;
pub use error::AuditApiError;

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

/// Top-level audit API client. Holds sub-clients per resource family.
#[derive(Debug, Clone)]
pub struct AuditClient {
    audit: audit::AuditEndpoints,
    campaign: campaign::CampaignEndpoints,
}

impl AuditClient {
    /// Create a new client from configuration.
    pub fn new(config: AuditApiConfig) -> Result<Self, AuditApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
                let mut headers = HeaderMap::new();
                let mut bearer =
                    HeaderValue::from_str(&format!("Bearer {}", config.api_token.as_str()))
                        .map_err(|_| config::ConfigError::InvalidHeader("Authorization"))?;
                bearer.set_sensitive(true);
                headers.insert(AUTHORIZATION, bearer);
                let mut key = HeaderValue::from_str(config.api_key.as_str())
                    .map_err(|_| config::ConfigError::InvalidHeader("X-API-Key"))?;
                key.set_sensitive(true);
                headers.insert("x-api-key", key);
                headers
            })
            .build()
            .map_err(|e| AuditApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let base = Endpoints {
            http,
            base_url: config.base_url,
        };
        Ok(Self {
            audit: audit::AuditEndpoints::new(base.clone()),
            campaign: campaign::CampaignEndpoints::new(base),
        })
    }

    /// Access the audit endpoints.
    pub fn audit(&self) -> &audit::AuditEndpoints {
        &self.audit
    }

    /// Access the contract and campaign endpoints.
    pub fn campaign(&self) -> &campaign::CampaignEndpoints {
        &self.campaign
    }
}

/// Shared transport for the sub-clients.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Url,
}

impl Endpoints {
    /// `base_url` with `segments` appended, each percent-encoded.
    pub(crate) fn url(&self, endpoint: &str, segments: &[&str]) -> Result<Url, AuditApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AuditApiError::Malformed {
                endpoint: endpoint.to_string(),
                reason: format!("base URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Map a transport result to the endpoint's error variant.
pub(crate) fn transport(
    endpoint: &str,
    result: Result<reqwest::Response, reqwest::Error>,
) -> Result<reqwest::Response, AuditApiError> {
    result.map_err(|e| AuditApiError::Http {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

/// Decode a 2xx JSON body, or turn a non-2xx response into
/// [`AuditApiError::Api`] with the server's detail.
pub(crate) async fn decode<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, AuditApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let detail = error::extract_detail(&body, &status.to_string());
        tracing::debug!(endpoint, status = status.as_u16(), %detail, "audit API call rejected");
        return Err(AuditApiError::Api {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail,
        });
    }
    resp.json().await.map_err(|e| AuditApiError::Deserialization {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(base: &str) -> Endpoints {
        Endpoints {
            http: reqwest::Client::new(),
            base_url: Url::parse(base).unwrap(),
        }
    }

    #[test]
    fn url_appends_and_encodes_segments() {
        let e = endpoints("http://127.0.0.1:8000");
        let url = e
            .url("POST /rerun-audit", &["rerun-audit", "CNT-1", "Spring Sale"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/rerun-audit/CNT-1/Spring%20Sale"
        );
    }

    #[test]
    fn url_keeps_base_path_prefix() {
        let e = endpoints("http://localhost:3000/api");
        let url = e.url("GET /audit/flags", &["audit", "flags"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/audit/flags");
        let e = endpoints("http://localhost:3000/api/");
        let url = e.url("GET /contract", &["contract"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/contract");
    }

    #[test]
    fn client_builds_from_local_config() {
        let client = AuditClient::new(AuditApiConfig::local(9000, "token").unwrap());
        assert!(client.is_ok());
    }
}
