//! # Contract and campaign endpoints
//!
//! The session contract, the campaign field rows, single-field updates and
//! the two publish paths.
//!
//! ## Endpoint Mapping
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | GET | `/contract` | retried on transport errors |
//! | GET | `/campaign/fields` | retried on transport errors |
//! | PUT | `/campaign/fields/{fieldType}` | body: `{value}` |
//! | POST | `/campaign/push-to-live` | publish the active campaign |
//! | POST | `/publish-live/{campaignName}` | publish a named campaign |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use setsync_core::{ContractId, FieldKey, FieldRow};

use crate::{decode, transport, AuditApiError, Endpoints};

/// Response of `GET /contract`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContractPayload {
    /// Contract id, when the backend reports one.
    #[serde(default)]
    pub id: Option<ContractId>,
    /// Campaign the contract governs, when reported.
    #[serde(default, alias = "campaignName")]
    pub campaign_name: Option<String>,
    /// Client name, when reported.
    #[serde(default, alias = "clientName")]
    pub client_name: Option<String>,
    /// Contract field values.
    #[serde(default)]
    pub fields: BTreeMap<FieldKey, Value>,
}

/// Successful publish response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Backend status word, e.g. `SUCCESS`.
    #[serde(default)]
    pub status: Option<String>,
    /// Message to show the user.
    #[serde(default)]
    pub message: Option<String>,
}

impl PublishReceipt {
    /// The message to show, with a default when the backend sent none.
    pub fn display_message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or("Campaign pushed to live successfully!")
    }
}

#[derive(Debug, Serialize)]
struct FieldUpdate<'a> {
    value: &'a Value,
}

// -- Client -------------------------------------------------------------------

/// Client for the contract and campaign endpoints.
#[derive(Debug, Clone)]
pub struct CampaignEndpoints {
    base: Endpoints,
}

impl CampaignEndpoints {
    pub(crate) fn new(base: Endpoints) -> Self {
        Self { base }
    }

    /// Fetch the session contract.
    ///
    /// Calls `GET /contract`.
    pub async fn contract(&self) -> Result<ContractPayload, AuditApiError> {
        let endpoint = "GET /contract";
        let url = self.base.url(endpoint, &["contract"])?;
        let resp = crate::retry::retry_send(endpoint, || self.base.http.get(url.clone()).send()).await;
        decode(endpoint, transport(endpoint, resp)?).await
    }

    /// List campaign field rows.
    ///
    /// Calls `GET /campaign/fields`.
    pub async fn fields(&self) -> Result<Vec<FieldRow>, AuditApiError> {
        let endpoint = "GET /campaign/fields";
        let url = self.base.url(endpoint, &["campaign", "fields"])?;
        let resp = crate::retry::retry_send(endpoint, || self.base.http.get(url.clone()).send()).await;
        decode(endpoint, transport(endpoint, resp)?).await
    }

    /// Overwrite one campaign field and return the re-audited row.
    ///
    /// Calls `PUT /campaign/fields/{fieldType}`.
    pub async fn update_field(
        &self,
        field: &FieldKey,
        value: &Value,
    ) -> Result<FieldRow, AuditApiError> {
        let endpoint = "PUT /campaign/fields/{fieldType}";
        let url = self
            .base
            .url(endpoint, &["campaign", "fields", field.as_str()])?;
        let body = FieldUpdate { value };
        let resp = transport(endpoint, self.base.http.put(url).json(&body).send().await)?;
        decode(endpoint, resp).await
    }

    /// Publish the active campaign.
    ///
    /// Calls `POST /campaign/push-to-live`.
    pub async fn push_to_live(&self) -> Result<PublishReceipt, AuditApiError> {
        let endpoint = "POST /campaign/push-to-live";
        let url = self.base.url(endpoint, &["campaign", "push-to-live"])?;
        let resp = transport(endpoint, self.base.http.post(url).send().await)?;
        decode(endpoint, resp).await
    }

    /// Publish a named campaign.
    ///
    /// Calls `POST /publish-live/{campaignName}`.
    pub async fn publish_live(&self, campaign_name: &str) -> Result<PublishReceipt, AuditApiError> {
        let endpoint = "POST /publish-live/{campaignName}";
        let url = self.base.url(endpoint, &["publish-live", campaign_name])?;
        let resp = transport(endpoint, self.base.http.post(url).send().await)?;
        decode(endpoint, resp).await
    }
}
