//! # Audit endpoints
//!
//! Running and re-running audits, reading flags and the compliance score,
//! and remediating a single flag.
//!
//! ## Endpoint Mapping
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | POST | `/audit/{contractId}` | body: campaign setup |
//! | POST | `/rerun-audit/{contractId}/{campaignName}` | body: partial patch |
//! | GET | `/audit/flags` | retried on transport errors |
//! | GET | `/audit/compliance-score` | `{score}` or bare number; retried |
//! | POST | `/audit/remediate/{flagId}` | body: `{fieldType}` |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use setsync_core::{AuditReport, Campaign, ContractId, FieldKey, Flag, FlagId, PillarKey, PillarReport};

use crate::{decode, transport, AuditApiError, Endpoints};

// -- Wire types ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AuditReportWire {
    pillars: BTreeMap<String, PillarReport>,
    is_certified: bool,
    #[serde(default)]
    score: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoreWire {
    Wrapped { score: Value },
    Bare(Value),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemediateRequest<'a> {
    field_type: &'a FieldKey,
}

/// Response of `POST /audit/remediate/{flagId}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemediationResponse {
    /// Corrected value, when the backend reports one.
    #[serde(default)]
    pub value: Option<Value>,
}

// -- Validation ---------------------------------------------------------------

/// Accept integers 0..=100, including integral floats such as `75.0`.
pub(crate) fn validate_score(endpoint: &str, raw: &Value) -> Result<u8, AuditApiError> {
    let malformed = |reason: String| AuditApiError::Malformed {
        endpoint: endpoint.to_string(),
        reason,
    };
    let number = raw
        .as_f64()
        .ok_or_else(|| malformed(format!("score is not a number: {raw}")))?;
    if number.fract() != 0.0 || !(0.0..=100.0).contains(&number) {
        return Err(malformed(format!("score must be an integer in 0..=100, got {raw}")));
    }
    Ok(number as u8)
}

fn into_report(endpoint: &str, wire: AuditReportWire) -> Result<AuditReport, AuditApiError> {
    let mut pillars = BTreeMap::new();
    for (key, report) in wire.pillars {
        match key.parse::<PillarKey>() {
            Ok(pillar) => {
                pillars.insert(pillar, report);
            }
            Err(_) => tracing::warn!(endpoint, pillar = %key, "skipping unknown pillar in audit report"),
        }
    }
    let score = wire
        .score
        .filter(|v| !v.is_null())
        .map(|v| validate_score(endpoint, &v))
        .transpose()?;
    Ok(AuditReport {
        pillars,
        is_certified: wire.is_certified,
        score,
    })
}

// -- Client -------------------------------------------------------------------

/// Client for the audit endpoints.
#[derive(Debug, Clone)]
pub struct AuditEndpoints {
    base: Endpoints,
}

impl AuditEndpoints {
    pub(crate) fn new(base: Endpoints) -> Self {
        Self { base }
    }

    /// Run a full audit of `campaign` against a contract.
    ///
    /// Calls `POST /audit/{contractId}`.
    pub async fn run(
        &self,
        contract_id: &ContractId,
        campaign: &Campaign,
    ) -> Result<AuditReport, AuditApiError> {
        let endpoint = "POST /audit/{contractId}";
        let url = self.base.url(endpoint, &["audit", contract_id.as_str()])?;
        let resp = transport(endpoint, self.base.http.post(url).json(campaign).send().await)?;
        let wire: AuditReportWire = decode(endpoint, resp).await?;
        into_report(endpoint, wire)
    }

    /// Merge a partial patch into the stored campaign and audit it again.
    ///
    /// Calls `POST /rerun-audit/{contractId}/{campaignName}`.
    pub async fn rerun(
        &self,
        contract_id: &ContractId,
        campaign_name: &str,
        patch: &Value,
    ) -> Result<AuditReport, AuditApiError> {
        let endpoint = "POST /rerun-audit/{contractId}/{campaignName}";
        let url = self
            .base
            .url(endpoint, &["rerun-audit", contract_id.as_str(), campaign_name])?;
        let resp = transport(endpoint, self.base.http.post(url).json(patch).send().await)?;
        let wire: AuditReportWire = decode(endpoint, resp).await?;
        into_report(endpoint, wire)
    }

    /// List the current flags.
    ///
    /// Calls `GET /audit/flags`.
    pub async fn flags(&self) -> Result<Vec<Flag>, AuditApiError> {
        let endpoint = "GET /audit/flags";
        let url = self.base.url(endpoint, &["audit", "flags"])?;
        let resp = crate::retry::retry_send(endpoint, || self.base.http.get(url.clone()).send()).await;
        decode(endpoint, transport(endpoint, resp)?).await
    }

    /// Read the backend's compliance score.
    ///
    /// Calls `GET /audit/compliance-score`.
    pub async fn compliance_score(&self) -> Result<u8, AuditApiError> {
        let endpoint = "GET /audit/compliance-score";
        let url = self.base.url(endpoint, &["audit", "compliance-score"])?;
        let resp = crate::retry::retry_send(endpoint, || self.base.http.get(url.clone()).send()).await;
        let wire: ScoreWire = decode(endpoint, transport(endpoint, resp)?).await?;
        let raw = match wire {
            ScoreWire::Wrapped { score } => score,
            ScoreWire::Bare(value) => value,
        };
        validate_score(endpoint, &raw)
    }

    /// Ask the backend to correct the field behind a flag.
    ///
    /// Calls `POST /audit/remediate/{flagId}`.
    pub async fn remediate(
        &self,
        flag_id: &FlagId,
        field: &FieldKey,
    ) -> Result<RemediationResponse, AuditApiError> {
        let endpoint = "POST /audit/remediate/{flagId}";
        let url = self
            .base
            .url(endpoint, &["audit", "remediate", flag_id.as_str()])?;
        let body = RemediateRequest { field_type: field };
        let resp = transport(endpoint, self.base.http.post(url).json(&body).send().await)?;
        decode(endpoint, resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_validation() {
        let ep = "GET /audit/compliance-score";
        assert_eq!(validate_score(ep, &json!(75)).unwrap(), 75);
        assert_eq!(validate_score(ep, &json!(100.0)).unwrap(), 100);
        assert!(matches!(
            validate_score(ep, &json!(101)),
            Err(AuditApiError::Malformed { .. })
        ));
        assert!(validate_score(ep, &json!(-1)).is_err());
        assert!(validate_score(ep, &json!(62.5)).is_err());
        assert!(validate_score(ep, &json!("75")).is_err());
    }

    #[test]
    fn unknown_pillars_skipped() {
        let wire: AuditReportWire = serde_json::from_value(json!({
            "pillars": {
                "Budget": { "status": "FAIL", "issues": ["over cap"] },
                "Sentiment": { "status": "PASS", "issues": [] }
            },
            "is_certified": false,
            "score": 75
        }))
        .unwrap();
        let report = into_report("POST /audit/{contractId}", wire).unwrap();
        assert_eq!(report.pillars.len(), 1);
        assert!(report.pillars.contains_key(&PillarKey::Budget));
        assert_eq!(report.score, Some(75));
    }

    #[test]
    fn report_score_out_of_range_is_malformed() {
        let wire: AuditReportWire = serde_json::from_value(json!({
            "pillars": {},
            "is_certified": false,
            "score": 250
        }))
        .unwrap();
        assert!(matches!(
            into_report("POST /audit/{contractId}", wire),
            Err(AuditApiError::Malformed { .. })
        ));
    }

    #[test]
    fn remediate_request_uses_camel_case() {
        let field = FieldKey::new("Budget").unwrap();
        let body = serde_json::to_value(RemediateRequest { field_type: &field }).unwrap();
        assert_eq!(body, json!({ "fieldType": "Budget" }));
    }
}
