//! # Audit Backend Seam
//!
//! [`AuditBackend`] is the engine's only way to reach the audit service.
//! Methods return `Send` futures so the engine can fan remediation calls
//! out across a `tokio::task::JoinSet`.
//!
//! [`HttpBackend`] is the production implementation over
//! [`setsync_client::AuditClient`]. It speaks one of two API flavours:
//!
//! - [`BackendMode::Dashboard`]: remediation via
//!   `POST /audit/remediate/{flagId}`, publishing via
//!   `POST /campaign/push-to-live`.
//! - [`BackendMode::Audit`]: remediation by re-running the audit with the
//!   documented fix for the pillar, publishing via
//!   `POST /publish-live/{campaignName}`.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use setsync_client::{AuditApiError, AuditClient, ContractPayload, PublishReceipt};
use setsync_core::{
    documented_fix, AuditReport, AuditStatus, Campaign, ContractId, FieldKey, FieldRow, Flag,
    FlagId,
};

use crate::error::BackendError;

/// Everything a backend needs to remediate one field.
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationCall {
    pub flag_id: FlagId,
    pub field: FieldKey,
    pub contract_id: ContractId,
    pub campaign_name: String,
}

/// Field state reported by the backend after a remediation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationOutcome {
    pub status: AuditStatus,
    /// Corrected value, if the backend returned one.
    pub value: Option<Value>,
    pub issues: Vec<String>,
    pub has_severance: bool,
}

impl RemediationOutcome {
    /// The field now passes with the given value.
    pub fn passed(value: Option<Value>) -> Self {
        Self {
            status: AuditStatus::Pass,
            value,
            issues: Vec::new(),
            has_severance: false,
        }
    }
}

pub const PUSH_TO_LIVE_ENDPOINT: &str = "POST /campaign/push-to-live";
pub const PUBLISH_LIVE_ENDPOINT: &str = "POST /publish-live/{campaignName}";

/// The audit service as seen by the engine.
pub trait AuditBackend: Send + Sync + 'static {
    fn fetch_contract(&self)
        -> impl Future<Output = Result<ContractPayload, BackendError>> + Send;

    fn fetch_fields(&self) -> impl Future<Output = Result<Vec<FieldRow>, BackendError>> + Send;

    fn fetch_flags(&self) -> impl Future<Output = Result<Vec<Flag>, BackendError>> + Send;

    fn fetch_score(&self) -> impl Future<Output = Result<u8, BackendError>> + Send;

    fn run_audit(
        &self,
        contract_id: &ContractId,
        campaign: &Campaign,
    ) -> impl Future<Output = Result<AuditReport, BackendError>> + Send;

    fn rerun_audit(
        &self,
        contract_id: &ContractId,
        campaign_name: &str,
        patch: &Value,
    ) -> impl Future<Output = Result<AuditReport, BackendError>> + Send;

    fn remediate(
        &self,
        call: &RemediationCall,
    ) -> impl Future<Output = Result<RemediationOutcome, BackendError>> + Send;

    fn publish(
        &self,
        campaign_name: &str,
    ) -> impl Future<Output = Result<PublishReceipt, BackendError>> + Send;

    /// Route `publish` calls, named in transport errors.
    fn publish_endpoint(&self) -> &'static str {
        PUBLISH_LIVE_ENDPOINT
    }
}

impl<T: AuditBackend> AuditBackend for Arc<T> {
    fn fetch_contract(
        &self,
    ) -> impl Future<Output = Result<ContractPayload, BackendError>> + Send {
        (**self).fetch_contract()
    }

    fn fetch_fields(&self) -> impl Future<Output = Result<Vec<FieldRow>, BackendError>> + Send {
        (**self).fetch_fields()
    }

    fn fetch_flags(&self) -> impl Future<Output = Result<Vec<Flag>, BackendError>> + Send {
        (**self).fetch_flags()
    }

    fn fetch_score(&self) -> impl Future<Output = Result<u8, BackendError>> + Send {
        (**self).fetch_score()
    }

    fn run_audit(
        &self,
        contract_id: &ContractId,
        campaign: &Campaign,
    ) -> impl Future<Output = Result<AuditReport, BackendError>> + Send {
        (**self).run_audit(contract_id, campaign)
    }

    fn rerun_audit(
        &self,
        contract_id: &ContractId,
        campaign_name: &str,
        patch: &Value,
    ) -> impl Future<Output = Result<AuditReport, BackendError>> + Send {
        (**self).rerun_audit(contract_id, campaign_name, patch)
    }

    fn remediate(
        &self,
        call: &RemediationCall,
    ) -> impl Future<Output = Result<RemediationOutcome, BackendError>> + Send {
        (**self).remediate(call)
    }

    fn publish(
        &self,
        campaign_name: &str,
    ) -> impl Future<Output = Result<PublishReceipt, BackendError>> + Send {
        (**self).publish(campaign_name)
    }

    fn publish_endpoint(&self) -> &'static str {
        (**self).publish_endpoint()
    }
}

/// Which audit API flavour an [`HttpBackend`] speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendMode {
    #[default]
    Dashboard,
    Audit,
}

/// [`AuditBackend`] over the HTTP audit API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: AuditClient,
    mode: BackendMode,
}

impl HttpBackend {
    pub fn new(client: AuditClient, mode: BackendMode) -> Self {
        Self { client, mode }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    async fn rerun_with_fix(&self, call: &RemediationCall) -> Result<RemediationOutcome, BackendError> {
        let no_fix = || BackendError::NoRemediation(call.field.clone());
        let pillar = call.field.pillar().ok_or_else(no_fix)?;
        let patch = documented_fix(pillar).ok_or_else(no_fix)?;

        let report = self
            .client
            .audit()
            .rerun(&call.contract_id, &call.campaign_name, &patch)
            .await?;
        let pillar_report = report.pillars.get(&pillar).ok_or_else(|| BackendError::Transport {
            endpoint: "POST /rerun-audit/{contractId}/{campaignName}".into(),
            detail: format!("re-audit report omitted pillar {pillar}"),
        })?;

        let field = pillar_report.to_field(pillar);
        Ok(RemediationOutcome {
            status: field.status,
            value: field.value,
            issues: field.issues,
            has_severance: field.has_severance,
        })
    }
}

impl AuditBackend for HttpBackend {
    async fn fetch_contract(&self) -> Result<ContractPayload, BackendError> {
        Ok(self.client.campaign().contract().await?)
    }

    async fn fetch_fields(&self) -> Result<Vec<FieldRow>, BackendError> {
        Ok(self.client.campaign().fields().await?)
    }

    async fn fetch_flags(&self) -> Result<Vec<Flag>, BackendError> {
        Ok(self.client.audit().flags().await?)
    }

    async fn fetch_score(&self) -> Result<u8, BackendError> {
        Ok(self.client.audit().compliance_score().await?)
    }

    async fn run_audit(
        &self,
        contract_id: &ContractId,
        campaign: &Campaign,
    ) -> Result<AuditReport, BackendError> {
        Ok(self.client.audit().run(contract_id, campaign).await?)
    }

    async fn rerun_audit(
        &self,
        contract_id: &ContractId,
        campaign_name: &str,
        patch: &Value,
    ) -> Result<AuditReport, BackendError> {
        Ok(self
            .client
            .audit()
            .rerun(contract_id, campaign_name, patch)
            .await?)
    }

    async fn remediate(&self, call: &RemediationCall) -> Result<RemediationOutcome, BackendError> {
        match self.mode {
            BackendMode::Dashboard => {
                let resp = self
                    .client
                    .audit()
                    .remediate(&call.flag_id, &call.field)
                    .await?;
                Ok(RemediationOutcome::passed(resp.value))
            }
            BackendMode::Audit => self.rerun_with_fix(call).await,
        }
    }

    async fn publish(&self, campaign_name: &str) -> Result<PublishReceipt, BackendError> {
        let receipt: Result<PublishReceipt, AuditApiError> = match self.mode {
            BackendMode::Dashboard => self.client.campaign().push_to_live().await,
            BackendMode::Audit => self.client.campaign().publish_live(campaign_name).await,
        };
        Ok(receipt?)
    }

    fn publish_endpoint(&self) -> &'static str {
        match self.mode {
            BackendMode::Dashboard => PUSH_TO_LIVE_ENDPOINT,
            BackendMode::Audit => PUBLISH_LIVE_ENDPOINT,
        }
    }
}
