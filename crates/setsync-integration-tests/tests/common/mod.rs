//! Shared fixtures: a stub server on an ephemeral port, engines wired to
//! it over HTTP, and an in-process backend over the stub's state.

#![allow(dead_code)]

use setsync_client::{AuditApiConfig, AuditClient, ContractPayload, PublishReceipt};
use setsync_core::{AuditReport, Campaign, ContractId, FieldRow, Flag};
use setsync_engine::{
    AuditBackend, BackendError, BackendMode, ComplianceEngine, EngineConfig, HttpBackend,
    RemediationCall, RemediationOutcome,
};
use setsync_stub::auth::AuthConfig;
use setsync_stub::{StubConfig, StubError, StubState};
use serde_json::Value;
use tokio::net::TcpListener;

pub const TOKEN: &str = "integration-token";

/// A seeded stub served on 127.0.0.1 with a random port.
pub struct RunningStub {
    pub port: u16,
    pub state: StubState,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for RunningStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_stub(token: Option<&str>) -> RunningStub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let state = StubState::seeded(StubConfig {
        port,
        auth: AuthConfig {
            token: token.map(str::to_string),
        },
    })
    .unwrap();
    let served = state.clone();
    let task = tokio::spawn(async move {
        let _ = setsync_stub::serve(listener, served).await;
    });
    RunningStub { port, state, task }
}

pub fn http_engine(port: u16, token: &str, mode: BackendMode) -> ComplianceEngine<HttpBackend> {
    let config = AuditApiConfig::local(port, token).unwrap();
    let client = AuditClient::new(config).unwrap();
    ComplianceEngine::new(HttpBackend::new(client, mode), EngineConfig::default())
}

/// A port nothing is listening on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// [`AuditBackend`] that calls [`StubState`] directly, without HTTP.
#[derive(Clone)]
pub struct InProcessBackend {
    pub state: StubState,
}

impl InProcessBackend {
    pub fn seeded() -> Self {
        Self {
            state: StubState::seeded(StubConfig::default()).unwrap(),
        }
    }
}

fn backend_error(endpoint: &str, err: StubError) -> BackendError {
    BackendError::Transport {
        endpoint: endpoint.to_string(),
        detail: err.to_string(),
    }
}

impl AuditBackend for InProcessBackend {
    async fn fetch_contract(&self) -> Result<ContractPayload, BackendError> {
        let contract = self
            .state
            .contract()
            .map_err(|e| backend_error("GET /contract", e))?;
        Ok(ContractPayload {
            id: Some(contract.id),
            campaign_name: Some(contract.campaign_name),
            client_name: contract.client_name,
            fields: contract.fields,
        })
    }

    async fn fetch_fields(&self) -> Result<Vec<FieldRow>, BackendError> {
        self.state
            .fields()
            .map_err(|e| backend_error("GET /campaign/fields", e))
    }

    async fn fetch_flags(&self) -> Result<Vec<Flag>, BackendError> {
        self.state
            .flags()
            .map_err(|e| backend_error("GET /audit/flags", e))
    }

    async fn fetch_score(&self) -> Result<u8, BackendError> {
        self.state
            .score()
            .map_err(|e| backend_error("GET /audit/compliance-score", e))
    }

    async fn run_audit(
        &self,
        contract_id: &ContractId,
        campaign: &Campaign,
    ) -> Result<AuditReport, BackendError> {
        self.state
            .audit(contract_id, campaign.clone())
            .map_err(|e| backend_error("POST /audit/{contractId}", e))
    }

    async fn rerun_audit(
        &self,
        contract_id: &ContractId,
        campaign_name: &str,
        patch: &Value,
    ) -> Result<AuditReport, BackendError> {
        self.state
            .rerun(contract_id, campaign_name, patch)
            .map_err(|e| backend_error("POST /rerun-audit", e))
    }

    async fn remediate(&self, call: &RemediationCall) -> Result<RemediationOutcome, BackendError> {
        let value = self
            .state
            .remediate(call.field.as_str())
            .map_err(|e| backend_error("POST /audit/remediate/{flagId}", e))?;
        Ok(RemediationOutcome::passed(Some(value)))
    }

    async fn publish(&self, campaign_name: &str) -> Result<PublishReceipt, BackendError> {
        let message = self
            .state
            .publish(campaign_name)
            .map_err(|e| backend_error("POST /publish-live/{campaignName}", e))?;
        Ok(PublishReceipt {
            status: Some("SUCCESS".to_string()),
            message: Some(message),
        })
    }
}
