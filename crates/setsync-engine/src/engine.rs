//! # Compliance Engine
//!
//! [`ComplianceEngine`] is a cheap-to-clone handle over shared session
//! state. Loading, re-auditing and read access live here; remediation,
//! sync and publishing are implemented in their own modules on the same
//! type.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;

use setsync_client::ContractPayload;
use setsync_core::{
    fallback_dashboard, Campaign, Contract, ContractId, ContractTerms, DashboardSnapshot,
    FieldKey, FieldRow, Flag, StrategicGap,
};
use setsync_graph::{AuditGraph, GraphBuilder};

use crate::backend::AuditBackend;
use crate::config::EngineConfig;
use crate::effect::Effect;
use crate::error::{BackendError, EngineError};
use crate::state::{AuditSnapshot, AuditState};

/// Capacity of the effect broadcast channel. Slow subscribers lag.
const EFFECT_CHANNEL_CAPACITY: usize = 256;

/// Contract id used when the dashboard contract carries none.
const SESSION_CONTRACT_ID: &str = "SESSION";

pub(crate) const CONTRACT_ENDPOINT: &str = "GET /contract";
pub(crate) const FIELDS_ENDPOINT: &str = "GET /campaign/fields";
pub(crate) const FLAGS_ENDPOINT: &str = "GET /audit/flags";
pub(crate) const SCORE_ENDPOINT: &str = "GET /audit/compliance-score";
const AUDIT_ENDPOINT: &str = "POST /audit/{contractId}";
const RERUN_ENDPOINT: &str = "POST /rerun-audit/{contractId}/{campaignName}";

/// Result of an initial load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    /// Why the load fell back to seeded data, if it did.
    pub degraded: Option<String>,
    pub score: u8,
    pub certified: bool,
    pub effects: Vec<Effect>,
}

pub(crate) struct Inner<B> {
    pub(crate) backend: B,
    pub(crate) state: RwLock<AuditState>,
    pub(crate) config: EngineConfig,
    pub(crate) effects: broadcast::Sender<Effect>,
}

/// Handle to one audit session.
pub struct ComplianceEngine<B> {
    pub(crate) inner: Arc<Inner<B>>,
}

impl<B> Clone for ComplianceEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AuditBackend> ComplianceEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let (effects, _) = broadcast::channel(EFFECT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                backend,
                state: RwLock::new(AuditState::new()),
                config,
                effects,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Receive every effect emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Effect> {
        self.inner.effects.subscribe()
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Fetch contract, fields, flags and score in parallel and populate
    /// the store.
    ///
    /// If contract, fields or flags cannot be fetched the store is seeded
    /// with [`fallback_dashboard`] and the outcome carries the reason. A
    /// missing score alone is not degraded: it is derived from the flags.
    pub async fn load_dashboard(&self) -> Result<LoadOutcome, EngineError> {
        self.ensure_unloaded()?;
        let fallback_id = ContractId::new(SESSION_CONTRACT_ID)?;
        let backend = &self.inner.backend;
        let (contract, fields, flags, score) = tokio::join!(
            self.call(CONTRACT_ENDPOINT, backend.fetch_contract()),
            self.call(FIELDS_ENDPOINT, backend.fetch_fields()),
            self.call(FLAGS_ENDPOINT, backend.fetch_flags()),
            self.call(SCORE_ENDPOINT, backend.fetch_score()),
        );

        let score = match score {
            Ok(score) => Some(score),
            Err(e) => {
                tracing::warn!(error = %e, "compliance score unavailable; deriving from flags");
                None
            }
        };
        let assembled = assemble(contract, fields, flags, score, fallback_id);

        let (snapshot, degraded) = match assembled {
            Ok(snapshot) => (snapshot, None),
            Err(e) => {
                tracing::warn!(error = %e, "dashboard load failed; using offline fallback data");
                (fallback_dashboard(), Some(e.to_string()))
            }
        };
        self.install(|state| state.install_dashboard(snapshot, degraded))
    }

    /// Run a full audit of `campaign` against `terms` and populate the
    /// store from the report. Degrades like [`load_dashboard`](Self::load_dashboard).
    pub async fn run_audit(
        &self,
        terms: &ContractTerms,
        campaign: &Campaign,
    ) -> Result<LoadOutcome, EngineError> {
        self.ensure_unloaded()?;
        let result = self
            .call(
                AUDIT_ENDPOINT,
                self.inner.backend.run_audit(&terms.contract_id, campaign),
            )
            .await;

        match result {
            Ok(report) => {
                tracing::info!(
                    contract = %terms.contract_id,
                    campaign = %campaign.campaign_name,
                    failing = report.failing().len(),
                    "audit complete"
                );
                let contract = terms.to_contract(campaign.campaign_name.clone());
                self.install(|state| state.install_report(contract, &report))
            }
            Err(e) => {
                tracing::warn!(error = %e, "audit failed; using offline fallback data");
                let reason = Some(e.to_string());
                self.install(|state| state.install_dashboard(fallback_dashboard(), reason))
            }
        }
    }

    /// Re-audit with a partial campaign patch and merge the report.
    /// Unlike the initial load, failures are surfaced.
    pub async fn rerun_audit(&self, patch: &Value) -> Result<Vec<Effect>, EngineError> {
        let (contract_id, campaign_name) = self.session()?;
        let report = self
            .call(
                RERUN_ENDPOINT,
                self.inner
                    .backend
                    .rerun_audit(&contract_id, &campaign_name, patch),
            )
            .await?;
        let effects = self.inner.state.write().merge_report(&report);
        self.emit(&effects);
        Ok(effects)
    }

    fn install(
        &self,
        apply: impl FnOnce(&mut AuditState) -> Result<Vec<Effect>, EngineError>,
    ) -> Result<LoadOutcome, EngineError> {
        let outcome = {
            let mut state = self.inner.state.write();
            let effects = apply(&mut state)?;
            LoadOutcome {
                degraded: state.degraded().map(str::to_string),
                score: state.score(),
                certified: state.is_certified(),
                effects,
            }
        };
        self.emit(&outcome.effects);
        Ok(outcome)
    }

    fn ensure_unloaded(&self) -> Result<(), EngineError> {
        let state = self.inner.state.read();
        match state.contract() {
            Ok(contract) => Err(EngineError::AlreadyLoaded(contract.id.to_string())),
            Err(_) => Ok(()),
        }
    }

    pub(crate) fn session(&self) -> Result<(ContractId, String), EngineError> {
        let state = self.inner.state.read();
        let contract = state.contract()?;
        Ok((contract.id.clone(), contract.campaign_name.clone()))
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn is_loaded(&self) -> bool {
        self.inner.state.read().is_loaded()
    }

    pub fn snapshot(&self) -> AuditSnapshot {
        self.inner.state.read().snapshot()
    }

    pub fn compliance_score(&self) -> u8 {
        self.inner.state.read().score()
    }

    pub fn is_certified(&self) -> bool {
        self.inner.state.read().is_certified()
    }

    pub fn degraded(&self) -> Option<String> {
        self.inner.state.read().degraded().map(str::to_string)
    }

    pub fn contract(&self) -> Result<Contract, EngineError> {
        Ok(self.inner.state.read().contract()?.clone())
    }

    /// Contract value for `key`; `Ok(None)` if the contract lacks it.
    pub fn get_field(&self, key: &FieldKey) -> Result<Option<Value>, EngineError> {
        Ok(self.inner.state.read().get_field(key)?.cloned())
    }

    pub fn flags(&self) -> Vec<Flag> {
        self.inner.state.read().snapshot().flags
    }

    pub fn gaps(&self) -> Vec<StrategicGap> {
        self.inner.state.read().gaps().to_vec()
    }

    /// Build the audit graph from current state with the configured layout.
    pub fn graph(&self) -> Result<AuditGraph, EngineError> {
        let config = &self.inner.config;
        let state = self.inner.state.read();
        let graph = GraphBuilder::new(config.layout)
            .extended(config.extended_graph)
            .build(state.contract()?, &state.audit_fields(), state.gaps())?;
        Ok(graph)
    }

    // ── Plumbing ────────────────────────────────────────────────────

    /// Bound a backend call by the configured timeout.
    pub(crate) async fn call<T>(
        &self,
        endpoint: &'static str,
        fut: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        let limit = self.inner.config.call_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(endpoint, timeout_secs = limit.as_secs(), "backend call timed out");
                Err(BackendError::Transport {
                    endpoint: endpoint.to_string(),
                    detail: format!("timed out after {}s", limit.as_secs()),
                })
            }
        }
    }

    pub(crate) fn emit(&self, effects: &[Effect]) {
        for effect in effects {
            // No subscribers is fine; effects are also returned to the caller.
            let _ = self.inner.effects.send(effect.clone());
        }
    }
}

fn assemble(
    contract: Result<ContractPayload, BackendError>,
    fields: Result<Vec<FieldRow>, BackendError>,
    flags: Result<Vec<Flag>, BackendError>,
    score: Option<u8>,
    fallback_id: ContractId,
) -> Result<DashboardSnapshot, BackendError> {
    let payload = contract?;
    Ok(DashboardSnapshot {
        contract: Contract {
            id: payload.id.unwrap_or(fallback_id),
            campaign_name: payload.campaign_name.unwrap_or_default(),
            client_name: payload.client_name,
            fields: payload.fields,
        },
        fields: fields?,
        flags: flags?,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RemediationCall, RemediationOutcome};
    use setsync_client::PublishReceipt;
    use setsync_core::{AuditReport, AuditStatus, FlagId, PillarKey, PillarReport};
    use std::collections::BTreeMap;

    /// Backend that serves the fallback dataset or fails every call.
    struct FixtureBackend {
        online: bool,
        score: Result<u8, ()>,
    }

    fn refused() -> BackendError {
        BackendError::Transport {
            endpoint: "fixture".into(),
            detail: "connection refused".into(),
        }
    }

    impl FixtureBackend {
        fn online() -> Self {
            Self { online: true, score: Ok(50) }
        }

        fn offline() -> Self {
            Self { online: false, score: Err(()) }
        }

        fn check(&self) -> Result<(), BackendError> {
            if self.online {
                Ok(())
            } else {
                Err(refused())
            }
        }
    }

    impl AuditBackend for FixtureBackend {
        async fn fetch_contract(&self) -> Result<ContractPayload, BackendError> {
            self.check()?;
            let contract = fallback_dashboard().contract;
            Ok(ContractPayload {
                id: Some(ContractId::new("CNT-FIXTURE").unwrap()),
                campaign_name: Some("fixture".into()),
                client_name: None,
                fields: contract.fields,
            })
        }

        async fn fetch_fields(&self) -> Result<Vec<FieldRow>, BackendError> {
            self.check()?;
            Ok(fallback_dashboard().fields)
        }

        async fn fetch_flags(&self) -> Result<Vec<Flag>, BackendError> {
            self.check()?;
            Ok(fallback_dashboard().flags)
        }

        async fn fetch_score(&self) -> Result<u8, BackendError> {
            self.score.map_err(|_| refused())
        }

        async fn run_audit(
            &self,
            _contract_id: &ContractId,
            _campaign: &Campaign,
        ) -> Result<AuditReport, BackendError> {
            self.check()?;
            let pillars = PillarKey::all()
                .iter()
                .map(|&p| {
                    let status = if p == PillarKey::Budget {
                        AuditStatus::Fail
                    } else {
                        AuditStatus::Pass
                    };
                    (
                        p,
                        PillarReport {
                            status,
                            issues: vec![],
                            value: None,
                            expected: None,
                            has_severance: false,
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>();
            Ok(AuditReport {
                pillars,
                is_certified: false,
                score: Some(75),
            })
        }

        async fn rerun_audit(
            &self,
            contract_id: &ContractId,
            _campaign_name: &str,
            _patch: &Value,
        ) -> Result<AuditReport, BackendError> {
            let mut report = self.run_audit(contract_id, &Campaign::nike_valentine_seed()).await?;
            for pillar in report.pillars.values_mut() {
                pillar.status = AuditStatus::Pass;
            }
            report.score = Some(100);
            Ok(report)
        }

        async fn remediate(&self, _call: &RemediationCall) -> Result<RemediationOutcome, BackendError> {
            self.check()?;
            Ok(RemediationOutcome::passed(None))
        }

        async fn publish(&self, _campaign_name: &str) -> Result<PublishReceipt, BackendError> {
            self.check()?;
            Ok(PublishReceipt {
                status: Some("SUCCESS".into()),
                message: None,
            })
        }
    }

    fn engine(backend: FixtureBackend) -> ComplianceEngine<FixtureBackend> {
        ComplianceEngine::new(backend, EngineConfig::default())
    }

    #[tokio::test]
    async fn load_dashboard_online() {
        let engine = engine(FixtureBackend::online());
        let outcome = engine.load_dashboard().await.unwrap();
        assert_eq!(outcome.degraded, None);
        assert_eq!(outcome.score, 50);
        assert_eq!(engine.contract().unwrap().id.as_str(), "CNT-FIXTURE");
        assert_eq!(
            engine.get_field(&FieldKey::new("Budget").unwrap()).unwrap(),
            Some(serde_json::json!("$50,000"))
        );
    }

    #[tokio::test]
    async fn load_dashboard_offline_degrades() {
        let engine = engine(FixtureBackend::offline());
        let mut effects = engine.subscribe();
        let outcome = engine.load_dashboard().await.unwrap();

        assert!(outcome.degraded.unwrap().contains("connection refused"));
        assert_eq!(outcome.score, 50);
        assert_eq!(engine.flags().len(), 3);
        assert!(matches!(effects.recv().await.unwrap(), Effect::Degraded { .. }));
    }

    #[tokio::test]
    async fn missing_score_alone_is_not_degraded() {
        let engine = engine(FixtureBackend {
            online: true,
            score: Err(()),
        });
        let outcome = engine.load_dashboard().await.unwrap();
        assert_eq!(outcome.degraded, None);
        assert_eq!(engine.snapshot().authoritative_score, None);
    }

    #[tokio::test]
    async fn second_load_rejected() {
        let engine = engine(FixtureBackend::online());
        engine.load_dashboard().await.unwrap();
        assert!(matches!(
            engine.load_dashboard().await,
            Err(EngineError::AlreadyLoaded(id)) if id == "CNT-FIXTURE"
        ));
    }

    #[tokio::test]
    async fn reads_before_load_are_not_loaded() {
        let engine = engine(FixtureBackend::online());
        assert!(matches!(engine.contract(), Err(EngineError::NotLoaded)));
        assert!(matches!(
            engine.get_field(&FieldKey::new("Budget").unwrap()),
            Err(EngineError::NotLoaded)
        ));
        assert!(matches!(engine.graph(), Err(EngineError::NotLoaded)));
        assert_eq!(engine.compliance_score(), 0);
        assert!(!engine.is_certified());
    }

    #[tokio::test]
    async fn run_audit_installs_report() {
        let engine = engine(FixtureBackend::online());
        let terms = ContractTerms::nike_valentine();
        let outcome = engine
            .run_audit(&terms, &Campaign::nike_valentine_seed())
            .await
            .unwrap();
        assert_eq!(outcome.score, 75);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.fields.len(), 7);
        assert_eq!(
            snapshot.flag(&FlagId::new("Budget").unwrap()).unwrap().status,
            AuditStatus::Fail
        );
    }

    #[tokio::test]
    async fn rerun_audit_merges_and_certifies() {
        let engine = engine(FixtureBackend::online());
        let terms = ContractTerms::nike_valentine();
        engine
            .run_audit(&terms, &Campaign::nike_valentine_seed())
            .await
            .unwrap();
        let effects = engine
            .rerun_audit(&serde_json::json!({ "budget": { "daily_budget": 200000 } }))
            .await
            .unwrap();
        assert!(effects.contains(&Effect::Certified));
        assert_eq!(engine.compliance_score(), 100);
    }

    #[tokio::test]
    async fn graph_reflects_state() {
        let engine = engine(FixtureBackend::online());
        engine.load_dashboard().await.unwrap();
        let graph = engine.graph().unwrap();
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.failing_edges().count(), 1);
    }
}
