//! # Stub Application State
//!
//! Contracts and audited campaigns live in `DashMap`s. The dashboard
//! endpoints (`/contract`, `/campaign/fields`, `/audit/flags`, ...) show
//! the most recently audited campaign. Map guards are never held across
//! an `.await`; every operation here is synchronous.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Value};

use setsync_core::{
    documented_fix, AuditReport, Campaign, Contract, ContractId, ContractTerms, FieldKey,
    FieldRow, Flag, PillarKey,
};

use crate::auth::AuthConfig;
use crate::error::StubError;
use crate::rules;

/// One audited campaign.
#[derive(Debug, Clone)]
pub struct CampaignRecord {
    pub contract_id: ContractId,
    pub campaign: Campaign,
    pub report: AuditReport,
    pub remediated_at: BTreeMap<PillarKey, DateTime<Utc>>,
    pub live: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StubConfig {
    pub port: u16,
    pub auth: AuthConfig,
}

#[derive(Clone)]
pub struct StubState {
    pub contracts: Arc<DashMap<ContractId, ContractTerms>>,
    pub campaigns: Arc<DashMap<String, CampaignRecord>>,
    active: Arc<RwLock<Option<String>>>,
    pub config: StubConfig,
}

impl StubState {
    /// Empty campaign store with the documented contract registered.
    pub fn new(config: StubConfig) -> Self {
        let contracts = DashMap::new();
        let terms = ContractTerms::nike_valentine();
        contracts.insert(terms.contract_id.clone(), terms);
        Self {
            contracts: Arc::new(contracts),
            campaigns: Arc::new(DashMap::new()),
            active: Arc::new(RwLock::new(None)),
            config,
        }
    }

    /// Store with the seed campaign already audited.
    pub fn seeded(config: StubConfig) -> Result<Self, StubError> {
        let state = Self::new(config);
        let terms = ContractTerms::nike_valentine();
        state.audit(&terms.contract_id, Campaign::nike_valentine_seed())?;
        Ok(state)
    }

    fn terms(&self, contract_id: &ContractId) -> Result<ContractTerms, StubError> {
        self.contracts
            .get(contract_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| StubError::NotFound("Contract not found".into()))
    }

    // ── Audit ───────────────────────────────────────────────────────

    pub fn audit(&self, contract_id: &ContractId, campaign: Campaign) -> Result<AuditReport, StubError> {
        let terms = self.terms(contract_id)?;
        let report = rules::audit(&terms, &campaign);
        let name = campaign.campaign_name.clone();
        tracing::info!(
            contract = %contract_id,
            campaign = %name,
            failing = report.failing().len(),
            "campaign audited"
        );
        self.campaigns.insert(
            name.clone(),
            CampaignRecord {
                contract_id: contract_id.clone(),
                campaign,
                report: report.clone(),
                remediated_at: BTreeMap::new(),
                live: false,
            },
        );
        *self.active.write() = Some(name);
        Ok(report)
    }

    pub fn rerun(
        &self,
        contract_id: &ContractId,
        campaign_name: &str,
        patch: &Value,
    ) -> Result<AuditReport, StubError> {
        let terms = self.terms(contract_id)?;
        let report = {
            let mut record = self
                .campaigns
                .get_mut(campaign_name)
                .filter(|r| &r.contract_id == contract_id)
                .ok_or_else(|| StubError::NotFound("Campaign not found. Run an audit first.".into()))?;
            record.campaign.apply_patch(patch)?;
            let report = rules::audit(&terms, &record.campaign);
            record.report = report.clone();
            record.live = false;
            report
        };
        *self.active.write() = Some(campaign_name.to_string());
        Ok(report)
    }

    // ── Dashboard view ──────────────────────────────────────────────

    pub fn active(&self) -> Result<CampaignRecord, StubError> {
        let name = self
            .active
            .read()
            .clone()
            .ok_or_else(|| StubError::NotFound("No campaign has been audited".into()))?;
        self.campaigns
            .get(&name)
            .map(|r| r.value().clone())
            .ok_or_else(|| StubError::NotFound("Campaign not found. Run an audit first.".into()))
    }

    pub fn contract(&self) -> Result<Contract, StubError> {
        let record = self.active()?;
        let terms = self.terms(&record.contract_id)?;
        Ok(terms.to_contract(record.campaign.campaign_name))
    }

    pub fn fields(&self) -> Result<Vec<FieldRow>, StubError> {
        let record = self.active()?;
        Ok(PillarKey::all()
            .iter()
            .filter_map(|&p| field_row(&record, p))
            .collect())
    }

    pub fn flags(&self) -> Result<Vec<Flag>, StubError> {
        Ok(self.active()?.report.flags())
    }

    pub fn score(&self) -> Result<u8, StubError> {
        Ok(self.active()?.report.score.unwrap_or(0))
    }

    /// Apply the documented fix for the flagged pillar and re-audit.
    /// Returns the pillar's new setup value.
    pub fn remediate(&self, field: &str) -> Result<Value, StubError> {
        let pillar = parse_pillar(field)?;
        let fix = documented_fix(pillar).ok_or_else(|| {
            StubError::Validation(format!("No automated remediation for {pillar}"))
        })?;
        let record = self.active()?;
        let name = record.campaign.campaign_name.clone();
        self.rerun(&record.contract_id, &name, &fix)?;
        self.mark_remediated(&name, pillar);
        Ok(self.active()?.campaign.setup_value(pillar))
    }

    /// Replace the setup value a pillar inspects and re-audit.
    pub fn update_field(&self, field: &str, value: &Value) -> Result<FieldRow, StubError> {
        let pillar = parse_pillar(field)?;
        let record = self.active()?;
        let name = record.campaign.campaign_name.clone();
        self.rerun(&record.contract_id, &name, &setup_patch(pillar, value))?;
        let record = self.active()?;
        field_row(&record, pillar)
            .ok_or_else(|| StubError::NotFound(format!("No audit result for {pillar}")))
    }

    fn mark_remediated(&self, campaign_name: &str, pillar: PillarKey) {
        if let Some(mut record) = self.campaigns.get_mut(campaign_name) {
            record.remediated_at.insert(pillar, Utc::now());
        }
    }

    // ── Publishing ──────────────────────────────────────────────────

    pub fn publish(&self, campaign_name: &str) -> Result<String, StubError> {
        let mut record = self.campaigns.get_mut(campaign_name).ok_or_else(|| {
            StubError::BadRequest(format!(
                "Campaign {campaign_name} has not been audited. Run an audit first."
            ))
        })?;
        let violations = record.report.failing();
        if !violations.is_empty() {
            tracing::info!(campaign = %campaign_name, ?violations, "publish blocked");
            return Err(StubError::PublishBlocked { violations });
        }
        record.live = true;
        tracing::info!(campaign = %campaign_name, "campaign published");
        Ok(format!("Campaign {campaign_name} is now live."))
    }

    pub fn push_active(&self) -> Result<String, StubError> {
        let name = self.active()?.campaign.campaign_name;
        self.publish(&name)
    }
}

fn parse_pillar(field: &str) -> Result<PillarKey, StubError> {
    field
        .parse()
        .map_err(|_| StubError::NotFound(format!("Unknown field {field}")))
}

fn field_row(record: &CampaignRecord, pillar: PillarKey) -> Option<FieldRow> {
    let report = record.report.pillars.get(&pillar)?;
    let field = report.to_field(pillar);
    Some(FieldRow {
        field_type: FieldKey::from(pillar),
        value: field.value,
        expected: field.expected,
        status: field.status,
        remediated_at: record.remediated_at.get(&pillar).copied(),
    })
}

/// Patch that sets the setup value `pillar` inspects.
fn setup_patch(pillar: PillarKey, value: &Value) -> Value {
    match pillar {
        PillarKey::Audience => json!({ "audience": { "geo_targeting": value } }),
        PillarKey::Budget => json!({ "budget": value }),
        PillarKey::Timeframe => json!({ "timeframe": { "start_date": value } }),
        PillarKey::Optimization => json!({ "optimization": { "placement": value } }),
        PillarKey::Creative => json!({ "creative": { "compliance_standard": value } }),
        PillarKey::Copy => json!({ "copy": { "ad_copy_text": value } }),
        PillarKey::Guardrails => json!({ "optimization": { "frequency_cap": value } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setsync_core::AuditStatus;

    fn seeded() -> StubState {
        StubState::seeded(StubConfig::default()).unwrap()
    }

    #[test]
    fn seeded_store_shows_seed_campaign() {
        let state = seeded();
        let contract = state.contract().unwrap();
        assert_eq!(contract.campaign_name, "Nike_Valentine_Campaign_v1");
        assert_eq!(state.flags().unwrap().len(), 7);
        assert_eq!(state.score().unwrap(), 0);
    }

    #[test]
    fn unknown_contract_not_found() {
        let state = seeded();
        let err = state
            .audit(
                &ContractId::new("CNT-MISSING").unwrap(),
                Campaign::nike_valentine_seed(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Contract not found");
    }

    #[test]
    fn rerun_unknown_campaign_not_found() {
        let state = seeded();
        let err = state
            .rerun(
                &ContractTerms::nike_valentine().contract_id,
                "ghost",
                &json!({}),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Campaign not found. Run an audit first.");
    }

    #[test]
    fn remediate_applies_fix_and_records_time() {
        let state = seeded();
        let value = state.remediate("Budget").unwrap();
        assert_eq!(value, json!(1_200_000));
        let rows = state.fields().unwrap();
        let budget = rows.iter().find(|r| r.field_type.as_str() == "Budget").unwrap();
        assert_eq!(budget.status, AuditStatus::Pass);
        assert!(budget.remediated_at.is_some());
        assert_eq!(state.score().unwrap(), 25);
    }

    #[test]
    fn remediate_without_fix_is_validation_error() {
        let state = seeded();
        assert!(matches!(
            state.remediate("Creative"),
            Err(StubError::Validation(_))
        ));
    }

    #[test]
    fn update_field_reaudits() {
        let state = seeded();
        let row = state
            .update_field("Copy", &json!("The best athletic gear for your Valentine."))
            .unwrap();
        assert_eq!(row.status, AuditStatus::Pass);
    }

    #[test]
    fn publish_blocked_until_clean() {
        let state = seeded();
        match state.publish("Nike_Valentine_Campaign_v1") {
            Err(StubError::PublishBlocked { violations }) => assert_eq!(violations.len(), 4),
            other => panic!("expected PublishBlocked, got: {other:?}"),
        }
        for field in ["Audience", "Budget", "Optimization", "Copy"] {
            state.remediate(field).unwrap();
        }
        assert_eq!(
            state.push_active().unwrap(),
            "Campaign Nike_Valentine_Campaign_v1 is now live."
        );
        assert!(state.campaigns.get("Nike_Valentine_Campaign_v1").unwrap().live);
    }

    #[test]
    fn publish_never_audited_is_bad_request() {
        let state = StubState::new(StubConfig::default());
        assert!(matches!(state.publish("ghost"), Err(StubError::BadRequest(_))));
    }
}
