//! # Contract Model
//!
//! [`ContractTerms`] are the binding guardrails a sales contract imposes.
//! [`Contract`] is the session's read-only view of them as a field map, and
//! [`ContractModel`] is the fetch-once holder the engine reads through.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::identity::{ContractId, FieldKey};
use crate::pillar::PillarKey;

/// Binding constraints of a sales contract.
///
/// Amounts are whole currency units. Floats are never used for money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Contract identifier.
    pub contract_id: ContractId,
    /// Client the contract was signed with.
    pub client_name: String,
    /// Maximum total spend.
    pub total_budget_limit: u64,
    /// First permitted flight day.
    pub flight_start: NaiveDate,
    /// Last permitted flight day.
    pub flight_end: NaiveDate,
    /// Geographies the campaign may target.
    pub allowed_geos: Vec<String>,
    /// Demographic segments the campaign may target.
    pub demographic: Vec<String>,
    /// Contextual targeting theme.
    pub contextual: String,
    /// Contracted placement type.
    pub placement_type: String,
    /// Contracted frequency cap.
    pub frequency_cap: String,
    /// Terms that must not appear in ad copy.
    pub forbidden_copy_terms: Vec<String>,
    /// Content genres the ad must not be associated with.
    pub forbidden_genres: Vec<String>,
    /// Required creative compliance standard.
    pub compliance_standard: String,
}

impl ContractTerms {
    /// The documented Nike Valentine contract.
    pub fn nike_valentine() -> Self {
        Self {
            contract_id: ContractId::from_literal("CNT-NIKE-VALENTINE"),
            client_name: "Nike".to_string(),
            total_budget_limit: 2_000_000,
            flight_start: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap_or_default(),
            flight_end: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap_or_default(),
            allowed_geos: vec!["USA".to_string()],
            demographic: vec!["Male".to_string(), "Female".to_string()],
            contextual: "Valentine gifting season".to_string(),
            placement_type: "Premium/Direct/Programmatic PMP".to_string(),
            frequency_cap: "5 views per user".to_string(),
            forbidden_copy_terms: vec!["cheap".to_string(), "discount".to_string()],
            forbidden_genres: vec![
                "Defamatory".to_string(),
                "Obscene".to_string(),
                "Illegal Content".to_string(),
            ],
            compliance_standard: "IAB Standard".to_string(),
        }
    }

    /// The value the contract expects for a pillar's campaign field.
    pub fn expected_value(&self, pillar: PillarKey) -> Value {
        match pillar {
            PillarKey::Audience => json!(self.allowed_geos),
            PillarKey::Budget => json!(self.total_budget_limit),
            PillarKey::Timeframe => json!(self.flight_start.to_string()),
            PillarKey::Optimization => json!(self.placement_type),
            PillarKey::Creative => json!(self.compliance_standard),
            PillarKey::Copy => json!(format!(
                "Copy free of: {}",
                self.forbidden_copy_terms.join(", ")
            )),
            PillarKey::Guardrails => json!(self.frequency_cap),
        }
    }

    /// Project the terms into the session contract view, one field per pillar.
    pub fn to_contract(&self, campaign_name: impl Into<String>) -> Contract {
        let fields = PillarKey::all()
            .iter()
            .map(|&p| (FieldKey::from(p), self.expected_value(p)))
            .collect();
        Contract {
            id: self.contract_id.clone(),
            campaign_name: campaign_name.into(),
            client_name: Some(self.client_name.clone()),
            fields,
        }
    }
}

/// The session's read-only contract view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Contract identifier.
    pub id: ContractId,
    /// Campaign audited against this contract.
    pub campaign_name: String,
    /// Client name, when known.
    #[serde(default)]
    pub client_name: Option<String>,
    /// Contract field values keyed by field.
    pub fields: BTreeMap<FieldKey, Value>,
}

impl Contract {
    /// A contract field value.
    pub fn field(&self, key: &FieldKey) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Fetch-once holder for the session contract.
///
/// Reads fail with [`CoreError::NotLoaded`] until [`ContractModel::load`]
/// succeeds; a second load fails with [`CoreError::AlreadyLoaded`]. There is
/// no mutation API.
#[derive(Debug, Clone, Default)]
pub struct ContractModel {
    contract: Option<Contract>,
}

impl ContractModel {
    /// An empty, not-yet-loaded model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the session contract.
    pub fn load(&mut self, contract: Contract) -> Result<(), CoreError> {
        if let Some(existing) = &self.contract {
            return Err(CoreError::AlreadyLoaded(existing.id.to_string()));
        }
        self.contract = Some(contract);
        Ok(())
    }

    /// Whether the initial load has completed.
    pub fn is_loaded(&self) -> bool {
        self.contract.is_some()
    }

    /// The loaded contract.
    pub fn contract(&self) -> Result<&Contract, CoreError> {
        self.contract.as_ref().ok_or(CoreError::NotLoaded)
    }

    /// A contract field value. `Ok(None)` when the contract has no such field.
    pub fn get_field(&self, key: &FieldKey) -> Result<Option<&Value>, CoreError> {
        Ok(self.contract()?.field(key))
    }
}
