//! # Campaign Setup
//!
//! The campaign "setup" audited against a contract, the documented seed
//! campaign, and the per-pillar fix patches applied when remediating by
//! re-running the audit.
//!
//! Patches are partial JSON documents deep-merged into the setup: objects
//! merge key by key, every other value replaces what it lands on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ValidationError;
use crate::pillar::PillarKey;

/// Audience targeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceSetup {
    /// Targeted geographies.
    pub geo_targeting: Vec<String>,
    /// Targeted demographic segments.
    #[serde(default)]
    pub demographic: Vec<String>,
    /// Contextual theme.
    #[serde(default)]
    pub contextual: String,
}

/// Budget plan. Total spend is `daily_budget * total_days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSetup {
    /// Spend per day in whole currency units.
    pub daily_budget: u64,
    /// Number of flight days.
    pub total_days: u32,
}

/// Flight dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSetup {
    /// First flight day.
    pub start_date: NaiveDate,
    /// Last flight day.
    pub end_date: NaiveDate,
}

/// Placement and frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSetup {
    /// Placement type.
    pub placement: String,
    /// Frequency cap.
    #[serde(default)]
    pub frequency_cap: String,
}

/// Creative format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeSetup {
    /// Asset format, e.g. `1080p`.
    pub format: String,
    /// Compliance standard the creative was produced under.
    #[serde(default)]
    pub compliance_standard: String,
}

/// Ad copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopySetup {
    /// The copy text shown to users.
    pub ad_copy_text: String,
}

/// A campaign setup audited against a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign name, unique per contract.
    pub campaign_name: String,
    /// Audience targeting.
    pub audience: AudienceSetup,
    /// Budget plan.
    pub budget: BudgetSetup,
    /// Flight dates.
    pub timeframe: TimeframeSetup,
    /// Placement and frequency.
    pub optimization: OptimizationSetup,
    /// Creative format.
    pub creative: CreativeSetup,
    /// Ad copy.
    pub copy: CopySetup,
}

impl Campaign {
    /// The documented seed campaign. Audited against
    /// [`ContractTerms::nike_valentine`](crate::ContractTerms::nike_valentine)
    /// it fails Audience, Budget, Optimization and Copy.
    pub fn nike_valentine_seed() -> Self {
        Self {
            campaign_name: "Nike_Valentine_Campaign_v1".to_string(),
            audience: AudienceSetup {
                geo_targeting: vec!["USA".to_string(), "UK".to_string()],
                demographic: vec!["Male".to_string(), "Female".to_string()],
                contextual: "Valentine gifting season".to_string(),
            },
            budget: BudgetSetup {
                daily_budget: 400_000,
                total_days: 10,
            },
            timeframe: TimeframeSetup {
                start_date: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap_or_default(),
                end_date: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap_or_default(),
            },
            optimization: OptimizationSetup {
                placement: "Social Media Feed".to_string(),
                frequency_cap: "5 views per user".to_string(),
            },
            creative: CreativeSetup {
                format: "1080p".to_string(),
                compliance_standard: "IAB Standard".to_string(),
            },
            copy: CopySetup {
                ad_copy_text: "Get 50% discount on cheap shoes now!".to_string(),
            },
        }
    }

    /// Total planned spend, saturating on overflow.
    pub fn total_spend(&self) -> u64 {
        self.budget
            .daily_budget
            .saturating_mul(u64::from(self.budget.total_days))
    }

    /// The setup value a pillar inspects, as shown next to the contract value.
    pub fn setup_value(&self, pillar: PillarKey) -> Value {
        match pillar {
            PillarKey::Audience => json!(self.audience.geo_targeting),
            PillarKey::Budget => json!(self.total_spend()),
            PillarKey::Timeframe => json!(self.timeframe.start_date.to_string()),
            PillarKey::Optimization => json!(self.optimization.placement),
            PillarKey::Creative => json!(self.creative.compliance_standard),
            PillarKey::Copy => json!(self.copy.ad_copy_text),
            PillarKey::Guardrails => json!(self.optimization.frequency_cap),
        }
    }

    /// Deep-merge a partial patch into this setup.
    ///
    /// The setup is left untouched when the merged document no longer
    /// describes a valid campaign.
    pub fn apply_patch(&mut self, patch: &Value) -> Result<(), ValidationError> {
        let mut doc =
            serde_json::to_value(&*self).map_err(|e| ValidationError::InvalidPatch(e.to_string()))?;
        merge_patch(&mut doc, patch);
        let merged: Campaign =
            serde_json::from_value(doc).map_err(|e| ValidationError::InvalidPatch(e.to_string()))?;
        *self = merged;
        Ok(())
    }
}

/// Deep-merge `patch` into `target`: objects merge recursively, any other
/// patch value replaces the target value.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_patch(existing, patch_value),
                    None => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// The documented fix patch for a pillar, if one exists.
///
/// Creative and Guardrails have no automated fix.
pub fn documented_fix(pillar: PillarKey) -> Option<Value> {
    match pillar {
        PillarKey::Audience => Some(json!({ "audience": { "geo_targeting": ["USA"] } })),
        PillarKey::Budget => Some(json!({ "budget": { "daily_budget": 200_000, "total_days": 6 } })),
        PillarKey::Optimization => Some(json!({
            "optimization": { "placement": "Premium/Direct/Programmatic PMP" }
        })),
        PillarKey::Copy => Some(json!({
            "copy": { "ad_copy_text": "The best athletic gear for your Valentine." }
        })),
        PillarKey::Timeframe => Some(json!({ "timeframe": { "start_date": "2026-02-09" } })),
        PillarKey::Creative | PillarKey::Guardrails => None,
    }
}
