//! # Audit Results
//!
//! Per-field audit state ([`AuditField`]), the flags issued against fields
//! ([`Flag`]), the wire shapes they arrive in ([`FieldRow`], [`AuditReport`])
//! and the assembled dashboard payload ([`DashboardSnapshot`]).
//!
//! Pillars and plain fields share one representation: a pillar is an
//! [`AuditField`] whose key parses as a [`PillarKey`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::Contract;
use crate::identity::{FieldKey, FlagId};
use crate::pillar::{AuditStatus, PillarKey};

/// Message shown for a non-passing field that carries no issue text.
pub const DEFAULT_FAIL_MESSAGE: &str = "Verification needed.";

/// Message shown for a passing field.
pub const PASS_MESSAGE: &str = "Compliant with contract";

/// Audit state of one field or pillar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditField {
    /// Field key.
    pub key: FieldKey,
    /// Current status.
    pub status: AuditStatus,
    /// Ordered issue messages.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Value found in the campaign setup.
    #[serde(default)]
    pub value: Option<Value>,
    /// Value the contract expects.
    #[serde(default)]
    pub expected: Option<Value>,
    /// Targeting diverges from contract scope.
    #[serde(default)]
    pub has_severance: bool,
    /// When the field was last remediated.
    #[serde(default)]
    pub remediated_at: Option<DateTime<Utc>>,
}

impl AuditField {
    /// A field with no issues, value or remediation history.
    pub fn new(key: FieldKey, status: AuditStatus) -> Self {
        Self {
            key,
            status,
            issues: Vec::new(),
            value: None,
            expected: None,
            has_severance: false,
            remediated_at: None,
        }
    }

    /// The pillar this field represents, if any.
    pub fn pillar(&self) -> Option<PillarKey> {
        self.key.pillar()
    }

    /// PASS and not severed.
    pub fn is_clear(&self) -> bool {
        self.status == AuditStatus::Pass && !self.has_severance
    }

    /// Severance always fails: a severed field cannot stay PASS or WARN.
    pub fn normalize(&mut self) {
        if self.has_severance {
            self.status = AuditStatus::Fail;
        }
    }

    /// Headline message for flags and graph nodes.
    pub fn message(&self) -> String {
        match (self.status, self.issues.first()) {
            (_, Some(first)) => first.clone(),
            (AuditStatus::Pass, None) => PASS_MESSAGE.to_string(),
            (_, None) => DEFAULT_FAIL_MESSAGE.to_string(),
        }
    }
}

/// A violation flag naming one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Flag id issued by the backend.
    pub id: FlagId,
    /// The field the flag is raised against.
    pub field: FieldKey,
    /// Flag status.
    pub status: AuditStatus,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl Flag {
    /// The flag an audit report implies for a field: its id is the field key.
    pub fn for_field(field: &AuditField) -> Self {
        Self {
            id: FlagId::from(&field.key),
            field: field.key.clone(),
            status: field.status,
            message: field.message(),
        }
    }
}

/// One row of the campaign field listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRow {
    /// Field key.
    pub field_type: FieldKey,
    /// Current setup value.
    #[serde(default)]
    pub value: Option<Value>,
    /// Contract value.
    #[serde(default)]
    pub expected: Option<Value>,
    /// Field status; rows without one are passing.
    #[serde(default = "default_row_status")]
    pub status: AuditStatus,
    /// Last remediation, as Unix milliseconds on the wire.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub remediated_at: Option<DateTime<Utc>>,
}

fn default_row_status() -> AuditStatus {
    AuditStatus::Pass
}

impl From<FieldRow> for AuditField {
    fn from(row: FieldRow) -> Self {
        Self {
            key: row.field_type,
            status: row.status,
            issues: Vec::new(),
            value: row.value,
            expected: row.expected,
            has_severance: false,
            remediated_at: row.remediated_at,
        }
    }
}

/// One pillar of an audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarReport {
    /// Pillar status.
    pub status: AuditStatus,
    /// Ordered issue messages.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Setup value inspected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Contract value expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Targeting diverges from contract scope.
    #[serde(default)]
    pub has_severance: bool,
}

impl PillarReport {
    /// The store entry for this pillar, severance normalized.
    pub fn to_field(&self, pillar: PillarKey) -> AuditField {
        let mut field = AuditField {
            key: FieldKey::from(pillar),
            status: self.status,
            issues: self.issues.clone(),
            value: self.value.clone(),
            expected: self.expected.clone(),
            has_severance: self.has_severance,
            remediated_at: None,
        };
        field.normalize();
        field
    }
}

/// Result of running or re-running an audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Per-pillar results, in pillar order.
    pub pillars: BTreeMap<PillarKey, PillarReport>,
    /// Backend's certification verdict.
    pub is_certified: bool,
    /// Authoritative score, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

impl AuditReport {
    /// Store entries for every reported pillar, in pillar order.
    pub fn fields(&self) -> Vec<AuditField> {
        self.pillars
            .iter()
            .map(|(&pillar, report)| report.to_field(pillar))
            .collect()
    }

    /// One flag per reported pillar, id = pillar key.
    pub fn flags(&self) -> Vec<Flag> {
        self.fields().iter().map(Flag::for_field).collect()
    }

    /// Status of one pillar, if reported.
    pub fn status_of(&self, pillar: PillarKey) -> Option<AuditStatus> {
        self.pillars.get(&pillar).map(|p| p.to_field(pillar).status)
    }

    /// Pillars reported as FAIL.
    pub fn failing(&self) -> Vec<PillarKey> {
        self.pillars
            .iter()
            .filter(|(&pillar, report)| report.to_field(pillar).status == AuditStatus::Fail)
            .map(|(&pillar, _)| pillar)
            .collect()
    }
}

/// Everything the dashboard's initial load assembles.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    /// Session contract.
    pub contract: Contract,
    /// Field rows.
    pub fields: Vec<FieldRow>,
    /// Open flags.
    pub flags: Vec<Flag>,
    /// Authoritative score, if the backend supplied one.
    pub score: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severance_normalizes_to_fail() {
        let report = PillarReport {
            status: AuditStatus::Warn,
            issues: vec![],
            value: None,
            expected: None,
            has_severance: true,
        };
        let field = report.to_field(PillarKey::Audience);
        assert_eq!(field.status, AuditStatus::Fail);
        assert!(!field.is_clear());
    }

    #[test]
    fn report_flags_use_pillar_keys_as_ids() {
        let raw = json!({
            "pillars": {
                "Budget": { "status": "FAIL", "issues": ["Total spend exceeds cap"] },
                "Audience": { "status": "PASS", "issues": [] }
            },
            "is_certified": false
        });
        let report: AuditReport = serde_json::from_value(raw).unwrap();
        let flags = report.flags();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].id.as_str(), "Audience");
        assert_eq!(flags[0].message, PASS_MESSAGE);
        assert_eq!(flags[1].id.as_str(), "Budget");
        assert_eq!(flags[1].message, "Total spend exceeds cap");
        assert_eq!(report.failing(), vec![PillarKey::Budget]);
        assert_eq!(report.score, None);
    }

    #[test]
    fn field_row_defaults_status_and_parses_millis() {
        let row: FieldRow = serde_json::from_value(json!({
            "fieldType": "Budget",
            "value": "$50,000",
            "remediatedAt": 1_770_595_200_000_i64
        }))
        .unwrap();
        assert_eq!(row.status, AuditStatus::Pass);
        let at = row.remediated_at.unwrap();
        assert_eq!(at.timestamp_millis(), 1_770_595_200_000);
    }

    #[test]
    fn message_falls_back_by_status() {
        let mut field = AuditField::new(FieldKey::from(PillarKey::Copy), AuditStatus::Fail);
        assert_eq!(field.message(), DEFAULT_FAIL_MESSAGE);
        field.issues.push("Forbidden term: cheap".into());
        assert_eq!(field.message(), "Forbidden term: cheap");
    }
}
