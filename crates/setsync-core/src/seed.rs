//! # Seed Datasets
//!
//! The dataset the dashboard falls back to when its initial load cannot
//! reach the audit backend. It carries no authoritative score; the score is
//! derived from its flags.

use std::collections::BTreeMap;

use serde_json::json;

use crate::audit::{DashboardSnapshot, FieldRow, Flag};
use crate::contract::Contract;
use crate::identity::{ContractId, FieldKey, FlagId};
use crate::pillar::AuditStatus;

/// Contract id of the offline fallback dataset.
pub const FALLBACK_CONTRACT_ID: &str = "OFFLINE-FALLBACK";

/// The degraded-mode dashboard: Budget FAIL, Genres WARN, Geos PASS.
pub fn fallback_dashboard() -> DashboardSnapshot {
    let budget = FieldKey::from_literal("Budget");
    let genres = FieldKey::from_literal("Genres");
    let geos = FieldKey::from_literal("Geos");

    let fields = BTreeMap::from([
        (budget.clone(), json!("$50,000")),
        (genres.clone(), json!("Action, Drama")),
        (geos.clone(), json!("US, CA, UK")),
    ]);
    let contract = Contract {
        id: ContractId::from_literal(FALLBACK_CONTRACT_ID),
        campaign_name: "offline-preview".to_string(),
        client_name: None,
        fields,
    };

    let row = |key: &FieldKey, value: &str, expected: &str, status| FieldRow {
        field_type: key.clone(),
        value: Some(json!(value)),
        expected: Some(json!(expected)),
        status,
        remediated_at: None,
    };
    let rows = vec![
        row(&budget, "$55,000", "$50,000", AuditStatus::Fail),
        row(&genres, "Action, Drama, Comedy", "Action, Drama", AuditStatus::Warn),
        row(&geos, "US, CA, UK", "US, CA, UK", AuditStatus::Pass),
    ];

    let flag = |id: &'static str, key: &FieldKey, status, message: &str| Flag {
        id: FlagId::from_literal(id),
        field: key.clone(),
        status,
        message: message.to_string(),
    };
    let flags = vec![
        flag("1", &budget, AuditStatus::Fail, "Budget exceeds contract limit by $5,000"),
        flag(
            "2",
            &genres,
            AuditStatus::Warn,
            "Genre selection may not match target demographics",
        ),
        flag(
            "3",
            &geos,
            AuditStatus::Pass,
            "Geographic targeting matches contract specifications",
        ),
    ];

    DashboardSnapshot {
        contract,
        fields: rows,
        flags,
        score: None,
    }
}
