//! # Strategic Gaps
//!
//! Cross-field issues that are not tied to a single flag id. Each gap kind
//! has a precondition over specific pillars; a gap stays open while any of
//! its fields is not clear, and is pruned as soon as all of them are.

use serde::{Deserialize, Serialize};

use crate::audit::AuditField;
use crate::identity::FieldKey;
use crate::pillar::{AuditStatus, PillarKey};

/// Kind of strategic gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Audience targeting reaches outside the contracted scope.
    AudienceSeverance,
    /// Placement does not serve the contracted optimization goal.
    OptimizationMismatch,
    /// Ad copy violates contract language rules.
    CopyViolation,
}

impl GapKind {
    /// All gap kinds in report order.
    pub fn all() -> &'static [GapKind] {
        &[
            Self::AudienceSeverance,
            Self::OptimizationMismatch,
            Self::CopyViolation,
        ]
    }

    /// The pillar whose state is this gap's precondition.
    pub fn pillar(&self) -> PillarKey {
        match self {
            Self::AudienceSeverance => PillarKey::Audience,
            Self::OptimizationMismatch => PillarKey::Optimization,
            Self::CopyViolation => PillarKey::Copy,
        }
    }

    fn holds_for(&self, field: &AuditField) -> bool {
        match self {
            Self::AudienceSeverance => field.has_severance,
            Self::OptimizationMismatch | Self::CopyViolation => {
                field.status == AuditStatus::Fail
            }
        }
    }

    fn describe(&self) -> (&'static str, &'static str) {
        match self {
            Self::AudienceSeverance => (
                "Audience severance: campaign targeting reaches outside the contracted geography.",
                "Restrict geo targeting to the contracted markets.",
            ),
            Self::OptimizationMismatch => (
                "Optimization goal mismatch: placement does not match the contracted delivery channel.",
                "Move delivery to the contracted placement type.",
            ),
            Self::CopyViolation => (
                "Copy violation: ad copy uses language the contract forbids.",
                "Replace the ad copy with approved brand messaging.",
            ),
        }
    }
}

/// A cross-field issue with a suggested remediation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategicGap {
    /// Gap kind.
    pub kind: GapKind,
    /// What is wrong.
    pub message: String,
    /// What to do about it.
    pub remediation: String,
    /// Fields whose state is this gap's precondition.
    pub fields: Vec<FieldKey>,
}

impl StrategicGap {
    /// The gap of a given kind with its standard wording.
    pub fn of_kind(kind: GapKind) -> Self {
        let (message, remediation) = kind.describe();
        Self {
            kind,
            message: message.to_string(),
            remediation: remediation.to_string(),
            fields: vec![FieldKey::from(kind.pillar())],
        }
    }
}

/// Derives and prunes strategic gaps from field state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategicGapAnalyzer;

impl StrategicGapAnalyzer {
    /// Gaps whose precondition holds for the given fields.
    pub fn detect(fields: &[AuditField]) -> Vec<StrategicGap> {
        GapKind::all()
            .iter()
            .filter(|kind| {
                let key = FieldKey::from(kind.pillar());
                fields
                    .iter()
                    .any(|f| f.key == key && kind.holds_for(f))
            })
            .map(|&kind| StrategicGap::of_kind(kind))
            .collect()
    }

    /// A gap is resolved once every field it names is present and clear.
    pub fn is_resolved(gap: &StrategicGap, fields: &[AuditField]) -> bool {
        gap.fields.iter().all(|key| {
            fields
                .iter()
                .find(|f| &f.key == key)
                .is_some_and(AuditField::is_clear)
        })
    }

    /// Keep unresolved gaps from `existing`, then add newly detected kinds.
    pub fn reconcile(existing: &[StrategicGap], fields: &[AuditField]) -> Vec<StrategicGap> {
        let mut gaps: Vec<StrategicGap> = existing
            .iter()
            .filter(|gap| !Self::is_resolved(gap, fields))
            .cloned()
            .collect();
        for detected in Self::detect(fields) {
            if !gaps.iter().any(|g| g.kind == detected.kind) {
                gaps.push(detected);
            }
        }
        gaps.sort_by_key(|g| g.kind);
        gaps
    }
}
