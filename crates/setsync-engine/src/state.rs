//! # Audit State Store
//!
//! [`AuditState`] holds one session's contract, fields, flags, gaps and
//! score. It is synchronous: the engine wraps it in a
//! `parking_lot::RwLock` and applies every mutation under a single write
//! lock, so observers never see a half-applied update.
//!
//! Every mutation path ends in [`AuditState::commit`], which re-derives
//! field status from flags, escalates severance, prunes gaps, and
//! recomputes the score. After a commit the following hold:
//!
//! - every flag names a field present in the store
//! - a field with flags has the worst status among them
//! - `certified` iff score is 100 iff at least one field is tracked, all
//!   are PASS without severance, and no gap is open
//!
//! [`AuditSnapshot::invariant_violations`] checks these from the outside.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use setsync_core::{
    certification_band, AuditField, AuditReport, AuditStatus, ComplianceScorer, Contract,
    ContractModel, DashboardSnapshot, FieldKey, Flag, FlagId, RemediationPhase,
    RemediationRequest, RemediationTarget, StrategicGap, StrategicGapAnalyzer,
};

use crate::backend::{RemediationCall, RemediationOutcome};
use crate::effect::Effect;
use crate::error::EngineError;
use crate::remediation::FieldResult;

/// A field together with its remediation lifecycle.
#[derive(Debug, Clone)]
struct TrackedField {
    field: AuditField,
    phase: RemediationPhase,
    /// The field as it was before an optimistic update.
    rollback: Option<AuditField>,
}

impl TrackedField {
    fn new(field: AuditField) -> Self {
        Self {
            field,
            phase: RemediationPhase::Clean,
            rollback: None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct AuditState {
    contract: ContractModel,
    fields: Vec<TrackedField>,
    flags: Vec<Flag>,
    gaps: Vec<StrategicGap>,
    /// Score reported by the backend. Cleared once local state diverges.
    authoritative: Option<u8>,
    score: u8,
    certified: bool,
    fixing: RemediationPhase,
    degraded: Option<String>,
    revision: u64,
}

impl AuditState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.contract.is_loaded()
    }

    pub(crate) fn contract(&self) -> Result<&Contract, EngineError> {
        Ok(self.contract.contract()?)
    }

    pub(crate) fn get_field(&self, key: &FieldKey) -> Result<Option<&Value>, EngineError> {
        Ok(self.contract.get_field(key)?)
    }

    pub(crate) fn score(&self) -> u8 {
        self.score
    }

    pub(crate) fn is_certified(&self) -> bool {
        self.certified
    }

    pub(crate) fn gaps(&self) -> &[StrategicGap] {
        &self.gaps
    }

    pub(crate) fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub(crate) fn audit_fields(&self) -> Vec<AuditField> {
        self.fields.iter().map(|t| t.field.clone()).collect()
    }

    pub(crate) fn is_pending(&self, key: &FieldKey) -> bool {
        self.tracked(key).is_some_and(|t| t.phase.is_pending())
    }

    pub(crate) fn is_fixing(&self) -> bool {
        self.fixing.is_pending()
    }

    fn any_pending(&self) -> bool {
        self.fields.iter().any(|t| t.phase.is_pending())
    }

    fn tracked(&self, key: &FieldKey) -> Option<&TrackedField> {
        self.fields.iter().find(|t| &t.field.key == key)
    }

    fn tracked_mut(&mut self, key: &FieldKey) -> Option<&mut TrackedField> {
        self.fields.iter_mut().find(|t| &t.field.key == key)
    }

    /// Insert or replace a field, keeping its remediation history.
    fn upsert(&mut self, mut field: AuditField) {
        field.normalize();
        match self.tracked_mut(&field.key) {
            Some(tracked) => {
                if field.remediated_at.is_none() {
                    field.remediated_at = tracked.field.remediated_at;
                }
                tracked.field = field;
            }
            None => self.fields.push(TrackedField::new(field)),
        }
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Populate the store from a dashboard payload.
    pub(crate) fn install_dashboard(
        &mut self,
        snapshot: DashboardSnapshot,
        degraded: Option<String>,
    ) -> Result<Vec<Effect>, EngineError> {
        self.contract.load(snapshot.contract)?;
        self.fields = snapshot
            .fields
            .into_iter()
            .map(|row| {
                let mut field = AuditField::from(row);
                field.normalize();
                TrackedField::new(field)
            })
            .collect();
        self.flags = snapshot.flags;
        for tracked in &self.fields {
            let field = &tracked.field;
            if !field.is_clear() && !self.flags.iter().any(|f| f.field == field.key) {
                tracing::debug!(field = %field.key, "field row without a flag; deriving one");
                self.flags.push(Flag::for_field(field));
            }
        }
        self.gaps.clear();
        self.authoritative = snapshot.score;
        Ok(self.install_finish(degraded))
    }

    /// Populate the store from a full audit report.
    pub(crate) fn install_report(
        &mut self,
        contract: Contract,
        report: &AuditReport,
    ) -> Result<Vec<Effect>, EngineError> {
        self.contract.load(contract)?;
        self.fields = report.fields().into_iter().map(TrackedField::new).collect();
        self.flags = report.flags();
        self.gaps.clear();
        self.authoritative = report.score;
        Ok(self.install_finish(None))
    }

    fn install_finish(&mut self, degraded: Option<String>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(reason) = &degraded {
            effects.push(Effect::Degraded {
                reason: reason.clone(),
            });
        }
        self.degraded = degraded;
        effects.extend(self.commit());
        effects
    }

    /// Merge a re-audit report. Pending fields keep their optimistic state.
    pub(crate) fn merge_report(&mut self, report: &AuditReport) -> Vec<Effect> {
        for (pillar, pillar_report) in &report.pillars {
            let field = pillar_report.to_field(*pillar);
            if self.is_pending(&field.key) {
                continue;
            }
            let flag = Flag::for_field(&field);
            self.flags.retain(|f| f.field != field.key);
            self.flags.push(flag);
            self.upsert(field);
        }
        self.authoritative = if self.any_pending() {
            None
        } else {
            report.score
        };
        self.commit()
    }

    /// Merge a background poll.
    ///
    /// The poll is the whole flag set. Every field that is not pending is
    /// rebuilt from it: its status becomes the worst incoming flag, or PASS
    /// when no flag names it, and a field that is no longer failing loses
    /// its severance and stale issues. Pending fields keep their local
    /// flags and state. Returns the fields whose local state was kept.
    pub(crate) fn merge_poll(
        &mut self,
        incoming: Vec<Flag>,
        score: u8,
    ) -> (Vec<Effect>, Vec<FieldKey>) {
        let pending: BTreeSet<FieldKey> = self
            .fields
            .iter()
            .filter(|t| t.phase.is_pending())
            .map(|t| t.field.key.clone())
            .collect();

        let mut flags: Vec<Flag> = self
            .flags
            .iter()
            .filter(|f| pending.contains(&f.field))
            .cloned()
            .collect();
        flags.extend(incoming.into_iter().filter(|f| !pending.contains(&f.field)));
        self.flags = flags;

        for tracked in self.fields.iter_mut().filter(|t| !t.phase.is_pending()) {
            let field = &mut tracked.field;
            let named: Vec<&Flag> = self.flags.iter().filter(|f| f.field == field.key).collect();
            let status = AuditStatus::worst(named.iter().map(|f| f.status)).unwrap_or(AuditStatus::Pass);
            let messages: Vec<String> = named
                .iter()
                .filter(|f| f.status != AuditStatus::Pass && !f.message.is_empty())
                .map(|f| f.message.clone())
                .collect();
            if status == AuditStatus::Fail {
                if field.issues.is_empty() {
                    field.issues = messages;
                }
            } else {
                field.has_severance = false;
                field.issues = messages;
            }
            field.status = status;
        }

        self.authoritative = pending.is_empty().then_some(score);
        (self.commit(), pending.into_iter().collect())
    }

    // ── Remediation ─────────────────────────────────────────────────

    pub(crate) fn flag(&self, id: &FlagId) -> Result<&Flag, EngineError> {
        if !self.is_loaded() {
            return Err(EngineError::NotLoaded);
        }
        self.flags
            .iter()
            .find(|f| &f.id == id)
            .ok_or_else(|| EngineError::UnknownFlag(id.clone()))
    }

    /// Failing flags, at most one per field, in store order.
    pub(crate) fn failing_flags(&self) -> Vec<Flag> {
        let mut seen = BTreeSet::new();
        self.flags
            .iter()
            .filter(|f| f.status == AuditStatus::Fail && seen.insert(f.field.clone()))
            .cloned()
            .collect()
    }

    pub(crate) fn remediation_call(&self, flag: &Flag) -> Result<RemediationCall, EngineError> {
        let contract = self.contract()?;
        Ok(RemediationCall {
            flag_id: flag.id.clone(),
            field: flag.field.clone(),
            contract_id: contract.id.clone(),
            campaign_name: contract.campaign_name.clone(),
        })
    }

    /// Mark a field pending and apply the optimistic value.
    pub(crate) fn begin(&mut self, key: &FieldKey) -> Result<(), EngineError> {
        let index = match self.fields.iter().position(|t| &t.field.key == key) {
            Some(index) => index,
            None => {
                self.fields
                    .push(TrackedField::new(AuditField::new(key.clone(), AuditStatus::Fail)));
                self.fields.len() - 1
            }
        };
        let tracked = &mut self.fields[index];
        tracked
            .phase
            .begin(RemediationRequest::now(RemediationTarget::Field(key.clone())))
            .map_err(|_| EngineError::AlreadyInFlight { field: key.clone() })?;
        tracked.rollback = Some(tracked.field.clone());
        if let Some(expected) = tracked.field.expected.clone() {
            tracked.field.value = Some(expected);
        }
        self.revision += 1;
        Ok(())
    }

    /// Apply a successful remediation. Call [`commit`](Self::commit) after.
    pub(crate) fn apply_outcome(
        &mut self,
        call: &RemediationCall,
        outcome: &RemediationOutcome,
    ) -> Option<FieldResult> {
        let now = Utc::now();
        let tracked = self.tracked_mut(&call.field)?;
        if tracked.phase.resolve().is_err() {
            tracing::warn!(field = %call.field, "remediation outcome for a field that was not pending");
        }
        tracked.rollback = None;

        let field = &mut tracked.field;
        field.status = outcome.status;
        if let Some(value) = outcome.value.clone().or_else(|| field.expected.clone()) {
            field.value = Some(value);
        }
        field.issues = outcome.issues.clone();
        field.has_severance = outcome.has_severance;
        field.remediated_at = Some(now);
        field.normalize();

        let status = field.status;
        let message = field.message();
        let result = FieldResult {
            flag_id: call.flag_id.clone(),
            field: call.field.clone(),
            status,
            value: field.value.clone(),
            remediated_at: now,
        };

        for flag in self.flags.iter_mut().filter(|f| f.field == call.field) {
            flag.status = status;
            flag.message = message.clone();
        }
        // The backend score predates this change.
        self.authoritative = None;
        Some(result)
    }

    /// Undo an optimistic update. Call [`commit`](Self::commit) after.
    pub(crate) fn restore(&mut self, key: &FieldKey) {
        if let Some(tracked) = self.tracked_mut(key) {
            let _ = tracked.phase.resolve();
            if let Some(previous) = tracked.rollback.take() {
                tracked.field = previous;
            }
        }
    }

    pub(crate) fn begin_fix_all(&mut self) -> Result<(), EngineError> {
        self.fixing
            .begin(RemediationRequest::now(RemediationTarget::All))
            .map_err(|_| EngineError::AlreadyFixing)
    }

    pub(crate) fn end_fix_all(&mut self) {
        let _ = self.fixing.resolve();
    }

    // ── Derivation ──────────────────────────────────────────────────

    /// Re-derive everything that depends on fields and flags.
    pub(crate) fn commit(&mut self) -> Vec<Effect> {
        for flag in &self.flags {
            if self.tracked(&flag.field).is_none() {
                let mut field = AuditField::new(flag.field.clone(), flag.status);
                if flag.status != AuditStatus::Pass && !flag.message.is_empty() {
                    field.issues.push(flag.message.clone());
                }
                self.fields.push(TrackedField::new(field));
            }
        }

        for tracked in &mut self.fields {
            let key = tracked.field.key.clone();
            let worst = AuditStatus::worst(
                self.flags
                    .iter()
                    .filter(|f| f.field == key)
                    .map(|f| f.status),
            );
            if let Some(status) = worst {
                tracked.field.status = status;
            }
            tracked.field.normalize();
            if tracked.field.has_severance {
                for flag in self.flags.iter_mut().filter(|f| f.field == key) {
                    flag.status = AuditStatus::Fail;
                }
            }
        }

        let fields = self.audit_fields();
        self.gaps = StrategicGapAnalyzer::reconcile(&self.gaps, &fields);

        let clean = !fields.is_empty()
            && fields.iter().all(AuditField::is_clear)
            && self.gaps.is_empty();
        let derived = ComplianceScorer::score(fields.iter().map(|f| f.status));
        let base = match self.authoritative {
            Some(reported) => {
                if (reported == 100) != clean {
                    tracing::warn!(
                        reported,
                        derived,
                        clean,
                        "backend score disagrees with field state; clamping"
                    );
                }
                reported
            }
            None => derived,
        };
        let score = certification_band(base, clean);

        let mut effects = Vec::new();
        if score != self.score {
            effects.push(Effect::ScoreChanged {
                from: self.score,
                to: score,
            });
            effects.push(Effect::score_announcement(score));
        }
        if clean && !self.certified {
            effects.push(Effect::Certified);
        }
        self.score = score;
        self.certified = clean;
        self.revision += 1;
        effects
    }

    pub(crate) fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            contract: self.contract.contract().ok().cloned(),
            fields: self
                .fields
                .iter()
                .map(|t| FieldView {
                    field: t.field.clone(),
                    pending: t.phase.is_pending(),
                })
                .collect(),
            flags: self.flags.clone(),
            gaps: self.gaps.clone(),
            score: self.score,
            certified: self.certified,
            authoritative_score: self.authoritative,
            fixing: self.fixing.is_pending(),
            degraded: self.degraded.clone(),
            revision: self.revision,
        }
    }
}

/// A field as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    #[serde(flatten)]
    pub field: AuditField,
    /// A remediation request is in flight.
    pub pending: bool,
}

/// Consistent point-in-time copy of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSnapshot {
    pub contract: Option<Contract>,
    pub fields: Vec<FieldView>,
    pub flags: Vec<Flag>,
    pub gaps: Vec<StrategicGap>,
    pub score: u8,
    pub certified: bool,
    pub authoritative_score: Option<u8>,
    pub fixing: bool,
    pub degraded: Option<String>,
    /// Incremented on every mutation.
    pub revision: u64,
}

impl AuditSnapshot {
    pub fn field(&self, key: &FieldKey) -> Option<&FieldView> {
        self.fields.iter().find(|v| &v.field.key == key)
    }

    pub fn flag(&self, id: &FlagId) -> Option<&Flag> {
        self.flags.iter().find(|f| &f.id == id)
    }

    pub fn audit_fields(&self) -> Vec<AuditField> {
        self.fields.iter().map(|v| v.field.clone()).collect()
    }

    pub fn pending_fields(&self) -> Vec<FieldKey> {
        self.fields
            .iter()
            .filter(|v| v.pending)
            .map(|v| v.field.key.clone())
            .collect()
    }

    /// Descriptions of every consistency rule the snapshot breaks.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let all_clear = !self.fields.is_empty() && self.fields.iter().all(|v| v.field.is_clear());

        if self.certified != (self.score == 100) {
            violations.push(format!(
                "certified={} but score={}",
                self.certified, self.score
            ));
        }
        if self.certified != all_clear {
            violations.push(format!(
                "certified={} but all fields clear={all_clear}",
                self.certified
            ));
        }
        if self.certified && !self.gaps.is_empty() {
            violations.push(format!("certified with {} open gaps", self.gaps.len()));
        }
        if !self.gaps.is_empty() && all_clear {
            violations.push("open gaps while every field is clear".to_string());
        }
        if self.certified && self.flags.iter().any(|f| f.status.is_blocking()) {
            violations.push("certified with a blocking flag".to_string());
        }
        for flag in &self.flags {
            let Some(view) = self.field(&flag.field) else {
                violations.push(format!("flag {} names untracked field {}", flag.id, flag.field));
                continue;
            };
            if view.field.has_severance && flag.status != AuditStatus::Fail {
                violations.push(format!("flag {} on severed field is not FAIL", flag.id));
            }
        }
        for view in &self.fields {
            let worst = AuditStatus::worst(
                self.flags
                    .iter()
                    .filter(|f| f.field == view.field.key)
                    .map(|f| f.status),
            );
            match worst {
                Some(worst) if worst != view.field.status => {
                    violations.push(format!(
                        "field {} is {} but its worst flag is {}",
                        view.field.key, view.field.status, worst
                    ));
                }
                None if !view.pending && !view.field.is_clear() => {
                    violations.push(format!(
                        "field {} is {} with no flag naming it",
                        view.field.key, view.field.status
                    ));
                }
                _ => {}
            }
        }
        if !self.certified
            && !self.fields.is_empty()
            && self.gaps.is_empty()
            && self.fields.iter().all(|v| v.field.is_clear())
        {
            violations.push("not certified while every field is clear and no gap is open".to_string());
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use setsync_core::{fallback_dashboard, ContractTerms, PillarKey, PillarReport};
    use std::collections::BTreeMap;

    fn key(s: &str) -> FieldKey {
        FieldKey::new(s).unwrap()
    }

    fn loaded_fallback() -> AuditState {
        let mut state = AuditState::new();
        state.install_dashboard(fallback_dashboard(), None).unwrap();
        state
    }

    fn report(statuses: &[(PillarKey, AuditStatus)], score: Option<u8>) -> AuditReport {
        let pillars = statuses
            .iter()
            .map(|&(pillar, status)| {
                let issues = if status == AuditStatus::Pass {
                    vec![]
                } else {
                    vec![format!("{pillar} violation")]
                };
                (
                    pillar,
                    PillarReport {
                        status,
                        issues,
                        value: None,
                        expected: None,
                        has_severance: false,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        AuditReport {
            pillars,
            is_certified: false,
            score,
        }
    }

    fn call_for(state: &AuditState, id: &str) -> RemediationCall {
        let flag = state.flag(&FlagId::new(id).unwrap()).unwrap().clone();
        state.remediation_call(&flag).unwrap()
    }

    #[test]
    fn fallback_scores_fifty_from_formula() {
        let state = loaded_fallback();
        assert_eq!(state.score(), 50);
        assert!(!state.is_certified());
        assert!(state.snapshot().invariant_violations().is_empty());
    }

    #[test]
    fn second_install_rejected() {
        let mut state = loaded_fallback();
        assert!(matches!(
            state.install_dashboard(fallback_dashboard(), None),
            Err(EngineError::AlreadyLoaded(_))
        ));
    }

    #[test]
    fn install_reports_degraded_reason_first() {
        let mut state = AuditState::new();
        let effects = state
            .install_dashboard(fallback_dashboard(), Some("GET /contract: refused".into()))
            .unwrap();
        assert_eq!(
            effects[0],
            Effect::Degraded {
                reason: "GET /contract: refused".into()
            }
        );
        assert_eq!(state.degraded(), Some("GET /contract: refused"));
    }

    #[test]
    fn flags_without_rows_create_fields() {
        let mut snapshot = fallback_dashboard();
        snapshot.fields.clear();
        let mut state = AuditState::new();
        state.install_dashboard(snapshot, None).unwrap();
        let view = state.snapshot();
        assert_eq!(view.fields.len(), 3);
        assert_eq!(view.field(&key("Budget")).unwrap().field.status, AuditStatus::Fail);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn begin_is_exclusive_per_field() {
        let mut state = loaded_fallback();
        state.begin(&key("Budget")).unwrap();
        assert!(matches!(
            state.begin(&key("Budget")),
            Err(EngineError::AlreadyInFlight { .. })
        ));
        state.begin(&key("Genres")).unwrap();
    }

    #[test]
    fn begin_applies_expected_value_optimistically() {
        let mut state = loaded_fallback();
        state.begin(&key("Budget")).unwrap();
        let view = state.snapshot();
        let budget = view.field(&key("Budget")).unwrap();
        assert!(budget.pending);
        assert_eq!(budget.field.value, Some(json!("$50,000")));
        assert_eq!(budget.field.status, AuditStatus::Fail);
    }

    #[test]
    fn restore_rolls_back_optimistic_value() {
        let mut state = loaded_fallback();
        let before = state.snapshot();
        state.begin(&key("Budget")).unwrap();
        state.restore(&key("Budget"));
        state.commit();
        let after = state.snapshot();
        assert_eq!(after.fields, before.fields);
        assert_eq!(after.flags, before.flags);
        assert_eq!(after.score, before.score);
        assert!(after.revision > before.revision);
    }

    #[test]
    fn outcome_updates_field_and_its_flags() {
        let mut state = loaded_fallback();
        let call = call_for(&state, "1");
        state.begin(&call.field).unwrap();
        let result = state
            .apply_outcome(&call, &RemediationOutcome::passed(Some(json!("$50,000"))))
            .unwrap();
        let effects = state.commit();

        assert_eq!(result.status, AuditStatus::Pass);
        let view = state.snapshot();
        assert!(!view.field(&key("Budget")).unwrap().pending);
        assert!(view.field(&key("Budget")).unwrap().field.remediated_at.is_some());
        assert_eq!(view.flag(&FlagId::new("1").unwrap()).unwrap().status, AuditStatus::Pass);
        // PASS, WARN, PASS: (100 * 5 + 3) / 6 = 83
        assert_eq!(view.score, 83);
        assert_eq!(effects[0], Effect::ScoreChanged { from: 50, to: 83 });
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn warn_blocks_certification() {
        let mut state = loaded_fallback();
        let call = call_for(&state, "1");
        state.begin(&call.field).unwrap();
        state.apply_outcome(&call, &RemediationOutcome::passed(None));
        state.commit();
        assert!(!state.is_certified());
        assert!(state.score() < 100);
    }

    #[test]
    fn certification_reached_when_all_clear() {
        let mut state = loaded_fallback();
        let mut saw_certified = false;
        for id in ["1", "2"] {
            let call = call_for(&state, id);
            state.begin(&call.field).unwrap();
            state.apply_outcome(&call, &RemediationOutcome::passed(None));
            saw_certified |= state.commit().contains(&Effect::Certified);
        }
        assert!(saw_certified);
        assert_eq!(state.score(), 100);
        assert!(state.is_certified());
        assert!(state.snapshot().invariant_violations().is_empty());
    }

    #[test]
    fn authoritative_hundred_clamped_while_not_clean() {
        let mut snapshot = fallback_dashboard();
        snapshot.score = Some(100);
        let mut state = AuditState::new();
        state.install_dashboard(snapshot, None).unwrap();
        assert_eq!(state.score(), 99);
        assert!(!state.is_certified());
    }

    #[test]
    fn authoritative_score_used_when_consistent() {
        let mut snapshot = fallback_dashboard();
        snapshot.score = Some(75);
        let mut state = AuditState::new();
        state.install_dashboard(snapshot, None).unwrap();
        assert_eq!(state.score(), 75);
    }

    #[test]
    fn severance_escalates_field_flags_and_opens_gap() {
        let terms = ContractTerms::nike_valentine();
        let mut r = report(
            &[
                (PillarKey::Audience, AuditStatus::Warn),
                (PillarKey::Budget, AuditStatus::Pass),
            ],
            None,
        );
        r.pillars.get_mut(&PillarKey::Audience).unwrap().has_severance = true;

        let mut state = AuditState::new();
        state.install_report(terms.to_contract("seed"), &r).unwrap();
        let view = state.snapshot();
        let audience = view.field(&key("Audience")).unwrap();
        assert_eq!(audience.field.status, AuditStatus::Fail);
        assert!(view.flags.iter().filter(|f| f.field == key("Audience")).all(|f| f.status == AuditStatus::Fail));
        assert_eq!(view.gaps.len(), 1);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn merge_report_skips_pending_fields() {
        let terms = ContractTerms::nike_valentine();
        let mut state = AuditState::new();
        state
            .install_report(
                terms.to_contract("seed"),
                &report(
                    &[
                        (PillarKey::Budget, AuditStatus::Fail),
                        (PillarKey::Copy, AuditStatus::Fail),
                    ],
                    Some(0),
                ),
            )
            .unwrap();
        state.begin(&key("Budget")).unwrap();

        state.merge_report(&report(
            &[
                (PillarKey::Budget, AuditStatus::Pass),
                (PillarKey::Copy, AuditStatus::Pass),
            ],
            Some(100),
        ));

        let view = state.snapshot();
        assert_eq!(view.field(&key("Budget")).unwrap().field.status, AuditStatus::Fail);
        assert_eq!(view.field(&key("Copy")).unwrap().field.status, AuditStatus::Pass);
        assert_eq!(view.authoritative_score, None);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn merge_poll_preserves_pending_flags() {
        let mut state = loaded_fallback();
        state.begin(&key("Budget")).unwrap();
        let incoming = vec![Flag {
            id: FlagId::new("1").unwrap(),
            field: key("Budget"),
            status: AuditStatus::Pass,
            message: String::new(),
        }];
        let (_, preserved) = state.merge_poll(incoming, 100);

        assert_eq!(preserved, vec![key("Budget")]);
        let view = state.snapshot();
        assert_eq!(view.flag(&FlagId::new("1").unwrap()).unwrap().status, AuditStatus::Fail);
        assert_eq!(view.authoritative_score, None);
        // Flags 2 and 3 were not in the poll; their fields stay tracked.
        assert_eq!(view.flags.len(), 1);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn merge_poll_takes_authoritative_score_when_idle() {
        let mut state = loaded_fallback();
        let flags = state.snapshot().flags;
        state.merge_poll(flags, 60);
        assert_eq!(state.score(), 60);
    }

    #[test]
    fn merge_poll_with_no_flags_clears_every_idle_field() {
        let mut state = loaded_fallback();
        let (_, preserved) = state.merge_poll(vec![], 100);

        assert!(preserved.is_empty());
        let view = state.snapshot();
        assert!(view.flags.is_empty());
        assert!(view.fields.iter().all(|v| v.field.status == AuditStatus::Pass));
        assert_eq!(view.score, 100);
        assert!(view.certified);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn merge_poll_lifts_severance_when_flags_pass() {
        let mut r = report(
            &[
                (PillarKey::Audience, AuditStatus::Fail),
                (PillarKey::Budget, AuditStatus::Pass),
            ],
            Some(50),
        );
        r.pillars.get_mut(&PillarKey::Audience).unwrap().has_severance = true;
        let mut state = AuditState::new();
        state
            .install_report(ContractTerms::nike_valentine().to_contract("seed"), &r)
            .unwrap();
        assert_eq!(state.gaps().len(), 1);

        let mut flags = state.snapshot().flags;
        for flag in &mut flags {
            flag.status = AuditStatus::Pass;
        }
        state.merge_poll(flags, 100);

        let view = state.snapshot();
        let audience = view.field(&key("Audience")).unwrap();
        assert_eq!(audience.field.status, AuditStatus::Pass);
        assert!(!audience.field.has_severance);
        assert!(audience.field.issues.is_empty());
        assert_eq!(view.flag(&FlagId::new("Audience").unwrap()).unwrap().status, AuditStatus::Pass);
        assert!(view.gaps.is_empty());
        assert!(view.certified);
        assert_eq!(view.score, 100);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn merge_poll_keeps_severance_while_still_failing() {
        let mut r = report(&[(PillarKey::Audience, AuditStatus::Fail)], None);
        r.pillars.get_mut(&PillarKey::Audience).unwrap().has_severance = true;
        let mut state = AuditState::new();
        state
            .install_report(ContractTerms::nike_valentine().to_contract("seed"), &r)
            .unwrap();

        let flags = state.snapshot().flags;
        state.merge_poll(flags, 0);
        let view = state.snapshot();
        assert!(view.field(&key("Audience")).unwrap().field.has_severance);
        assert!(!view.certified);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn unflagged_failing_row_gets_a_flag() {
        let mut snapshot = fallback_dashboard();
        snapshot.flags.retain(|f| f.field != key("Budget"));
        let mut state = AuditState::new();
        state.install_dashboard(snapshot, None).unwrap();

        let view = state.snapshot();
        let budget = view.flags.iter().find(|f| f.field == key("Budget")).unwrap();
        assert_eq!(budget.status, AuditStatus::Fail);
        assert!(view.invariant_violations().is_empty());
    }

    #[test]
    fn violations_report_unflagged_failing_field() {
        let mut view = loaded_fallback().snapshot();
        view.flags.retain(|f| f.field != key("Budget"));
        assert!(view
            .invariant_violations()
            .iter()
            .any(|v| v.contains("Budget") && v.contains("no flag")));
    }

    #[test]
    fn violations_report_uncertified_clean_state() {
        let mut state = loaded_fallback();
        state.merge_poll(vec![], 100);
        let mut view = state.snapshot();
        view.certified = false;
        view.score = 99;
        assert!(view
            .invariant_violations()
            .iter()
            .any(|v| v.starts_with("not certified")));
    }

    #[test]
    fn fix_all_phase_is_exclusive() {
        let mut state = loaded_fallback();
        state.begin_fix_all().unwrap();
        assert!(matches!(state.begin_fix_all(), Err(EngineError::AlreadyFixing)));
        state.end_fix_all();
        state.begin_fix_all().unwrap();
    }

    #[test]
    fn failing_flags_one_per_field() {
        let mut snapshot = fallback_dashboard();
        snapshot.flags.push(Flag {
            id: FlagId::new("9").unwrap(),
            field: key("Budget"),
            status: AuditStatus::Fail,
            message: "Second budget issue".into(),
        });
        let mut state = AuditState::new();
        state.install_dashboard(snapshot, None).unwrap();
        let failing = state.failing_flags();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].id, FlagId::new("1").unwrap());
    }

    #[test]
    fn unknown_flag_and_not_loaded() {
        let state = AuditState::new();
        assert!(matches!(state.flag(&FlagId::new("1").unwrap()), Err(EngineError::NotLoaded)));
        let state = loaded_fallback();
        assert!(matches!(
            state.flag(&FlagId::new("42").unwrap()),
            Err(EngineError::UnknownFlag(_))
        ));
    }

    fn status_strategy() -> impl Strategy<Value = AuditStatus> {
        prop_oneof![
            Just(AuditStatus::Pass),
            Just(AuditStatus::Warn),
            Just(AuditStatus::Fail),
        ]
    }

    proptest! {
        #[test]
        fn commit_always_consistent(
            statuses in proptest::collection::vec((status_strategy(), any::<bool>()), 1..=7),
            reported in proptest::option::of(0u8..=100),
            remediate in proptest::collection::vec(any::<bool>(), 7),
        ) {
            let pillars = PillarKey::all();
            let mut r = report(
                &statuses.iter().zip(pillars).map(|((s, _), p)| (*p, *s)).collect::<Vec<_>>(),
                reported,
            );
            for ((_, severed), p) in statuses.iter().zip(pillars) {
                r.pillars.get_mut(p).unwrap().has_severance = *severed;
            }
            let mut state = AuditState::new();
            state.install_report(ContractTerms::nike_valentine().to_contract("seed"), &r).unwrap();
            prop_assert!(state.snapshot().invariant_violations().is_empty());

            for (p, fix) in pillars.iter().zip(remediate).take(statuses.len()) {
                let flag = state.snapshot().flag(&FlagId::new(p.as_str()).unwrap()).cloned().unwrap();
                let call = state.remediation_call(&flag).unwrap();
                state.begin(&call.field).unwrap();
                if fix {
                    state.apply_outcome(&call, &RemediationOutcome::passed(None));
                } else {
                    state.restore(&call.field);
                }
                state.commit();
                prop_assert!(state.snapshot().invariant_violations().is_empty());
            }
        }

        #[test]
        fn merge_poll_always_consistent(
            statuses in proptest::collection::vec((status_strategy(), any::<bool>()), 1..=7),
            incoming in proptest::collection::vec(proptest::option::of(status_strategy()), 7),
            pending in proptest::option::of(0usize..7),
            reported in 0u8..=100,
        ) {
            let pillars = PillarKey::all();
            let mut r = report(
                &statuses.iter().zip(pillars).map(|((s, _), p)| (*p, *s)).collect::<Vec<_>>(),
                None,
            );
            for ((_, severed), p) in statuses.iter().zip(pillars) {
                r.pillars.get_mut(p).unwrap().has_severance = *severed;
            }
            let mut state = AuditState::new();
            state.install_report(ContractTerms::nike_valentine().to_contract("seed"), &r).unwrap();

            let pending = pending
                .filter(|i| *i < statuses.len())
                .map(|i| FieldKey::from(pillars[i]));
            if let Some(field) = &pending {
                state.begin(field).unwrap();
            }

            // A partial poll: pillars mapped to `None` are absent from it.
            let flags: Vec<Flag> = pillars
                .iter()
                .zip(&incoming)
                .filter_map(|(p, status)| {
                    status.map(|status| Flag {
                        id: FlagId::new(p.as_str()).unwrap(),
                        field: FieldKey::from(*p),
                        status,
                        message: format!("{p} reported {status}"),
                    })
                })
                .collect();
            let idle_clear = flags
                .iter()
                .all(|f| f.status == AuditStatus::Pass);
            let (_, preserved) = state.merge_poll(flags, reported);

            let view = state.snapshot();
            prop_assert!(view.invariant_violations().is_empty(), "{:?}", view.invariant_violations());
            prop_assert_eq!(preserved, pending.clone().into_iter().collect::<Vec<_>>());
            if pending.is_none() && idle_clear {
                prop_assert!(view.certified);
                prop_assert_eq!(view.score, 100);
            }
        }
    }
}
