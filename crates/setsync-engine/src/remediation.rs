//! # Remediation Orchestrator
//!
//! Single-flag remediation and the concurrent fix-all batch.
//!
//! Each remediated field goes `Clean -> Pending -> Clean`. While pending it
//! carries an optimistic value, rejects a second request, and is skipped by
//! background polls. The outcome is applied under one write lock; a failure
//! or a cancelled future restores the field exactly as it was.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;

use setsync_core::{AuditStatus, FieldKey, FlagId};

use crate::backend::{AuditBackend, RemediationCall, RemediationOutcome};
use crate::effect::Effect;
use crate::engine::ComplianceEngine;
use crate::error::{BackendError, EngineError, PartialRemediationFailure};

const REMEDIATE_ENDPOINT: &str = "POST /audit/remediate/{flagId}";

/// A field updated by a successful remediation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub flag_id: FlagId,
    pub field: FieldKey,
    pub status: AuditStatus,
    pub value: Option<Value>,
    pub remediated_at: DateTime<Utc>,
}

/// A remediation that failed and was rolled back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldFailure {
    pub flag_id: FlagId,
    pub field: FieldKey,
    pub message: String,
}

/// Outcome of [`ComplianceEngine::fix_all`].
#[derive(Debug, Clone, Serialize)]
pub struct FixAllReport {
    pub resolved: Vec<FieldResult>,
    pub failures: Vec<FieldFailure>,
    /// Failing fields left alone because a remediation was already in flight.
    pub skipped: Vec<FieldKey>,
    pub score: u8,
    pub certified: bool,
    pub effects: Vec<Effect>,
}

impl FixAllReport {
    pub fn attempted(&self) -> usize {
        self.resolved.len() + self.failures.len()
    }

    pub fn partial_failure(&self) -> Option<PartialRemediationFailure> {
        if self.failures.is_empty() {
            return None;
        }
        Some(PartialRemediationFailure {
            attempted: self.attempted(),
            failures: self.failures.clone(),
        })
    }

    /// `Err` if any remediation in the batch failed.
    pub fn into_result(self) -> Result<Self, EngineError> {
        match self.partial_failure() {
            Some(failure) => Err(failure.into()),
            None => Ok(self),
        }
    }
}

/// Restores pending fields if the owning future is dropped mid-flight.
struct RollbackGuard<B: AuditBackend> {
    engine: ComplianceEngine<B>,
    fields: Vec<FieldKey>,
    ends_batch: bool,
    armed: bool,
}

impl<B: AuditBackend> RollbackGuard<B> {
    fn new(engine: &ComplianceEngine<B>, fields: Vec<FieldKey>, ends_batch: bool) -> Self {
        Self {
            engine: engine.clone(),
            fields,
            ends_batch,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<B: AuditBackend> Drop for RollbackGuard<B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(fields = ?self.fields, "remediation cancelled; restoring previous state");
        let effects = {
            let mut state = self.engine.inner.state.write();
            for field in &self.fields {
                if state.is_pending(field) {
                    state.restore(field);
                }
            }
            if self.ends_batch {
                state.end_fix_all();
            }
            state.commit()
        };
        self.engine.emit(&effects);
    }
}

impl<B: AuditBackend> ComplianceEngine<B> {
    /// Remediate the field named by one flag.
    ///
    /// Rejected with [`EngineError::AlreadyInFlight`] while that field has
    /// a request pending. On failure the field is restored and the error
    /// carries the backend's message.
    pub async fn remediate_one(&self, flag_id: &FlagId) -> Result<FieldResult, EngineError> {
        let call = {
            let mut state = self.inner.state.write();
            let flag = state.flag(flag_id)?.clone();
            let call = state.remediation_call(&flag)?;
            state.begin(&call.field)?;
            call
        };
        tracing::info!(flag = %call.flag_id, field = %call.field, "remediation started");

        let mut guard = RollbackGuard::new(self, vec![call.field.clone()], false);
        let result = self
            .call(REMEDIATE_ENDPOINT, self.inner.backend.remediate(&call))
            .await;
        guard.disarm();

        let (result, effects) = {
            let mut state = self.inner.state.write();
            match result {
                Ok(outcome) => {
                    let applied = state.apply_outcome(&call, &outcome);
                    let mut effects = remediated_effects(applied.as_ref());
                    effects.extend(state.commit());
                    let applied = applied.ok_or_else(|| EngineError::UnknownFlag(call.flag_id.clone()));
                    (applied, effects)
                }
                Err(e) => {
                    state.restore(&call.field);
                    let mut effects = state.commit();
                    effects.push(failed_effect(&call.field, &e));
                    (Err(e.into()), effects)
                }
            }
        };

        match &result {
            Ok(applied) => tracing::info!(field = %applied.field, status = %applied.status, "remediation applied"),
            Err(e) => tracing::warn!(field = %call.field, error = %e, "remediation failed; state restored"),
        }
        self.emit(&effects);
        result
    }

    /// Remediate every failing flag concurrently, one request per field.
    ///
    /// Fields already pending are skipped. Outcomes are applied together
    /// and the score is recomputed once. Partial failure is reported in the
    /// returned [`FixAllReport`], not as an error.
    pub async fn fix_all(&self) -> Result<FixAllReport, EngineError> {
        let (calls, skipped) = {
            let mut state = self.inner.state.write();
            if !state.is_loaded() {
                return Err(EngineError::NotLoaded);
            }
            state.begin_fix_all()?;

            let mut calls: Vec<RemediationCall> = Vec::new();
            let mut skipped = Vec::new();
            for flag in state.failing_flags() {
                if state.is_pending(&flag.field) {
                    skipped.push(flag.field);
                    continue;
                }
                let call = match state.remediation_call(&flag) {
                    Ok(call) => call,
                    Err(e) => {
                        for begun in &calls {
                            state.restore(&begun.field);
                        }
                        state.end_fix_all();
                        let _ = state.commit();
                        return Err(e);
                    }
                };
                if let Err(e) = state.begin(&call.field) {
                    tracing::warn!(field = %call.field, error = %e, "skipping field in fix-all");
                    skipped.push(call.field);
                    continue;
                }
                calls.push(call);
            }
            (calls, skipped)
        };
        tracing::info!(count = calls.len(), skipped = skipped.len(), "fix-all started");

        let mut guard = RollbackGuard::new(
            self,
            calls.iter().map(|c| c.field.clone()).collect(),
            true,
        );
        let mut tasks = JoinSet::new();
        for call in calls.iter().cloned() {
            let engine = self.clone();
            tasks.spawn(async move {
                let result = engine
                    .call(REMEDIATE_ENDPOINT, engine.inner.backend.remediate(&call))
                    .await;
                (call, result)
            });
        }
        let mut settled: Vec<(RemediationCall, Result<RemediationOutcome, BackendError>)> =
            Vec::with_capacity(calls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => settled.push(pair),
                Err(e) => tracing::error!(error = %e, "remediation task did not complete"),
            }
        }
        guard.disarm();

        let report = {
            let mut state = self.inner.state.write();
            let mut resolved = Vec::new();
            let mut failures = Vec::new();
            let mut effects = Vec::new();
            let mut done = BTreeSet::new();

            for (call, result) in settled {
                done.insert(call.field.clone());
                match result {
                    Ok(outcome) => {
                        let applied = state.apply_outcome(&call, &outcome);
                        effects.extend(remediated_effects(applied.as_ref()));
                        resolved.extend(applied);
                    }
                    Err(e) => {
                        state.restore(&call.field);
                        effects.push(failed_effect(&call.field, &e));
                        failures.push(FieldFailure {
                            flag_id: call.flag_id,
                            field: call.field,
                            message: e.to_string(),
                        });
                    }
                }
            }
            for call in calls.iter().filter(|c| !done.contains(&c.field)) {
                state.restore(&call.field);
                let message = "remediation task aborted".to_string();
                effects.push(Effect::RemediationFailed {
                    field: call.field.clone(),
                    message: message.clone(),
                });
                failures.push(FieldFailure {
                    flag_id: call.flag_id.clone(),
                    field: call.field.clone(),
                    message,
                });
            }

            state.end_fix_all();
            effects.extend(state.commit());
            FixAllReport {
                resolved,
                failures,
                skipped,
                score: state.score(),
                certified: state.is_certified(),
                effects,
            }
        };

        tracing::info!(
            resolved = report.resolved.len(),
            failed = report.failures.len(),
            score = report.score,
            "fix-all finished"
        );
        self.emit(&report.effects);
        Ok(report)
    }
}

fn remediated_effects(applied: Option<&FieldResult>) -> Vec<Effect> {
    let Some(applied) = applied else {
        return Vec::new();
    };
    let mut effects = vec![Effect::FieldRemediated {
        field: applied.field.clone(),
        at: applied.remediated_at,
    }];
    if applied.status == AuditStatus::Pass {
        effects.push(Effect::remediation_announcement(&applied.field));
    }
    effects
}

fn failed_effect(field: &FieldKey, err: &BackendError) -> Effect {
    let message = match err {
        BackendError::Transport { detail, .. } => detail.clone(),
        other => other.to_string(),
    };
    Effect::RemediationFailed {
        field: field.clone(),
        message,
    }
}
