//! Text and JSON rendering of engine results.
//!
//! Results go to stdout. Effects and notices go to stderr so that JSON
//! output stays machine-readable.

use serde::Serialize;

use setsync_core::AuditStatus;
use setsync_engine::{AuditSnapshot, Effect, FieldResult, FixAllReport};

#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print `value` as pretty JSON in JSON mode, otherwise `text`.
    pub fn result<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(s) => println!("{s}"),
                Err(e) => tracing::error!("failed to serialize result: {e}"),
            }
        } else {
            println!("{}", text());
        }
    }

    pub fn effects(&self, effects: &[Effect]) {
        for effect in effects {
            if let Some(line) = render_effect(effect) {
                eprintln!("{line}");
            }
        }
    }

    pub fn snapshot(&self, snapshot: &AuditSnapshot) {
        self.result(snapshot, || render_snapshot(snapshot));
    }

    pub fn fix_all(&self, report: &FixAllReport) {
        self.result(report, || render_fix_all(report));
    }

    pub fn field_result(&self, result: &FieldResult) {
        self.result(result, || {
            format!("{}: {} ({})", result.field, result.status, value_text(result.value.as_ref()))
        });
    }
}

/// One stderr line per user-visible effect.
pub fn render_effect(effect: &Effect) -> Option<String> {
    match effect {
        Effect::Announce { message } => Some(message.clone()),
        Effect::RemediationFailed { field, message } => {
            Some(format!("remediation of {field} failed: {message}"))
        }
        Effect::Certified => Some("Campaign certified: ready to publish".to_string()),
        Effect::Degraded { reason } => {
            Some(format!("Audit API unreachable, showing offline data ({reason})"))
        }
        Effect::ScoreChanged { .. } | Effect::FieldRemediated { .. } => None,
    }
}

pub fn render_snapshot(snapshot: &AuditSnapshot) -> String {
    let mut out = String::new();
    if let Some(contract) = &snapshot.contract {
        out.push_str(&format!("Contract {} / {}\n", contract.id, contract.campaign_name));
    }
    if let Some(reason) = &snapshot.degraded {
        out.push_str(&format!("OFFLINE DATA: {reason}\n"));
    }
    for view in &snapshot.fields {
        let field = &view.field;
        let mut line = format!("  {:<5} {:<14}", field.status.as_str(), field.key.as_str());
        if field.has_severance {
            line.push_str(" [severance]");
        }
        if view.pending {
            line.push_str(" [remediating]");
        }
        if field.status != AuditStatus::Pass {
            line.push_str(&format!(" {}", field.message()));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    for gap in &snapshot.gaps {
        out.push_str(&format!("  gap: {}\n", gap.message));
    }
    out.push_str(&format!(
        "Compliance score: {}%{}",
        snapshot.score,
        if snapshot.certified { " (certified)" } else { "" }
    ));
    out
}

pub fn render_fix_all(report: &FixAllReport) -> String {
    let mut out = String::new();
    for result in &report.resolved {
        out.push_str(&format!("  fixed  {} ({})\n", result.field, result.status));
    }
    for failure in &report.failures {
        out.push_str(&format!("  failed {}: {}\n", failure.field, failure.message));
    }
    for field in &report.skipped {
        out.push_str(&format!("  skipped {field} (already remediating)\n"));
    }
    out.push_str(&format!(
        "{} of {} remediations succeeded. Compliance score: {}%",
        report.resolved.len(),
        report.attempted(),
        report.score
    ));
    out
}

fn value_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "no value".to_string(),
    }
}
