//! # Contract Rules
//!
//! Audits a campaign setup against contract terms, one check per pillar.
//! Any issue fails the pillar. Audience targeting outside the contracted
//! geographies is a severance.
//!
//! The score starts at 100 and loses 25 per failing pillar, floored at 0.

use std::collections::BTreeMap;

use setsync_core::{AuditReport, AuditStatus, Campaign, ContractTerms, PillarKey, PillarReport};

/// Points lost per failing pillar.
pub const FAIL_PENALTY: u8 = 25;

/// Audit `campaign` against `terms`.
pub fn audit(terms: &ContractTerms, campaign: &Campaign) -> AuditReport {
    let pillars: BTreeMap<PillarKey, PillarReport> = PillarKey::all()
        .iter()
        .map(|&pillar| (pillar, check(pillar, terms, campaign)))
        .collect();

    let fails = pillars
        .values()
        .filter(|r| r.status == AuditStatus::Fail)
        .count();
    let penalty = u8::try_from(fails)
        .unwrap_or(u8::MAX)
        .saturating_mul(FAIL_PENALTY);
    let is_certified = pillars.values().all(|r| r.status == AuditStatus::Pass);

    AuditReport {
        pillars,
        is_certified,
        score: Some(100u8.saturating_sub(penalty)),
    }
}

fn check(pillar: PillarKey, terms: &ContractTerms, campaign: &Campaign) -> PillarReport {
    let mut issues = Vec::new();
    let mut has_severance = false;

    match pillar {
        PillarKey::Audience => {
            let outside: Vec<&str> = campaign
                .audience
                .geo_targeting
                .iter()
                .filter(|geo| !contains_ignore_case(&terms.allowed_geos, geo))
                .map(String::as_str)
                .collect();
            if !outside.is_empty() {
                has_severance = true;
                issues.push(format!(
                    "Targets {} outside contracted geographies ({})",
                    outside.join(", "),
                    terms.allowed_geos.join(", ")
                ));
            }
            for segment in &campaign.audience.demographic {
                if !contains_ignore_case(&terms.demographic, segment) {
                    issues.push(format!("Demographic segment {segment} is not contracted"));
                }
            }
        }
        PillarKey::Budget => {
            let total = campaign.total_spend();
            if total > terms.total_budget_limit {
                issues.push(format!(
                    "Total spend {total} exceeds contract limit {}",
                    terms.total_budget_limit
                ));
            }
        }
        PillarKey::Timeframe => {
            let t = &campaign.timeframe;
            if t.start_date > t.end_date {
                issues.push(format!("Flight starts {} after it ends {}", t.start_date, t.end_date));
            } else if t.start_date < terms.flight_start || t.end_date > terms.flight_end {
                issues.push(format!(
                    "Flight {} to {} is outside the contracted window {} to {}",
                    t.start_date, t.end_date, terms.flight_start, terms.flight_end
                ));
            }
        }
        PillarKey::Optimization => {
            let placement = &campaign.optimization.placement;
            if !placement.eq_ignore_ascii_case(&terms.placement_type) {
                issues.push(format!(
                    "Placement '{placement}' does not match contracted '{}'",
                    terms.placement_type
                ));
            }
        }
        PillarKey::Creative => {
            let standard = &campaign.creative.compliance_standard;
            if !standard.eq_ignore_ascii_case(&terms.compliance_standard) {
                issues.push(format!(
                    "Creative standard '{standard}' does not match contracted '{}'",
                    terms.compliance_standard
                ));
            }
        }
        PillarKey::Copy => {
            let copy = campaign.copy.ad_copy_text.to_lowercase();
            for term in &terms.forbidden_copy_terms {
                if copy.contains(&term.to_lowercase()) {
                    issues.push(format!("Forbidden term in copy: {term}"));
                }
            }
        }
        PillarKey::Guardrails => {
            let context = format!(
                "{} {}",
                campaign.copy.ad_copy_text, campaign.audience.contextual
            )
            .to_lowercase();
            for genre in &terms.forbidden_genres {
                if context.contains(&genre.to_lowercase()) {
                    issues.push(format!("Associated with forbidden genre: {genre}"));
                }
            }
            let cap = &campaign.optimization.frequency_cap;
            if !cap.eq_ignore_ascii_case(&terms.frequency_cap) {
                issues.push(format!(
                    "Frequency cap '{cap}' does not match contracted '{}'",
                    terms.frequency_cap
                ));
            }
        }
    }

    let status = if issues.is_empty() {
        AuditStatus::Pass
    } else {
        AuditStatus::Fail
    };
    PillarReport {
        status,
        issues,
        value: Some(campaign.setup_value(pillar)),
        expected: Some(terms.expected_value(pillar)),
        has_severance,
    }
}

fn contains_ignore_case(list: &[String], needle: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(needle))
}
