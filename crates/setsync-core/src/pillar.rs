//! # Pillars and Audit Statuses
//!
//! The seven contract pillars a campaign setup is audited against, and the
//! three-valued status every pillar, field and flag carries.
//!
//! [`PillarKey`] is the single source of truth for the pillar set. Its
//! declaration order is the display order used by reports and graph layouts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A contract pillar.
///
/// Serialized in PascalCase (`"Audience"`, `"Budget"`, ...), matching the
/// keys of an audit report's `pillars` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PillarKey {
    /// Geographic, demographic and contextual targeting.
    Audience,
    /// Total spend against the contract cap.
    Budget,
    /// Flight dates.
    Timeframe,
    /// Placement and delivery goal.
    Optimization,
    /// Creative format and compliance standard.
    Creative,
    /// Ad copy text.
    Copy,
    /// Legal guardrails: forbidden genres and frequency cap.
    Guardrails,
}

impl PillarKey {
    /// Total number of pillars.
    pub const COUNT: usize = 7;

    /// All pillars in display order.
    pub fn all() -> &'static [PillarKey] {
        &[
            Self::Audience,
            Self::Budget,
            Self::Timeframe,
            Self::Optimization,
            Self::Creative,
            Self::Copy,
            Self::Guardrails,
        ]
    }

    /// The canonical PascalCase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audience => "Audience",
            Self::Budget => "Budget",
            Self::Timeframe => "Timeframe",
            Self::Optimization => "Optimization",
            Self::Creative => "Creative",
            Self::Copy => "Copy",
            Self::Guardrails => "Guardrails",
        }
    }

    /// Human label of the campaign field a pillar checks.
    pub fn field_label(&self) -> &'static str {
        match self {
            Self::Audience => "Geo Targeting",
            Self::Budget => "Total Spend",
            Self::Timeframe => "Start Date",
            Self::Optimization => "Placement",
            Self::Creative => "Format",
            Self::Copy => "Ad Copy",
            Self::Guardrails => "Legal Terms",
        }
    }

    /// The extended graph aspect this pillar renders as, if any.
    ///
    /// Budget and Guardrails have no aspect node and render as plain fields.
    pub fn aspect(&self) -> Option<Aspect> {
        match self {
            Self::Audience => Some(Aspect::Audience),
            Self::Optimization => Some(Aspect::Optimization),
            Self::Creative => Some(Aspect::Creative),
            Self::Copy => Some(Aspect::Copy),
            Self::Timeframe => Some(Aspect::Temporal),
            Self::Budget | Self::Guardrails => None,
        }
    }
}

impl fmt::Display for PillarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PillarKey {
    type Err = ValidationError;

    /// Parses a pillar name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownPillar(s.to_string()))
    }
}

/// An extended-layout aspect node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    /// Audience targeting.
    Audience,
    /// Optimization goal.
    Optimization,
    /// Creative.
    Creative,
    /// Copy.
    Copy,
    /// Flight timing.
    Temporal,
}

impl Aspect {
    /// All aspects in display order.
    pub fn all() -> &'static [Aspect] {
        &[
            Self::Audience,
            Self::Optimization,
            Self::Creative,
            Self::Copy,
            Self::Temporal,
        ]
    }

    /// Lowercase name used in node ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audience => "audience",
            Self::Optimization => "optimization",
            Self::Creative => "creative",
            Self::Copy => "copy",
            Self::Temporal => "temporal",
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of auditing one pillar or field.
///
/// Variants are declared from best to worst so that `Ord` ranks severity:
/// `max()` over a set of statuses yields the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    /// Matches the contract.
    Pass,
    /// Needs attention; blocks certification but not counted as a failure.
    Warn,
    /// Violates the contract.
    Fail,
}

impl AuditStatus {
    /// Score contribution in half points: PASS = 2, WARN = 1, FAIL = 0.
    pub fn half_points(&self) -> u64 {
        match self {
            Self::Pass => 2,
            Self::Warn => 1,
            Self::Fail => 0,
        }
    }

    /// Whether this status prevents certification.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Self::Pass)
    }

    /// The canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        }
    }

    /// Worst status of an iterator, or `None` when empty.
    pub fn worst<I: IntoIterator<Item = AuditStatus>>(statuses: I) -> Option<AuditStatus> {
        statuses.into_iter().max()
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pillars_listed_once_in_display_order() {
        let all = PillarKey::all();
        assert_eq!(all.len(), PillarKey::COUNT);
        let mut sorted = all.to_vec();
        sorted.sort();
        assert_eq!(sorted, all.to_vec());
        assert_eq!(all.first(), Some(&PillarKey::Audience));
        assert_eq!(all.last(), Some(&PillarKey::Guardrails));
    }

    #[test]
    fn pillar_parse_is_case_insensitive() {
        assert_eq!("budget".parse::<PillarKey>(), Ok(PillarKey::Budget));
        assert_eq!(" COPY ".parse::<PillarKey>(), Ok(PillarKey::Copy));
        assert!(matches!(
            "Genres".parse::<PillarKey>(),
            Err(ValidationError::UnknownPillar(_))
        ));
    }

    #[test]
    fn pillar_serializes_pascal_case() {
        let json = serde_json::to_string(&PillarKey::Optimization).unwrap();
        assert_eq!(json, "\"Optimization\"");
    }

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(serde_json::to_string(&AuditStatus::Warn).unwrap(), "\"WARN\"");
        let parsed: AuditStatus = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(parsed, AuditStatus::Fail);
        assert!(serde_json::from_str::<AuditStatus>("\"MAYBE\"").is_err());
    }

    #[test]
    fn worst_status_ranks_fail_over_warn() {
        let worst = AuditStatus::worst([AuditStatus::Pass, AuditStatus::Fail, AuditStatus::Warn]);
        assert_eq!(worst, Some(AuditStatus::Fail));
        assert_eq!(AuditStatus::worst(std::iter::empty()), None);
    }

    #[test]
    fn budget_and_guardrails_have_no_aspect() {
        assert_eq!(PillarKey::Budget.aspect(), None);
        assert_eq!(PillarKey::Guardrails.aspect(), None);
        assert_eq!(PillarKey::Timeframe.aspect(), Some(Aspect::Temporal));
        let covered: Vec<Aspect> = PillarKey::all().iter().filter_map(|p| p.aspect()).collect();
        assert_eq!(covered.len(), Aspect::all().len());
    }
}
