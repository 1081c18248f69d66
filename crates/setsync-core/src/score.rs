//! # Compliance Score
//!
//! `score = round(100 * (pass + 0.5 * warn) / total)`, computed in integer
//! half points so rounding is exact: `(200p + 100w + N) / 2N` rounds the
//! quotient half-up. An empty status set scores 0.

use serde::{Deserialize, Serialize};

use crate::pillar::AuditStatus;

/// Counts of each status in a set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally {
    /// PASS count.
    pub pass: usize,
    /// WARN count.
    pub warn: usize,
    /// FAIL count.
    pub fail: usize,
}

impl StatusTally {
    /// Total number of statuses counted.
    pub fn total(&self) -> usize {
        self.pass + self.warn + self.fail
    }

    /// The formula score for this tally.
    pub fn score(&self) -> u8 {
        let n = self.total() as u64;
        if n == 0 {
            return 0;
        }
        let half_points = 2 * self.pass as u64 + self.warn as u64;
        let rounded = (100 * half_points + n) / (2 * n);
        u8::try_from(rounded).unwrap_or(100)
    }
}

/// The pure score formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceScorer;

impl ComplianceScorer {
    /// Count statuses.
    pub fn tally<I: IntoIterator<Item = AuditStatus>>(statuses: I) -> StatusTally {
        statuses
            .into_iter()
            .fold(StatusTally::default(), |mut tally, status| {
                match status {
                    AuditStatus::Pass => tally.pass += 1,
                    AuditStatus::Warn => tally.warn += 1,
                    AuditStatus::Fail => tally.fail += 1,
                }
                tally
            })
    }

    /// Score a status set.
    pub fn score<I: IntoIterator<Item = AuditStatus>>(statuses: I) -> u8 {
        Self::tally(statuses).score()
    }
}

/// Clamp a base score into the band its certification state allows.
///
/// A clean state (non-empty, every field clear, no open gaps) is exactly 100;
/// anything else is at most 99. This keeps `score == 100` equivalent to
/// certification whatever an authoritative backend score says.
pub fn certification_band(base: u8, clean: bool) -> u8 {
    if clean {
        100
    } else {
        base.min(99)
    }
}
