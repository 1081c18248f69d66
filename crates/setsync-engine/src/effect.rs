//! Side-effect descriptors.
//!
//! The engine never renders, alerts or speaks. Every user-visible
//! consequence of a mutation is described by an [`Effect`], returned from
//! the operation and broadcast to subscribers, in the order it happened.

use chrono::{DateTime, Utc};
use serde::Serialize;

use setsync_core::FieldKey;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Text for a polite screen-reader live region.
    Announce { message: String },
    ScoreChanged { from: u8, to: u8 },
    FieldRemediated { field: FieldKey, at: DateTime<Utc> },
    /// A remediation failed; state was left as it was before the request.
    RemediationFailed { field: FieldKey, message: String },
    /// The session just reached a score of 100.
    Certified,
    /// The initial load fell back to seeded data.
    Degraded { reason: String },
}

impl Effect {
    pub(crate) fn score_announcement(score: u8) -> Self {
        Self::Announce {
            message: format!("Compliance score updated to {score} percent"),
        }
    }

    pub(crate) fn remediation_announcement(field: &FieldKey) -> Self {
        Self::Announce {
            message: format!(
                "{field} field has been remediated and now matches contract specifications"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Effect::ScoreChanged { from: 50, to: 75 }).unwrap();
        assert_eq!(json["type"], "score_changed");
        assert_eq!(json["to"], 75);
    }

    #[test]
    fn announcements_read_naturally() {
        let field = FieldKey::new("Budget").unwrap();
        assert_eq!(
            Effect::remediation_announcement(&field),
            Effect::Announce {
                message: "Budget field has been remediated and now matches contract specifications"
                    .into()
            }
        );
    }
}
