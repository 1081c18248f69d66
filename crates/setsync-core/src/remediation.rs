//! # Remediation Lifecycle
//!
//! Per-target state machine:
//!
//! ```text
//! CLEAN --begin--> PENDING --resolve--> CLEAN
//! ```
//!
//! Whether the request resolved the field or left it unchanged is decided by
//! the caller; the phase only tracks exclusivity. `PENDING -> PENDING` is
//! rejected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::identity::FieldKey;

/// What a remediation request targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationTarget {
    /// One field.
    Field(FieldKey),
    /// Every failing field at once.
    All,
}

impl fmt::Display for RemediationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(key) => write!(f, "{key}"),
            Self::All => f.write_str("ALL"),
        }
    }
}

/// An issued remediation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationRequest {
    /// Target of the request.
    pub target: RemediationTarget,
    /// When it was issued.
    pub issued_at: DateTime<Utc>,
}

impl RemediationRequest {
    /// A request issued now.
    pub fn now(target: RemediationTarget) -> Self {
        Self {
            target,
            issued_at: Utc::now(),
        }
    }
}

/// Exclusivity phase of one remediation target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RemediationPhase {
    /// Nothing in flight.
    #[default]
    Clean,
    /// A request is in flight.
    Pending(RemediationRequest),
}

impl RemediationPhase {
    /// Whether a request is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The in-flight request, if any.
    pub fn request(&self) -> Option<&RemediationRequest> {
        match self {
            Self::Pending(request) => Some(request),
            Self::Clean => None,
        }
    }

    /// `CLEAN -> PENDING`.
    pub fn begin(&mut self, request: RemediationRequest) -> Result<(), TransitionError> {
        if let Self::Pending(current) = self {
            return Err(TransitionError::AlreadyPending {
                target: current.target.to_string(),
                since: current.issued_at.to_rfc3339(),
            });
        }
        *self = Self::Pending(request);
        Ok(())
    }

    /// `PENDING -> CLEAN`, returning the request that was in flight.
    pub fn resolve(&mut self) -> Result<RemediationRequest, TransitionError> {
        match std::mem::take(self) {
            Self::Pending(request) => Ok(request),
            Self::Clean => Err(TransitionError::NotPending),
        }
    }
}
