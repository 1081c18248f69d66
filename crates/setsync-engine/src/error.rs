//! # Engine Errors
//!
//! [`BackendError`] is what an [`AuditBackend`](crate::AuditBackend) call
//! can fail with. [`EngineError`] is what engine operations surface to
//! callers. Transport details are carried verbatim so the caller can show
//! the server's own message.

use std::fmt;

use thiserror::Error;

use setsync_client::AuditApiError;
use setsync_core::{CoreError, FieldKey, FlagId, TransitionError, ValidationError};
use setsync_graph::GraphError;

use crate::remediation::FieldFailure;

/// Failure of a single backend call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Network failure, timeout, non-2xx status or malformed body.
    #[error("{endpoint}: {detail}")]
    Transport { endpoint: String, detail: String },

    /// The backend has no automated fix for this field.
    #[error("no automated remediation for {0}")]
    NoRemediation(FieldKey),
}

impl From<AuditApiError> for BackendError {
    fn from(err: AuditApiError) -> Self {
        Self::Transport {
            endpoint: err.endpoint().unwrap_or("client").to_string(),
            detail: err.detail(),
        }
    }
}

/// Error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A backend call failed or timed out.
    #[error("{endpoint} failed: {detail}")]
    Transport { endpoint: String, detail: String },

    /// The field already has a remediation request in flight.
    #[error("remediation already in flight for {field}")]
    AlreadyInFlight { field: FieldKey },

    /// A fix-all batch is already running.
    #[error("fix-all already in progress")]
    AlreadyFixing,

    /// Publishing requires a compliance score of exactly 100.
    #[error("certification required: compliance score is {score}, publishing requires 100")]
    CertificationRequired { score: u8 },

    /// Some remediations of a fix-all batch failed.
    #[error(transparent)]
    PartialRemediationFailure(#[from] PartialRemediationFailure),

    #[error("audit data not loaded")]
    NotLoaded,

    #[error("audit data already loaded for contract {0}")]
    AlreadyLoaded(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(FlagId),

    #[error("no automated remediation for {0}")]
    NoRemediation(FieldKey),

    #[error("graph construction failed: {0}")]
    Graph(#[from] GraphError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid remediation transition: {0}")]
    Transition(TransitionError),
}

impl EngineError {
    /// True for the "operation in progress" rejections.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::AlreadyInFlight { .. } | Self::AlreadyFixing)
    }

    /// Text suitable for an alert. Transport errors show the server detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport { endpoint, detail } => Self::Transport { endpoint, detail },
            BackendError::NoRemediation(field) => Self::NoRemediation(field),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotLoaded => Self::NotLoaded,
            CoreError::AlreadyLoaded(id) => Self::AlreadyLoaded(id),
            CoreError::Validation(v) => Self::Validation(v),
            CoreError::Transition(t) => Self::Transition(t),
        }
    }
}

/// A fix-all batch in which at least one remediation failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRemediationFailure {
    pub attempted: usize,
    pub failures: Vec<FieldFailure>,
}

impl fmt::Display for PartialRemediationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} remediations failed",
            self.failures.len(),
            self.attempted
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} ({})", failure.field, failure.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialRemediationFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(s: &str) -> FieldKey {
        FieldKey::new(s).unwrap()
    }

    #[test]
    fn backend_transport_maps_verbatim() {
        let err: EngineError = BackendError::Transport {
            endpoint: "POST /audit/remediate/1".into(),
            detail: "Remediation engine unavailable".into(),
        }
        .into();
        assert_eq!(err.user_message(), "Remediation engine unavailable");
        assert!(!err.is_in_progress());
    }

    #[test]
    fn in_progress_classification() {
        assert!(EngineError::AlreadyFixing.is_in_progress());
        assert!(EngineError::AlreadyInFlight {
            field: field("Budget")
        }
        .is_in_progress());
        assert!(!EngineError::NotLoaded.is_in_progress());
    }

    #[test]
    fn core_not_loaded_maps_to_engine_not_loaded() {
        assert!(matches!(
            EngineError::from(CoreError::NotLoaded),
            EngineError::NotLoaded
        ));
    }

    #[test]
    fn partial_failure_lists_each_field() {
        let failure = PartialRemediationFailure {
            attempted: 3,
            failures: vec![
                FieldFailure {
                    flag_id: FlagId::new("1").unwrap(),
                    field: field("Budget"),
                    message: "timed out after 15s".into(),
                },
                FieldFailure {
                    flag_id: FlagId::new("4").unwrap(),
                    field: field("Copy"),
                    message: "HTTP 500".into(),
                },
            ],
        };
        assert_eq!(
            failure.to_string(),
            "2 of 3 remediations failed: Budget (timed out after 15s); Copy (HTTP 500)"
        );
    }

    #[test]
    fn certification_message_names_score() {
        let err = EngineError::CertificationRequired { score: 75 };
        assert!(err.to_string().contains("75"));
    }
}
