//! # Error Hierarchy
//!
//! Structured error types for the domain layer, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.

use thiserror::Error;

/// Top-level error type for domain operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The contract has not been loaded into the session yet.
    #[error("contract not loaded")]
    NotLoaded,

    /// The contract was already loaded; it is fetched once per session.
    #[error("contract {0} already loaded for this session")]
    AlreadyLoaded(String),

    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Remediation lifecycle violation.
    #[error("remediation transition error: {0}")]
    Transition(#[from] TransitionError),
}

/// Errors from domain primitive construction and payload checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier was empty or whitespace.
    #[error("{kind} must not be empty")]
    EmptyIdentifier {
        /// Which identifier kind was being constructed.
        kind: &'static str,
    },

    /// A string did not name one of the seven pillars.
    #[error("unknown pillar key: {0:?}")]
    UnknownPillar(String),

    /// A score fell outside 0..=100 or was not an integer.
    #[error("score out of range 0..=100: {0}")]
    ScoreOutOfRange(String),

    /// A partial campaign patch could not be applied.
    #[error("invalid campaign patch: {0}")]
    InvalidPatch(String),
}

/// Errors from the per-target remediation state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// `begin` was called while a request for the same target was pending.
    #[error("remediation for {target} already pending since {since}")]
    AlreadyPending {
        /// Display form of the target.
        target: String,
        /// RFC 3339 timestamp of the pending request.
        since: String,
    },

    /// `resolve` was called with nothing pending.
    #[error("no remediation pending")]
    NotPending,
}
