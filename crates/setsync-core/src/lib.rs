#![deny(missing_docs)]

//! # setsync-core — Domain Types for the Compliance Audit Engine
//!
//! This crate defines the vocabulary every other SetSync crate speaks. It
//! performs no I/O and owns no runtime: only `serde`, `serde_json`,
//! `thiserror` and `chrono` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Single [`PillarKey`] enum.** The seven contract pillars are defined
//!    once, in display order, with exhaustive `match` everywhere.
//!
//! 2. **Validated newtypes at the boundary.** [`FieldKey`], [`FlagId`] and
//!    [`ContractId`] reject empty identifiers on construction and on
//!    deserialization.
//!
//! 3. **Pure scoring.** [`ComplianceScorer`] is a deterministic function of
//!    the status multiset; the certification band that ties the score to
//!    the gap set lives next to it.
//!
//! 4. **Explicit remediation lifecycle.** [`RemediationPhase`] encodes
//!    `CLEAN -> PENDING -> CLEAN`; a second `begin` while pending is a
//!    [`TransitionError`], never a silent overwrite.

pub mod audit;
pub mod campaign;
pub mod contract;
pub mod error;
pub mod gap;
pub mod identity;
pub mod pillar;
pub mod remediation;
pub mod score;
pub mod seed;

pub use audit::{AuditField, AuditReport, DashboardSnapshot, FieldRow, Flag, PillarReport};
pub use campaign::{
    documented_fix, merge_patch, AudienceSetup, BudgetSetup, Campaign, CopySetup, CreativeSetup,
    OptimizationSetup, TimeframeSetup,
};
pub use contract::{Contract, ContractModel, ContractTerms};
pub use error::{CoreError, TransitionError, ValidationError};
pub use gap::{GapKind, StrategicGap, StrategicGapAnalyzer};
pub use identity::{ContractId, FieldKey, FlagId};
pub use pillar::{Aspect, AuditStatus, PillarKey};
pub use remediation::{RemediationPhase, RemediationRequest, RemediationTarget};
pub use score::{certification_band, ComplianceScorer, StatusTally};
pub use seed::fallback_dashboard;
