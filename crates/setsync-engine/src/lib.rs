//! # setsync-engine — Compliance Audit & Remediation State Engine
//!
//! The engine owns one session's audit state: the contract, every audited
//! field, the open flags and strategic gaps, and the derived compliance
//! score. It is mutated only through the operations exposed here:
//!
//! - **Loading**: [`ComplianceEngine::load_dashboard`] and
//!   [`ComplianceEngine::run_audit`] populate the store once. Transport
//!   failures degrade to a seeded fallback dataset with a visible
//!   degraded-mode reason instead of failing.
//! - **Remediation**: [`ComplianceEngine::remediate_one`] and
//!   [`ComplianceEngine::fix_all`] apply optimistic updates, call the
//!   backend, and reconcile. A field has at most one request in flight.
//! - **Sync**: [`SyncScheduler`] re-fetches flags and score on a fixed
//!   interval; pending fields are never overwritten by a poll.
//! - **Publishing**: [`ComplianceEngine::publish`] is gated on a score of
//!   exactly 100.
//!
//! ## Concurrency
//!
//! The store sits behind a `parking_lot::RwLock` that is never held across
//! an `.await`. Every backend call is bounded by a timeout. Side effects
//! are returned as [`Effect`] descriptors and broadcast to subscribers.
//!
//! ## Backend seam
//!
//! [`AuditBackend`] abstracts the audit API. [`HttpBackend`] implements it
//! over `setsync-client`; tests substitute scripted in-memory backends.

pub mod backend;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod publish;
pub mod remediation;
pub mod state;
pub mod sync;

pub use backend::{AuditBackend, BackendMode, HttpBackend, RemediationCall, RemediationOutcome};
pub use config::EngineConfig;
pub use effect::Effect;
pub use engine::{ComplianceEngine, LoadOutcome};
pub use error::{BackendError, EngineError, PartialRemediationFailure};
pub use publish::PublishGate;
pub use remediation::{FieldFailure, FieldResult, FixAllReport};
pub use setsync_client::PublishReceipt;
pub use state::{AuditSnapshot, FieldView};
pub use sync::{PollOutcome, SyncHandle, SyncScheduler};
