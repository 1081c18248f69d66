//! # setsync-cli — SetSync Command-Line Interface
//!
//! Drives one audit session of the compliance engine against a live or
//! stub audit API.
//!
//! ## Subcommands
//!
//! - `audit`: load the session and print the audit summary
//! - `remediate`: fix one flagged field
//! - `fix-all`: fix every failing field concurrently, optionally publish
//! - `graph`: emit the audit graph as JSON
//! - `watch`: poll for flag and score changes and print effects
//! - `publish`: push a certified campaign live
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | error |
//! | 2 | campaign not certified |
//! | 3 | some remediations in a batch failed |
//!
//! ## Crate Policy
//!
//! - Argument parsing lives with each subcommand; handlers delegate to the
//!   engine and only format its results.
//! - Every handler loads the session itself; nothing persists between runs.

pub mod audit;
pub mod graph;
pub mod input;
pub mod output;
pub mod publish;
pub mod remediate;
pub mod session;
pub mod watch;

pub const EXIT_OK: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_NOT_CERTIFIED: u8 = 2;
pub const EXIT_PARTIAL_FAILURE: u8 = 3;

/// An engine error as the user should see it.
pub(crate) fn engine_error(err: setsync_engine::EngineError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}
