//! # Audit Subcommand
//!
//! Loads the session and prints the audit summary. Exits 2 when the
//! campaign is not certified so the command can gate a pipeline.

use anyhow::Result;
use clap::Args;

use crate::session::Session;
use crate::{EXIT_NOT_CERTIFIED, EXIT_OK};

#[derive(Args, Debug)]
pub struct AuditArgs {}

pub async fn run_audit(_args: &AuditArgs, session: &Session) -> Result<u8> {
    session.load().await?;
    let snapshot = session.engine.snapshot();
    session.output.snapshot(&snapshot);

    let violations = snapshot.invariant_violations();
    for violation in &violations {
        tracing::error!(%violation, "audit state is inconsistent");
    }
    Ok(if snapshot.certified { EXIT_OK } else { EXIT_NOT_CERTIFIED })
}
