//! # Remediate and Fix-All Subcommands
//!
//! `remediate <FIELD>` fixes the field behind one open flag. `fix-all`
//! fixes every failing field concurrently and can publish the campaign
//! when the batch leaves it certified.

use anyhow::{bail, Result};
use clap::Args;

use setsync_core::{AuditStatus, Flag};

use crate::session::Session;
use crate::{engine_error, publish, EXIT_NOT_CERTIFIED, EXIT_OK, EXIT_PARTIAL_FAILURE};

#[derive(Args, Debug)]
pub struct RemediateArgs {
    /// Field or pillar to fix, e.g. `Budget`.
    pub field: String,
}

#[derive(Args, Debug)]
pub struct FixAllArgs {
    /// Publish the campaign if the batch certifies it.
    #[arg(long)]
    pub publish: bool,
}

/// The open flag raised against `field`, matched case-insensitively.
pub fn find_open_flag<'a>(flags: &'a [Flag], field: &str) -> Option<&'a Flag> {
    let field = field.trim();
    flags
        .iter()
        .filter(|f| f.status != AuditStatus::Pass)
        .find(|f| f.field.as_str().eq_ignore_ascii_case(field))
}

pub async fn run_remediate(args: &RemediateArgs, session: &Session) -> Result<u8> {
    session.load().await?;
    let flags = session.engine.flags();
    let Some(flag) = find_open_flag(&flags, &args.field) else {
        bail!("no open flag for {}", args.field);
    };

    let result = session
        .engine
        .remediate_one(&flag.id)
        .await
        .map_err(engine_error)?;
    session.output.field_result(&result);
    if !session.output.is_json() {
        println!("Compliance score: {}%", session.engine.compliance_score());
    }
    Ok(EXIT_OK)
}

pub async fn run_fix_all(args: &FixAllArgs, session: &Session) -> Result<u8> {
    session.load().await?;
    let report = session.engine.fix_all().await.map_err(engine_error)?;
    session.output.effects(&report.effects);
    session.output.fix_all(&report);

    if let Some(failure) = report.partial_failure() {
        tracing::warn!(%failure, "batch remediation incomplete");
        return Ok(EXIT_PARTIAL_FAILURE);
    }
    if args.publish {
        return publish::publish_loaded(session).await;
    }
    Ok(if report.certified { EXIT_OK } else { EXIT_NOT_CERTIFIED })
}
