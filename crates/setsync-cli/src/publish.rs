//! # Publish Subcommand
//!
//! Pushes the campaign live. The engine refuses below a score of 100; that
//! refusal exits 2 rather than 1.

use anyhow::Result;
use clap::Args;

use setsync_engine::EngineError;

use crate::session::Session;
use crate::{engine_error, EXIT_NOT_CERTIFIED, EXIT_OK};

#[derive(Args, Debug)]
pub struct PublishArgs {}

pub async fn run_publish(_args: &PublishArgs, session: &Session) -> Result<u8> {
    session.load().await?;
    publish_loaded(session).await
}

/// Publish an already loaded session.
pub(crate) async fn publish_loaded(session: &Session) -> Result<u8> {
    match session.engine.publish().await {
        Ok(receipt) => {
            session.output.result(&receipt, || receipt.display_message().to_string());
            Ok(EXIT_OK)
        }
        Err(EngineError::CertificationRequired { score }) => {
            eprintln!("Campaign cannot be published at a compliance score of {score}%; 100% is required.");
            Ok(EXIT_NOT_CERTIFIED)
        }
        Err(e) => Err(engine_error(e)),
    }
}
