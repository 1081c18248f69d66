//! # Watch Subcommand
//!
//! Loads the session, then polls flags and score on an interval and prints
//! every effect as it is broadcast. Stops on Ctrl-C or after `--for`.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio::sync::broadcast::error::RecvError;

use setsync_engine::SyncScheduler;

use crate::output::render_effect;
use crate::session::Session;
use crate::EXIT_OK;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between polls (at least 1).
    #[arg(long, default_value_t = 30)]
    pub interval: u64,

    /// Stop after this many seconds.
    #[arg(long = "for")]
    pub duration: Option<u64>,
}

pub async fn run_watch(args: &WatchArgs, session: &Session) -> Result<u8> {
    session.load().await?;
    session.output.snapshot(&session.engine.snapshot());

    let mut effects = session.engine.subscribe();
    let handle = SyncScheduler::spawn(session.engine.clone());
    tracing::info!(
        interval_secs = session.engine.config().poll_interval.as_secs(),
        "watching for changes"
    );

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            received = effects.recv() => match received {
                Ok(effect) => {
                    if let Some(line) = render_effect(&effect) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "effect stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
        }
    }

    handle.shutdown().await;
    Ok(EXIT_OK)
}
