//! # setsync CLI entry point
//!
//! Parses command-line arguments, builds the session and dispatches to the
//! subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use setsync_cli::audit::{run_audit, AuditArgs};
use setsync_cli::graph::{run_graph, GraphArgs};
use setsync_cli::publish::{run_publish, PublishArgs};
use setsync_cli::remediate::{run_fix_all, run_remediate, FixAllArgs, RemediateArgs};
use setsync_cli::session::{Session, SessionArgs};
use setsync_cli::watch::{run_watch, WatchArgs};
use setsync_engine::EngineConfig;

/// SetSync: audit campaign setups against their contracts and fix what
/// fails.
#[derive(Parser, Debug)]
#[command(name = "setsync", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the session and print the audit summary.
    Audit(AuditArgs),

    /// Fix the field behind one open flag.
    Remediate(RemediateArgs),

    /// Fix every failing field concurrently.
    FixAll(FixAllArgs),

    /// Print the audit graph as JSON.
    Graph(GraphArgs),

    /// Poll for flag and score changes.
    Watch(WatchArgs),

    /// Publish a certified campaign.
    Publish(PublishArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = EngineConfig::default();
    if let Commands::Graph(args) = &cli.command {
        config = config.with_layout(args.layout.into(), args.extended);
    }
    if let Commands::Watch(args) = &cli.command {
        config = config.with_poll_interval(std::time::Duration::from_secs(args.interval.max(1)));
    }

    let session = match Session::connect(&cli.session, config) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            return ExitCode::from(setsync_cli::EXIT_ERROR);
        }
    };

    let result = match &cli.command {
        Commands::Audit(args) => run_audit(args, &session).await,
        Commands::Remediate(args) => run_remediate(args, &session).await,
        Commands::FixAll(args) => run_fix_all(args, &session).await,
        Commands::Graph(args) => run_graph(args, &session).await,
        Commands::Watch(args) => run_watch(args, &session).await,
        Commands::Publish(args) => run_publish(args, &session).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(setsync_cli::EXIT_ERROR)
        }
    }
}
