//! # Session setup
//!
//! Global flags shared by every subcommand, and the engine they build.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use setsync_client::config::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use setsync_client::{AuditApiConfig, AuditClient};
use setsync_engine::{BackendMode, ComplianceEngine, EngineConfig, HttpBackend, LoadOutcome};

use crate::input;
use crate::output::Output;

/// Which API flavour to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Contract, field and flag endpoints; per-flag remediation.
    Dashboard,
    /// Full audits and re-audits with documented fixes.
    Audit,
}

impl From<ModeArg> for BackendMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Dashboard => BackendMode::Dashboard,
            ModeArg::Audit => BackendMode::Audit,
        }
    }
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Base URL of the audit API.
    #[arg(long, env = "SETSYNC_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Bearer token for the audit API.
    #[arg(long, env = "SETSYNC_API_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Per-call timeout in seconds (clamped to 10..=30).
    #[arg(long, env = "SETSYNC_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout: u64,

    /// API flavour.
    #[arg(long, value_enum, default_value_t = ModeArg::Dashboard, global = true)]
    pub mode: ModeArg,

    /// Contract id to audit against (audit mode).
    #[arg(long, global = true)]
    pub contract: Option<String>,

    /// Campaign setup YAML (audit mode; defaults to the seed campaign).
    #[arg(long, global = true)]
    pub campaign: Option<PathBuf>,

    /// Contract terms YAML (audit mode; defaults to the seed contract).
    #[arg(long, global = true)]
    pub terms: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
}

/// A connected, not yet loaded, audit session.
pub struct Session {
    pub engine: ComplianceEngine<HttpBackend>,
    pub output: Output,
    args: SessionArgs,
}

impl Session {
    pub fn connect(args: &SessionArgs, config: EngineConfig) -> Result<Self> {
        let api = AuditApiConfig::new(&args.api_url, args.token.as_deref().unwrap_or_default())
            .context("invalid audit API configuration")?
            .with_timeout_secs(args.timeout);
        let client = AuditClient::new(api).context("failed to build audit API client")?;
        let backend = HttpBackend::new(client, args.mode.into());
        let config = config.with_call_timeout_secs(args.timeout);
        tracing::debug!(api_url = %args.api_url, mode = ?args.mode, "session configured");

        Ok(Self {
            engine: ComplianceEngine::new(backend, config),
            output: Output::new(args.json),
            args: args.clone(),
        })
    }

    /// Populate the engine: the dashboard endpoints in dashboard mode, a
    /// full audit of the campaign file in audit mode.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let outcome = match self.args.mode {
            ModeArg::Dashboard => self.engine.load_dashboard().await,
            ModeArg::Audit => {
                let terms = input::load_terms(self.args.terms.as_deref(), self.args.contract.as_deref())?;
                let campaign = input::load_campaign(self.args.campaign.as_deref())?;
                self.engine.run_audit(&terms, &campaign).await
            }
        }
        .map_err(crate::engine_error)?;

        if let Some(reason) = &outcome.degraded {
            tracing::warn!(%reason, "audit API unreachable; showing offline data");
        }
        self.output.effects(&outcome.effects);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SessionArgs {
        SessionArgs {
            api_url: "http://127.0.0.1:9".into(),
            token: Some("t".into()),
            timeout: 15,
            mode: ModeArg::Audit,
            contract: None,
            campaign: None,
            terms: None,
            json: false,
        }
    }

    #[test]
    fn missing_token_rejected() {
        let mut args = args();
        args.token = None;
        assert!(Session::connect(&args, EngineConfig::default()).is_err());
    }

    #[test]
    fn invalid_url_rejected() {
        let mut args = args();
        args.api_url = "not a url".into();
        assert!(Session::connect(&args, EngineConfig::default()).is_err());
    }

    #[test]
    fn mode_maps_to_backend() {
        let session = Session::connect(&args(), EngineConfig::default()).unwrap();
        assert_eq!(session.engine.backend().mode(), BackendMode::Audit);
    }
}
