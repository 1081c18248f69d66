//! # setsync-stub — Binary Entry Point
//!
//! Starts the in-memory audit API with the seed campaign already audited.
//! Binds to `SETSYNC_STUB_PORT` (default 8000). When `SETSYNC_STUB_TOKEN`
//! is set every request must carry it as a bearer token.

use setsync_stub::auth::AuthConfig;
use setsync_stub::{StubConfig, StubState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("SETSYNC_STUB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let token = std::env::var("SETSYNC_STUB_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());
    if token.is_none() {
        tracing::warn!("SETSYNC_STUB_TOKEN not set; requests are not authenticated");
    }

    let config = StubConfig {
        port,
        auth: AuthConfig { token },
    };
    let state = StubState::seeded(config)?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    setsync_stub::serve(listener, state).await?;

    Ok(())
}
