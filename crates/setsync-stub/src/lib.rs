//! # setsync-stub — In-Memory Audit API
//!
//! A self-contained implementation of the audit API the engine talks to.
//! Campaigns are audited against contract terms by [`rules`], kept in a
//! [`StubState`] and exposed over the same routes as the production
//! backend. Used for local runs of the CLI and by the integration tests.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! `/health` is mounted outside the auth middleware.

pub mod auth;
pub mod error;
pub mod routes;
pub mod rules;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use error::StubError;
pub use state::{StubConfig, StubState};

/// Assemble the router with all routes and middleware.
pub fn app(state: StubState) -> Router {
    let auth_config = state.config.auth.clone();

    let api = routes::router()
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state);

    let health = Router::new().route("/health", axum::routing::get(health));

    Router::new().merge(health).merge(api)
}

async fn health() -> &'static str {
    "ok"
}

/// Serve `state` on an already-bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: StubState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("audit stub listening on {addr}");
    }
    axum::serve(listener, app(state)).await
}
