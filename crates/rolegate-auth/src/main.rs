//! Rolegate auth service — grants a Discord role through an OAuth2 login.
//!
//! Two endpoints implement the flow:
//!
//! 1. `GET /login?role=&guild=` screens the role and links to Discord's
//!    authorization page, carrying `role:guild` in the OAuth2 `state`.
//! 2. `GET /callback?code=&state=` exchanges the code, identifies the user,
//!    checks they already belong to the guild and grants the role with the
//!    bot token.
//!
//! Nothing is stored between the two requests; the `state` parameter carries
//! everything the callback needs.

mod callback;
mod config;
mod discord;
mod error;
mod ids;
mod login;
mod pages;
mod permissions;
mod query;
mod state_token;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use clap::Parser;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::discord::DiscordClient;

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all Axum handlers.
pub(crate) struct AppState {
    /// Service configuration, fixed at startup.
    pub config: AppConfig,
    /// Discord REST client (pooled connections).
    pub discord: DiscordClient,
}

impl AppState {
    /// Build the shared state from a validated configuration.
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        let discord = DiscordClient::new(&config)?;
        Ok(Self { config, discord })
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Build the router: `/login`, `/callback`, and a plain-text 404 for the rest.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", get(login::handle_login))
        .route("/callback", get(callback::handle_callback))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Discord role gate.
#[derive(Parser, Debug)]
#[command(name = "rolegate-auth", about = "Grant a Discord role through OAuth2 login")]
struct Args {
    /// Port to listen on (overrides LISTEN_PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Structured logging (controlled via RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env().inspect_err(|e| {
        error!(error = %e, "invalid configuration");
    })?;
    if let Some(port) = args.port {
        config.listen_port = port;
    }

    info!(
        client_id = %config.client_id,
        redirect_uri = %config.redirect_uri,
        api_base = %config.api_base,
        verify_role_permissions = config.verify_role_permissions,
        "configuration loaded"
    );

    let listen_port = config.listen_port;
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let addr = format!("0.0.0.0:{listen_port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "role gate listening");
    axum::serve(listener, app).await?;
    Ok(())
}
