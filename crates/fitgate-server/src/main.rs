//! fitgate - HTTP facade for a Garmin Connect account.
//!
//! Serves the account's daily stats, heart rate, activities, hydration, sleep,
//! stress and body composition as JSON. Sessions are resumed from the token
//! store on first use, or created with `POST /login`.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fitgate_core::{Config, ConnectClient, SessionManager};
use fitgate_server::{cors::setup_cors, router};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        token_store = %config.token_store.display(),
        domain = %config.provider_domain,
        "fitgate starting"
    );

    let client = ConnectClient::new(&config).context("Failed to create provider client")?;
    let manager = Arc::new(SessionManager::new(client, config.token_store.clone()));

    let app = router(manager)
        .layer(setup_cors(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
