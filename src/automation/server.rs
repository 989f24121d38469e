use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::board_client::BoardClient;
use super::monday::MondayClient;
use crate::config::AutomationConfig;

/// Build the full application router: webhook, admin API, request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the automation server and run until Ctrl+C.
pub async fn start_server(config: AutomationConfig) -> Result<()> {
    config.token().context("Cannot start server")?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let client: Arc<dyn BoardClient> =
        Arc::new(MondayClient::from_config(&config).context("Failed to build API client")?);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let board = config.monday.board_id.clone();
    let state = Arc::new(AppState::new(config, client));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, board = ?board, "Board automator listening");
    println!("Board automator running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
