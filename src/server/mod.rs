//! HTTP transport for the recognizer.
//!
//! - `POST /api/recognize` - multipart form with an `image` field
//! - `GET /health` - liveness and cached gallery size

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use anyhow::{Context, Result};

use crate::config::ServerConfig;

pub use error::ApiError;
pub use handlers::{HealthResponse, RecognizeResponse};
pub use routes::create_router;
pub use state::AppState;

/// Bind and serve until Ctrl+C.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let app = create_router(state, config.max_upload_mb * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
