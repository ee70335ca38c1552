//! HTTP server for inference
//!
//! Provides an OpenAI-compatible REST API.

mod admission;
mod error;
mod handlers;
mod routes;
mod streaming;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{GenerationConfig, ServerConfig};
use crate::engine::Engine;

pub use admission::Admission;
pub use handlers::AppState;
pub use routes::api_routes;
pub use streaming::{create_chat_stream, DONE_SENTINEL};

/// Build the application router
pub fn router(engine: Engine, generation: GenerationConfig, config: &ServerConfig) -> Result<Router> {
    let state = Arc::new(
        AppState::new(engine, generation).context("invalid generation defaults")?,
    );

    let mut app = Router::new()
        .merge(api_routes())
        .layer(DefaultBodyLimit::max(config.max_body_size));

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }
    if config.request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    Ok(app.with_state(state))
}

/// Start the HTTP inference server
pub async fn start(engine: Engine, generation: GenerationConfig, config: ServerConfig) -> Result<()> {
    let app = router(engine, generation, &config)?;

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  GET  /v1/models - List models");
    tracing::info!("  POST /v1/chat/completions - Chat completion");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
