//! HTTP surface over the publisher, generators and task store.
use axum::Router;
use log::*;
use tower_http::cors::CorsLayer;

use crate::Result;

/// Routes, handlers and request types.
pub mod api;

pub use api::{AppState, SharedState};

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Answer cross-origin requests from any origin.
    pub cors: bool,
}

pub fn build_router(state: SharedState, cors: bool) -> Router {
    let mut app = api::api_router().with_state(state);

    if cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

/// Serve the API until ctrl-c.
pub async fn start_server(
    config: ServerConfig,
    state: SharedState,
) -> Result<()> {
    let app = build_router(state, config.cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to install ctrl-c handler: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
