//! HTTP ingress for the queue

pub mod routes;
pub mod state;

use axum::{http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Queue HTTP server plus its background coordinator loop
pub struct QueueServer {
    config: QueueConfig,
    state: AppState,
}

impl QueueServer {
    /// Create a new queue server
    pub fn new(config: QueueConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    /// Serve HTTP and process jobs until Ctrl+C
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let coordinator = self.state.coordinator().clone();
        let worker = tokio::spawn(async move { coordinator.run(shutdown_rx).await });

        let router = build_router(self.state.clone(), self.config.server.enable_cors);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        tracing::info!("Queue server listening on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Shutting down coordinator...");
        let _ = shutdown_tx.send(true);
        if let Err(e) = worker.await {
            tracing::warn!("Coordinator task ended abnormally: {}", e);
        }

        self.state.store().close()
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness))
        .merge(routes::api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
