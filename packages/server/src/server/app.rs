//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::Method,
    routing::{get, post},
    Router,
};
use signal_pipeline::{Orchestrator, Repository};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    api_root_handler, collect_handler, delete_job_handler, get_job_handler, get_signal_handler,
    health_handler, job_stats_handler, list_jobs_handler, list_signals_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub orchestrator: Arc<Orchestrator>,
    /// Score counted as "high" in the stats summary
    pub alert_threshold: u8,
    /// Cancels background runs started over HTTP on shutdown
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn from_deps(deps: &ServerDeps, shutdown: CancellationToken) -> Self {
        Self {
            repository: deps.repository.clone(),
            orchestrator: deps.orchestrator.clone(),
            alert_threshold: deps.config.alert_threshold,
            shutdown,
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - the API is read-mostly and unauthenticated
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api", get(api_root_handler))
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/jobs/stats/summary", get(job_stats_handler))
        .route("/api/jobs/collect", post(collect_handler))
        .route(
            "/api/jobs/:id",
            get(get_job_handler).delete(delete_job_handler),
        )
        .route("/api/signals", get(list_signals_handler))
        .route("/api/signals/:id", get(get_signal_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!("API listening on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    Ok(())
}
