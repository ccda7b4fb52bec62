use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use signal_pipeline::SignalStore;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
    database: DatabaseHealth,
    pipeline: PipelineHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct PipelineHealth {
    state: String,
    running: bool,
    producers: Vec<String>,
}

const STORE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check endpoint
///
/// 200 when the store answers a count within five seconds, 503 otherwise.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = probe_store(&state).await;
    let healthy = database.error.is_none();

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: Utc::now(),
        database,
        pipeline: PipelineHealth {
            state: state.orchestrator.state().to_string(),
            running: state.orchestrator.is_running(),
            producers: state.orchestrator.producer_names(),
        },
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

async fn probe_store(state: &AppState) -> DatabaseHealth {
    let error = match tokio::time::timeout(STORE_PROBE_TIMEOUT, state.repository.count_signals())
        .await
    {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(format!("Query failed: {}", e)),
        Err(_) => Some("Query timeout (>5s)".to_string()),
    };
    if let Some(error) = &error {
        tracing::warn!(error = %error, "Health probe failed");
    }

    DatabaseHealth {
        status: if error.is_none() { "ok" } else { "error" }.to_string(),
        error,
    }
}

/// API metadata
pub async fn api_root_handler() -> Json<Value> {
    Json(json!({
        "name": "SignalForge API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
