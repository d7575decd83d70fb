//! # HTTP Server
//!
//! HTTP server for metrics, health checks, Kubernetes probes and read-only
//! views of the workload-secrets index.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 once every watcher has listed)
//! - `/workloads` - Tracked workloads and their secret references (JSON)
//! - `/secrets` - Secret references and the workloads using them (JSON)
//!
//! The server runs on port 5000 by default (configurable via `METRICS_PORT` environment variable).

use crate::observability::metrics;
use crate::store::WorkloadSecrets;
use crate::workload::Workload;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
    pub store: Arc<WorkloadSecrets>,
}

impl ServerState {
    #[must_use]
    pub fn new(store: Arc<WorkloadSecrets>) -> Self {
        Self {
            is_ready: Arc::new(AtomicBool::new(false)),
            store,
        }
    }
}

/// One tracked workload in the `/workloads` view
#[derive(Debug, Serialize)]
pub struct WorkloadEntry {
    pub workload: Workload,
    pub secrets: Vec<String>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/workloads", get(workloads_handler))
        .route("/secrets", get(secrets_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until the process exits
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let inverse = state.store.secret_workloads();
    metrics::set_tracked(state.store.len(), inverse.len());

    let encoder = TextEncoder::new();
    let metric_families = metrics::REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn workloads_handler(State(state): State<Arc<ServerState>>) -> Json<Vec<WorkloadEntry>> {
    let mut entries: Vec<WorkloadEntry> = state
        .store
        .workload_secrets()
        .into_iter()
        .map(|(workload, secrets)| WorkloadEntry { workload, secrets })
        .collect();
    entries.sort_by(|a, b| a.workload.cmp(&b.workload));
    Json(entries)
}

async fn secrets_handler(
    State(state): State<Arc<ServerState>>,
) -> Json<BTreeMap<String, Vec<Workload>>> {
    Json(state.store.secret_workloads().into_iter().collect())
}
