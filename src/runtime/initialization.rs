//! # Initialization
//!
//! Reloader initialization: configuration, tracing, rustls, metrics, HTTP
//! server startup and Kubernetes client setup.

use crate::config::ReloaderConfig;
use crate::observability;
use crate::server::{start_server, ServerState};
use crate::store::WorkloadSecrets;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the watch loop needs to run
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Configuration loaded from the environment
    pub config: ReloaderConfig,
    /// Shared workload-secrets index
    pub store: Arc<WorkloadSecrets>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("config", &self.config)
            .field("tracked_workloads", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// Initialize the reloader runtime
///
/// # Errors
///
/// Returns an error if tracing or metrics cannot be set up, or if no
/// Kubernetes client configuration is available.
pub async fn initialize() -> Result<InitializationResult> {
    let config = ReloaderConfig::from_env();
    observability::logging::init_tracing(&config)?;

    // Required for rustls 0.23+ before the kube client opens a connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting Secrets Reloader");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let store = Arc::new(WorkloadSecrets::new());
    let server_state = Arc::new(ServerState::new(Arc::clone(&store)));

    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    match &config.watch_namespace {
        Some(namespace) => info!("Watching workloads in namespace '{}'", namespace),
        None => info!("Watching workloads in all namespaces"),
    }

    Ok(InitializationResult {
        client,
        config,
        store,
        server_state,
    })
}
