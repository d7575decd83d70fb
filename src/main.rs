//! # Secrets Reloader
//!
//! Watches Deployments, StatefulSets, DaemonSets and Secrets annotated with
//! `alpha.vault.security.banzaicloud.io/reload-on-secret-change: "true"` and
//! keeps an in-memory index of the Vault secrets each of them references.
//!
//! The index is exposed over HTTP (`/workloads`, `/secrets`) next to the
//! Prometheus metrics and health probes.

use anyhow::Result;
use secrets_reloader::runtime::{initialization::initialize, watch_loop::run_watch_loop};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init).await?;
    info!("Secrets Reloader stopped");
    Ok(())
}
