//! # Metrics
//!
//! Prometheus metrics for monitoring the reloader.
//!
//! ## Metrics Exposed
//!
//! - `secrets_reloader_collections_total{kind}` - Collections that stored secret references
//! - `secrets_reloader_empty_collections_total{kind}` - Collections that found no secret references
//! - `secrets_reloader_workloads_deleted_total` - Workloads removed from the index
//! - `secrets_reloader_tracked_workloads` - Current number of tracked workloads
//! - `secrets_reloader_tracked_secret_references` - Current number of distinct secret references
//! - `secrets_reloader_watch_errors_total{kind}` - Watch stream errors by watched kind

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static COLLECTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secrets_reloader_collections_total",
            "Total number of collections that stored secret references, by workload kind",
        ),
        &["kind"],
    )
    .expect("Failed to create COLLECTIONS_TOTAL metric - this should never happen")
});

static EMPTY_COLLECTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secrets_reloader_empty_collections_total",
            "Total number of collections that found no secret references, by workload kind",
        ),
        &["kind"],
    )
    .expect("Failed to create EMPTY_COLLECTIONS_TOTAL metric - this should never happen")
});

static WORKLOADS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secrets_reloader_workloads_deleted_total",
        "Total number of workloads removed from the index",
    )
    .expect("Failed to create WORKLOADS_DELETED_TOTAL metric - this should never happen")
});

static TRACKED_WORKLOADS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "secrets_reloader_tracked_workloads",
        "Current number of workloads with tracked secret references",
    )
    .expect("Failed to create TRACKED_WORKLOADS metric - this should never happen")
});

static TRACKED_SECRET_REFERENCES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "secrets_reloader_tracked_secret_references",
        "Current number of distinct secret references across all workloads",
    )
    .expect("Failed to create TRACKED_SECRET_REFERENCES metric - this should never happen")
});

static WATCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secrets_reloader_watch_errors_total",
            "Total number of watch stream errors, by watched kind",
        ),
        &["kind"],
    )
    .expect("Failed to create WATCH_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails if a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(COLLECTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EMPTY_COLLECTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKLOADS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRACKED_WORKLOADS.clone()))?;
    REGISTRY.register(Box::new(TRACKED_SECRET_REFERENCES.clone()))?;
    REGISTRY.register(Box::new(WATCH_ERRORS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_collections(kind: &str) {
    COLLECTIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_empty_collections(kind: &str) {
    EMPTY_COLLECTIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_workloads_deleted() {
    WORKLOADS_DELETED_TOTAL.inc();
}

/// Set the tracked workload and secret reference gauges
pub fn set_tracked(workloads: usize, secret_references: usize) {
    TRACKED_WORKLOADS.set(i64::try_from(workloads).unwrap_or(i64::MAX));
    TRACKED_SECRET_REFERENCES.set(i64::try_from(secret_references).unwrap_or(i64::MAX));
}

pub fn increment_watch_errors(kind: &str) {
    WATCH_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}
