//! # Collector
//!
//! Glue between the watch layer and the workload-secrets store. Extracts
//! secret references from a pod template or a Secret and stores them for the
//! workload.
//!
//! An extraction that finds nothing never writes: it does not clear an entry
//! stored by an earlier collection. Removing a workload is done explicitly via
//! [`WorkloadSecrets::delete`].

pub mod extract;

use crate::observability::metrics;
use crate::store::WorkloadSecrets;
use crate::workload::Workload;
use k8s_openapi::api::core::v1::{PodTemplateSpec, Secret};
use std::sync::Arc;
use tracing::{debug, info};

/// Collect all secret references used by a pod template
///
/// Scans env values of regular and init containers plus the
/// `vault-env-from-path` annotation, and returns the sorted union.
#[must_use]
pub fn collect_secrets(template: &PodTemplateSpec) -> Vec<String> {
    let containers = template.spec.iter().flat_map(|spec| {
        spec.containers
            .iter()
            .chain(spec.init_containers.iter().flatten())
    });
    let mut paths = extract::secrets_from_container_env(containers);

    let annotations = template
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.annotations.as_ref());
    paths.extend(extract::secrets_from_annotations(annotations));

    extract::sort_dedup(paths)
}

/// Writes extraction results into a shared [`WorkloadSecrets`] store
#[derive(Debug, Clone)]
pub struct Collector {
    store: Arc<WorkloadSecrets>,
}

impl Collector {
    #[must_use]
    pub fn new(store: Arc<WorkloadSecrets>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<WorkloadSecrets> {
        &self.store
    }

    /// Collect secret references from a workload's pod template
    ///
    /// Returns the stored references, or an empty list if nothing was found
    /// (in which case the store is left untouched).
    pub fn collect_from_pod_template(
        &self,
        workload: &Workload,
        template: &PodTemplateSpec,
    ) -> Vec<String> {
        let paths = collect_secrets(template);
        self.store_secrets(workload, paths, "container env vars")
    }

    /// Collect secret references from the keys of a Secret object
    ///
    /// Returns the stored references, or an empty list if nothing was found
    /// (in which case the store is left untouched).
    pub fn collect_from_secret(&self, workload: &Workload, secret: &Secret) -> Vec<String> {
        let paths = extract::secrets_from_secret(secret);
        self.store_secrets(workload, paths, "Secret")
    }

    fn store_secrets(&self, workload: &Workload, paths: Vec<String>, source: &str) -> Vec<String> {
        if paths.is_empty() {
            debug!(
                worker = "collector",
                workload = %workload,
                "No Vault secret paths found in {}",
                source
            );
            metrics::increment_empty_collections(workload.kind());
            return paths;
        }
        debug!(worker = "collector", paths = ?paths, "Vault secret paths found");

        self.store.store(workload.clone(), paths.clone());
        metrics::increment_collections(workload.kind());
        info!(
            worker = "collector",
            kind = workload.kind(),
            namespace = workload.namespace(),
            name = workload.name(),
            "Collected secrets from {}",
            workload
        );
        paths
    }
}
