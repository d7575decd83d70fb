//! # Workload Secrets Store
//!
//! Concurrent-safe bidirectional index between workloads and the Vault secret
//! references they use.
//!
//! The store owns the primary `workload -> references` map. The inverse
//! `reference -> workloads` map is derived on every read and never cached.
//!
//! ## Concurrency
//!
//! A single `RwLock` guards the whole index:
//! - `store` and `delete` take the write lock
//! - `workload_secrets` and `secret_workloads` take the read lock and return
//!   owned copies, so no reference into the live map ever escapes
//! - `secret_workloads` holds the read lock for the whole inversion
//!
//! Concurrent `store` calls for the same workload are last-writer-wins: the
//! entry holds whatever the most recently completed call wrote. There is no
//! merge and no version check.
//!
//! Extraction happens outside the lock; only the final map operation is
//! performed while holding it.

use crate::workload::Workload;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Primary index: workload -> sorted, deduplicated secret references
pub type WorkloadSecretsMap = HashMap<Workload, Vec<String>>;

/// Derived index: secret reference -> workloads using it
pub type SecretWorkloadsMap = HashMap<String, Vec<Workload>>;

/// In-memory workload-secrets index
///
/// Process-lifetime state owned by the controller and shared via `Arc`.
/// Nothing is persisted; the index is rebuilt as watchers re-collect workloads.
#[derive(Debug, Default)]
pub struct WorkloadSecrets {
    inner: RwLock<WorkloadSecretsMap>,
}

impl WorkloadSecrets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Each write is a single map operation, so a panicking holder cannot leave
    // the map half-updated and the poisoned guard is safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, WorkloadSecretsMap> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkloadSecretsMap> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the full reference set of `workload`
    ///
    /// Any previous entry is overwritten, never merged.
    pub fn store(&self, workload: Workload, secrets: Vec<String>) {
        self.write().insert(workload, secrets);
    }

    /// Remove `workload` from the index. No-op if it is not tracked.
    pub fn delete(&self, workload: &Workload) {
        self.write().remove(workload);
    }

    /// Remove every workload for which `keep` returns false
    ///
    /// Runs under a single write lock. Returns the removed workloads, sorted.
    pub fn retain(&self, mut keep: impl FnMut(&Workload) -> bool) -> Vec<Workload> {
        let mut removed = Vec::new();
        self.write().retain(|workload, _| {
            let kept = keep(workload);
            if !kept {
                removed.push(workload.clone());
            }
            kept
        });
        removed.sort();
        removed
    }

    /// Snapshot of the primary index
    #[must_use]
    pub fn workload_secrets(&self) -> WorkloadSecretsMap {
        self.read().clone()
    }

    /// Compute the inverse index: secret reference -> workloads
    ///
    /// Each workload list is sorted and holds every workload exactly once.
    /// Cost is linear in the total number of references.
    #[must_use]
    pub fn secret_workloads(&self) -> SecretWorkloadsMap {
        let index = self.read();
        let mut secret_workloads = SecretWorkloadsMap::new();
        for (workload, secrets) in index.iter() {
            for secret in secrets {
                secret_workloads
                    .entry(secret.clone())
                    .or_default()
                    .push(workload.clone());
            }
        }
        drop(index);

        for workloads in secret_workloads.values_mut() {
            workloads.sort();
            workloads.dedup();
        }
        secret_workloads
    }

    /// References currently stored for `workload`, if tracked
    #[must_use]
    pub fn references_for(&self, workload: &Workload) -> Option<Vec<String>> {
        self.read().get(workload).cloned()
    }

    /// Workloads that reference `secret`, sorted
    #[must_use]
    pub fn workloads_for(&self, secret: &str) -> Vec<Workload> {
        let mut workloads: Vec<Workload> = self
            .read()
            .iter()
            .filter(|(_, secrets)| secrets.iter().any(|s| s == secret))
            .map(|(workload, _)| workload.clone())
            .collect();
        workloads.sort();
        workloads
    }

    /// Number of tracked workloads
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_store_overwrites_previous_entry() {
        let store = WorkloadSecrets::new();
        let web = Workload::new("web", "default", "Deployment");

        store.store(web.clone(), refs(&["a", "b"]));
        store.store(web.clone(), refs(&["c"]));

        assert_eq!(store.references_for(&web), Some(refs(&["c"])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = WorkloadSecrets::new();
        let web = Workload::new("web", "default", "Deployment");

        store.delete(&web);
        store.store(web.clone(), refs(&["a"]));
        store.delete(&web);
        store.delete(&web);

        assert!(store.is_empty());
        assert!(store.secret_workloads().is_empty());
    }

    #[test]
    fn test_retain_returns_removed_workloads() {
        let store = WorkloadSecrets::new();
        let web = Workload::new("web", "default", "Deployment");
        let api = Workload::new("api", "default", "Deployment");
        let db = Workload::new("db", "default", "StatefulSet");
        store.store(web.clone(), refs(&["a"]));
        store.store(api.clone(), refs(&["a"]));
        store.store(db.clone(), refs(&["b"]));

        let removed = store.retain(|workload| workload.kind() != "Deployment");

        assert_eq!(removed, vec![api, web]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.secret_workloads()["b"], vec![db]);
        assert!(!store.secret_workloads().contains_key("a"));
    }

    #[test]
    fn test_snapshot_is_detached_from_store() {
        let store = WorkloadSecrets::new();
        let web = Workload::new("web", "default", "Deployment");
        store.store(web.clone(), refs(&["a"]));

        let mut snapshot = store.workload_secrets();
        snapshot.clear();
        store.store(Workload::new("db", "default", "StatefulSet"), refs(&["b"]));

        assert!(snapshot.is_empty());
        assert_eq!(store.workload_secrets().get(&web), Some(&refs(&["a"])));
    }

    #[test]
    fn test_secret_workloads_inverts_index() {
        let store = WorkloadSecrets::new();
        let web = Workload::new("web", "default", "Deployment");
        let db = Workload::new("db", "default", "StatefulSet");
        store.store(web.clone(), refs(&["shared", "web-only"]));
        store.store(db.clone(), refs(&["db-only", "shared"]));

        let inverse = store.secret_workloads();

        assert_eq!(inverse.len(), 3);
        assert_eq!(inverse["shared"], vec![web.clone(), db.clone()]);
        assert_eq!(inverse["web-only"], vec![web.clone()]);
        assert_eq!(inverse["db-only"], vec![db.clone()]);
        assert_eq!(store.workloads_for("shared"), vec![web, db]);
        assert!(store.workloads_for("missing").is_empty());
    }
}
