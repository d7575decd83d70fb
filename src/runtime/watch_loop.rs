//! # Watch Loop
//!
//! Watches Deployments, StatefulSets, DaemonSets and (optionally) Secrets and
//! feeds every change into the [`Collector`].
//!
//! Only objects annotated with `reload-on-secret-change: "true"` are
//! collected. An object without the annotation is removed from the index, so
//! dropping the annotation stops tracking. Deleted objects are removed too.
//!
//! A watcher that loses its place re-lists instead of replaying deletes. The
//! [`RelistTracker`] records what each re-list returns and prunes tracked
//! workloads of that kind that are gone. Readiness is reported once every
//! watcher has finished its first list.

use crate::collector::Collector;
use crate::constants::RELOAD_ON_SECRET_CHANGE_ANNOTATION;
use crate::observability::metrics;
use crate::runtime::initialization::InitializationResult;
use crate::workload::Workload;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{PodTemplateSpec, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Api, Client, Resource};
use kube_runtime::watcher::{self, Event};
use kube_runtime::WatchStreamExt;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A watched object kind whose secret references can be collected
pub trait Collectable:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static
{
    /// Collect and store this object's secret references
    fn collect(&self, collector: &Collector, workload: &Workload) -> Vec<String>;
}

fn collect_template(
    collector: &Collector,
    workload: &Workload,
    template: Option<&PodTemplateSpec>,
) -> Vec<String> {
    template.map_or_else(Vec::new, |template| {
        collector.collect_from_pod_template(workload, template)
    })
}

impl Collectable for Deployment {
    fn collect(&self, collector: &Collector, workload: &Workload) -> Vec<String> {
        collect_template(collector, workload, self.spec.as_ref().map(|s| &s.template))
    }
}

impl Collectable for StatefulSet {
    fn collect(&self, collector: &Collector, workload: &Workload) -> Vec<String> {
        collect_template(collector, workload, self.spec.as_ref().map(|s| &s.template))
    }
}

impl Collectable for DaemonSet {
    fn collect(&self, collector: &Collector, workload: &Workload) -> Vec<String> {
        collect_template(collector, workload, self.spec.as_ref().map(|s| &s.template))
    }
}

impl Collectable for Secret {
    fn collect(&self, collector: &Collector, workload: &Workload) -> Vec<String> {
        collector.collect_from_secret(workload, self)
    }
}

/// Whether an object opted into reload tracking
#[must_use]
pub fn reload_enabled(metadata: &ObjectMeta) -> bool {
    metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(RELOAD_ON_SECRET_CHANGE_ANNOTATION))
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

/// Workload kinds always watched; `Secret` is added when enabled
const WORKLOAD_KINDS: usize = 3;

/// Re-list bookkeeping for one watched kind
///
/// Workloads seen between `Init` and `InitDone` form the live set. When the
/// list completes, tracked workloads of this kind (within the watched
/// namespace) that are not in it are removed from the index.
#[derive(Debug)]
pub struct RelistTracker {
    kind: String,
    namespace: Option<String>,
    seen: Option<HashSet<Workload>>,
}

impl RelistTracker {
    #[must_use]
    pub fn new<K: Resource<DynamicType = ()>>(namespace: Option<&str>) -> Self {
        Self {
            kind: K::kind(&()).into_owned(),
            namespace: namespace.map(str::to_string),
            seen: None,
        }
    }

    fn begin(&mut self) {
        self.seen = Some(HashSet::new());
    }

    fn record(&mut self, workload: Workload) {
        if let Some(seen) = self.seen.as_mut() {
            seen.insert(workload);
        }
    }

    fn in_scope(&self, workload: &Workload) -> bool {
        workload.kind() == self.kind
            && self
                .namespace
                .as_deref()
                .is_none_or(|namespace| workload.namespace() == namespace)
    }

    /// Prune workloads missing from the completed list
    fn finish(&mut self, collector: &Collector) -> Vec<Workload> {
        let Some(seen) = self.seen.take() else {
            return Vec::new();
        };
        let removed = collector
            .store()
            .retain(|workload| !self.in_scope(workload) || seen.contains(workload));
        for workload in &removed {
            debug!(workload = %workload, "Workload missing from re-list, untracking");
            metrics::increment_workloads_deleted();
        }
        if !removed.is_empty() {
            info!(kind = %self.kind, "Pruned {} workloads after re-list", removed.len());
        }
        removed
    }
}

/// Apply one watch event to the index
pub fn handle_event<K: Collectable>(
    collector: &Collector,
    relist: &mut RelistTracker,
    event: Event<K>,
) {
    match event {
        Event::Apply(obj) => {
            apply_object(collector, &obj);
        }
        Event::InitApply(obj) => {
            if let Some(workload) = apply_object(collector, &obj) {
                relist.record(workload);
            }
        }
        Event::Delete(obj) => delete_object(collector, &obj),
        Event::Init => relist.begin(),
        Event::InitDone => {
            relist.finish(collector);
        }
    }
}

fn apply_object<K: Collectable>(collector: &Collector, obj: &K) -> Option<Workload> {
    let workload = match Workload::from_resource(obj) {
        Ok(workload) => workload,
        Err(e) => {
            warn!("Skipping object: {}", e);
            return None;
        }
    };

    if reload_enabled(obj.meta()) {
        obj.collect(collector, &workload);
    } else if collector.store().references_for(&workload).is_some() {
        debug!(workload = %workload, "Reload annotation removed, untracking workload");
        collector.store().delete(&workload);
        metrics::increment_workloads_deleted();
    }
    Some(workload)
}

fn delete_object<K: Collectable>(collector: &Collector, obj: &K) {
    match Workload::from_resource(obj) {
        Ok(workload) => {
            debug!(workload = %workload, "Workload deleted, untracking");
            collector.store().delete(&workload);
            metrics::increment_workloads_deleted();
        }
        Err(e) => warn!("Skipping deleted object: {}", e),
    }
}

/// Flips readiness once every watcher has finished its first list
#[derive(Debug, Clone)]
pub struct InitialSync {
    pending: Arc<AtomicUsize>,
    is_ready: Arc<AtomicBool>,
}

impl InitialSync {
    #[must_use]
    pub fn new(watchers: usize, is_ready: Arc<AtomicBool>) -> Self {
        Self {
            pending: Arc::new(AtomicUsize::new(watchers)),
            is_ready,
        }
    }

    /// Called once per watcher after its first `InitDone`
    pub fn mark_synced(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.is_ready.store(true, Ordering::Relaxed);
            info!("All watchers completed their initial list, ready");
        }
    }
}

/// How a watch stream error is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorAction {
    /// Keep the stream; the watcher's backoff retries
    Retry,
    /// Drop the stream and start a fresh watcher after the restart delay
    Restart,
}

/// Classify a watch stream error from its debug representation
///
/// Authentication and authorization failures restart the watcher, since RBAC
/// changes need time to propagate. Everything else, including 410 Gone which
/// the watcher answers with a re-list, stays on the backoff stream.
#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorAction {
    let is_401 = error.contains("401") || error.contains("Unauthorized");
    let is_403 = error.contains("403") || error.contains("Forbidden");
    if is_401 || is_403 {
        WatchErrorAction::Restart
    } else {
        WatchErrorAction::Retry
    }
}

fn api_for<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

/// Watch one kind forever, restarting the stream on auth failures
pub async fn watch_kind<K: Collectable>(
    api: Api<K>,
    collector: Collector,
    namespace: Option<String>,
    restart_delay: Duration,
    initial_sync: InitialSync,
) {
    let kind = K::kind(&()).into_owned();
    let mut relist = RelistTracker::new::<K>(namespace.as_deref());
    let mut synced = false;
    loop {
        info!("Starting {} watch", kind);
        let mut stream = watcher::watcher(api.clone(), watcher::Config::default())
            .default_backoff()
            .boxed();

        while let Some(result) = stream.next().await {
            match result {
                Ok(event) => {
                    let list_done = matches!(event, Event::InitDone);
                    handle_event(&collector, &mut relist, event);
                    if list_done && !synced {
                        synced = true;
                        initial_sync.mark_synced();
                    }
                }
                Err(e) => {
                    warn!(kind = %kind, "Watch stream error: {}", e);
                    metrics::increment_watch_errors(&kind);
                    if classify_watch_error(&format!("{e:?}")) == WatchErrorAction::Restart {
                        break;
                    }
                }
            }
        }

        warn!(
            "{} watch stream stopped, restarting in {}s",
            kind,
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
}

/// Run all watchers until a shutdown signal is received
///
/// # Errors
///
/// Returns an error if the shutdown signal handler cannot be installed.
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        client,
        config,
        store,
        server_state,
    } = init;

    let collector = Collector::new(store);
    let namespace = config.watch_namespace.as_deref();
    let restart_delay = config.watch_restart_delay_duration();
    let initial_sync = InitialSync::new(
        WORKLOAD_KINDS + usize::from(config.watch_secrets),
        Arc::clone(&server_state.is_ready),
    );
    let owned_namespace = || namespace.map(str::to_string);

    let mut watchers = vec![
        tokio::spawn(watch_kind(
            api_for::<Deployment>(client.clone(), namespace),
            collector.clone(),
            owned_namespace(),
            restart_delay,
            initial_sync.clone(),
        )),
        tokio::spawn(watch_kind(
            api_for::<StatefulSet>(client.clone(), namespace),
            collector.clone(),
            owned_namespace(),
            restart_delay,
            initial_sync.clone(),
        )),
        tokio::spawn(watch_kind(
            api_for::<DaemonSet>(client.clone(), namespace),
            collector.clone(),
            owned_namespace(),
            restart_delay,
            initial_sync.clone(),
        )),
    ];
    if config.watch_secrets {
        watchers.push(tokio::spawn(watch_kind(
            api_for::<Secret>(client, namespace),
            collector,
            owned_namespace(),
            restart_delay,
            initial_sync,
        )));
    }

    info!(
        "Watchers started ({} kinds), ready after initial list",
        watchers.len()
    );

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, stopping watchers");
    server_state.is_ready.store(false, Ordering::Relaxed);

    for handle in &watchers {
        handle.abort();
    }
    Ok(())
}
