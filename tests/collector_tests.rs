//! # Collector Tests
//!
//! End-to-end tests from Kubernetes objects to the workload-secrets index.

use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use secrets_reloader::constants::VAULT_ENV_FROM_PATH_ANNOTATION;
use secrets_reloader::{Collector, Workload, WorkloadSecrets};
use std::collections::BTreeMap;
use std::sync::Arc;

fn collector() -> Collector {
    Collector::new(Arc::new(WorkloadSecrets::new()))
}

fn container(values: &[&str]) -> Container {
    Container {
        name: "app".to_string(),
        env: Some(
            values
                .iter()
                .map(|value| EnvVar {
                    name: "SECRET".to_string(),
                    value: Some((*value).to_string()),
                    ..Default::default()
                })
                .collect(),
        ),
        ..Default::default()
    }
}

fn template(
    containers: Vec<Container>,
    init_containers: Vec<Container>,
    annotation: Option<&str>,
) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            annotations: annotation.map(|value| {
                BTreeMap::from([(
                    VAULT_ENV_FROM_PATH_ANNOTATION.to_string(),
                    value.to_string(),
                )])
            }),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers,
            init_containers: Some(init_containers),
            ..Default::default()
        }),
    }
}

fn secret(keys: &[&str]) -> Secret {
    Secret {
        data: Some(
            keys.iter()
                .map(|key| ((*key).to_string(), ByteString(b"value".to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

#[test]
fn test_init_container_env_is_collected() {
    let collector = collector();
    let workload = Workload::new("app", "default", "Deployment");
    let template = template(vec![], vec![container(&["vault:db/creds/app#pw"])], None);

    let stored = collector.collect_from_pod_template(&workload, &template);

    assert_eq!(stored, vec!["db/creds/app".to_string()]);
    assert_eq!(
        collector.store().workload_secrets()[&workload],
        vec!["db/creds/app".to_string()]
    );
}

#[test]
fn test_pod_template_env_and_annotation_union() {
    let collector = collector();
    let workload = Workload::new("app", "default", "StatefulSet");
    let template = template(
        vec![container(&[
            "vault:secret/data/foo#password",
            "vault:secret/data/pinned#password#2",
            "plain",
        ])],
        vec![container(&[">>vault:secret/data/foo#username"])],
        Some("secret/data/bar,secret/data/foo,secret/data/baz#1"),
    );

    collector.collect_from_pod_template(&workload, &template);

    assert_eq!(
        collector.store().references_for(&workload),
        Some(vec![
            "secret/data/bar".to_string(),
            "secret/data/foo".to_string()
        ])
    );
}

#[test]
fn test_secret_keys_are_stored_sorted() {
    let collector = collector();
    let workload = Workload::new("creds", "default", "Secret");

    let stored = collector.collect_from_secret(&workload, &secret(&["user", "pass"]));

    assert_eq!(stored, vec!["pass".to_string(), "user".to_string()]);
    assert_eq!(
        collector.store().workload_secrets()[&workload],
        vec!["pass".to_string(), "user".to_string()]
    );
}

#[test]
fn test_empty_extraction_keeps_previous_entry() {
    let collector = collector();
    let workload = Workload::new("app", "default", "Deployment");
    collector.collect_from_pod_template(
        &workload,
        &template(vec![container(&["vault:secret/data/foo#key"])], vec![], None),
    );

    // Only pinned references left: nothing to track, but nothing is cleared
    let stored = collector.collect_from_pod_template(
        &workload,
        &template(vec![container(&["vault:secret/data/foo#key#3"])], vec![], None),
    );
    assert!(stored.is_empty());
    assert_eq!(
        collector.store().references_for(&workload),
        Some(vec!["secret/data/foo".to_string()])
    );

    let stored = collector.collect_from_secret(&workload, &Secret::default());
    assert!(stored.is_empty());
    assert_eq!(
        collector.store().references_for(&workload),
        Some(vec!["secret/data/foo".to_string()])
    );
}

#[test]
fn test_empty_extraction_for_new_workload_stores_nothing() {
    let collector = collector();
    let workload = Workload::new("app", "default", "Deployment");

    collector.collect_from_pod_template(&workload, &PodTemplateSpec::default());

    assert!(collector.store().is_empty());
}

#[test]
fn test_recollection_replaces_references() {
    let collector = collector();
    let workload = Workload::new("app", "default", "Deployment");
    collector.collect_from_pod_template(
        &workload,
        &template(vec![container(&["vault:secret/data/old#key"])], vec![], None),
    );
    collector.collect_from_pod_template(
        &workload,
        &template(vec![container(&["vault:secret/data/new#key"])], vec![], None),
    );

    let inverse = collector.store().secret_workloads();
    assert!(!inverse.contains_key("secret/data/old"));
    assert_eq!(inverse["secret/data/new"], vec![workload]);
}

#[test]
fn test_affected_workloads_for_shared_secret() {
    let collector = collector();
    let web = Workload::new("web", "prod", "Deployment");
    let worker = Workload::new("worker", "prod", "DaemonSet");
    let shared = template(vec![container(&["vault:secret/data/shared#key"])], vec![], None);

    collector.collect_from_pod_template(&web, &shared);
    collector.collect_from_pod_template(&worker, &shared);

    assert_eq!(
        collector.store().workloads_for("secret/data/shared"),
        vec![worker, web]
    );
}
