//! # Workload
//!
//! Identity of a workload whose pod template (or Secret) is scanned for Vault
//! secret references. Used as the key of the workload-secrets index.

use kube::Resource;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkloadError {
    #[error("{kind} object has no metadata.name")]
    MissingName { kind: String },
    #[error("{kind} {name} has no metadata.namespace")]
    MissingNamespace { kind: String, name: String },
}

/// Immutable workload identity
///
/// Two identities refer to the same workload iff kind, namespace and name all
/// match exactly. Ordering is by kind, then namespace, then name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Workload {
    kind: String,
    namespace: String,
    name: String,
}

impl Workload {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the identity of a namespaced Kubernetes object
    ///
    /// The kind comes from the object's static type (e.g. `Deployment`), not
    /// from `TypeMeta`, which watch events do not always populate.
    ///
    /// # Errors
    ///
    /// Returns an error if the object has no name or no namespace.
    pub fn from_resource<K>(obj: &K) -> Result<Self, WorkloadError>
    where
        K: Resource<DynamicType = ()>,
    {
        let kind = K::kind(&()).into_owned();
        let Some(name) = obj.meta().name.clone() else {
            return Err(WorkloadError::MissingName { kind });
        };
        let Some(namespace) = obj.meta().namespace.clone() else {
            return Err(WorkloadError::MissingNamespace { kind, name });
        };
        Ok(Self {
            kind,
            namespace,
            name,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::HashSet;

    fn deployment(name: Option<&str>, namespace: Option<&str>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: name.map(str::to_string),
                namespace: namespace.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_equality_requires_all_fields() {
        let a = Workload::new("app", "default", "Deployment");
        assert_eq!(a, Workload::new("app", "default", "Deployment"));
        assert_ne!(a, Workload::new("app", "default", "StatefulSet"));
        assert_ne!(a, Workload::new("app", "other", "Deployment"));
        assert_ne!(a, Workload::new("app2", "default", "Deployment"));
    }

    #[test]
    fn test_hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(Workload::new("app", "default", "Deployment"));
        set.insert(Workload::new("app", "default", "Deployment"));
        set.insert(Workload::new("app", "default", "DaemonSet"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_from_resource_uses_static_kind() {
        let workload = Workload::from_resource(&deployment(Some("web"), Some("prod"))).unwrap();
        assert_eq!(workload, Workload::new("web", "prod", "Deployment"));

        let sts = StatefulSet {
            metadata: ObjectMeta {
                name: Some("db".to_string()),
                namespace: Some("prod".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(Workload::from_resource(&sts).unwrap().kind(), "StatefulSet");
    }

    #[test]
    fn test_from_resource_missing_metadata() {
        assert_eq!(
            Workload::from_resource(&deployment(None, Some("prod"))),
            Err(WorkloadError::MissingName {
                kind: "Deployment".to_string()
            })
        );
        assert_eq!(
            Workload::from_resource(&deployment(Some("web"), None)),
            Err(WorkloadError::MissingNamespace {
                kind: "Deployment".to_string(),
                name: "web".to_string()
            })
        );
    }

    #[test]
    fn test_display() {
        let workload = Workload::new("web", "prod", "Deployment");
        assert_eq!(workload.to_string(), "Deployment prod/web");
    }
}
