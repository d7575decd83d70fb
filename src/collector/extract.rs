//! # Secret Reference Extraction
//!
//! Pure functions that parse Vault secret references out of container
//! environment values, pod template annotations and Secret key names.
//!
//! Every function returns a sorted, deduplicated list.
//!
//! ## Environment values
//!
//! ```text
//! [">>"] "vault:" <path> "#" <key> ["#" <version>]
//! ```
//!
//! Only unversioned values (exactly one `#`) are tracked. A value pinned to a
//! version references an immutable snapshot and never needs a reload.
//!
//! ## Annotation entries
//!
//! `vault-env-from-path` entries are bare paths. An entry is tracked only if
//! it contains no `#` at all. This differs from the environment rule on
//! purpose: the two sources use different reference formats.

use crate::constants::{
    SECRET_PATH_SEPARATOR, VAULT_ENV_FROM_PATH_ANNOTATION, VAULT_PREFIX, VAULT_TEMPLATE_PREFIX,
};
use k8s_openapi::api::core::v1::{Container, Secret};
use std::collections::BTreeMap;

/// Whether an environment value is a Vault secret reference
#[must_use]
pub fn has_vault_prefix(value: &str) -> bool {
    value.starts_with(VAULT_PREFIX) || value.starts_with(VAULT_TEMPLATE_PREFIX)
}

/// Whether an environment value has a key but no pinned version (`path#key`)
#[must_use]
pub fn unversioned_secret_value(value: &str) -> bool {
    value.splitn(3, SECRET_PATH_SEPARATOR).count() == 2
}

/// Whether an annotation entry carries no `#` at all
#[must_use]
pub fn unversioned_annotation_secret_value(value: &str) -> bool {
    value.splitn(2, SECRET_PATH_SEPARATOR).count() == 1
}

/// Parse the secret path out of an environment value
///
/// Returns `None` unless the value has a Vault prefix, is unversioned, and has
/// a non-empty path between `vault:` and the first `#`.
///
/// ```
/// use secrets_reloader::collector::extract::parse_env_secret_path;
///
/// assert_eq!(parse_env_secret_path("vault:secret/data/foo#password"), Some("secret/data/foo"));
/// assert_eq!(parse_env_secret_path("vault:secret/data/foo#password#2"), None);
/// ```
#[must_use]
pub fn parse_env_secret_path(value: &str) -> Option<&str> {
    if !has_vault_prefix(value) || !unversioned_secret_value(value) {
        return None;
    }
    let start = value.find(VAULT_PREFIX)? + VAULT_PREFIX.len();
    let rest = &value[start..];
    let end = rest.find(SECRET_PATH_SEPARATOR)?;
    let path = &rest[..end];
    (!path.is_empty()).then_some(path)
}

/// Collect secret paths from the `env` values of the given containers
pub fn secrets_from_container_env<'a, I>(containers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Container>,
{
    let paths = containers
        .into_iter()
        .flat_map(|container| container.env.iter().flatten())
        .filter_map(|env| env.value.as_deref())
        .filter_map(parse_env_secret_path)
        .map(str::to_string)
        .collect();
    sort_dedup(paths)
}

/// Collect secret paths from the `vault-env-from-path` annotation
///
/// A missing or empty annotation yields nothing. Entries are taken verbatim,
/// so an empty entry (e.g. from a trailing comma) is kept as `""`.
#[must_use]
pub fn secrets_from_annotations(annotations: Option<&BTreeMap<String, String>>) -> Vec<String> {
    let Some(value) = annotations
        .and_then(|a| a.get(VAULT_ENV_FROM_PATH_ANNOTATION))
        .filter(|value| !value.is_empty())
    else {
        return Vec::new();
    };
    let paths = value
        .split(',')
        .filter(|entry| unversioned_annotation_secret_value(entry))
        .map(str::to_string)
        .collect();
    sort_dedup(paths)
}

/// Collect secret paths from a Secret's key names
///
/// Keys of `data` are used as-is.
#[must_use]
pub fn secrets_from_secret(secret: &Secret) -> Vec<String> {
    sort_dedup(secret.data.iter().flat_map(BTreeMap::keys).cloned().collect())
}

/// Sort lexicographically and drop duplicates
#[must_use]
pub fn sort_dedup(mut paths: Vec<String>) -> Vec<String> {
    paths.sort();
    paths.dedup();
    paths
}
