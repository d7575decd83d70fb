//! Secrets Reloader Library
//!
//! Tracks which Kubernetes workloads reference which Vault secrets, so that a
//! change to a secret can be mapped back to the workloads that must be reloaded.
//!
//! - [`collector::extract`] parses secret references out of container env
//!   values, the `vault-env-from-path` annotation and Secret key names
//! - [`store::WorkloadSecrets`] is the concurrent workload <-> secret index
//! - [`collector::Collector`] writes extraction results into the index
//! - [`runtime`] watches workloads and feeds them into the collector

pub mod collector;
pub mod config;
pub mod constants;
pub mod observability;
pub mod runtime;
pub mod server;
pub mod store;
pub mod workload;

pub use collector::Collector;
pub use store::{SecretWorkloadsMap, WorkloadSecrets, WorkloadSecretsMap};
pub use workload::{Workload, WorkloadError};
