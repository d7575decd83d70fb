//! # Constants
//!
//! Shared constants used throughout the reloader.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Annotation holding a comma-separated list of Vault secret paths that the
/// webhook injects as environment variables (`vault-env-from-path`)
pub const VAULT_ENV_FROM_PATH_ANNOTATION: &str = "vault.security.banzaicloud.io/vault-env-from-path";

/// Annotation that opts a workload (or Secret) into reload tracking
pub const RELOAD_ON_SECRET_CHANGE_ANNOTATION: &str =
    "alpha.vault.security.banzaicloud.io/reload-on-secret-change";

/// Environment value prefix marking a Vault secret reference
pub const VAULT_PREFIX: &str = "vault:";

/// Environment value prefix marking a Vault secret reference rendered into a template
pub const VAULT_TEMPLATE_PREFIX: &str = ">>vault:";

/// Separator between secret path, key and optional pinned version
pub const SECRET_PATH_SEPARATOR: char = '#';

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default delay before restarting a watch stream after an error (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default log level when `RUST_LOG` is not set
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Default log format (json, text)
pub const DEFAULT_LOG_FORMAT: &str = "json";
