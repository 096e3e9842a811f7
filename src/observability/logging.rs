//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem. Logs go to
//! stderr so command output on stdout stays machine-readable.

use crate::config::{AppConfig, ObservabilityConfig};
use tracing_subscriber::EnvFilter;

/// Create a tracing span for a Vault operation.
///
/// ```rust,ignore
/// let span = vault_span!("login", method = "APPROLE");
/// ```
#[macro_export]
macro_rules! vault_span {
    ($operation:expr) => {
        tracing::info_span!("vault_operation", operation = %$operation)
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!("vault_operation", operation = %$operation, $($field)*)
    };
}

/// Build the level filter: `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config)).with_writer(std::io::stderr);

    let installed = if config.json_logging {
        builder.json().with_current_span(true).try_init().is_ok()
    } else {
        builder.with_target(false).try_init().is_ok()
    };

    if installed {
        tracing::debug!(service_name = %config.service_name, json = config.json_logging, "Logging initialized");
    }
    installed
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        vault_address = %config.vault.url,
        vault_namespace = %config.vault.vault_namespace,
        auth_method = config.vault.auth.method_name(),
        retry_attempts = config.retry.max_attempts,
        write_engines_enabled = config.resolver.write_engines_enabled,
        "buildvault configuration"
    );
}
