//! # Configuration Settings
//!
//! Defines the configuration structure for buildvault.

use crate::config::ConnectionSettings;
use crate::errors::{Result, VaultError};
use crate::vault::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "BUILDVAULT";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Vault connection and authentication
    #[validate(nested)]
    pub vault: ConnectionSettings,

    /// Retry policy for login and secret fetches
    #[validate(nested)]
    pub retry: RetrySettings,

    /// Token lifecycle settings
    #[validate(nested)]
    pub session: SessionSettings,

    /// Secret reference resolution settings
    #[validate(nested)]
    pub resolver: ResolverSettings,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from an optional file plus `BUILDVAULT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__").try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(VaultError::from)?;
        self.vault.validate_auth()?;
        Ok(())
    }
}

/// Retry configuration for Vault calls
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first one
    #[validate(range(min = 1, max = 20, message = "Max attempts must be between 1 and 20"))]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[validate(range(max = 60000, message = "Retry delay must be at most 60 seconds"))]
    pub delay_millis: u64,

    /// Double the delay after each failed attempt
    pub exponential: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 5, delay_millis: 200, exponential: true }
    }
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_millis)
    }

    /// Build the retry policy described by these settings
    pub fn to_policy(&self) -> RetryPolicy {
        if self.exponential {
            RetryPolicy::exponential(self.max_attempts, self.delay())
        } else {
            RetryPolicy::fixed(self.max_attempts, self.delay())
        }
    }
}

/// Token lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionSettings {
    /// How long before lease expiry a renewal fires
    #[validate(range(max = 86400, message = "Refresh lead time must be at most one day"))]
    pub refresh_lead_seconds: u64,

    /// TTL requested for response-wrapped tokens (Vault duration syntax)
    #[validate(length(min = 1, message = "Wrap TTL cannot be empty"))]
    pub wrap_ttl: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { refresh_lead_seconds: 15, wrap_ttl: "10m".to_string() }
    }
}

impl SessionSettings {
    pub fn refresh_lead_time(&self) -> Duration {
        Duration::from_secs(self.refresh_lead_seconds)
    }
}

/// Secret reference resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResolverSettings {
    /// Treat `write:`-prefixed references as dynamic secret writes
    pub write_engines_enabled: bool,

    /// Maximum number of paths fetched in parallel
    #[validate(range(min = 1, max = 64, message = "Concurrency must be between 1 and 64"))]
    pub concurrency: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self { write_engines_enabled: false, concurrency: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { service_name: "buildvault".to_string(), log_level: "info".to_string(), json_logging: false }
    }
}
