//! # Configuration Management
//!
//! Configuration for connecting to Vault and resolving secrets.
//!
//! [`AppConfig`] is layered from defaults, an optional TOML/YAML file and
//! `BUILDVAULT_`-prefixed environment variables (nested keys separated by `__`):
//!
//! ```bash
//! BUILDVAULT_VAULT__URL=https://vault.example.com:8200
//! BUILDVAULT_VAULT__AUTH__METHOD=approle
//! BUILDVAULT_VAULT__AUTH__ROLE_ID=build-role
//! BUILDVAULT_VAULT__AUTH__SECRET_ID=...
//! BUILDVAULT_RESOLVER__WRITE_ENGINES_ENABLED=true
//! ```
//!
//! Build features hand connection settings around as flat property maps;
//! [`ConnectionSettings::from_properties`] and [`ConnectionSettings::to_properties`]
//! convert between the two forms.

pub mod connection;
pub mod settings;

pub use connection::{AuthSettings, ConnectionSettings, FAILED_TO_FETCH};
pub use settings::{AppConfig, ObservabilityConfig, ResolverSettings, RetrySettings, SessionSettings};
