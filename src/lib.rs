//! # buildvault
//!
//! Build-time credential lifecycle against HashiCorp Vault.
//!
//! ## Architecture
//!
//! ```text
//! server:  TokenHandoff ── wrapped token + accessor ──▶ agent
//! agent:   CubbyholeAuthentication ─▶ SessionManager ─▶ QueryResolver ─▶ ParameterResolver
//!                                          │                  │
//!                                   renew / revoke      VaultHttpClient (retry)
//! ```
//!
//! ## Core Components
//!
//! - **Session**: lazy login, lease renewal ahead of expiry, revocation on close
//! - **Handoff**: response-wrapped tokens for builds, revoked by accessor afterwards
//! - **Resolver**: `[write:]<path>[!/<field>]` references, one Vault call per path
//! - **Transport**: Vault HTTP API with bounded retry on 5xx and I/O errors
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use buildvault::auth::build_authentication;
//! use buildvault::config::AppConfig;
//! use buildvault::resolver::QueryResolver;
//! use buildvault::session::SessionManager;
//! use buildvault::vault::VaultHttpClient;
//!
//! #[tokio::main]
//! async fn main() -> buildvault::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let client = VaultHttpClient::from_settings(&config.vault, config.retry.to_policy())?;
//!     let session = SessionManager::new(client.clone(), build_authentication(&config.vault.auth));
//!
//!     let token = session.get_session_token().await?;
//!     let result = QueryResolver::new(client, config.resolver.clone())
//!         .resolve_references(["/secret/data/app!/password"], &token)
//!         .await;
//!     println!("resolved {} references", result.replacements.len());
//!
//!     session.destroy().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod handoff;
pub mod observability;
pub mod parameters;
pub mod resolver;
pub mod secrets;
pub mod session;
pub mod vault;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Result, VaultError};
pub use secrets::SecretString;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "buildvault");
    }
}
