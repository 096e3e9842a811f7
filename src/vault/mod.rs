//! # Vault Transport
//!
//! The subset of the Vault HTTP API used by buildvault: login, token renewal and
//! revocation, generic reads and writes, health and response wrapping.
//!
//! ## Example
//!
//! ```rust,ignore
//! use buildvault::vault::{RetryPolicy, VaultHttpClient};
//!
//! let client = VaultHttpClient::new("https://vault.example.com:8200", Some("team-a"))?
//!     .with_retry(RetryPolicy::exponential(5, Duration::from_millis(200)));
//! let secret = client.read("secret/data/app", Some(&token)).await?;
//! ```

pub mod client;
pub mod response;
pub mod retry;

pub use client::VaultHttpClient;
pub use response::{error_message, AuthInfo, HealthStatus, VaultResponse, WrapInfo};
pub use retry::{Backoff, RetryPolicy};
