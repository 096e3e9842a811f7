//! # Secret Reference Resolution
//!
//! Parses references such as `/secret/data/app!/password` into [`VaultQuery`]
//! values, fetches each distinct path once, and extracts the requested fields.
//!
//! ```rust,ignore
//! let resolver = QueryResolver::new(client, ResolverSettings::default());
//! let token = session.get_session_token().await?;
//! let result = resolver.resolve_references(["/secret/data/app!/password"], &token).await;
//! for (reference, error) in &result.errors {
//!     tracing::warn!(reference = %reference, error = %error, "Unresolved reference");
//! }
//! ```

pub mod extract;
pub mod query;
#[allow(clippy::module_inception)]
pub mod resolver;

pub use extract::{extract_value, unwrap_kv2};
pub use query::{VaultQuery, FIELD_SEPARATOR, WRITE_PREFIX};
pub use resolver::{QueryResolver, ResolvingResult};
