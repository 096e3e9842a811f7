//! # Build Parameters
//!
//! Finds `%vault:<query>%` and `%vault:<namespace>:<query>%` references in build
//! parameters, resolves them through a [`SessionManager`](crate::session::SessionManager)
//! and substitutes the values. Every value is handed to a [`RedactionSink`] first so
//! build output can be masked.
//!
//! ```rust,ignore
//! let sink = Arc::new(PasswordReplacer::new());
//! let resolver = ParameterResolver::new(connection.clone(), config.resolver.clone(), sink.clone());
//! let outcome = resolver.resolve(&session, &parameters).await?.into_result(connection.fail_on_error)?;
//! println!("{}", sink.replace(&build_log));
//! ```

pub mod redaction;
pub mod references;
pub mod resolve;

pub use redaction::{PasswordReplacer, RedactionSink, PASSWORD_MASK};
pub use references::{
    collect_references, has_references, make_reference, reference_namespace, reference_path, substitute,
    VAULT_PARAMETER_PREFIX,
};
pub use resolve::{ParameterResolver, ResolutionOutcome, ENV_VAULT_ADDR, ENV_VAULT_TOKEN};
