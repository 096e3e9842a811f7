//! # Error Handling
//!
//! Error types for talking to HashiCorp Vault and resolving secret references.
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! [`VaultError`] separates transient transport failures (retried) from caller
//! errors, authentication rejections and per-reference resolution failures.

pub mod types;

pub use types::{AuthErrorKind, Result, VaultError};
