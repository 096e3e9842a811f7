//! # Error Types
//!
//! Error taxonomy for Vault interactions using `thiserror`.

use std::fmt;

/// Custom result type for Vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Main error type for Vault operations
#[derive(thiserror::Error, Debug)]
pub enum VaultError {
    /// Network failure or 5xx response. Retried by the retry policy.
    #[error("{}", render_status(.status, .path, .message))]
    Transport { path: String, status: Option<u16>, message: String },

    /// 4xx response treated as a caller error. Never retried.
    #[error("Status {status} {path}: {message}")]
    Client { path: String, status: u16, message: String },

    /// Login, renewal or unwrap rejected by Vault
    #[error("Authentication error: {message}")]
    Auth { message: String, kind: AuthErrorKind },

    /// Write (or other non-read call) against a missing path
    #[error("Nothing found at path '{path}'")]
    NotFound { path: String },

    /// A single secret reference could not be resolved
    #[error("Cannot resolve '{reference}': {reason}")]
    Resolution { reference: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn render_status(status: &Option<u16>, path: &str, message: &str) -> String {
    match status {
        Some(code) => format!("Status {} {}: {}", code, path, message),
        None => format!("I/O error on {}: {}", path, message),
    }
}

/// Authentication error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    InvalidCredentials,
    TokenRejected,
    AlreadyUnwrapped,
    SessionClosed,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::InvalidCredentials => write!(f, "invalid_credentials"),
            AuthErrorKind::TokenRejected => write!(f, "token_rejected"),
            AuthErrorKind::AlreadyUnwrapped => write!(f, "already_unwrapped"),
            AuthErrorKind::SessionClosed => write!(f, "session_closed"),
        }
    }
}

impl VaultError {
    /// Create a transport error for a failed request
    pub fn transport<P: Into<String>, M: Into<String>>(path: P, status: Option<u16>, message: M) -> Self {
        Self::Transport { path: path.into(), status, message: message.into() }
    }

    /// Create a client error for a rejected request
    pub fn client<P: Into<String>, M: Into<String>>(path: P, status: u16, message: M) -> Self {
        Self::Client { path: path.into(), status, message: message.into() }
    }

    /// Classify a non-success response by its status code
    pub fn from_status<P: Into<String>, M: Into<String>>(path: P, status: u16, message: M) -> Self {
        if status >= 500 {
            Self::transport(path, Some(status), message)
        } else {
            Self::client(path, status, message)
        }
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S, kind: AuthErrorKind) -> Self {
        Self::Auth { message: message.into(), kind }
    }

    pub fn not_found<P: Into<String>>(path: P) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a resolution error for one reference
    pub fn resolution<R: Into<String>, S: Into<String>>(reference: R, reason: S) -> Self {
        Self::Resolution { reference: reference.into(), reason: reason.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error for a specific field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status reported by Vault, when the error came from a response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            VaultError::Transport { status, .. } => *status,
            VaultError::Client { status, .. } => Some(*status),
            VaultError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Message reported by Vault for a failed request
    pub fn vault_message(&self) -> Option<&str> {
        match self {
            VaultError::Transport { message, .. } | VaultError::Client { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Copy of this error to report against one secret reference.
    ///
    /// The variant is kept so callers can still tell transport failures from
    /// rejections. Resolution errors are re-keyed to `reference`; variants that
    /// own a source error become resolution errors carrying its message.
    pub fn for_reference(&self, reference: &str) -> VaultError {
        match self {
            VaultError::Transport { path, status, message } => VaultError::transport(path.as_str(), *status, message.as_str()),
            VaultError::Client { path, status, message } => VaultError::client(path.as_str(), *status, message.as_str()),
            VaultError::Auth { message, kind } => VaultError::auth(message.as_str(), *kind),
            VaultError::NotFound { path } => VaultError::not_found(path.as_str()),
            VaultError::Resolution { reason, .. } => VaultError::resolution(reference, reason.as_str()),
            VaultError::Validation { message, field } => {
                VaultError::Validation { message: message.clone(), field: field.clone() }
            }
            VaultError::Internal { message } => VaultError::internal(message.as_str()),
            other @ (VaultError::Config { .. } | VaultError::Serialization { .. } | VaultError::Io { .. }) => {
                VaultError::resolution(reference, other.to_string())
            }
        }
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::Transport { .. } | VaultError::Io { .. })
    }

    /// Check if this error is a 4xx client error
    pub fn is_client_error(&self) -> bool {
        matches!(self, VaultError::Client { .. } | VaultError::NotFound { .. })
    }
}

impl From<std::io::Error> for VaultError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for VaultError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for VaultError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
