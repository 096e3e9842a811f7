//! # Authentication
//!
//! One login exchange per method: credentials in, [`VaultToken`] out.
//!
//! The session manager depends only on [`ClientAuthentication`]; the concrete
//! method is chosen from [`AuthSettings`] by [`build_authentication`].

pub mod approle;
pub mod cubbyhole;
pub mod ldap;
pub mod login;
pub mod token;

pub use approle::AppRoleAuthentication;
pub use cubbyhole::CubbyholeAuthentication;
pub use ldap::LdapAuthentication;
pub use token::{TokenKind, VaultToken};

use crate::config::AuthSettings;
use crate::errors::Result;
use crate::secrets::SecretString;
use crate::vault::VaultHttpClient;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    AppRole,
    Ldap,
    Cubbyhole,
    Token,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::AppRole => write!(f, "APPROLE"),
            AuthMethod::Ldap => write!(f, "LDAP"),
            AuthMethod::Cubbyhole => write!(f, "CUBBYHOLE"),
            AuthMethod::Token => write!(f, "TOKEN"),
        }
    }
}

/// A single login exchange against Vault
#[async_trait]
pub trait ClientAuthentication: Send + Sync {
    fn method(&self) -> AuthMethod;

    /// Obtain a fresh token
    async fn login(&self, client: &VaultHttpClient) -> Result<VaultToken>;
}

/// Uses a token provided from outside. No network call is made.
#[derive(Debug, Clone)]
pub struct TokenAuthentication {
    token: SecretString,
}

impl TokenAuthentication {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl ClientAuthentication for TokenAuthentication {
    fn method(&self) -> AuthMethod {
        AuthMethod::Token
    }

    async fn login(&self, _client: &VaultHttpClient) -> Result<VaultToken> {
        Ok(VaultToken::from_static(self.token.clone()))
    }
}

/// Pick the authentication method described by the settings
pub fn build_authentication(settings: &AuthSettings) -> Arc<dyn ClientAuthentication> {
    match settings {
        AuthSettings::AppRole { endpoint, role_id, secret_id } => {
            Arc::new(AppRoleAuthentication::new(endpoint.clone(), role_id.clone(), secret_id.clone()))
        }
        AuthSettings::Ldap { path, username, password } => {
            Arc::new(LdapAuthentication::new(path.clone(), username.clone(), password.clone()))
        }
        AuthSettings::Wrapped { wrapped_token } => Arc::new(CubbyholeAuthentication::new(wrapped_token.clone())),
        AuthSettings::Token { token } => Arc::new(TokenAuthentication::new(token.clone())),
    }
}
