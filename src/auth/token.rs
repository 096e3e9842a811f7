//! Session tokens issued by Vault.

use crate::secrets::SecretString;
use crate::vault::AuthInfo;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Where a token came from, which decides whether it is renewed and revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Obtained by a login exchange; owned by this process
    Login,
    /// Injected from outside; never renewed or revoked here
    Static,
}

/// A Vault token with its lease metadata
#[derive(Debug, Clone)]
pub struct VaultToken {
    token: SecretString,
    accessor: Option<String>,
    renewable: bool,
    lease_duration: Duration,
    issued_at: DateTime<Utc>,
    kind: TokenKind,
}

impl VaultToken {
    /// A token obtained by logging in
    pub fn login(token: SecretString, renewable: bool, lease_duration: Duration) -> Self {
        Self { token, accessor: None, renewable, lease_duration, issued_at: Utc::now(), kind: TokenKind::Login }
    }

    /// An externally provided token
    pub fn from_static(token: SecretString) -> Self {
        Self {
            token,
            accessor: None,
            renewable: false,
            lease_duration: Duration::ZERO,
            issued_at: Utc::now(),
            kind: TokenKind::Static,
        }
    }

    /// Build a login token from the `auth` block of a Vault response
    pub fn from_auth(auth: &AuthInfo) -> Self {
        Self::login(auth.client_token.clone(), auth.renewable, Duration::from_secs(auth.lease_duration))
            .with_accessor(auth.accessor.clone())
    }

    pub fn with_accessor(mut self, accessor: Option<String>) -> Self {
        self.accessor = accessor.filter(|a| !a.is_empty());
        self
    }

    pub fn secret(&self) -> &SecretString {
        &self.token
    }

    pub fn accessor(&self) -> Option<&str> {
        self.accessor.as_deref()
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn is_login(&self) -> bool {
        self.kind == TokenKind::Login
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Expiry instant, or `None` for tokens without a lease
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.lease_duration.is_zero() {
            return None;
        }
        chrono::Duration::from_std(self.lease_duration).ok().map(|lease| self.issued_at + lease)
    }

    /// Login token that Vault allows renewing and that carries a positive lease
    pub fn is_renewable(&self) -> bool {
        self.is_login() && self.renewable && !self.lease_duration.is_zero()
    }
}
