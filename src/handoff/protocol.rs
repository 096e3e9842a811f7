//! Issuing wrapped tokens and revoking them by accessor.

use crate::auth::login::LoginRequest;
use crate::config::{ConnectionSettings, FAILED_TO_FETCH};
use crate::errors::{AuthErrorKind, Result, VaultError};
use crate::secrets::SecretString;
use crate::session::manager::REVOKE_SELF_PATH;
use crate::vault::{RetryPolicy, VaultHttpClient};
use serde::Serialize;
use serde_json::json;

pub const REVOKE_ACCESSOR_PATH: &str = "auth/token/revoke-accessor";

/// Single-use wrapping token plus the accessor of the token inside it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrappedTokenEnvelope {
    pub wrapped_token: SecretString,
    pub accessor: String,
}

impl WrappedTokenEnvelope {
    /// JSON form handed to agents; the wrapping token is written in plaintext
    pub fn to_json(&self) -> serde_json::Value {
        json!({ "wrapped_token": self.wrapped_token.expose_secret(), "accessor": self.accessor })
    }
}

/// A plain token issued to someone else, revoked by its own value
#[derive(Debug, Clone)]
pub struct LeasedTokenInfo {
    pub token: SecretString,
    pub accessor: String,
    pub settings: ConnectionSettings,
}

/// A wrapped token issued for one build, revoked by accessor
#[derive(Debug, Clone)]
pub struct LeasedWrappedTokenInfo {
    pub wrapped_token: SecretString,
    pub accessor: String,
    pub settings: ConnectionSettings,
}

impl LeasedWrappedTokenInfo {
    pub fn new(envelope: WrappedTokenEnvelope, settings: ConnectionSettings) -> Self {
        Self { wrapped_token: envelope.wrapped_token, accessor: envelope.accessor, settings }
    }

    /// Placeholder for a build the server could not obtain a token for
    pub fn failed(settings: ConnectionSettings) -> Self {
        Self { wrapped_token: SecretString::new(FAILED_TO_FETCH), accessor: String::new(), settings }
    }

    pub fn is_failed(&self) -> bool {
        self.wrapped_token.expose_secret() == FAILED_TO_FETCH
    }

    /// Settings an agent needs to unwrap this token
    pub fn agent_settings(&self) -> ConnectionSettings {
        self.settings.to_agent_settings(self.wrapped_token.clone())
    }
}

/// Something to revoke once a build is over
#[derive(Debug, Clone)]
pub enum RevokeTarget {
    Wrapped(LeasedWrappedTokenInfo),
    Leased(LeasedTokenInfo),
}

/// Server side of the handoff
#[derive(Debug, Clone)]
pub struct TokenHandoff {
    retry: RetryPolicy,
    wrap_ttl: String,
}

impl TokenHandoff {
    pub fn new(retry: RetryPolicy, wrap_ttl: impl Into<String>) -> Self {
        Self { retry, wrap_ttl: wrap_ttl.into() }
    }

    pub fn wrap_ttl(&self) -> &str {
        &self.wrap_ttl
    }

    fn client_for(&self, settings: &ConnectionSettings) -> Result<VaultHttpClient> {
        VaultHttpClient::from_settings(settings, self.retry.clone())
    }

    /// Log in as the server identity with response wrapping and return the envelope.
    pub async fn request_wrapped_token(&self, settings: &ConnectionSettings) -> Result<WrappedTokenEnvelope> {
        let request = LoginRequest::for_settings(&settings.auth)?;
        let client = self.client_for(settings)?.with_wrap_ttl(self.wrap_ttl.clone());

        let response = request.send(&client).await?;
        let wrap = response.wrap_info.ok_or_else(|| {
            VaultError::auth(
                format!("{} login response was not wrapped", request.method),
                AuthErrorKind::TokenRejected,
            )
        })?;
        let accessor = wrap.wrapped_accessor.filter(|a| !a.is_empty()).ok_or_else(|| {
            VaultError::auth("Wrapped login response carried no accessor", AuthErrorKind::TokenRejected)
        })?;

        tracing::info!(
            method = %request.method,
            accessor = %accessor,
            wrap_ttl = %self.wrap_ttl,
            "Issued wrapped HashiCorp Vault token"
        );
        Ok(WrappedTokenEnvelope { wrapped_token: wrap.token, accessor })
    }

    /// Log in as the server identity and return the plain token.
    pub async fn request_token(&self, settings: &ConnectionSettings) -> Result<LeasedTokenInfo> {
        let request = LoginRequest::for_settings(&settings.auth)?;
        let auth = request.login(&self.client_for(settings)?).await?;

        let accessor = auth.accessor.filter(|a| !a.is_empty()).ok_or_else(|| {
            VaultError::auth("HashiCorp Vault hasn't returned token accessor", AuthErrorKind::TokenRejected)
        })?;
        tracing::info!(method = %request.method, accessor = %accessor, "Issued HashiCorp Vault token");
        Ok(LeasedTokenInfo { token: auth.client_token, accessor, settings: settings.clone() })
    }

    /// Issue a wrapped token for a build, falling back to the `FAILED_TO_FETCH` placeholder.
    pub async fn issue_for_build(&self, settings: &ConnectionSettings) -> LeasedWrappedTokenInfo {
        match self.request_wrapped_token(settings).await {
            Ok(envelope) => LeasedWrappedTokenInfo::new(envelope, settings.clone()),
            Err(error) => {
                tracing::warn!(namespace = %settings.id, error = %error, "Failed to fetch wrapped HashiCorp Vault token");
                LeasedWrappedTokenInfo::failed(settings.clone())
            }
        }
    }

    /// Revoke a token issued earlier. Never fails; returns whether revocation is settled.
    ///
    /// With `background` set the revocation is spawned and `true` is returned at once.
    pub async fn revoke(&self, target: RevokeTarget, background: bool) -> bool {
        if background {
            let handoff = self.clone();
            tokio::spawn(async move {
                handoff.revoke_now(&target).await;
            });
            return true;
        }
        self.revoke_now(&target).await
    }

    async fn revoke_now(&self, target: &RevokeTarget) -> bool {
        match target {
            RevokeTarget::Wrapped(info) => self.revoke_by_accessor(info).await,
            RevokeTarget::Leased(info) => self.revoke_leased(info).await,
        }
    }

    /// Revoke the token inside a wrapped envelope by its accessor.
    ///
    /// Logs in as the server identity, calls `auth/token/revoke-accessor`, then
    /// revokes the server's own token. A missing accessor on the Vault side counts
    /// as already revoked.
    pub async fn revoke_by_accessor(&self, info: &LeasedWrappedTokenInfo) -> bool {
        if info.is_failed() || info.accessor.is_empty() {
            tracing::debug!(namespace = %info.settings.id, "No wrapped token to revoke");
            return true;
        }

        let client = match self.client_for(&info.settings) {
            Ok(client) => client,
            Err(error) => {
                tracing::warn!(error = %error, "Cannot revoke HashiCorp Vault token");
                return false;
            }
        };

        let server_token = match LoginRequest::for_settings(&info.settings.auth) {
            Ok(request) => request.login(&client).await,
            Err(error) => Err(error),
        };
        let server_token = match server_token {
            Ok(auth) => auth.client_token,
            Err(error) => {
                tracing::warn!(accessor = %info.accessor, error = %error, "Cannot log in to revoke HashiCorp Vault token");
                return false;
            }
        };

        let body = json!({ "accessor": info.accessor });
        let settled = match client.write(REVOKE_ACCESSOR_PATH, Some(&server_token), Some(&body)).await {
            Ok(_) => {
                tracing::info!(accessor = %info.accessor, "Revoked HashiCorp Vault token by accessor");
                true
            }
            Err(VaultError::Client { status: 400, message, .. }) => {
                if message.contains("invalid accessor") {
                    tracing::info!(accessor = %info.accessor, "HashiCorp Vault token already revoked or expired");
                } else {
                    tracing::warn!(accessor = %info.accessor, message = %message, "Unexpected response while revoking token");
                }
                true
            }
            Err(VaultError::Client { status: 403, .. }) => {
                tracing::warn!(
                    accessor = %info.accessor,
                    path = REVOKE_ACCESSOR_PATH,
                    "Server identity lacks 'update' permission on the revoke-accessor path; token left to expire"
                );
                true
            }
            Err(VaultError::NotFound { .. }) => true,
            Err(error) => {
                tracing::warn!(accessor = %info.accessor, error = %error, "Cannot revoke HashiCorp Vault token by accessor");
                false
            }
        };

        if let Err(error) = client.write_once(REVOKE_SELF_PATH, Some(&server_token), None).await {
            tracing::warn!(error = %error, "Cannot revoke server HashiCorp Vault token");
        }

        settled
    }

    /// Revoke a plain token by its own value; an already invalid token is success.
    pub async fn revoke_leased(&self, info: &LeasedTokenInfo) -> bool {
        let client = match self.client_for(&info.settings) {
            Ok(client) => client,
            Err(error) => {
                tracing::warn!(error = %error, "Cannot revoke HashiCorp Vault token");
                return false;
            }
        };

        match client.write(REVOKE_SELF_PATH, Some(&info.token), None).await {
            Ok(_) => {
                tracing::info!(accessor = %info.accessor, "Revoked HashiCorp Vault token");
                true
            }
            Err(error) if error.is_client_error() => {
                tracing::info!(accessor = %info.accessor, "HashiCorp Vault token already invalid");
                true
            }
            Err(error) => {
                tracing::warn!(accessor = %info.accessor, error = %error, "Cannot revoke HashiCorp Vault token");
                false
            }
        }
    }
}
