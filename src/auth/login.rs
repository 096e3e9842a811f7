//! Shared login exchange and readable login errors.

use crate::auth::{AppRoleAuthentication, AuthMethod, LdapAuthentication};
use crate::config::AuthSettings;
use crate::errors::{AuthErrorKind, Result, VaultError};
use crate::secrets::SecretString;
use crate::vault::{VaultHttpClient, VaultResponse};
use serde_json::Value;

/// Replacement for credentials echoed back in error messages
pub const MASK: &str = "*******";

const APPROLE_BAD_SECRET_PREFIXES: [&str; 2] = ["failed to validate credentials: ", "failed to validate SecretID: "];

/// A credential login exchange: where to post and what to send.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub method: AuthMethod,
    pub path: String,
    pub body: Value,
    /// Secret to mask out of error messages
    pub credential: SecretString,
}

impl LoginRequest {
    /// Login request for credential-based settings.
    ///
    /// Wrapped and static tokens cannot log in on behalf of someone else and are rejected.
    pub fn for_settings(settings: &AuthSettings) -> Result<Self> {
        match settings {
            AuthSettings::AppRole { endpoint, role_id, secret_id } => {
                Ok(AppRoleAuthentication::new(endpoint.clone(), role_id.clone(), secret_id.clone()).login_request())
            }
            AuthSettings::Ldap { path, username, password } => {
                Ok(LdapAuthentication::new(path.clone(), username.clone(), password.clone()).login_request())
            }
            other => Err(VaultError::config(format!(
                "Auth method '{}' cannot issue tokens for other processes",
                other.method_name()
            ))),
        }
    }

    /// Send the request under the client's retry policy
    pub async fn send(&self, client: &VaultHttpClient) -> Result<VaultResponse> {
        perform_login(client, self.method, &self.path, &self.body, Some(&self.credential)).await
    }

    /// Send the request and read the `auth` block
    pub async fn login(&self, client: &VaultHttpClient) -> Result<crate::vault::AuthInfo> {
        self.send(client).await?.auth.ok_or_else(|| {
            VaultError::auth(
                format!("{} login response carried no auth block", self.method),
                AuthErrorKind::InvalidCredentials,
            )
        })
    }
}

/// `POST <path>` with the login body under the client's retry policy.
///
/// `credential` is masked out of any error message.
pub async fn perform_login(
    client: &VaultHttpClient,
    method: AuthMethod,
    path: &str,
    body: &Value,
    credential: Option<&SecretString>,
) -> Result<VaultResponse> {
    match client.write(path, None, Some(body)).await {
        Ok(Some(response)) => Ok(response),
        Ok(None) => Err(VaultError::auth(
            format!("Cannot log in to HashiCorp Vault using {} method: empty response", method),
            AuthErrorKind::InvalidCredentials,
        )),
        Err(error) => Err(readable_login_error(method, error, credential)),
    }
}

/// Turn a rejected login into an authentication error a build user can act on.
pub fn readable_login_error(method: AuthMethod, error: VaultError, credential: Option<&SecretString>) -> VaultError {
    let mask = |text: &str| credential.map_or_else(|| text.to_string(), |c| c.mask_in(text, MASK));

    match error {
        VaultError::Client { message, .. } => {
            let message = mask(&message);
            let readable = match method {
                AuthMethod::AppRole
                    if APPROLE_BAD_SECRET_PREFIXES.iter().any(|p| message.starts_with(p))
                        && message.contains("invalid secret_id") =>
                {
                    "Cannot log in to HashiCorp Vault using APPROLE method, SecretID is incorrect or expired".to_string()
                }
                AuthMethod::AppRole if message.contains("failed to find secondary index for role_id") => {
                    "Cannot log in to HashiCorp Vault using APPROLE method, RoleID is incorrect or there's no such role"
                        .to_string()
                }
                _ => format!("Cannot log in to HashiCorp Vault using {} method: {}", method, message),
            };
            VaultError::auth(readable, AuthErrorKind::InvalidCredentials)
        }
        VaultError::NotFound { path } => VaultError::auth(
            format!("Cannot log in to HashiCorp Vault using {} method: no auth backend at '{}'", method, path),
            AuthErrorKind::InvalidCredentials,
        ),
        VaultError::Transport { path, status, message } => VaultError::transport(path, status, mask(&message)),
        other => other,
    }
}
