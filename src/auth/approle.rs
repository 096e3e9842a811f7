//! AppRole login.

use crate::auth::login::LoginRequest;
use crate::auth::{AuthMethod, ClientAuthentication, VaultToken};
use crate::config::connection::normalize_mount_path;
use crate::errors::Result;
use crate::secrets::SecretString;
use crate::vault::VaultHttpClient;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Logs in with a role ID and secret ID at `auth/<mount>/login`.
#[derive(Debug, Clone)]
pub struct AppRoleAuthentication {
    mount_path: String,
    role_id: String,
    secret_id: SecretString,
}

impl AppRoleAuthentication {
    pub fn new(mount_path: impl Into<String>, role_id: impl Into<String>, secret_id: SecretString) -> Self {
        Self { mount_path: mount_path.into(), role_id: role_id.into(), secret_id }
    }

    pub fn login_path(&self) -> String {
        format!("auth/{}/login", normalize_mount_path(&self.mount_path))
    }

    /// Login body; `secret_id` is omitted for roles bound without one
    pub fn login_body(&self) -> Value {
        let mut body = json!({ "role_id": self.role_id });
        if !self.secret_id.is_empty() {
            body["secret_id"] = Value::String(self.secret_id.expose_secret().to_string());
        }
        body
    }

    pub fn login_request(&self) -> LoginRequest {
        LoginRequest {
            method: AuthMethod::AppRole,
            path: self.login_path(),
            body: self.login_body(),
            credential: self.secret_id.clone(),
        }
    }
}

#[async_trait]
impl ClientAuthentication for AppRoleAuthentication {
    fn method(&self) -> AuthMethod {
        AuthMethod::AppRole
    }

    async fn login(&self, client: &VaultHttpClient) -> Result<VaultToken> {
        let request = self.login_request();
        let token = VaultToken::from_auth(&request.login(client).await?);

        tracing::info!(
            method = %self.method(),
            path = %request.path,
            renewable = token.is_renewable(),
            lease_seconds = token.lease_duration().as_secs(),
            "Logged in to HashiCorp Vault"
        );
        Ok(token)
    }
}
