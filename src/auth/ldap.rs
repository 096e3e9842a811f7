//! LDAP login.

use crate::auth::login::LoginRequest;
use crate::auth::{AuthMethod, ClientAuthentication, VaultToken};
use crate::config::connection::normalize_mount_path;
use crate::errors::Result;
use crate::secrets::SecretString;
use crate::vault::VaultHttpClient;
use async_trait::async_trait;
use serde_json::json;

/// Logs in at `auth/<mount>/login/<username>` with a password.
#[derive(Debug, Clone)]
pub struct LdapAuthentication {
    mount_path: String,
    username: String,
    password: SecretString,
}

impl LdapAuthentication {
    pub fn new(mount_path: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self { mount_path: mount_path.into(), username: username.into(), password }
    }

    pub fn login_path(&self) -> String {
        format!("auth/{}/login/{}", normalize_mount_path(&self.mount_path), self.username)
    }

    pub fn login_request(&self) -> LoginRequest {
        LoginRequest {
            method: AuthMethod::Ldap,
            path: self.login_path(),
            body: json!({ "password": self.password.expose_secret() }),
            credential: self.password.clone(),
        }
    }
}

#[async_trait]
impl ClientAuthentication for LdapAuthentication {
    fn method(&self) -> AuthMethod {
        AuthMethod::Ldap
    }

    async fn login(&self, client: &VaultHttpClient) -> Result<VaultToken> {
        let auth = self.login_request().login(client).await?;

        tracing::info!(method = %self.method(), username = %self.username, "Logged in to HashiCorp Vault");
        Ok(VaultToken::from_auth(&auth))
    }
}
