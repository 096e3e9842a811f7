//! Vault connection settings and the property-map form used by build features.

use crate::errors::{Result, VaultError};
use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Placeholder stored instead of a wrapped token when the server could not obtain one
pub const FAILED_TO_FETCH: &str = "FAILED_TO_FETCH";

const DEFAULT_APPROLE_ENDPOINT: &str = "approle";
const DEFAULT_LDAP_PATH: &str = "ldap";

// Property keys shared between build features and agents
const KEY_URL: &str = "url";
const KEY_VAULT_NAMESPACE: &str = "vault-namespace";
const KEY_NAMESPACE: &str = "namespace";
const KEY_AUTH_METHOD: &str = "auth-method";
const KEY_ENDPOINT: &str = "endpoint";
const KEY_ROLE_ID: &str = "role-id";
const KEY_SECRET_ID: &str = "secure:secret-id";
const KEY_USERNAME: &str = "username";
const KEY_PASSWORD: &str = "secure:password";
const KEY_PATH: &str = "path";
const KEY_TOKEN: &str = "secure:token";
const KEY_WRAPPED_TOKEN: &str = "wrapped-token";
const KEY_FAIL_ON_ERROR: &str = "fail-on-error";
const KEY_SET_ENV: &str = "set-env";

/// How to authenticate against Vault
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum AuthSettings {
    /// AppRole login with a role ID and optional secret ID
    AppRole {
        #[serde(default = "default_approle_endpoint")]
        endpoint: String,
        #[serde(default)]
        role_id: String,
        #[serde(default)]
        secret_id: SecretString,
    },
    /// LDAP login with username and password
    Ldap {
        #[serde(default = "default_ldap_path")]
        path: String,
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: SecretString,
    },
    /// Response-wrapped token handed over by a server
    Wrapped {
        #[serde(default)]
        wrapped_token: SecretString,
    },
    /// Static token, never revoked by this process
    Token {
        #[serde(default)]
        token: SecretString,
    },
}

fn default_approle_endpoint() -> String {
    DEFAULT_APPROLE_ENDPOINT.to_string()
}

fn default_ldap_path() -> String {
    DEFAULT_LDAP_PATH.to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings::Token { token: SecretString::default() }
    }
}

impl AuthSettings {
    /// Short name of the method, as used in the `auth-method` property
    pub fn method_name(&self) -> &'static str {
        match self {
            AuthSettings::AppRole { .. } => "approle",
            AuthSettings::Ldap { .. } => "ldap",
            AuthSettings::Wrapped { .. } => "wrapped",
            AuthSettings::Token { .. } => "token",
        }
    }

    /// Whether the method can be used by a server to mint tokens for agents
    pub fn supports_handoff(&self) -> bool {
        matches!(self, AuthSettings::AppRole { .. } | AuthSettings::Ldap { .. })
    }
}

/// Connection settings for one Vault parameter namespace
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Parameter namespace; empty for the default namespace
    pub id: String,

    /// Vault server address, e.g. `https://vault.example.com:8200`
    #[validate(url(message = "Vault URL must be a valid URL"))]
    pub url: String,

    /// Vault Enterprise namespace sent as `X-Vault-Namespace`
    pub vault_namespace: String,

    pub auth: AuthSettings,

    /// Fail the build when any reference cannot be resolved
    pub fail_on_error: bool,

    /// Expose the session token and address as environment variables
    pub expose_env: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            url: "http://127.0.0.1:8200".to_string(),
            vault_namespace: String::new(),
            auth: AuthSettings::default(),
            fail_on_error: true,
            expose_env: false,
        }
    }
}

impl ConnectionSettings {
    /// Parse the flat property map stored by a build feature.
    ///
    /// A `wrapped-token` entry takes precedence over the configured auth method,
    /// which is how agents receive settings from the server.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self> {
        let get = |key: &str| properties.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let secret = |key: &str| SecretString::new(get(key).unwrap_or_default());

        let url = get(KEY_URL)
            .ok_or_else(|| VaultError::validation_field("Vault URL is required", KEY_URL))?
            .to_string();

        let auth = if let Some(wrapped) = get(KEY_WRAPPED_TOKEN) {
            AuthSettings::Wrapped { wrapped_token: SecretString::new(wrapped) }
        } else {
            match get(KEY_AUTH_METHOD).unwrap_or("approle") {
                "approle" => AuthSettings::AppRole {
                    endpoint: get(KEY_ENDPOINT).unwrap_or(DEFAULT_APPROLE_ENDPOINT).to_string(),
                    role_id: get(KEY_ROLE_ID).unwrap_or_default().to_string(),
                    secret_id: secret(KEY_SECRET_ID),
                },
                "ldap" => AuthSettings::Ldap {
                    path: get(KEY_PATH).unwrap_or(DEFAULT_LDAP_PATH).to_string(),
                    username: get(KEY_USERNAME).unwrap_or_default().to_string(),
                    password: secret(KEY_PASSWORD),
                },
                "token" => AuthSettings::Token { token: secret(KEY_TOKEN) },
                other => {
                    return Err(VaultError::validation_field(
                        format!("Unsupported auth method '{}'", other),
                        KEY_AUTH_METHOD,
                    ))
                }
            }
        };

        let settings = Self {
            id: get(KEY_NAMESPACE).unwrap_or_default().to_string(),
            url,
            vault_namespace: get(KEY_VAULT_NAMESPACE).unwrap_or_default().to_string(),
            auth,
            fail_on_error: get(KEY_FAIL_ON_ERROR).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(true),
            expose_env: get(KEY_SET_ENV).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false),
        };

        settings.validate_settings()?;
        Ok(settings)
    }

    /// Render the settings as a property map. Secrets are written in plaintext.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        properties.insert(KEY_URL.to_string(), self.url.clone());
        properties.insert(KEY_FAIL_ON_ERROR.to_string(), self.fail_on_error.to_string());
        if !self.id.is_empty() {
            properties.insert(KEY_NAMESPACE.to_string(), self.id.clone());
        }
        if !self.vault_namespace.is_empty() {
            properties.insert(KEY_VAULT_NAMESPACE.to_string(), self.vault_namespace.clone());
        }
        if self.expose_env {
            properties.insert(KEY_SET_ENV.to_string(), "true".to_string());
        }

        match &self.auth {
            AuthSettings::AppRole { endpoint, role_id, secret_id } => {
                properties.insert(KEY_AUTH_METHOD.to_string(), "approle".to_string());
                properties.insert(KEY_ENDPOINT.to_string(), endpoint.clone());
                properties.insert(KEY_ROLE_ID.to_string(), role_id.clone());
                properties.insert(KEY_SECRET_ID.to_string(), secret_id.expose_secret().to_string());
            }
            AuthSettings::Ldap { path, username, password } => {
                properties.insert(KEY_AUTH_METHOD.to_string(), "ldap".to_string());
                properties.insert(KEY_PATH.to_string(), path.clone());
                properties.insert(KEY_USERNAME.to_string(), username.clone());
                properties.insert(KEY_PASSWORD.to_string(), password.expose_secret().to_string());
            }
            AuthSettings::Wrapped { wrapped_token } => {
                properties.insert(KEY_WRAPPED_TOKEN.to_string(), wrapped_token.expose_secret().to_string());
            }
            AuthSettings::Token { token } => {
                properties.insert(KEY_AUTH_METHOD.to_string(), "token".to_string());
                properties.insert(KEY_TOKEN.to_string(), token.expose_secret().to_string());
            }
        }

        properties
    }

    /// Settings for an agent: same connection, but authenticating with a wrapped token only.
    pub fn to_agent_settings(&self, wrapped_token: SecretString) -> Self {
        Self { auth: AuthSettings::Wrapped { wrapped_token }, ..self.clone() }
    }

    /// Whether these settings describe the default parameter namespace
    pub fn is_default_namespace(&self) -> bool {
        self.id.is_empty()
    }

    /// Prefix for exposed environment variables: `""` or `"<NAMESPACE>_"`.
    pub fn env_prefix(&self) -> String {
        if self.id.is_empty() {
            return String::new();
        }
        let mut prefix: String =
            self.id.chars().map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' }).collect();
        prefix.push('_');
        prefix
    }

    /// Method-specific checks the derive cannot express
    pub fn validate_auth(&self) -> Result<()> {
        match &self.auth {
            AuthSettings::AppRole { endpoint, role_id, .. } => {
                if normalize_mount_path(endpoint).is_empty() {
                    return Err(VaultError::validation_field("AppRole endpoint cannot be empty", "endpoint"));
                }
                if role_id.trim().is_empty() {
                    return Err(VaultError::validation_field("AppRole role ID cannot be empty", "role_id"));
                }
            }
            AuthSettings::Ldap { path, username, .. } => {
                if normalize_mount_path(path).is_empty() {
                    return Err(VaultError::validation_field("LDAP path cannot be empty", "path"));
                }
                if username.trim().is_empty() {
                    return Err(VaultError::validation_field("LDAP username cannot be empty", "username"));
                }
            }
            AuthSettings::Wrapped { wrapped_token } => {
                if wrapped_token.is_empty() {
                    return Err(VaultError::validation_field("Wrapped token cannot be empty", "wrapped_token"));
                }
                if wrapped_token.expose_secret() == FAILED_TO_FETCH {
                    return Err(VaultError::validation_field(
                        "Server failed to fetch a wrapped token for this build",
                        "wrapped_token",
                    ));
                }
            }
            AuthSettings::Token { token } => {
                if token.is_empty() {
                    return Err(VaultError::validation_field("Token cannot be empty", "token"));
                }
            }
        }
        Ok(())
    }

    /// Run derive validation and method-specific checks
    pub fn validate_settings(&self) -> Result<()> {
        Validate::validate(self).map_err(VaultError::from)?;
        self.validate_auth()
    }
}

/// Strip leading and trailing slashes from an auth mount path
pub fn normalize_mount_path(path: &str) -> &str {
    path.trim_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_from_properties_approle_defaults() {
        let settings = ConnectionSettings::from_properties(&props(&[
            ("url", "http://localhost:8200"),
            ("role-id", "role"),
            ("secure:secret-id", "secret"),
        ]))
        .unwrap();

        assert!(settings.is_default_namespace());
        assert!(settings.fail_on_error);
        assert_eq!(
            settings.auth,
            AuthSettings::AppRole {
                endpoint: "approle".to_string(),
                role_id: "role".to_string(),
                secret_id: SecretString::new("secret"),
            }
        );
    }

    #[test]
    fn test_from_properties_ldap() {
        let settings = ConnectionSettings::from_properties(&props(&[
            ("url", "http://localhost:8200"),
            ("namespace", "prod"),
            ("vault-namespace", "ns1"),
            ("auth-method", "ldap"),
            ("path", "corp-ldap"),
            ("username", "builder"),
            ("secure:password", "pw"),
            ("fail-on-error", "false"),
        ]))
        .unwrap();

        assert_eq!(settings.id, "prod");
        assert_eq!(settings.vault_namespace, "ns1");
        assert!(!settings.fail_on_error);
        assert_eq!(settings.auth.method_name(), "ldap");
    }

    #[test]
    fn test_wrapped_token_takes_precedence() {
        let settings = ConnectionSettings::from_properties(&props(&[
            ("url", "http://localhost:8200"),
            ("auth-method", "ldap"),
            ("wrapped-token", "s.wrapped"),
        ]))
        .unwrap();
        assert_eq!(settings.auth, AuthSettings::Wrapped { wrapped_token: SecretString::new("s.wrapped") });
    }

    #[test]
    fn test_from_properties_rejects_missing_url_and_unknown_method() {
        assert!(ConnectionSettings::from_properties(&props(&[("role-id", "r")])).is_err());
        assert!(ConnectionSettings::from_properties(&props(&[
            ("url", "http://localhost:8200"),
            ("auth-method", "kerberos"),
        ]))
        .is_err());
    }

    #[test]
    fn test_failed_to_fetch_sentinel_is_rejected() {
        let result = ConnectionSettings::from_properties(&props(&[
            ("url", "http://localhost:8200"),
            ("wrapped-token", FAILED_TO_FETCH),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_properties_survive_agent_conversion() {
        let server = ConnectionSettings {
            id: "prod".to_string(),
            url: "https://vault:8200".to_string(),
            auth: AuthSettings::AppRole {
                endpoint: "/approle/".to_string(),
                role_id: "role".to_string(),
                secret_id: SecretString::new("secret"),
            },
            ..ConnectionSettings::default()
        };

        let agent = server.to_agent_settings(SecretString::new("s.wrapped"));
        let properties = agent.to_properties();
        assert_eq!(properties.get("wrapped-token").map(String::as_str), Some("s.wrapped"));
        assert!(!properties.contains_key("secure:secret-id"));

        let parsed = ConnectionSettings::from_properties(&properties).unwrap();
        assert_eq!(parsed, agent);
    }

    #[test]
    fn test_validate_settings_runs_derive_and_auth_checks() {
        let mut settings = ConnectionSettings {
            url: "http://localhost:8200".to_string(),
            auth: AuthSettings::AppRole {
                endpoint: "approle".to_string(),
                role_id: "role".to_string(),
                secret_id: SecretString::new("secret"),
            },
            ..ConnectionSettings::default()
        };
        assert!(settings.validate_settings().is_ok());

        settings.auth = AuthSettings::AppRole {
            endpoint: "approle".to_string(),
            role_id: " ".to_string(),
            secret_id: SecretString::new("secret"),
        };
        assert!(settings.validate_settings().is_err());

        settings.auth = AuthSettings::Token { token: SecretString::new("s.static") };
        settings.url = "not a url".to_string();
        assert!(settings.validate_settings().is_err());
    }

    #[test]
    fn test_env_prefix() {
        let mut settings = ConnectionSettings::default();
        assert_eq!(settings.env_prefix(), "");
        settings.id = "team-a.prod".to_string();
        assert_eq!(settings.env_prefix(), "TEAM_A_PROD_");
    }

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path("/approle"), "approle");
        assert_eq!(normalize_mount_path("//custom/approle/"), "custom/approle");
    }
}
