//! Vault response envelopes.

use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Generic Vault response body
#[derive(Clone, Default, Deserialize)]
pub struct VaultResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub lease_id: Option<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    /// Secret payload; may contain plaintext secrets
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub auth: Option<AuthInfo>,
    #[serde(default)]
    pub wrap_info: Option<WrapInfo>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl fmt::Debug for VaultResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_keys: Option<Vec<&String>> = self.data.as_ref().map(|d| d.keys().collect());
        f.debug_struct("VaultResponse")
            .field("request_id", &self.request_id)
            .field("lease_id", &self.lease_id)
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .field("data_keys", &data_keys)
            .field("auth", &self.auth)
            .field("wrap_info", &self.wrap_info)
            .field("warnings", &self.warnings)
            .finish()
    }
}

/// `auth` block returned by login and token endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfo {
    pub client_token: SecretString,
    #[serde(default)]
    pub accessor: Option<String>,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// `wrap_info` block returned when `X-Vault-Wrap-TTL` is set
#[derive(Debug, Clone, Deserialize)]
pub struct WrapInfo {
    pub token: SecretString,
    #[serde(default)]
    pub accessor: Option<String>,
    /// Accessor of the token inside the envelope
    #[serde(default)]
    pub wrapped_accessor: Option<String>,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub creation_path: Option<String>,
}

/// Body of `GET sys/health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub performance_standby: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub server_time_utc: Option<i64>,
    /// HTTP status Vault answered with
    #[serde(skip)]
    pub status_code: u16,
}

impl HealthStatus {
    /// Initialized, unsealed and able to serve requests
    pub fn is_ready(&self) -> bool {
        self.initialized && !self.sealed
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<Value>,
}

/// Extract a readable message from an error response body.
///
/// Vault reports failures as `{"errors": [...]}`. A single entry is returned bare,
/// several are joined with `, `. Anything else is returned trimmed.
pub fn error_message(body: &str) -> String {
    let trimmed = body.trim();
    match serde_json::from_str::<ErrorBody>(trimmed) {
        Ok(parsed) if !parsed.errors.is_empty() => {
            let messages: Vec<String> = parsed
                .errors
                .iter()
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            if messages.len() == 1 {
                messages.into_iter().next().unwrap_or_default()
            } else {
                messages.join(", ")
            }
        }
        Ok(_) => "no error details".to_string(),
        Err(_) if trimmed.is_empty() => "empty response body".to_string(),
        Err(_) => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_single_element_is_unwrapped() {
        assert_eq!(error_message(r#"{"errors":["permission denied"]}"#), "permission denied");
    }

    #[test]
    fn test_error_message_multiple_elements() {
        assert_eq!(error_message(r#"{"errors":["first","second"]}"#), "first, second");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(r#"{"errors":[]}"#), "no error details");
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
        assert_eq!(error_message(""), "empty response body");
    }

    #[test]
    fn test_login_response_deserializes() {
        let response: VaultResponse = serde_json::from_value(json!({
            "request_id": "r-1",
            "lease_duration": 0,
            "renewable": false,
            "data": null,
            "auth": {
                "client_token": "hvs.login",
                "accessor": "acc-1",
                "policies": ["default"],
                "renewable": true,
                "lease_duration": 3600
            }
        }))
        .unwrap();

        let auth = response.auth.unwrap();
        assert_eq!(auth.client_token.expose_secret(), "hvs.login");
        assert_eq!(auth.accessor.as_deref(), Some("acc-1"));
        assert!(auth.renewable);
        assert_eq!(auth.lease_duration, 3600);
    }

    #[test]
    fn test_debug_hides_secret_values() {
        let response: VaultResponse = serde_json::from_value(json!({
            "data": {"password": "hunter2"},
            "wrap_info": {"token": "hvs.wrapped", "ttl": 600, "wrapped_accessor": "acc-2"}
        }))
        .unwrap();

        let debug = format!("{:?}", response);
        assert!(debug.contains("password"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("hvs.wrapped"));
    }
}
