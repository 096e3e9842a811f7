//! Unwrapping a response-wrapped token handed over by a server.
//!
//! The wrapping token is single use on the Vault side. The authenticator also
//! gives it up locally after the first attempt, so a second `login` fails fast
//! with [`AuthErrorKind::AlreadyUnwrapped`] without touching the network.

use crate::auth::{AuthMethod, ClientAuthentication, VaultToken};
use crate::errors::{AuthErrorKind, Result, VaultError};
use crate::secrets::SecretString;
use crate::vault::VaultHttpClient;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

pub const UNWRAP_PATH: &str = "sys/wrapping/unwrap";

pub struct CubbyholeAuthentication {
    wrapped_token: Mutex<Option<SecretString>>,
}

impl CubbyholeAuthentication {
    pub fn new(wrapped_token: SecretString) -> Self {
        Self { wrapped_token: Mutex::new(Some(wrapped_token)) }
    }

    /// Whether the envelope is still available for unwrapping
    pub fn is_consumed(&self) -> bool {
        self.wrapped_token.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    fn take(&self) -> Option<SecretString> {
        self.wrapped_token.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[async_trait]
impl ClientAuthentication for CubbyholeAuthentication {
    fn method(&self) -> AuthMethod {
        AuthMethod::Cubbyhole
    }

    async fn login(&self, client: &VaultHttpClient) -> Result<VaultToken> {
        let wrapped = self.take().ok_or_else(|| {
            VaultError::auth("Wrapped token has already been unwrapped", AuthErrorKind::AlreadyUnwrapped)
        })?;

        // Vault consumes the envelope on the first attempt, so unwrap is never retried.
        let response = match client.write_once(UNWRAP_PATH, Some(&wrapped), None).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                return Err(VaultError::auth("Unwrapping returned an empty response", AuthErrorKind::TokenRejected))
            }
            Err(VaultError::Client { message, .. }) => {
                return Err(VaultError::auth(
                    format!("Wrapped token is invalid, expired or already unwrapped: {}", message),
                    AuthErrorKind::AlreadyUnwrapped,
                ))
            }
            Err(error) => return Err(error),
        };

        let token = if let Some(auth) = &response.auth {
            VaultToken::from_auth(auth)
        } else if let Some(Value::String(token)) = response.data.as_ref().and_then(|d| d.get("token")) {
            VaultToken::login(SecretString::new(token.as_str()), false, std::time::Duration::ZERO)
        } else {
            return Err(VaultError::auth("Unwrapped response carried no token", AuthErrorKind::TokenRejected));
        };

        tracing::info!(
            method = %self.method(),
            renewable = token.is_renewable(),
            lease_seconds = token.lease_duration().as_secs(),
            "Unwrapped HashiCorp Vault token"
        );
        Ok(token)
    }
}
