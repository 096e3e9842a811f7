//! HTTP transport for the Vault API.
//!
//! [`VaultHttpClient`] owns the `reqwest` client, the `<address>/v1/` base URL,
//! the namespace header and the retry policy. `read` and `write` run under the
//! retry policy; `write_once` performs a single attempt for calls that must not
//! be repeated (token renewal and revocation).

use crate::config::ConnectionSettings;
use crate::errors::{Result, VaultError};
use crate::secrets::SecretString;
use crate::vault::response::{error_message, HealthStatus, VaultResponse};
use crate::vault::RetryPolicy;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const TOKEN_HEADER: &str = "X-Vault-Token";
pub const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
pub const WRAP_TTL_HEADER: &str = "X-Vault-Wrap-TTL";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status codes for which `sys/health` still returns a health body
const HEALTH_STATUSES: [u16; 6] = [200, 429, 472, 473, 501, 503];

/// Vault REST API client
#[derive(Debug, Clone)]
pub struct VaultHttpClient {
    http: reqwest::Client,
    address: String,
    base_url: Url,
    namespace: Option<String>,
    wrap_ttl: Option<String>,
    retry: RetryPolicy,
}

impl VaultHttpClient {
    fn user_agent() -> String {
        format!("buildvault/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Create a client for `address`, optionally scoped to a Vault namespace.
    pub fn new(address: &str, namespace: Option<&str>) -> Result<Self> {
        let address = address.trim().trim_end_matches('/').to_string();
        let base_url = Url::parse(&format!("{}/v1/", address))
            .map_err(|e| VaultError::config(format!("Invalid Vault address '{}': {}", address, e)))?;

        let http = reqwest::Client::builder()
            .user_agent(Self::user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VaultError::config_with_source("Failed to build HTTP client", Box::new(e)))?;

        Ok(Self {
            http,
            address,
            base_url,
            namespace: namespace.map(str::trim).filter(|ns| !ns.is_empty()).map(str::to_string),
            wrap_ttl: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client from connection settings and a retry policy.
    pub fn from_settings(settings: &ConnectionSettings, retry: RetryPolicy) -> Result<Self> {
        Ok(Self::new(&settings.url, Some(&settings.vault_namespace))?.with_retry(retry))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A copy of this client that asks Vault to response-wrap every reply.
    pub fn with_wrap_ttl(&self, ttl: impl Into<String>) -> Self {
        Self { wrap_ttl: Some(ttl.into()), ..self.clone() }
    }

    /// Server address without the API prefix
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// `GET <path>` under the retry policy. A 404 yields `Ok(None)`.
    pub async fn read(&self, path: &str, token: Option<&SecretString>) -> Result<Option<VaultResponse>> {
        let path = normalize_path(path);
        self.retry.run(path, || self.read_once(path, token)).await
    }

    /// `POST <path>` under the retry policy. A 204 yields `Ok(None)`.
    pub async fn write(
        &self,
        path: &str,
        token: Option<&SecretString>,
        body: Option<&Value>,
    ) -> Result<Option<VaultResponse>> {
        let path = normalize_path(path);
        self.retry.run(path, || self.write_once(path, token, body)).await
    }

    /// Single `GET <path>` attempt
    pub async fn read_once(&self, path: &str, token: Option<&SecretString>) -> Result<Option<VaultResponse>> {
        let path = normalize_path(path);
        let (status, body) = self.send(Method::GET, path, token, None).await?;

        match status {
            200..=299 => parse_body(path, &body),
            404 => {
                tracing::debug!(path = %path, "Vault returned no data");
                Ok(None)
            }
            _ => Err(VaultError::from_status(path, status, error_message(&body))),
        }
    }

    /// Single `POST <path>` attempt
    pub async fn write_once(
        &self,
        path: &str,
        token: Option<&SecretString>,
        body: Option<&Value>,
    ) -> Result<Option<VaultResponse>> {
        let path = normalize_path(path);
        let (status, response) = self.send(Method::POST, path, token, body).await?;

        match status {
            204 => Ok(None),
            200..=299 => parse_body(path, &response),
            404 => Err(VaultError::not_found(path)),
            _ => Err(VaultError::from_status(path, status, error_message(&response))),
        }
    }

    /// `GET sys/health`, reporting standby, sealed and uninitialized states instead of failing.
    pub async fn health(&self) -> Result<HealthStatus> {
        let path = "sys/health";
        let url = self.url_for(path)?;
        let response = self
            .decorate(self.http.get(url), None)
            .query(&[("standbyok", "true"), ("perfstandbyok", "true")])
            .send()
            .await
            .map_err(|e| VaultError::transport(path, None, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| VaultError::transport(path, Some(status), e.to_string()))?;

        if !HEALTH_STATUSES.contains(&status) {
            return Err(VaultError::from_status(path, status, error_message(&body)));
        }

        let mut health: HealthStatus = serde_json::from_str(&body).map_err(|e| VaultError::Serialization {
            source: e,
            context: format!("Invalid health response from {}", self.address),
        })?;
        health.status_code = status;
        Ok(health)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&SecretString>,
        body: Option<&Value>,
    ) -> Result<(u16, String)> {
        let url = self.url_for(path)?;
        let mut request = self.decorate(self.http.request(method.clone(), url), token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| VaultError::transport(path, None, e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| VaultError::transport(path, Some(status), e.to_string()))?;

        tracing::debug!(method = %method, path = %path, status, "Vault request completed");
        Ok((status, text))
    }

    fn decorate(&self, mut request: reqwest::RequestBuilder, token: Option<&SecretString>) -> reqwest::RequestBuilder {
        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token.expose_secret());
        }
        if let Some(ttl) = &self.wrap_ttl {
            request = request.header(WRAP_TTL_HEADER, ttl);
        }
        request
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| VaultError::config(format!("Invalid Vault path '{}': {}", path, e)))
    }
}

/// Vault paths are relative to `/v1/`; strip leading slashes.
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn parse_body(path: &str, body: &str) -> Result<Option<VaultResponse>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| VaultError::Serialization { source: e, context: format!("Invalid response from {}", path) })
}
