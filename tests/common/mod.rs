//! Common test utilities for all integration tests.
//!
//! Mock Vault endpoints built on wiremock, plus settings pointing at them.

#![allow(dead_code)]

use buildvault::config::{AuthSettings, ConnectionSettings};
use buildvault::secrets::SecretString;
use buildvault::vault::{RetryPolicy, VaultHttpClient};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ROLE_ID: &str = "build-role";
pub const SECRET_ID: &str = "build-secret";

/// Retry policy without delays so failing tests stay fast
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(max_attempts, Duration::ZERO)
}

pub fn client(server: &MockServer) -> VaultHttpClient {
    VaultHttpClient::new(&server.uri(), None).unwrap().with_retry(fast_retry(3))
}

pub fn approle_settings(server: &MockServer) -> ConnectionSettings {
    ConnectionSettings {
        url: server.uri(),
        auth: AuthSettings::AppRole {
            endpoint: "approle".to_string(),
            role_id: ROLE_ID.to_string(),
            secret_id: SecretString::new(SECRET_ID),
        },
        ..Default::default()
    }
}

pub fn auth_body(token: &str, accessor: &str, renewable: bool, lease: u64) -> Value {
    json!({
        "auth": {
            "client_token": token,
            "accessor": accessor,
            "renewable": renewable,
            "lease_duration": lease,
            "policies": ["default", "build"]
        }
    })
}

pub fn secret_body(data: Value) -> Value {
    json!({ "request_id": "req-1", "lease_duration": 0, "renewable": false, "data": data })
}

/// `POST auth/approle/login` answering with a plain token
pub async fn mount_approle_login(server: &MockServer, token: &str, accessor: &str, lease: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(body_json(json!({"role_id": ROLE_ID, "secret_id": SECRET_ID})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(token, accessor, true, lease)))
        .mount(server)
        .await;
}

/// `POST auth/approle/login` with a wrap TTL header, answering with a wrap envelope
pub async fn mount_wrapped_login(server: &MockServer, wrapping_token: &str, accessor: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(header("X-Vault-Wrap-TTL", "10m"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wrap_info": {
                "token": wrapping_token,
                "accessor": "wrapping-accessor",
                "ttl": 600,
                "creation_time": "2024-01-01T00:00:00Z",
                "creation_path": "auth/approle/login",
                "wrapped_accessor": accessor
            }
        })))
        .mount(server)
        .await;
}

/// `POST sys/wrapping/unwrap` answering once with `token`
pub async fn mount_unwrap(server: &MockServer, wrapping_token: &str, token: &str, accessor: &str, lease: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .and(header("X-Vault-Token", wrapping_token))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body(token, accessor, true, lease)))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// `GET <secret_path>` answering with `data`
pub async fn mount_secret(server: &MockServer, secret_path: &str, data: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", secret_path.trim_start_matches('/'))))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_body(data)))
        .mount(server)
        .await;
}

/// `POST auth/token/revoke-self` accepting any token
pub async fn mount_revoke_self(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-self"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

/// Number of received requests whose path equals `request_path`
pub async fn requests_to(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .count()
}
