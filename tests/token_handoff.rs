//! Server issues a wrapped token, an agent unwraps it once, the server revokes it by accessor.

mod common;

use buildvault::auth::{build_authentication, ClientAuthentication, CubbyholeAuthentication};
use buildvault::config::{AuthSettings, ConnectionSettings};
use buildvault::errors::{AuthErrorKind, VaultError};
use buildvault::handoff::{RevokeTarget, TokenHandoff, TokenLeases};
use buildvault::session::{ManualScheduler, SessionManager};
use common::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn handoff() -> TokenHandoff {
    TokenHandoff::new(fast_retry(2), "10m")
}

#[tokio::test]
async fn test_wrapped_token_round_trip() {
    let server = MockServer::start().await;
    mount_wrapped_login(&server, "hvs.wrapping", "acc-build").await;
    mount_approle_login(&server, "hvs.server", "acc-server", 600).await;
    mount_unwrap(&server, "hvs.wrapping", "hvs.build", "acc-build", 1800).await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-accessor"))
        .and(header("X-Vault-Token", "hvs.server"))
        .and(body_json(json!({"accessor": "acc-build"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_revoke_self(&server).await;

    let settings = approle_settings(&server);
    let leased = handoff().issue_for_build(&settings).await;
    assert!(!leased.is_failed());
    assert_eq!(leased.accessor, "acc-build");

    // The agent only sees the property map
    let properties: BTreeMap<String, String> = leased.agent_settings().to_properties();
    let agent_settings = ConnectionSettings::from_properties(&properties).unwrap();
    assert!(matches!(agent_settings.auth, AuthSettings::Wrapped { .. }));

    let session = SessionManager::builder(client(&server), build_authentication(&agent_settings.auth))
        .scheduler(Arc::new(ManualScheduler::new()))
        .build();
    let token = session.get_session_token().await.unwrap();
    assert_eq!(token.secret().expose_secret(), "hvs.build");
    assert_eq!(token.accessor(), Some("acc-build"));

    let leases = TokenLeases::new();
    leases.register("build-42", RevokeTarget::Wrapped(leased));
    assert!(leases.revoke_build(&handoff(), "build-42").await);
    assert!(leases.is_empty());
}

#[tokio::test]
async fn test_wrapped_token_unwraps_only_once() {
    let server = MockServer::start().await;
    mount_unwrap(&server, "hvs.wrapping", "hvs.build", "acc-build", 1800).await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"errors": ["wrapping token is not valid or does not exist"]})))
        .mount(&server)
        .await;

    let vault = client(&server);

    let first = CubbyholeAuthentication::new(buildvault::SecretString::new("hvs.wrapping"));
    assert!(first.login(&vault).await.is_ok());
    assert!(first.is_consumed());
    let local = first.login(&vault).await.unwrap_err();
    assert!(matches!(local, VaultError::Auth { kind: AuthErrorKind::AlreadyUnwrapped, .. }));

    // A second holder of the same envelope is rejected by Vault
    let replay = CubbyholeAuthentication::new(buildvault::SecretString::new("hvs.wrapping"));
    let remote = replay.login(&vault).await.unwrap_err();
    assert!(matches!(remote, VaultError::Auth { kind: AuthErrorKind::AlreadyUnwrapped, .. }));

    assert_eq!(requests_to(&server, "/v1/sys/wrapping/unwrap").await, 2);
}

#[tokio::test]
async fn test_failed_issue_yields_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"errors": ["invalid role ID"]})))
        .mount(&server)
        .await;

    let leased = handoff().issue_for_build(&approle_settings(&server)).await;
    assert!(leased.is_failed());

    // Nothing was issued, so revocation is a no-op
    assert!(handoff().revoke_by_accessor(&leased).await);
    assert_eq!(requests_to(&server, "/v1/auth/token/revoke-accessor").await, 0);
}

#[tokio::test]
async fn test_revoke_of_expired_accessor_is_settled() {
    let server = MockServer::start().await;
    mount_wrapped_login(&server, "hvs.wrapping", "acc-gone").await;
    mount_approle_login(&server, "hvs.server", "acc-server", 600).await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-accessor"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"errors": ["1 error occurred:\n\t* invalid accessor\n\n"]})))
        .mount(&server)
        .await;
    mount_revoke_self(&server).await;

    let handoff = handoff();
    let leased = handoff.issue_for_build(&approle_settings(&server)).await;

    assert!(handoff.revoke(RevokeTarget::Wrapped(leased), false).await);
    assert_eq!(requests_to(&server, "/v1/auth/token/revoke-self").await, 1);
}

#[tokio::test]
async fn test_server_outage_during_revoke_reports_failure() {
    let server = MockServer::start().await;
    mount_wrapped_login(&server, "hvs.wrapping", "acc-build").await;
    mount_approle_login(&server, "hvs.server", "acc-server", 600).await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-accessor"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"errors": ["Vault is sealed"]})))
        .mount(&server)
        .await;
    mount_revoke_self(&server).await;

    let handoff = handoff();
    let leased = handoff.issue_for_build(&approle_settings(&server)).await;

    assert!(!handoff.revoke_by_accessor(&leased).await);
    // Retried under the policy before giving up
    assert_eq!(requests_to(&server, "/v1/auth/token/revoke-accessor").await, 2);
}
