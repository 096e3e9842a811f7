//! Resolving build parameters end to end through an unwrapped session.

mod common;

use buildvault::auth::CubbyholeAuthentication;
use buildvault::config::{ConnectionSettings, ResolverSettings};
use buildvault::parameters::{ParameterResolver, PasswordReplacer};
use buildvault::resolver::QueryResolver;
use buildvault::secrets::SecretString;
use buildvault::session::{ManualScheduler, SessionManager};
use common::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agent_session(server: &MockServer) -> SessionManager {
    SessionManager::builder(client(server), Arc::new(CubbyholeAuthentication::new(SecretString::new("hvs.wrapping"))))
        .scheduler(Arc::new(ManualScheduler::new()))
        .build()
}

fn params(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[tokio::test]
async fn test_build_parameters_are_resolved_and_masked() {
    let server = MockServer::start().await;
    mount_unwrap(&server, "hvs.wrapping", "hvs.build", "acc-build", 1800).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db"))
        .and(header("X-Vault-Token", "hvs.build"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_body(json!({
            "data": {"username": "app", "password": "s3cr3t"},
            "metadata": {"created_time": "2024-05-01T10:00:00Z", "deletion_time": "", "destroyed": false, "version": 2}
        }))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/database/creds/readonly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_body(json!({
            "username": "v-token-readonly-1",
            "password": "A1a-dynamic"
        }))))
        .expect(1)
        .mount(&server)
        .await;
    mount_revoke_self(&server).await;

    let sink = Arc::new(PasswordReplacer::new());
    let connection = ConnectionSettings { url: server.uri(), expose_env: true, ..Default::default() };
    let resolver = ParameterResolver::new(
        connection,
        ResolverSettings { write_engines_enabled: true, concurrency: 2 },
        sink.clone(),
    );
    let parameters = params(&[
        ("env.DB_URL", "postgres://%vault:/secret/data/db!/username%:%vault:/secret/data/db!/password%@db"),
        ("env.REPORT_USER", "%vault:write:/database/creds/readonly!/username%"),
        ("env.REPORT_PASSWORD", "%vault:write:/database/creds/readonly!/password%"),
        ("plain", "untouched"),
    ]);

    let session = agent_session(&server);
    let outcome = resolver.resolve(&session, &parameters).await.unwrap().into_result(true).unwrap();

    assert_eq!(outcome.parameters["env.DB_URL"], "postgres://app:s3cr3t@db");
    assert_eq!(outcome.parameters["env.REPORT_USER"], "v-token-readonly-1");
    assert_eq!(outcome.parameters["env.REPORT_PASSWORD"], "A1a-dynamic");
    assert_eq!(outcome.parameters["plain"], "untouched");
    assert_eq!(outcome.env["VAULT_TOKEN"].expose_secret(), "hvs.build");

    let log_line = "connecting as app with s3cr3t and A1a-dynamic using hvs.build";
    assert_eq!(sink.replace(log_line), "connecting as ******* with ******* and ******* using *******");

    session.destroy().await;
    assert_eq!(requests_to(&server, "/v1/auth/token/revoke-self").await, 1);
}

#[tokio::test]
async fn test_partial_failure_keeps_other_references() {
    let server = MockServer::start().await;
    mount_secret(&server, "secret/app", json!({"user": "svc"})).await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(&server)
        .await;

    let session = SessionManager::new(
        client(&server),
        Arc::new(buildvault::auth::TokenAuthentication::new(SecretString::new("hvs.static"))),
    );
    let token = session.get_session_token().await.unwrap();
    let resolver = QueryResolver::new(client(&server), ResolverSettings::default());

    let result = resolver
        .resolve_references(["/secret/app!/user", "/secret/app!/password", "/secret/missing!/x"], &token)
        .await;

    assert_eq!(result.value("/secret/app!/user"), Some("svc"));
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors["/secret/app!/password"].to_string().contains("password"));
    assert!(result.errors["/secret/missing!/x"].to_string().contains("Failed to fetch data for path '/secret/missing'"));
    assert_eq!(requests_to(&server, "/v1/secret/app").await, 1);
}
