//! Pact contract tests for the Secret Manager REST client
//!
//! Each test drives `SecretManagerRest` against a Pact mock server, so the
//! recorded contract is exactly what the client sends and understands.

mod common;

use common::{init_rustls, mock_base_url, mock_rest_client, PROJECT_ID};
use pact_consumer::prelude::*;
use qitlalli_deploy::provider::gcp::SecretManagerRest;
use qitlalli_deploy::provider::{SecretState, SecretStore};
use serde_json::json;

const CONSUMER: &str = "QiTlalli-Deploy";
const PROVIDER: &str = "GCP-Secret-Manager";

fn secret_manager(base_url: &str) -> SecretManagerRest {
    SecretManagerRest::new(mock_rest_client("secretmanager", base_url), PROJECT_ID)
}

const DB_SECRET_PATH: &str = "/v1/projects/qitlalli-prod/secrets/qitlalli-db-password";

fn secret_body(name: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/123456789/secrets/{name}"),
        "replication": { "automatic": {} },
        "createTime": "2025-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn test_populated_secret_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder
        .interaction("get an existing secret", "", |mut i| {
            i.given("the secret qitlalli-db-password exists with a version");
            i.request
                .method("GET")
                .path(DB_SECRET_PATH.to_string())
                .header("authorization", "Bearer test-token");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(secret_body("qitlalli-db-password"));
            i
        })
        .interaction("get the latest version of a populated secret", "", |mut i| {
            i.given("the secret qitlalli-db-password exists with a version");
            i.request
                .method("GET")
                .path(format!("{DB_SECRET_PATH}/versions/latest"))
                .header("authorization", "Bearer test-token");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "name": "projects/123456789/secrets/qitlalli-db-password/versions/1",
                    "state": "ENABLED",
                    "createTime": "2025-01-01T00:00:00Z"
                }));
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let store = secret_manager(&mock_base_url(&mock_server.url()));

    let state = store.secret_state("qitlalli-db-password").await.unwrap();
    assert_eq!(state, SecretState::Populated);
}

#[tokio::test]
async fn test_secret_without_versions_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder
        .interaction("get a secret whose first write failed", "", |mut i| {
            i.given("the secret qitlalli-db-password exists without versions");
            i.request
                .method("GET")
                .path(DB_SECRET_PATH.to_string())
                .header("authorization", "Bearer test-token");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(secret_body("qitlalli-db-password"));
            i
        })
        .interaction("get the latest version of an empty secret", "", |mut i| {
            i.given("the secret qitlalli-db-password exists without versions");
            i.request
                .method("GET")
                .path(format!("{DB_SECRET_PATH}/versions/latest"))
                .header("authorization", "Bearer test-token");
            i.response
                .status(404)
                .header("content-type", "application/json")
                .json_body(json!({
                    "error": {
                        "code": 404,
                        "message": concat!(
                            "Secret Version [projects/123456789/secrets/",
                            "qitlalli-db-password/versions/latest] not found."
                        ),
                        "status": "NOT_FOUND"
                    }
                }));
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let store = secret_manager(&mock_base_url(&mock_server.url()));

    let state = store.secret_state("qitlalli-db-password").await.unwrap();
    assert_eq!(state, SecretState::Empty);
}

#[tokio::test]
async fn test_secret_not_found_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("get a secret that does not exist", "", |mut i| {
        i.given("the secret qitlalli-jwt-secret does not exist");
        i.request
            .method("GET")
            .path("/v1/projects/qitlalli-prod/secrets/qitlalli-jwt-secret".to_string())
            .header("authorization", "Bearer test-token");
        i.response
            .status(404)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 404,
                    "message": concat!(
                        "Secret [projects/123456789/secrets/qitlalli-jwt-secret] ",
                        "not found or has no versions."
                    ),
                    "status": "NOT_FOUND"
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let store = secret_manager(&mock_base_url(&mock_server.url()));

    let state = store.secret_state("qitlalli-jwt-secret").await.unwrap();
    assert_eq!(state, SecretState::Missing);
}

#[tokio::test]
async fn test_secret_lookup_permission_denied_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("get a secret without permission", "", |mut i| {
        i.given("the caller lacks secretmanager.secrets.get");
        i.request
            .method("GET")
            .path("/v1/projects/qitlalli-prod/secrets/qitlalli-admin-password".to_string())
            .header("authorization", "Bearer test-token");
        i.response
            .status(403)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 403,
                    "message": "Permission 'secretmanager.secrets.get' denied",
                    "status": "PERMISSION_DENIED"
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let store = secret_manager(&mock_base_url(&mock_server.url()));

    let err = store
        .secret_state("qitlalli-admin-password")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(403));
    assert!(!err.is_transient());
    assert!(err.to_string().contains("PERMISSION_DENIED"));
}

#[tokio::test]
async fn test_create_secret_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("create a secret with automatic replication", "", |mut i| {
        i.given("a GCP project exists");
        i.request
            .method("POST")
            .path("/v1/projects/qitlalli-prod/secrets".to_string())
            .query_param("secretId", "qitlalli-db-password")
            .header("authorization", "Bearer test-token")
            .header("content-type", "application/json")
            .json_body(json!({
                "replication": { "automatic": {} }
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "projects/123456789/secrets/qitlalli-db-password",
                "replication": { "automatic": {} },
                "createTime": "2025-01-01T00:00:00Z"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let store = secret_manager(&mock_base_url(&mock_server.url()));

    store.create_secret("qitlalli-db-password").await.unwrap();
}

#[tokio::test]
async fn test_create_existing_secret_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("create a secret that already exists", "", |mut i| {
        i.given("the secret qitlalli-db-password exists");
        i.request
            .method("POST")
            .path("/v1/projects/qitlalli-prod/secrets".to_string())
            .query_param("secretId", "qitlalli-db-password")
            .header("authorization", "Bearer test-token");
        i.response
            .status(409)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 409,
                    "message": concat!(
                        "Secret [projects/123456789/secrets/qitlalli-db-password] ",
                        "already exists."
                    ),
                    "status": "ALREADY_EXISTS"
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let store = secret_manager(&mock_base_url(&mock_server.url()));

    let err = store.create_secret("qitlalli-db-password").await.unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_add_secret_version_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("add the first version to a secret", "", |mut i| {
        i.given("the secret qitlalli-email-password exists without versions");
        i.request
            .method("POST")
            .path(
                "/v1/projects/qitlalli-prod/secrets/qitlalli-email-password:addVersion"
                    .to_string(),
            )
            .header("authorization", "Bearer test-token")
            .header("content-type", "application/json")
            .json_body(json!({
                "payload": { "data": "UExBQ0VIT0xERVItVVBEQVRFLU1BTlVBTExZ" }
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "projects/123456789/secrets/qitlalli-email-password/versions/1",
                "state": "ENABLED",
                "createTime": "2025-01-01T00:00:00Z"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let store = secret_manager(&mock_base_url(&mock_server.url()));

    store
        .add_secret_version("qitlalli-email-password", "PLACEHOLDER-UPDATE-MANUALLY")
        .await
        .unwrap();
}
