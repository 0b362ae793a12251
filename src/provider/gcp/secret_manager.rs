//! # GCP Secret Manager REST Client
//!
//! Native REST implementation for the Secret Manager API v1.
//!
//! - `GET  v1/projects/{p}/secrets/{s}`: existence check (metadata only)
//! - `GET  v1/projects/{p}/secrets/{s}/versions/latest`: whether any version exists
//! - `POST v1/projects/{p}/secrets?secretId={s}`: create container, automatic replication
//! - `POST v1/projects/{p}/secrets/{s}:addVersion`: add a base64-encoded payload
//!
//! References:
//! - [Secret Manager REST API v1](https://cloud.google.com/secret-manager/docs/reference/rest)

use super::common::{format_project_path, format_secret_path, OperationTracker};
use super::rest::RestClient;
use crate::error::ProviderError;
use crate::provider::{SecretState, SecretStore};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::de::IgnoredAny;
use serde::Serialize;
use tracing::{debug_span, field, info, info_span, Instrument};

/// Replication configuration for a secret
#[derive(Debug, Serialize)]
struct Replication {
    automatic: AutomaticReplication,
}

/// Replicate to all regions, chosen by Google
#[derive(Debug, Serialize)]
struct AutomaticReplication {}

/// Body of `projects.secrets.create`; the id travels as the `secretId` query parameter
#[derive(Debug, Serialize)]
struct CreateSecretRequest {
    replication: Replication,
}

/// Secret payload; `data` is base64-encoded on the wire
#[derive(Serialize)]
struct SecretPayload {
    data: String,
}

/// Body of `projects.secrets.addVersion`
#[derive(Serialize)]
struct AddVersionRequest {
    payload: SecretPayload,
}

/// Secret Manager client bound to one project
pub struct SecretManagerRest {
    client: RestClient,
    project_id: String,
}

impl std::fmt::Debug for SecretManagerRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretManagerRest")
            .field("project_id", &self.project_id)
            .field("client", &self.client)
            .finish()
    }
}

impl SecretManagerRest {
    #[must_use]
    pub fn new(client: RestClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl SecretStore for SecretManagerRest {
    async fn secret_state(&self, secret_name: &str) -> Result<SecretState, ProviderError> {
        let tracker = OperationTracker::new(debug_span!(
            "gcp.secret.get",
            secret.name = secret_name,
            project.id = %self.project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        ));
        let span = tracker.span().clone();
        let secret_path = format_secret_path(&self.project_id, secret_name);

        let result = async {
            match self.client.get::<IgnoredAny>(&secret_path).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => return Ok(SecretState::Missing),
                Err(e) => return Err(e),
            }

            // `latest` resolves to the newest version; 404 means the container has none
            match self
                .client
                .get::<IgnoredAny>(&format!("{secret_path}/versions/latest"))
                .await
            {
                Ok(_) => Ok(SecretState::Populated),
                Err(e) if e.is_not_found() => Ok(SecretState::Empty),
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }

    async fn create_secret(&self, secret_name: &str) -> Result<(), ProviderError> {
        let tracker = OperationTracker::new(info_span!(
            "gcp.secret.create",
            secret.name = secret_name,
            project.id = %self.project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        ));
        let span = tracker.span().clone();

        let result = async {
            info!("Creating GCP secret: {}", secret_name);
            let request = CreateSecretRequest {
                replication: Replication {
                    automatic: AutomaticReplication {},
                },
            };
            self.client
                .post_with_query::<_, IgnoredAny>(
                    &format!("{}/secrets", format_project_path(&self.project_id)),
                    &[("secretId", secret_name)],
                    &request,
                )
                .await
                .map(|_| ())
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }

    async fn add_secret_version(
        &self,
        secret_name: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        let tracker = OperationTracker::new(info_span!(
            "gcp.secret.add_version",
            secret.name = secret_name,
            project.id = %self.project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        ));
        let span = tracker.span().clone();

        let result = async {
            info!("Adding version to GCP secret: {}", secret_name);
            let request = AddVersionRequest {
                payload: SecretPayload {
                    data: general_purpose::STANDARD.encode(value.as_bytes()),
                },
            };
            self.client
                .post::<_, IgnoredAny>(
                    &format!(
                        "{}:addVersion",
                        format_secret_path(&self.project_id, secret_name)
                    ),
                    &request,
                )
                .await
                .map(|_| ())
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }
}
