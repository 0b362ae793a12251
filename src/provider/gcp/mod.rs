//! # Google Cloud Providers
//!
//! REST implementations of the provider capabilities:
//!
//! - [`SecretManagerRest`]: Secret Manager v1
//! - [`CloudBuildRest`]: Cloud Build v1
//! - [`IamRest`]: IAM v1 and Resource Manager v1 IAM policies
//! - [`ResourceManagerAuthChecker`]: credential verification
//!
//! All clients share one lazily resolved [`GcpCredentials`] token.

pub mod auth;
pub mod cloud_build;
pub mod common;
pub mod iam;
pub mod rest;
pub mod secret_manager;

pub use auth::{GcpCredentials, ResourceManagerAuthChecker};
pub use cloud_build::CloudBuildRest;
pub use iam::IamRest;
pub use rest::RestClient;
pub use secret_manager::SecretManagerRest;

use crate::config::{DeploymentConfig, RuntimeSettings};
use crate::error::{DeployError, ProviderError};
use crate::orchestrator::ProviderClients;
use crate::provider::health::HttpHealthChecker;
use std::sync::Arc;

/// Wire every production client for one project
///
/// # Errors
/// Returns [`DeployError::ClientInit`] if an HTTP client cannot be built.
pub fn clients(
    config: &DeploymentConfig,
    settings: &RuntimeSettings,
    credentials: Arc<GcpCredentials>,
) -> Result<ProviderClients, DeployError> {
    let rest = |service: &'static str, base_url: &str| {
        RestClient::new(service, base_url, Arc::clone(&credentials), settings.api_timeout)
            .map_err(|e: ProviderError| DeployError::ClientInit {
                client: service,
                message: e.to_string(),
            })
    };
    let endpoints = &settings.endpoints;
    let project_id = config.project_id();

    let health =
        HttpHealthChecker::new(settings.health_check_timeout).map_err(|e| DeployError::ClientInit {
            client: "health",
            message: e.to_string(),
        })?;

    Ok(ProviderClients {
        credentials: Arc::new(ResourceManagerAuthChecker::new(
            rest("cloudresourcemanager", &endpoints.resource_manager)?,
            settings.retry.clone(),
        )),
        secrets: Arc::new(SecretManagerRest::new(
            rest("secretmanager", &endpoints.secret_manager)?,
            project_id,
        )),
        iam: Arc::new(IamRest::new(
            rest("iam", &endpoints.iam)?,
            rest("cloudresourcemanager", &endpoints.resource_manager)?,
            project_id,
        )),
        builds: Arc::new(CloudBuildRest::new(
            rest("cloudbuild", &endpoints.cloud_build)?,
            project_id,
        )),
        health: Arc::new(health),
    })
}
