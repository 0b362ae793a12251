//! # Provider Capabilities
//!
//! One trait per external service the orchestrator talks to. The orchestrator
//! only sees these traits, so runs can be exercised against in-memory fakes.
//!
//! - [`CredentialChecker`]: credential discovery and a cheap authenticated read
//! - [`SecretStore`]: secret containers and versions
//! - [`IamAdmin`]: service accounts and project role bindings
//! - [`BuildSubmitter`]: container build submission
//! - [`HealthChecker`]: HTTP check of the deployed service

use crate::build_spec::{BuildSpec, BuildSubmission};
use crate::error::{AuthenticationError, HealthCheckError, ProviderError};
use async_trait::async_trait;

/// Verifies that usable credentials exist for a project
#[async_trait]
pub trait CredentialChecker: Send + Sync {
    /// Resolve credentials and prove they work with a low-cost read of `project_id`
    async fn verify(&self, project_id: &str) -> Result<(), AuthenticationError>;
}

/// What the store holds for one secret name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretState {
    /// No secret container
    Missing,
    /// Container without any version, e.g. left behind by a failed first write
    Empty,
    /// Container with at least one version
    Populated,
}

/// Secret storage with versioned values
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Whether the secret exists and whether it already holds a version
    async fn secret_state(&self, secret_name: &str) -> Result<SecretState, ProviderError>;

    /// Create an empty secret container
    async fn create_secret(&self, secret_name: &str) -> Result<(), ProviderError>;

    /// Add a version holding `value` to an existing secret
    async fn add_secret_version(&self, secret_name: &str, value: &str)
        -> Result<(), ProviderError>;
}

/// Identity and access management for the target project
#[async_trait]
pub trait IamAdmin: Send + Sync {
    /// Create a service account
    /// Returns true if it was created, false if it already existed
    async fn ensure_service_account(
        &self,
        account_id: &str,
        display_name: &str,
    ) -> Result<bool, ProviderError>;

    /// Bind each role to `member` on the project, leaving existing bindings alone
    /// Returns the number of bindings that were added
    async fn grant_project_roles(&self, member: &str, roles: &[&str])
        -> Result<usize, ProviderError>;
}

/// Remote container build service
#[async_trait]
pub trait BuildSubmitter: Send + Sync {
    /// Submit a build without waiting for it to finish
    async fn submit_build(&self, spec: &BuildSpec) -> Result<BuildSubmission, ProviderError>;
}

/// HTTP readiness check
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Single GET of `url`; Ok only for HTTP 200
    async fn check(&self, url: &str) -> Result<(), HealthCheckError>;
}

pub mod gcp;
pub mod health;
