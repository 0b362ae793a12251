//! # Configuration
//!
//! [`DeploymentConfig`] describes *what* is deployed and is validated once at
//! startup. [`RuntimeSettings`] describes *how* the tool talks to Google Cloud
//! (endpoints, timeouts, retries, health-check delay).
//!
//! Both are built from command-line flags (with environment fallbacks), never
//! from files.

use crate::constants::{
    CLOUD_BUILD_ENDPOINT, DEFAULT_API_TIMEOUT_SECS, DEFAULT_DB_INSTANCE_NAME, DEFAULT_DOCKERFILE,
    DEFAULT_HEALTH_CHECK_DELAY_SECS, DEFAULT_HEALTH_CHECK_TIMEOUT_SECS, DEFAULT_REGION,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_SERVICE_ACCOUNT, DEFAULT_SERVICE_NAME, IAM_ENDPOINT, RESOURCE_MANAGER_ENDPOINT,
    SECRET_MANAGER_ENDPOINT,
};
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

// GCP project ids and service account ids share the same shape:
// 6-30 chars, lowercase letters/digits/hyphens, starts with a letter, no trailing hyphen.
// https://cloud.google.com/resource-manager/docs/creating-managing-projects
static PROJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$").expect("valid regex"));

static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+(-[a-z]+)+[0-9]+$").expect("valid regex"));

// Cloud Run service names: lowercase letters, digits, hyphens; start with a letter; max 49 chars
static SERVICE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]([a-z0-9-]{0,47}[a-z0-9])?$").expect("valid regex"));

// Cloud SQL instance names: lowercase letters, digits, hyphens; start with a letter; max 98 chars
static DB_INSTANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]([a-z0-9-]{0,96}[a-z0-9])?$").expect("valid regex"));

/// Immutable description of the deployment target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    project_id: String,
    region: String,
    service_name: String,
    db_instance_name: String,
    service_account: String,
}

impl DeploymentConfig {
    /// Validate and build a configuration
    ///
    /// # Errors
    /// Returns [`ConfigError`] naming the first field that does not satisfy
    /// Google Cloud's naming rules.
    pub fn new(
        project_id: impl Into<String>,
        region: impl Into<String>,
        service_name: impl Into<String>,
        db_instance_name: impl Into<String>,
        service_account: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            project_id: project_id.into(),
            region: region.into(),
            service_name: service_name.into(),
            db_instance_name: db_instance_name.into(),
            service_account: service_account.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration with every QiTlalli default except the project
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `project_id` is not a valid GCP project id.
    pub fn for_project(project_id: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(
            project_id,
            DEFAULT_REGION,
            DEFAULT_SERVICE_NAME,
            DEFAULT_DB_INSTANCE_NAME,
            DEFAULT_SERVICE_ACCOUNT,
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        const ACCOUNT_ID_RULE: &str = "must be 6-30 lowercase letters, digits or hyphens, \
            start with a letter and not end with a hyphen";

        check(
            &PROJECT_ID_RE,
            "project id",
            &self.project_id,
            ACCOUNT_ID_RULE,
        )?;
        check(
            &REGION_RE,
            "region",
            &self.region,
            "must look like 'us-central1'",
        )?;
        check(
            &SERVICE_NAME_RE,
            "service name",
            &self.service_name,
            "must be at most 49 lowercase letters, digits or hyphens and start with a letter",
        )?;
        check(
            &DB_INSTANCE_RE,
            "database instance name",
            &self.db_instance_name,
            "must be lowercase letters, digits or hyphens and start with a letter",
        )?;
        check(
            &PROJECT_ID_RE,
            "service account",
            &self.service_account,
            ACCOUNT_ID_RULE,
        )
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn db_instance_name(&self) -> &str {
        &self.db_instance_name
    }

    #[must_use]
    pub fn service_account(&self) -> &str {
        &self.service_account
    }

    /// Email of the workload service account
    #[must_use]
    pub fn service_account_email(&self) -> String {
        format!(
            "{}@{}.iam.gserviceaccount.com",
            self.service_account, self.project_id
        )
    }

    /// Container image produced by the build
    #[must_use]
    pub fn image_tag(&self) -> String {
        format!("gcr.io/{}/{}:latest", self.project_id, self.service_name)
    }
}

fn check(
    re: &Regex,
    field: &'static str,
    value: &str,
    reason: &'static str,
) -> Result<(), ConfigError> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError {
            field,
            value: value.to_string(),
            reason,
        })
    }
}

/// Base URLs of the Google Cloud APIs
///
/// Overridable so the tool can target emulators or contract-test mock servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub secret_manager: String,
    pub cloud_build: String,
    pub iam: String,
    pub resource_manager: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            secret_manager: SECRET_MANAGER_ENDPOINT.to_string(),
            cloud_build: CLOUD_BUILD_ENDPOINT.to_string(),
            iam: IAM_ENDPOINT.to_string(),
            resource_manager: RESOURCE_MANAGER_ENDPOINT.to_string(),
        }
    }
}

/// Transport and pacing settings for one run
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub endpoints: Endpoints,
    /// Timeout applied to every provider API request
    pub api_timeout: Duration,
    /// Wait before probing the deployed service
    pub health_check_delay: Duration,
    /// Timeout of the health check request
    pub health_check_timeout: Duration,
    /// Retry policy for idempotent provider calls
    pub retry: RetryPolicy,
    /// Dockerfile path passed to the docker build step
    pub dockerfile: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            health_check_delay: Duration::from_secs(DEFAULT_HEALTH_CHECK_DELAY_SECS),
            health_check_timeout: Duration::from_secs(DEFAULT_HEALTH_CHECK_TIMEOUT_SECS),
            retry: RetryPolicy::new(
                DEFAULT_RETRY_MAX_ATTEMPTS,
                Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
                Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            ),
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
        }
    }
}
