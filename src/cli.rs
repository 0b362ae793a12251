//! # Command Line
//!
//! ```bash
//! # One-time environment setup: service account, IAM roles, secrets
//! qitlalli-deploy --project-id qitlalli-prod --action setup
//!
//! # Create any secrets that are missing
//! qitlalli-deploy --project-id qitlalli-prod --action secrets
//!
//! # Submit the container build and check the service
//! qitlalli-deploy --project-id qitlalli-prod
//! ```
//!
//! Every flag can also be set through the environment variable shown in `--help`.

use crate::config::{DeploymentConfig, Endpoints, RuntimeSettings};
use crate::constants::{
    CLOUD_BUILD_ENDPOINT, DEFAULT_API_TIMEOUT_SECS, DEFAULT_DB_INSTANCE_NAME, DEFAULT_DOCKERFILE,
    DEFAULT_HEALTH_CHECK_DELAY_SECS, DEFAULT_HEALTH_CHECK_TIMEOUT_SECS, DEFAULT_REGION,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_SERVICE_ACCOUNT, DEFAULT_SERVICE_NAME, IAM_ENDPOINT, RESOURCE_MANAGER_ENDPOINT,
    SECRET_MANAGER_ENDPOINT,
};
use crate::error::ConfigError;
use crate::observability::LogFormat;
use crate::orchestrator::Action;
use crate::retry::RetryPolicy;
use clap::Parser;
use std::time::Duration;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// QiTlalli deployment orchestrator for Google Cloud
#[derive(Debug, Parser)]
#[command(name = "qitlalli-deploy", version, long_version = LONG_VERSION)]
#[command(
    about = "Provision secrets, service accounts and container builds for QiTlalli on Google Cloud",
    long_about = None,
    after_help = "\
Actions:
  setup    create the service account, bind its roles, create secrets
  secrets  create missing secrets only
  deploy   submit the container build, then health-check the service

Examples:
  qitlalli-deploy --project-id qitlalli-prod --action setup
  qitlalli-deploy --project-id qitlalli-prod
"
)]
pub struct Cli {
    /// Google Cloud project id
    #[arg(long, env = "GCP_PROJECT_ID")]
    pub project_id: String,

    /// Google Cloud region
    #[arg(long, env = "GCP_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// What to do
    #[arg(long, env = "QITLALLI_ACTION", value_enum, default_value_t = Action::Deploy)]
    pub action: Action,

    /// Cloud Run service name
    #[arg(long, env = "QITLALLI_SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// Cloud SQL instance name
    #[arg(long, env = "QITLALLI_DB_INSTANCE", default_value = DEFAULT_DB_INSTANCE_NAME)]
    pub db_instance: String,

    /// Workload service account id (the part before '@')
    #[arg(long, env = "QITLALLI_SERVICE_ACCOUNT", default_value = DEFAULT_SERVICE_ACCOUNT)]
    pub service_account: String,

    /// Dockerfile used by the container build
    #[arg(long, env = "QITLALLI_DOCKERFILE", default_value = DEFAULT_DOCKERFILE)]
    pub dockerfile: String,

    /// OAuth2 access token; skips gcloud and metadata-server discovery
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Timeout for each Google Cloud API request, in seconds
    #[arg(long, env = "QITLALLI_API_TIMEOUT_SECS", default_value_t = DEFAULT_API_TIMEOUT_SECS)]
    pub api_timeout_secs: u64,

    /// Wait before the health check, in seconds
    #[arg(
        long,
        env = "QITLALLI_HEALTH_CHECK_DELAY_SECS",
        default_value_t = DEFAULT_HEALTH_CHECK_DELAY_SECS
    )]
    pub health_check_delay_secs: u64,

    /// Timeout of the health check request, in seconds
    #[arg(
        long,
        env = "QITLALLI_HEALTH_CHECK_TIMEOUT_SECS",
        default_value_t = DEFAULT_HEALTH_CHECK_TIMEOUT_SECS
    )]
    pub health_check_timeout_secs: u64,

    /// Attempts for idempotent API calls that fail transiently (1 disables retries)
    #[arg(long, env = "QITLALLI_RETRY_MAX_ATTEMPTS", default_value_t = DEFAULT_RETRY_MAX_ATTEMPTS)]
    pub retry_max_attempts: u32,

    /// Log output format
    #[arg(long, env = "QITLALLI_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(
        long,
        env = "SECRET_MANAGER_ENDPOINT",
        default_value = SECRET_MANAGER_ENDPOINT,
        hide = true
    )]
    pub secret_manager_endpoint: String,

    #[arg(
        long,
        env = "CLOUD_BUILD_ENDPOINT",
        default_value = CLOUD_BUILD_ENDPOINT,
        hide = true
    )]
    pub cloud_build_endpoint: String,

    #[arg(long, env = "IAM_ENDPOINT", default_value = IAM_ENDPOINT, hide = true)]
    pub iam_endpoint: String,

    #[arg(
        long,
        env = "RESOURCE_MANAGER_ENDPOINT",
        default_value = RESOURCE_MANAGER_ENDPOINT,
        hide = true
    )]
    pub resource_manager_endpoint: String,
}

/// Validated inputs for one run
#[derive(Debug)]
pub struct Invocation {
    pub config: DeploymentConfig,
    pub settings: RuntimeSettings,
    pub action: Action,
    pub log_format: LogFormat,
    pub access_token: Option<String>,
}

impl Cli {
    /// Validate the arguments and split them into run inputs
    ///
    /// # Errors
    /// Returns [`ConfigError`] for the first identifier that fails validation.
    pub fn into_invocation(self) -> Result<Invocation, ConfigError> {
        let config = DeploymentConfig::new(
            self.project_id,
            self.region,
            self.service_name,
            self.db_instance,
            self.service_account,
        )?;

        let settings = RuntimeSettings {
            endpoints: Endpoints {
                secret_manager: self.secret_manager_endpoint,
                cloud_build: self.cloud_build_endpoint,
                iam: self.iam_endpoint,
                resource_manager: self.resource_manager_endpoint,
            },
            api_timeout: Duration::from_secs(self.api_timeout_secs),
            health_check_delay: Duration::from_secs(self.health_check_delay_secs),
            health_check_timeout: Duration::from_secs(self.health_check_timeout_secs),
            retry: RetryPolicy::new(
                self.retry_max_attempts,
                Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
                Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            ),
            dockerfile: self.dockerfile,
        };

        Ok(Invocation {
            config,
            settings,
            action: self.action,
            log_format: self.log_format,
            access_token: self.access_token,
        })
    }
}
