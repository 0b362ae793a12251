//! # Constants
//!
//! Shared constants used throughout the deployment tool.
//!
//! These values represent the QiTlalli defaults and can be overridden via
//! command-line flags or environment variables where applicable.

/// Default GCP region
pub const DEFAULT_REGION: &str = "us-central1";

/// Default Cloud Run service name
pub const DEFAULT_SERVICE_NAME: &str = "qitlalli-odoo";

/// Default Cloud SQL instance name
pub const DEFAULT_DB_INSTANCE_NAME: &str = "qitlalli-db";

/// Default service account id (the part before `@`)
pub const DEFAULT_SERVICE_ACCOUNT: &str = "qitlalli-service-account";

/// Dockerfile used by the Cloud Build docker step, relative to the build context
pub const DEFAULT_DOCKERFILE: &str = "gcp/Dockerfile";

/// Builder image for both the build and push steps
pub const DOCKER_BUILDER_IMAGE: &str = "gcr.io/cloud-builders/docker";

/// Path checked on the deployed service
pub const HEALTH_CHECK_PATH: &str = "/web/health";

/// Default delay before the health check, giving the service time to become ready (seconds)
pub const DEFAULT_HEALTH_CHECK_DELAY_SECS: u64 = 30;

/// Default timeout of the health check request (seconds)
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 30;

/// Default timeout applied to every provider API request (seconds)
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts for idempotent provider calls
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// First retry delay (milliseconds)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound on a single retry delay (milliseconds)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8_000;

/// Timeout for the GCE/GKE metadata server token request (seconds)
pub const METADATA_TOKEN_TIMEOUT_SECS: u64 = 3;

/// Value stored for secrets that must be filled in by an operator
pub const PLACEHOLDER_SECRET_VALUE: &str = "PLACEHOLDER-UPDATE-MANUALLY";

/// Characters used for generated passwords and tokens
pub const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

/// Project roles granted to the workload service account
pub const SERVICE_ACCOUNT_ROLES: [&str; 5] = [
    "roles/secretmanager.secretAccessor",
    "roles/cloudsql.client",
    "roles/logging.logWriter",
    "roles/monitoring.metricWriter",
    "roles/run.invoker",
];

/// IAM policy version requested on read; the only one that carries conditions
pub const IAM_POLICY_VERSION: i64 = 3;

/// Production API endpoints
pub const SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com";
pub const CLOUD_BUILD_ENDPOINT: &str = "https://cloudbuild.googleapis.com";
pub const IAM_ENDPOINT: &str = "https://iam.googleapis.com";
pub const RESOURCE_MANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";

/// Metadata server token endpoint (Workload Identity / GCE default service account)
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
