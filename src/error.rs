//! # Errors
//!
//! Typed error taxonomy for a deployment run.
//!
//! - [`ProviderError`]: one failed REST call against a Google Cloud API
//! - [`AuthenticationError`]: credentials missing or rejected (fatal, checked first)
//! - [`ProvisioningError`]: service-account or role-binding failure
//! - [`BuildError`]: build submission failure
//! - [`HealthCheckError`]: the deployed service did not answer 200
//! - [`DeployError`]: aggregate returned by a run; always maps to exit code 1

use thiserror::Error;

/// Failure of a single provider API call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API answered with a non-success status
    #[error("{service} API error: {message} (code: {code}, status: {status})")]
    Api {
        service: &'static str,
        code: u16,
        status: String,
        message: String,
    },
    /// The request never produced a response (connect, timeout, TLS)
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The response body could not be decoded
    #[error("failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
}

impl ProviderError {
    /// Build an API error from an HTTP status without an error envelope
    #[must_use]
    pub fn api(service: &'static str, code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            service,
            code,
            status: canonical_status(code).to_string(),
            message: message.into(),
        }
    }

    /// HTTP status code, when the API answered
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.has_status(404, "NOT_FOUND")
    }

    /// The resource already exists
    ///
    /// A 409 carrying another status (`ABORTED` on a concurrent policy
    /// write, for one) is not an existence conflict.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.has_status(409, "ALREADY_EXISTS")
    }

    /// The canonical status decides when the API sent one, the HTTP code otherwise
    fn has_status(&self, http_code: u16, canonical: &str) -> bool {
        match self {
            Self::Api { status, .. } if !status.is_empty() => status == canonical,
            Self::Api { code, .. } => *code == http_code,
            _ => false,
        }
    }

    /// Whether retrying the same idempotent call may succeed
    ///
    /// Transport failures, throttling (429) and server errors (5xx) are transient.
    /// Everything else (bad request, permission denied, not found) is permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { code, .. } => *code == 429 || (500..=599).contains(code),
            Self::Decode { .. } | Self::Authentication(_) => false,
        }
    }
}

/// Map an HTTP status to the google.rpc canonical code name
fn canonical_status(code: u16) -> &'static str {
    match code {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        409 => "ALREADY_EXISTS",
        429 => "RESOURCE_EXHAUSTED",
        503 => "UNAVAILABLE",
        504 => "DEADLINE_EXCEEDED",
        500..=599 => "INTERNAL",
        _ => "UNKNOWN",
    }
}

/// Credential resolution or verification failure
#[derive(Debug, Clone, Error)]
pub enum AuthenticationError {
    /// No credential source produced a token
    #[error("no Google Cloud credentials configured: {0}")]
    NoCredentials(String),
    /// A token was found but the provider refused it
    #[error("credentials rejected by Google Cloud (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    /// The verification call itself failed
    #[error("authentication check failed: {0}")]
    Unavailable(String),
}

/// Service-account step failure
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("failed to create service account {account}: {source}")]
    ServiceAccount {
        account: String,
        #[source]
        source: ProviderError,
    },
    #[error("failed to bind roles to {member}: {source}")]
    RoleBinding {
        member: String,
        #[source]
        source: ProviderError,
    },
}

/// Build submission failure
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to submit build for {image}: {source}")]
    Submission {
        image: String,
        #[source]
        source: ProviderError,
    },
}

/// Health check failure
#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("health check returned HTTP {status}")]
    UnexpectedStatus { status: u16 },
    #[error("health check request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Invalid command-line input
#[derive(Debug, Clone, Error)]
#[error("invalid {field} '{value}': {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub reason: &'static str,
}

/// Everything that can end a run unsuccessfully
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("failed to initialize {client} client: {message}")]
    ClientInit {
        client: &'static str,
        message: String,
    },
}

impl DeployError {
    /// Process exit status for this failure
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        1
    }
}
