//! # Google Cloud Credentials
//!
//! Resolves an OAuth2 access token once per run, trying in order:
//!
//! 1. an explicit token (`--access-token` / `GOOGLE_OAUTH_ACCESS_TOKEN`)
//! 2. `gcloud auth print-access-token`, when `gcloud` is on `PATH`
//! 3. the GCE/GKE metadata server (Workload Identity, default service account)
//!
//! [`ResourceManagerAuthChecker`] proves the token works by reading the target
//! project from Cloud Resource Manager.

use super::common::format_project_path;
use super::rest::RestClient;
use crate::constants::{DEFAULT_API_TIMEOUT_SECS, METADATA_TOKEN_TIMEOUT_SECS, METADATA_TOKEN_URL};
use crate::error::{AuthenticationError, ProviderError};
use crate::provider::CredentialChecker;
use crate::retry::{retry_transient, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// OAuth2 access token response from the metadata server
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Lazily resolved, cached bearer token
pub struct GcpCredentials {
    explicit_token: Option<Zeroizing<String>>,
    /// Upper bound on `gcloud auth print-access-token`
    command_timeout: Duration,
    token: OnceCell<Result<Zeroizing<String>, AuthenticationError>>,
}

impl std::fmt::Debug for GcpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpCredentials")
            .field("explicit_token", &self.explicit_token.is_some())
            .field("command_timeout", &self.command_timeout)
            .field("resolved", &self.token.initialized())
            .finish()
    }
}

impl GcpCredentials {
    /// Discover credentials from the environment on first use
    #[must_use]
    pub fn discover(explicit_token: Option<String>) -> Self {
        Self {
            explicit_token: explicit_token
                .filter(|t| !t.trim().is_empty())
                .map(Zeroizing::new),
            command_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            token: OnceCell::new(),
        }
    }

    /// Give up on the gcloud CLI after `timeout` and fall through to the metadata server
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Use a fixed token and skip discovery
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::discover(Some(token.into()))
    }

    /// Bearer token for Google API calls
    ///
    /// # Errors
    /// Returns [`AuthenticationError::NoCredentials`] if no source yields a token.
    pub async fn access_token(&self) -> Result<Zeroizing<String>, AuthenticationError> {
        self.token.get_or_init(|| self.resolve()).await.clone()
    }

    async fn resolve(&self) -> Result<Zeroizing<String>, AuthenticationError> {
        if let Some(token) = &self.explicit_token {
            debug!("Using explicitly configured access token");
            return Ok(token.clone());
        }

        if let Some(token) = gcloud_access_token(self.command_timeout).await {
            info!("Using access token from gcloud CLI");
            return Ok(token);
        }

        if let Some(token) = metadata_server_token().await {
            info!("Using access token from metadata server (Workload Identity)");
            return Ok(token);
        }

        Err(AuthenticationError::NoCredentials(
            concat!(
                "run `gcloud auth login`, set GOOGLE_OAUTH_ACCESS_TOKEN, ",
                "or run on GCE/GKE with a service account"
            )
            .to_string(),
        ))
    }
}

async fn gcloud_access_token(timeout: Duration) -> Option<Zeroizing<String>> {
    let gcloud = match which::which("gcloud") {
        Ok(path) => path,
        Err(e) => {
            debug!("gcloud not found on PATH: {}", e);
            return None;
        }
    };

    token_from_command(&gcloud, &["auth", "print-access-token"], timeout).await
}

/// Run a token-printing command and take its trimmed stdout
///
/// The child is killed if it outlives `timeout`, e.g. gcloud waiting on an
/// interactive reauthentication prompt.
async fn token_from_command(
    program: &Path,
    args: &[&str],
    timeout: Duration,
) -> Option<Zeroizing<String>> {
    let run = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("Failed to run {}: {}", program.display(), e);
            return None;
        }
        Err(_) => {
            debug!(
                "{} did not finish within {}ms",
                program.display(),
                timeout.as_millis()
            );
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let token = Zeroizing::new(String::from_utf8_lossy(&output.stdout).trim().to_string());
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

async fn metadata_server_token() -> Option<Zeroizing<String>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(METADATA_TOKEN_TIMEOUT_SECS))
        .build()
        .ok()?;

    match client
        .get(METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => {
            match response.json::<TokenResponse>().await {
                Ok(token) => Some(Zeroizing::new(token.access_token)),
                Err(e) => {
                    debug!("Failed to parse token response from metadata server: {}", e);
                    None
                }
            }
        }
        Ok(response) => {
            debug!("Metadata server returned status {}", response.status());
            None
        }
        Err(e) => {
            debug!("Metadata server not available: {}", e);
            None
        }
    }
}

/// Verifies credentials with `GET v1/projects/{project}` on Cloud Resource Manager
#[derive(Debug)]
pub struct ResourceManagerAuthChecker {
    client: RestClient,
    retry: RetryPolicy,
}

impl ResourceManagerAuthChecker {
    #[must_use]
    pub fn new(client: RestClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl CredentialChecker for ResourceManagerAuthChecker {
    async fn verify(&self, project_id: &str) -> Result<(), AuthenticationError> {
        let path = format_project_path(project_id);
        let path = path.as_str();
        let client = &self.client;
        let result = retry_transient(&self.retry, "verify project access", move || {
            client.get::<IgnoredAny>(path)
        })
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(ProviderError::Authentication(e)) => Err(e),
            Err(ProviderError::Api {
                code: code @ (401 | 403),
                message,
                ..
            }) => Err(AuthenticationError::Rejected {
                status: code,
                message,
            }),
            Err(e) => Err(AuthenticationError::Unavailable(e.to_string())),
        }
    }
}
