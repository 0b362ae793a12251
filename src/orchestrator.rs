//! # Deployment Orchestrator
//!
//! Sequences provider calls for one action and reports the outcome.
//!
//! | action    | steps                                                          |
//! |-----------|----------------------------------------------------------------|
//! | `setup`   | auth check → service account + roles → secrets                 |
//! | `secrets` | auth check → secrets                                           |
//! | `deploy`  | auth check → build submission → service URL → health check     |
//!
//! Authentication is always checked first and aborts the run. Service-account
//! and build failures abort the run. Individual secret failures are logged and
//! skipped. A failed health check is only a warning; nothing is rolled back.

use crate::build_spec::{BuildSpec, BuildSubmission};
use crate::config::{DeploymentConfig, RuntimeSettings};
use crate::constants::{HEALTH_CHECK_PATH, SERVICE_ACCOUNT_ROLES};
use crate::error::{
    AuthenticationError, BuildError, DeployError, ProviderError, ProvisioningError,
};
use crate::provider::{
    BuildSubmitter, CredentialChecker, HealthChecker, IamAdmin, SecretState, SecretStore,
};
use crate::retry::retry_transient;
use crate::secrets::{SecretEntry, SecretSpec, REQUIRED_SECRETS};
use clap::ValueEnum;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument, Span};

/// What a run does
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Service account, IAM roles and secrets
    Setup,
    /// Build submission and health check
    Deploy,
    /// Secrets only
    Secrets,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Deploy => "deploy",
            Self::Secrets => "secrets",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capabilities one run uses
#[derive(Clone)]
pub struct ProviderClients {
    pub credentials: Arc<dyn CredentialChecker>,
    pub secrets: Arc<dyn SecretStore>,
    pub iam: Arc<dyn IamAdmin>,
    pub builds: Arc<dyn BuildSubmitter>,
    pub health: Arc<dyn HealthChecker>,
}

impl std::fmt::Debug for ProviderClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClients").finish_non_exhaustive()
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    Setup {
        /// Role bindings added this run
        roles_bound: usize,
        /// Secrets newly created this run
        created_secrets: Vec<String>,
    },
    Secrets {
        created_secrets: Vec<String>,
    },
    Deploy {
        submission: BuildSubmission,
        service_url: Option<String>,
        /// `None` when no URL was available to check
        healthy: Option<bool>,
    },
}

/// Conventional Cloud Run URL for a service
#[must_use]
pub fn service_url(service_name: &str, project_id: &str) -> String {
    format!("https://{service_name}-{project_id}.run.app")
}

/// Root span carrying the run's identity; every step logs inside it
#[must_use]
pub fn run_span(config: &DeploymentConfig, action: Action) -> Span {
    info_span!(
        "deploy",
        project.id = %config.project_id(),
        region = %config.region(),
        action = %action,
    )
}

pub struct Orchestrator {
    config: DeploymentConfig,
    settings: RuntimeSettings,
    clients: ProviderClients,
    span: Span,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: DeploymentConfig,
        settings: RuntimeSettings,
        clients: ProviderClients,
        span: Span,
    ) -> Self {
        Self {
            config,
            settings,
            clients,
            span,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Run one action end to end
    ///
    /// # Errors
    /// Authentication failure (before any other step), service-account failure
    /// during `setup`, or build submission failure during `deploy`.
    pub async fn run(&self, action: Action) -> Result<RunReport, DeployError> {
        async {
            self.check_authentication().await?;

            info!(
                "Starting QiTlalli {} for project: {}",
                action,
                self.config.project_id()
            );

            match action {
                Action::Setup => {
                    info!("Setting up GCP environment...");
                    let roles_bound = self.setup_service_account().await?;
                    let created = self.create_secrets().await;
                    info!("Created {} secrets", created.len());
                    Ok(RunReport::Setup {
                        roles_bound,
                        created_secrets: created.into_keys().collect(),
                    })
                }
                Action::Secrets => {
                    let created = self.create_secrets().await;
                    info!("Managed {} secrets", created.len());
                    Ok(RunReport::Secrets {
                        created_secrets: created.into_keys().collect(),
                    })
                }
                Action::Deploy => self.deploy().await,
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn deploy(&self) -> Result<RunReport, DeployError> {
        info!("Starting deployment...");
        let submission = self.build_and_deploy().await?;

        let service_url = self.get_service_url();
        let healthy = match &service_url {
            Some(url) => {
                info!("Service URL: {}", url);
                let healthy = self.run_health_check(url).await;
                if healthy {
                    info!("Deployment completed successfully");
                } else {
                    warn!("Deployment completed but health check failed");
                }
                Some(healthy)
            }
            None => None,
        };

        Ok(RunReport::Deploy {
            submission,
            service_url,
            healthy,
        })
    }

    /// Verify credentials with a cheap authenticated read
    ///
    /// # Errors
    /// [`AuthenticationError::NoCredentials`] when nothing is configured,
    /// otherwise `Rejected` or `Unavailable` from the verification call.
    pub async fn check_authentication(&self) -> Result<(), AuthenticationError> {
        match self
            .clients
            .credentials
            .verify(self.config.project_id())
            .await
        {
            Ok(()) => {
                info!("GCP authentication verified");
                Ok(())
            }
            Err(e @ AuthenticationError::NoCredentials(_)) => {
                error!("Not authenticated with Google Cloud. Run: gcloud auth login ({e})");
                Err(e)
            }
            Err(e) => {
                error!("Authentication check failed: {e}");
                Err(e)
            }
        }
    }

    /// Create every missing required secret
    ///
    /// Returns only the secrets created by this call. Existing secrets are
    /// skipped; a failure on one secret is logged and does not stop the others.
    pub async fn create_secrets(&self) -> BTreeMap<String, SecretEntry> {
        let mut created = BTreeMap::new();

        for spec in &REQUIRED_SECRETS {
            match self.provision_secret(spec).await {
                Ok(Some(entry)) => {
                    if entry.is_placeholder() {
                        warn!(
                            "Secret {} holds a placeholder; replace it with the real value",
                            spec.name
                        );
                    }
                    created.insert(spec.name.to_string(), entry);
                }
                Ok(None) => {}
                Err(e) => error!("Failed to create secret {}: {}", spec.name, e),
            }
        }

        created
    }

    async fn provision_secret(
        &self,
        spec: &SecretSpec,
    ) -> Result<Option<SecretEntry>, ProviderError> {
        let store = &self.clients.secrets;
        let retry = &self.settings.retry;

        let state = retry_transient(retry, "check secret", move || {
            store.secret_state(spec.name)
        })
        .await?;

        match state {
            SecretState::Populated => {
                info!("Secret {} already exists", spec.name);
                return Ok(None);
            }
            SecretState::Empty => {
                warn!(
                    "Secret {} exists without a version; adding its first version",
                    spec.name
                );
            }
            SecretState::Missing => {
                if !self.create_secret_container(spec.name).await? {
                    info!(
                        "Secret {} was created concurrently by another run; leaving it untouched",
                        spec.name
                    );
                    return Ok(None);
                }
            }
        }

        let entry = spec.materialize();
        if let Err(e) = store.add_secret_version(spec.name, entry.value()).await {
            error!(
                "Secret {} was created without a value; the next run adds its first version",
                spec.name
            );
            return Err(e);
        }
        info!("Created secret: {}", spec.name);
        Ok(Some(entry))
    }

    /// Create an empty secret container
    ///
    /// Returns `false` when the first attempt already finds the secret, i.e.
    /// someone else created it between the state check and the create. A 409
    /// on a retry is ours: the previous attempt reached the server before failing.
    async fn create_secret_container(&self, name: &str) -> Result<bool, ProviderError> {
        let store = &self.clients.secrets;
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        retry_transient(&self.settings.retry, "create secret", move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match store.create_secret(name).await {
                    Ok(()) => Ok(true),
                    Err(e) if e.is_already_exists() => Ok(attempt > 1),
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    /// Create the workload service account and bind its project roles
    ///
    /// Returns the number of role bindings added by this call.
    ///
    /// # Errors
    /// [`ProvisioningError`] naming the step that failed.
    pub async fn setup_service_account(&self) -> Result<usize, ProvisioningError> {
        let result = self.provision_service_account().await;
        match &result {
            Ok(_) => info!(
                "Service account setup completed with {} roles",
                SERVICE_ACCOUNT_ROLES.len()
            ),
            Err(e) => error!("Service account setup failed: {e}"),
        }
        result
    }

    async fn provision_service_account(&self) -> Result<usize, ProvisioningError> {
        let iam = &self.clients.iam;
        let retry = &self.settings.retry;
        let account_id = self.config.service_account();
        let email = self.config.service_account_email();

        retry_transient(retry, "create service account", move || {
            iam.ensure_service_account(account_id, "QiTlalli Service Account")
        })
        .await
        .map_err(|source| ProvisioningError::ServiceAccount {
            account: email.clone(),
            source,
        })?;

        let member = format!("serviceAccount:{email}");
        let member_ref = member.as_str();
        retry_transient(retry, "grant project roles", move || {
            iam.grant_project_roles(member_ref, &SERVICE_ACCOUNT_ROLES)
        })
        .await
        .map_err(|source| ProvisioningError::RoleBinding {
            member: member.clone(),
            source,
        })
    }

    /// Submit the container build; does not wait for it or deploy the revision
    ///
    /// # Errors
    /// [`BuildError::Submission`] if Cloud Build rejects or cannot receive the build.
    pub async fn build_and_deploy(&self) -> Result<BuildSubmission, BuildError> {
        let image = self.config.image_tag();
        let spec = BuildSpec::docker_build_and_push(&image, &self.settings.dockerfile);

        info!("Starting Docker build...");
        match self.clients.builds.submit_build(&spec).await {
            Ok(submission) => {
                info!("Docker build submitted successfully");
                if let Some(log_url) = &submission.log_url {
                    info!("Build logs: {}", log_url);
                }
                Ok(submission)
            }
            Err(source) => {
                error!("Build and deployment failed: {source}");
                Err(BuildError::Submission { image, source })
            }
        }
    }

    /// URL of the deployed service, computed from service name and project
    #[must_use]
    pub fn get_service_url(&self) -> Option<String> {
        Some(service_url(
            self.config.service_name(),
            self.config.project_id(),
        ))
    }

    /// Wait for the service to settle, then request `{url}/web/health` once
    pub async fn run_health_check(&self, url: &str) -> bool {
        let delay = self.settings.health_check_delay;
        if !delay.is_zero() {
            info!("Waiting {}s for service to be ready...", delay.as_secs());
            tokio::time::sleep(delay).await;
        }

        let health_url = format!("{}{}", url.trim_end_matches('/'), HEALTH_CHECK_PATH);
        match self.clients.health.check(&health_url).await {
            Ok(()) => {
                info!("Health check passed");
                true
            }
            Err(e) => {
                error!("Health check failed: {e}");
                false
            }
        }
    }
}
