//! Shared test utilities
//!
//! rustls setup for the Pact contract tests, and in-memory fakes of every
//! provider capability for orchestrator scenarios.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use qitlalli_deploy::build_spec::{BuildSpec, BuildSubmission};
use qitlalli_deploy::error::{AuthenticationError, HealthCheckError, ProviderError};
use qitlalli_deploy::provider::{
    BuildSubmitter, CredentialChecker, HealthChecker, IamAdmin, SecretState, SecretStore,
};
use qitlalli_deploy::retry::RetryPolicy;
use qitlalli_deploy::{DeploymentConfig, Orchestrator, ProviderClients, RuntimeSettings};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it only runs once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const PROJECT_ID: &str = "qitlalli-prod";

/// Base URL of a running Pact mock server without the trailing slash
pub fn mock_base_url(url: &impl std::fmt::Display) -> String {
    url.to_string().trim_end_matches('/').to_string()
}

pub struct FakeCredentials {
    result: Result<(), AuthenticationError>,
    pub calls: AtomicUsize,
}

impl FakeCredentials {
    pub fn valid() -> Self {
        Self {
            result: Ok(()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: AuthenticationError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialChecker for FakeCredentials {
    async fn verify(&self, _project_id: &str) -> Result<(), AuthenticationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Secret Manager held in memory
#[derive(Default)]
pub struct FakeSecretStore {
    secrets: Mutex<BTreeMap<String, Vec<String>>>,
    /// `secret_state` answers 403 for these
    denied: BTreeSet<String>,
    /// Another run creates and populates these right after our state check
    raced: BTreeSet<String>,
    /// `create_secret` answers 503 this many times before succeeding
    transient_create_failures: AtomicUsize,
    /// `create_secret` stores the container but answers 503 this many times
    lost_create_responses: AtomicUsize,
    /// `add_secret_version` answers 503 once for these
    failing_versions: Mutex<BTreeSet<String>>,
    pub state_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub add_version_calls: AtomicUsize,
}

impl FakeSecretStore {
    pub fn with_existing(names: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut secrets = store.secrets.lock().unwrap();
            for name in names {
                secrets.insert((*name).to_string(), vec!["pre-existing".to_string()]);
            }
        }
        store
    }

    /// Containers left without any version
    pub fn with_empty(self, names: &[&str]) -> Self {
        {
            let mut secrets = self.secrets.lock().unwrap();
            for name in names {
                secrets.insert((*name).to_string(), Vec::new());
            }
        }
        self
    }

    pub fn deny(mut self, name: &str) -> Self {
        self.denied.insert(name.to_string());
        self
    }

    pub fn race_after_check(mut self, name: &str) -> Self {
        self.raced.insert(name.to_string());
        self
    }

    pub fn transient_create_failures(self, count: usize) -> Self {
        self.transient_create_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn lost_create_responses(self, count: usize) -> Self {
        self.lost_create_responses.store(count, Ordering::SeqCst);
        self
    }

    pub fn fail_add_version_once(self, name: &str) -> Self {
        self.failing_versions
            .lock()
            .unwrap()
            .insert(name.to_string());
        self
    }

    /// Versions stored for a secret, oldest first
    pub fn versions(&self, name: &str) -> Vec<String> {
        self.secrets
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.secrets.lock().unwrap().keys().cloned().collect()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn secret_state(&self, secret_name: &str) -> Result<SecretState, ProviderError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        if self.denied.contains(secret_name) {
            return Err(ProviderError::api("secretmanager", 403, "permission denied"));
        }

        let mut secrets = self.secrets.lock().unwrap();
        let state = match secrets.get(secret_name) {
            None => SecretState::Missing,
            Some(versions) if versions.is_empty() => SecretState::Empty,
            Some(_) => SecretState::Populated,
        };
        if self.raced.contains(secret_name) {
            secrets.insert(secret_name.to_string(), vec!["other-run".to_string()]);
        }
        Ok(state)
    }

    async fn create_secret(&self, secret_name: &str) -> Result<(), ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if take_one(&self.transient_create_failures) {
            return Err(ProviderError::api("secretmanager", 503, "backend unavailable"));
        }

        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(secret_name) {
            return Err(ProviderError::api("secretmanager", 409, "already exists"));
        }
        secrets.insert(secret_name.to_string(), Vec::new());

        if take_one(&self.lost_create_responses) {
            return Err(ProviderError::api("secretmanager", 503, "deadline exceeded"));
        }
        Ok(())
    }

    async fn add_secret_version(
        &self,
        secret_name: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        self.add_version_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_versions.lock().unwrap().remove(secret_name) {
            return Err(ProviderError::api("secretmanager", 503, "backend unavailable"));
        }
        match self.secrets.lock().unwrap().get_mut(secret_name) {
            Some(versions) => {
                versions.push(value.to_string());
                Ok(())
            }
            None => Err(ProviderError::api("secretmanager", 404, "secret not found")),
        }
    }
}

#[derive(Default)]
pub struct FakeIam {
    fail_service_account: bool,
    accounts: Mutex<BTreeSet<String>>,
    bindings: Mutex<BTreeSet<(String, String)>>,
    pub grant_calls: AtomicUsize,
}

impl FakeIam {
    pub fn failing() -> Self {
        Self {
            fail_service_account: true,
            ..Self::default()
        }
    }

    pub fn accounts(&self) -> Vec<String> {
        self.accounts.lock().unwrap().iter().cloned().collect()
    }

    /// Roles bound to `member`
    pub fn roles_of(&self, member: &str) -> Vec<String> {
        self.bindings
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m == member)
            .map(|(role, _)| role.clone())
            .collect()
    }
}

#[async_trait]
impl IamAdmin for FakeIam {
    async fn ensure_service_account(
        &self,
        account_id: &str,
        _display_name: &str,
    ) -> Result<bool, ProviderError> {
        if self.fail_service_account {
            return Err(ProviderError::api("iam", 403, "iam.serviceAccounts.create denied"));
        }
        Ok(self.accounts.lock().unwrap().insert(account_id.to_string()))
    }

    async fn grant_project_roles(
        &self,
        member: &str,
        roles: &[&str],
    ) -> Result<usize, ProviderError> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        let mut bindings = self.bindings.lock().unwrap();
        let mut added = 0;
        for role in roles {
            if bindings.insert(((*role).to_string(), member.to_string())) {
                added += 1;
            }
        }
        Ok(added)
    }
}

#[derive(Default)]
pub struct FakeBuilds {
    fail: bool,
    submitted: Mutex<Vec<BuildSpec>>,
    pub calls: AtomicUsize,
}

impl FakeBuilds {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<BuildSpec> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildSubmitter for FakeBuilds {
    async fn submit_build(&self, spec: &BuildSpec) -> Result<BuildSubmission, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::api("cloudbuild", 400, "invalid build step"));
        }
        self.submitted.lock().unwrap().push(spec.clone());
        Ok(BuildSubmission {
            operation: "operations/build/qitlalli-prod/b1".to_string(),
            build_id: Some("b1".to_string()),
            log_url: None,
        })
    }
}

/// Health endpoint answering a fixed status
pub struct FakeHealth {
    status: u16,
    checked: Mutex<Vec<String>>,
}

impl FakeHealth {
    pub fn answering(status: u16) -> Self {
        Self {
            status,
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl HealthChecker for FakeHealth {
    async fn check(&self, url: &str) -> Result<(), HealthCheckError> {
        self.checked.lock().unwrap().push(url.to_string());
        if self.status == 200 {
            Ok(())
        } else {
            Err(HealthCheckError::UnexpectedStatus {
                status: self.status,
            })
        }
    }
}

/// One fake per capability, shared with the orchestrator under test
pub struct Fakes {
    pub credentials: Arc<FakeCredentials>,
    pub secrets: Arc<FakeSecretStore>,
    pub iam: Arc<FakeIam>,
    pub builds: Arc<FakeBuilds>,
    pub health: Arc<FakeHealth>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            credentials: Arc::new(FakeCredentials::valid()),
            secrets: Arc::new(FakeSecretStore::default()),
            iam: Arc::new(FakeIam::default()),
            builds: Arc::new(FakeBuilds::default()),
            health: Arc::new(FakeHealth::answering(200)),
        }
    }
}

impl Fakes {
    pub fn clients(&self) -> ProviderClients {
        ProviderClients {
            credentials: Arc::clone(&self.credentials) as Arc<dyn CredentialChecker>,
            secrets: Arc::clone(&self.secrets) as Arc<dyn SecretStore>,
            iam: Arc::clone(&self.iam) as Arc<dyn IamAdmin>,
            builds: Arc::clone(&self.builds) as Arc<dyn BuildSubmitter>,
            health: Arc::clone(&self.health) as Arc<dyn HealthChecker>,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let config = DeploymentConfig::for_project(PROJECT_ID).unwrap();
        Orchestrator::new(config, fast_settings(), self.clients(), tracing::Span::none())
    }
}

/// Runtime settings with no health-check delay and instant retries
pub fn fast_settings() -> RuntimeSettings {
    RuntimeSettings {
        health_check_delay: Duration::ZERO,
        retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
        ..RuntimeSettings::default()
    }
}

/// REST client for one Google API pointed at a mock server, authenticating as `Bearer test-token`
pub fn mock_rest_client(
    service: &'static str,
    base_url: &str,
) -> qitlalli_deploy::provider::gcp::RestClient {
    qitlalli_deploy::provider::gcp::RestClient::new(
        service,
        base_url,
        Arc::new(qitlalli_deploy::provider::gcp::GcpCredentials::from_token("test-token")),
        Duration::from_secs(5),
    )
    .expect("Failed to build REST client")
}
