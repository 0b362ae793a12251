//! # QiTlalli Deploy
//!
//! Provisions and deploys the QiTlalli stack on Google Cloud:
//!
//! 1. **Authentication** - resolves an access token and proves it works against the project
//! 2. **Service account** - creates the workload identity and binds its project roles
//! 3. **Secrets** - creates missing Secret Manager secrets with generated or placeholder values
//! 4. **Build** - submits a Cloud Build that builds and pushes the container image
//! 5. **Health check** - requests the deployed service once
//!
//! The [`Orchestrator`] sequences these steps against the capability traits in
//! [`provider`], so a run can be driven by the Google Cloud REST clients in
//! [`provider::gcp`] or by in-memory fakes.

pub mod build_spec;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod secrets;

pub use config::{DeploymentConfig, RuntimeSettings};
pub use error::DeployError;
pub use orchestrator::{Action, Orchestrator, ProviderClients, RunReport};
