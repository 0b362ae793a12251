//! # qitlalli-deploy
//!
//! Entry point: parse flags, build the log subscriber, wire the Google Cloud
//! clients and run one action. Exits 0 on success and 1 on any failure.

use clap::Parser;
use qitlalli_deploy::cli::{Cli, Invocation};
use qitlalli_deploy::observability::build_dispatch;
use qitlalli_deploy::orchestrator::run_span;
use qitlalli_deploy::provider::gcp::{self, GcpCredentials};
use qitlalli_deploy::{DeployError, Orchestrator, RunReport};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::instrument::WithSubscriber;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Must happen before any TLS client is built. An already installed provider is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let dispatch = build_dispatch(cli.log_format);

    let outcome = async move {
        info!(
            "qitlalli-deploy v{} (git: {}, built: {})",
            env!("CARGO_PKG_VERSION"),
            env!("BUILD_GIT_HASH"),
            env!("BUILD_DATETIME")
        );

        let invocation = cli.into_invocation().map_err(DeployError::from)?;
        run(invocation).await
    }
    .with_subscriber(dispatch.clone())
    .await;

    tracing::dispatcher::with_default(&dispatch, || match outcome {
        Ok(report) => {
            info!(?report, "Run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Deployment failed: {e}");
            ExitCode::from(e.exit_code())
        }
    })
}

async fn run(invocation: Invocation) -> Result<RunReport, DeployError> {
    let Invocation {
        config,
        settings,
        action,
        access_token,
        ..
    } = invocation;

    let credentials = Arc::new(
        GcpCredentials::discover(access_token).with_command_timeout(settings.api_timeout),
    );
    let clients = gcp::clients(&config, &settings, credentials)?;
    let span = run_span(&config, action);

    Orchestrator::new(config, settings, clients, span)
        .run(action)
        .await
}
