//! # Cloud Build REST Client
//!
//! Submits builds with `POST v1/projects/{p}/builds`. The API answers with a
//! long-running operation immediately; this client does not poll it.
//!
//! Reference: <https://cloud.google.com/build/docs/api/reference/rest/v1/projects.builds/create>

use super::common::{format_project_path, OperationTracker};
use super::rest::RestClient;
use crate::build_spec::{BuildSpec, BuildSubmission};
use crate::error::ProviderError;
use crate::provider::BuildSubmitter;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{field, info, info_span, Instrument};

/// Long-running operation returned by `projects.builds.create`
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    metadata: Option<BuildOperationMetadata>,
}

#[derive(Debug, Deserialize)]
struct BuildOperationMetadata {
    #[serde(default)]
    build: Option<BuildInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    log_url: Option<String>,
}

impl From<Operation> for BuildSubmission {
    fn from(operation: Operation) -> Self {
        let build = operation.metadata.and_then(|m| m.build);
        Self {
            operation: operation.name,
            build_id: build.as_ref().and_then(|b| b.id.clone()),
            log_url: build.and_then(|b| b.log_url),
        }
    }
}

#[derive(Debug)]
pub struct CloudBuildRest {
    client: RestClient,
    project_id: String,
}

impl CloudBuildRest {
    #[must_use]
    pub fn new(client: RestClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl BuildSubmitter for CloudBuildRest {
    async fn submit_build(&self, spec: &BuildSpec) -> Result<BuildSubmission, ProviderError> {
        let tracker = OperationTracker::new(info_span!(
            "gcp.build.submit",
            project.id = %self.project_id,
            image = spec.primary_image(),
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        ));
        let span = tracker.span().clone();

        let result = async {
            let operation: Operation = self
                .client
                .post(
                    &format!("{}/builds", format_project_path(&self.project_id)),
                    spec,
                )
                .await?;
            info!("Build submitted: {}", operation.name);
            Ok::<_, ProviderError>(BuildSubmission::from(operation))
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }
}
