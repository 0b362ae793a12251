//! # Build Specification
//!
//! Cloud Build request body for the QiTlalli container image: a docker build
//! step followed by a push step, publishing a single image tag.
//!
//! Serializes to the `Build` resource of the Cloud Build REST API v1:
//! <https://cloud.google.com/build/docs/api/reference/rest/v1/projects.builds#Build>

use crate::constants::DOCKER_BUILDER_IMAGE;
use serde::Serialize;

/// One build step: a builder image and its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStep {
    /// Builder image, e.g. `gcr.io/cloud-builders/docker`
    pub name: String,
    pub args: Vec<String>,
}

/// Steps and resulting images of one build submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSpec {
    pub steps: Vec<BuildStep>,
    pub images: Vec<String>,
}

impl BuildSpec {
    /// `docker build -f <dockerfile> -t <image> .` then `docker push <image>`
    #[must_use]
    pub fn docker_build_and_push(image: &str, dockerfile: &str) -> Self {
        Self {
            steps: vec![
                BuildStep {
                    name: DOCKER_BUILDER_IMAGE.to_string(),
                    args: args(&["build", "-f", dockerfile, "-t", image, "."]),
                },
                BuildStep {
                    name: DOCKER_BUILDER_IMAGE.to_string(),
                    args: args(&["push", image]),
                },
            ],
            images: vec![image.to_string()],
        }
    }

    /// First published image, used in logs and errors
    #[must_use]
    pub fn primary_image(&self) -> &str {
        self.images.first().map_or("<none>", String::as_str)
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Outcome of submitting a build (the build itself keeps running remotely)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSubmission {
    /// Long-running operation name, e.g. `operations/build/my-project/abc`
    pub operation: String,
    pub build_id: Option<String>,
    pub log_url: Option<String>,
}
