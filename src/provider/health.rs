//! # HTTP Health Checker
//!
//! Issues one bounded GET against the deployed service. Only HTTP 200 counts as
//! healthy; redirects are not followed so a login redirect is not mistaken for
//! a ready service.

use crate::error::HealthCheckError;
use crate::provider::HealthChecker;
use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpHealthChecker {
    http_client: Client,
}

impl HttpHealthChecker {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend setup).
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, url: &str) -> Result<(), HealthCheckError> {
        debug!("Probing {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| HealthCheckError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(HealthCheckError::UnexpectedStatus {
                status: status.as_u16(),
            }),
        }
    }
}
