//! # Google Cloud REST transport
//!
//! Thin authenticated JSON client shared by the Secret Manager, Cloud Build,
//! IAM and Resource Manager clients. Uses reqwest (rustls) with a uniform
//! per-request timeout and OAuth2 bearer tokens from [`GcpCredentials`].
//!
//! Error responses follow the Google API error envelope:
//! <https://cloud.google.com/apis/design/errors>

use super::auth::GcpCredentials;
use crate::error::ProviderError;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Google API error response wrapper
#[derive(Debug, Deserialize)]
struct GcpErrorResponse {
    error: GcpError,
}

/// Detailed error information from a Google API
#[derive(Debug, Deserialize)]
struct GcpError {
    /// HTTP status code (e.g., 404, 403, 500)
    code: u16,
    /// Human-readable error message
    #[serde(default)]
    message: String,
    /// Canonical status string (e.g., "NOT_FOUND", "PERMISSION_DENIED")
    #[serde(default)]
    status: String,
}

/// Authenticated JSON client for one Google API (`{base_url}/v1/...`)
pub struct RestClient {
    http_client: Client,
    base_url: String,
    service: &'static str,
    credentials: Arc<GcpCredentials>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// # Errors
    /// Returns [`ProviderError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        service: &'static str,
        base_url: &str,
        credentials: Arc<GcpCredentials>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ProviderError::Transport { service, source })?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
            credentials,
        })
    }

    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    /// `GET /v1/{path}`
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let request = self.http_client.get(self.url(path));
        self.execute(request).await
    }

    /// `POST /v1/{path}` with a JSON body
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_with_query(path, &[], body).await
    }

    /// `POST /v1/{path}?{query}` with a JSON body
    pub async fn post_with_query<B, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http_client.post(self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        self.execute(request.json(body)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let token = self.credentials.access_token().await?;

        let response = request
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                service: self.service,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error_from_response(response).await);
        }
        debug!(service = self.service, status = status.as_u16(), "API call succeeded");

        response.json::<T>().await.map_err(|e| ProviderError::Decode {
            service: self.service,
            message: e.to_string(),
        })
    }

    /// Convert a non-success response into a [`ProviderError::Api`]
    async fn error_from_response(&self, response: Response) -> ProviderError {
        let code = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        parse_error(self.service, code, &error_text)
    }
}

/// Parse a Google error envelope, falling back to the raw body
fn parse_error(service: &'static str, code: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<GcpErrorResponse>(body) {
        Ok(envelope) if !envelope.error.status.is_empty() => ProviderError::Api {
            service,
            code: envelope.error.code,
            status: envelope.error.status,
            message: envelope.error.message,
        },
        Ok(envelope) => ProviderError::api(service, envelope.error.code, envelope.error.message),
        Err(_) => ProviderError::api(service, code, body.trim()),
    }
}
