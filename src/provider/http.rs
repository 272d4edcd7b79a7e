//! HTTP provider adapter for the vector-store control plane.
//!
//! This module provides the REST client that performs the actual
//! create/read/update/delete calls. Credentials, region, and endpoint are
//! passed in explicitly via [`ProviderConfig`]; nothing is read from ambient
//! process state here.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ProviderError, Result, VectorformError};
use crate::graph::{ObservedState, Scalar};

use super::adapter::{ProviderAdapter, ReadOutcome};
use super::types::{RESOURCE_VECTOR_BUCKET, RESOURCE_VECTOR_INDEX};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Explicit configuration for the HTTP provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Control-plane base URL.
    pub endpoint: String,
    /// Provider region.
    pub region: String,
    /// API key for bearer authentication.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// HTTP client for the vector-store control plane.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    /// HTTP client.
    client: Client,
    /// Provider configuration.
    config: ProviderConfig,
}

/// Request body carrying a resource's attribute set.
#[derive(Debug, Serialize)]
struct AttributesRequest<'a> {
    attributes: &'a BTreeMap<String, Scalar>,
}

/// Response envelope carrying a resource's observed attributes.
#[derive(Debug, Deserialize)]
struct AttributesResponse {
    attributes: BTreeMap<String, Scalar>,
}

/// Error payload returned by the control plane.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

impl ProviderConfig {
    /// Creates a provider configuration with the default timeout.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: region.into(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl HttpProvider {
    /// Creates a new HTTP provider from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Maps a resource type to its URL path segment.
    fn path_segment(resource_type: &str) -> &str {
        match resource_type {
            RESOURCE_VECTOR_BUCKET => "vector-buckets",
            RESOURCE_VECTOR_INDEX => "vector-indexes",
            other => other,
        }
    }

    /// Builds the URL for a resource.
    fn resource_url(&self, resource_type: &str, name: &str) -> String {
        format!(
            "{}/v1/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            Self::path_segment(resource_type),
            name
        )
    }

    /// Sends a request, retrying transient failures.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&BTreeMap<String, Scalar>>,
    ) -> Result<reqwest::Response> {
        let mut last_error: Option<VectorformError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Honor a server-supplied Retry-After hint; fall back to a
                // linear backoff otherwise.
                let delay = last_error
                    .as_ref()
                    .and_then(VectorformError::retry_delay_secs)
                    .map_or_else(
                        || Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)),
                        Duration::from_secs,
                    );
                debug!("Retry attempt {attempt} of {MAX_RETRIES} after {delay:?}");
                tokio::time::sleep(delay).await;
            }

            match self.send_once(method.clone(), url, body).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            VectorformError::Provider(ProviderError::NetworkError {
                message: String::from("Max retries exceeded"),
            })
        }))
    }

    /// Sends a single request.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&BTreeMap<String, Scalar>>,
    ) -> Result<reqwest::Response> {
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header("x-vectorform-region", &self.config.region);

        if let Some(attributes) = body {
            request = request.json(&AttributesRequest { attributes });
        }

        let response = request.send().await.map_err(|e| {
            VectorformError::Provider(ProviderError::NetworkError {
                message: format!("Request failed: {e}"),
            })
        })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VectorformError::Provider(
                ProviderError::AuthenticationFailed {
                    message: String::from("API key rejected by control plane"),
                },
            )),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5);
                Err(VectorformError::Provider(ProviderError::RateLimited {
                    retry_after_secs,
                }))
            }
            _ => Ok(response),
        }
    }

    /// Parses a success response into an observed state.
    async fn parse_state(response: reqwest::Response) -> Result<ObservedState> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }

        let envelope: AttributesResponse = response.json().await.map_err(|e| {
            VectorformError::Provider(ProviderError::InvalidResponse {
                message: format!("Failed to decode response body: {e}"),
            })
        })?;

        Ok(ObservedState::new(envelope.attributes))
    }

    /// Converts a non-success response into a provider error.
    async fn api_error(status: StatusCode, response: reqwest::Response) -> VectorformError {
        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| String::from("no error detail"));

        VectorformError::Provider(ProviderError::api_error(status.as_u16(), message))
    }
}

#[async_trait]
impl ProviderAdapter for HttpProvider {
    async fn create(
        &self,
        resource_type: &str,
        name: &str,
        attributes: &BTreeMap<String, Scalar>,
    ) -> Result<ObservedState> {
        debug!("Creating {resource_type}.{name}");
        let url = self.resource_url(resource_type, name);
        let response = self.send(Method::PUT, &url, Some(attributes)).await?;
        Self::parse_state(response).await
    }

    async fn read(&self, resource_type: &str, name: &str) -> Result<ReadOutcome> {
        let url = self.resource_url(resource_type, name);
        let response = self.send(Method::GET, &url, None).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ReadOutcome::NotFound);
        }

        Ok(ReadOutcome::Found(Self::parse_state(response).await?))
    }

    async fn update(
        &self,
        resource_type: &str,
        name: &str,
        attributes: &BTreeMap<String, Scalar>,
    ) -> Result<ObservedState> {
        debug!("Updating {resource_type}.{name}");
        let url = self.resource_url(resource_type, name);
        let response = self.send(Method::PATCH, &url, Some(attributes)).await?;
        Self::parse_state(response).await
    }

    async fn delete(&self, resource_type: &str, name: &str) -> Result<()> {
        debug!("Deleting {resource_type}.{name}");
        let url = self.resource_url(resource_type, name);
        let response = self.send(Method::DELETE, &url, None).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(VectorformError::Provider(ProviderError::ResourceNotFound {
                resource_type: resource_type.to_string(),
                name: name.to_string(),
            }));
        }
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> HttpProvider {
        HttpProvider::new(ProviderConfig::new(server.uri(), "us-east-1", "test-key")).unwrap()
    }

    #[tokio::test]
    async fn test_read_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/vector-buckets/b1"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "attributes": { "bucket_name": "media-vectors", "arn": "vfrn:http:b1" }
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let outcome = provider.read("vector_bucket", "b1").await.unwrap();
        let state = outcome.found().unwrap();
        assert_eq!(state.get("bucket_name"), Some(&Scalar::from("media-vectors")));
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/vector-indexes/i1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let outcome = provider.read("vector_index", "i1").await.unwrap();
        assert_eq!(outcome, ReadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_create_returns_computed_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/vector-indexes/i1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "attributes": { "dimension": 384, "arn": "vfrn:http:i1" }
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let mut attrs = BTreeMap::new();
        attrs.insert(String::from("dimension"), Scalar::Int(384));

        let state = provider.create("vector_index", "i1", &attrs).await.unwrap();
        assert_eq!(state.get("dimension"), Some(&Scalar::Int(384)));
        assert_eq!(state.get("arn"), Some(&Scalar::from("vfrn:http:i1")));
    }

    #[tokio::test]
    async fn test_server_error_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/vector-buckets/b1"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "message": "internal provisioning failure"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .create("vector_bucket", "b1", &BTreeMap::new())
            .await
            .unwrap_err();

        match err {
            VectorformError::Provider(ProviderError::ApiRequestFailed { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("internal provisioning failure"));
            }
            other => panic!("expected api error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_retried_with_hint() {
        let server = MockServer::start().await;
        // First call is throttled with an immediate Retry-After hint; the
        // retry then succeeds.
        Mock::given(method("GET"))
            .and(path("/v1/vector-buckets/b1"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/vector-buckets/b1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "attributes": { "bucket_name": "b1" }
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let outcome = provider.read("vector_bucket", "b1").await.unwrap();
        let state = outcome.found().unwrap();
        assert_eq!(state.get("bucket_name"), Some(&Scalar::from("b1")));
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/vector-buckets/b1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.read("vector_bucket", "b1").await.unwrap_err();
        assert!(matches!(
            err,
            VectorformError::Provider(ProviderError::AuthenticationFailed { .. })
        ));
    }
}
