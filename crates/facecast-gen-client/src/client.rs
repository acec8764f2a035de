//! Generative video HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{GenError, GenResult};
use crate::types::{GenerateVideoRequest, Operation, PredictRequest};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the generative client.
#[derive(Debug, Clone)]
pub struct GenClientConfig {
    /// API key. Absent means the remote backend is unusable.
    pub api_key: Option<String>,
    /// Base URL of the API, without trailing slash.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Interval between operation polls.
    pub poll_interval: Duration,
    /// Retry budget for transient failures.
    pub max_retries: u32,
    /// Requested clip length.
    pub clip_seconds: u32,
}

impl Default for GenClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "veo-2.0-generate-001".to_string(),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(5),
            max_retries: 3,
            clip_seconds: 5,
        }
    }
}

impl GenClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEN_API_KEY")
                .or_else(|_| std::env::var("GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("GEN_API_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: std::env::var("GEN_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(
                std::env::var("GEN_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            poll_interval: Duration::from_secs(
                std::env::var("GEN_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            max_retries: std::env::var("GEN_POLL_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            clip_seconds: std::env::var("GEN_CLIP_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(5),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Client for the generative video API.
#[derive(Debug, Clone)]
pub struct GenClient {
    http: Client,
    api_key: String,
    config: GenClientConfig,
}

impl GenClient {
    /// Build a client. Fails with `MissingApiKey` without touching the network.
    pub fn new(config: GenClientConfig) -> GenResult<Self> {
        let api_key = config.api_key.clone().ok_or(GenError::MissingApiKey)?;
        url::Url::parse(&config.base_url)
            .map_err(|e| GenError::InvalidConfig(format!("Invalid base URL '{}': {}", config.base_url, e)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GenError::Network)?;

        Ok(Self { http, api_key, config })
    }

    pub fn config(&self) -> &GenClientConfig {
        &self.config
    }

    /// Start a generation. Returns the pending operation.
    pub async fn submit(&self, request: &GenerateVideoRequest) -> GenResult<Operation> {
        let url = format!("{}/models/{}:predictLongRunning", self.config.base_url, self.config.model);
        debug!(model = %self.config.model, "Submitting generation request");

        let body = PredictRequest::from(request);
        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .header(API_KEY_HEADER, &self.api_key)
                    .json(&body)
                    .send()
                    .await?;
                check_status(response).await
            })
            .await?;

        let operation: Operation = response.json().await?;
        if operation.name.is_empty() {
            return Err(GenError::InvalidResponse("Operation has no name".to_string()));
        }
        Ok(operation)
    }

    /// Fetch the current state of an operation. Single attempt; callers own the retry policy.
    pub async fn get_operation(&self, name: &str) -> GenResult<Operation> {
        let url = format!("{}/{}", self.config.base_url, name.trim_start_matches('/'));
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Stream a generated video to `dest`. Returns bytes written.
    pub async fn download_to(&self, uri: &str, dest: &Path) -> GenResult<u64> {
        let mut response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .get(uri)
                    .header(API_KEY_HEADER, &self.api_key)
                    .send()
                    .await?;
                check_status(response).await
            })
            .await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(GenError::InvalidResponse("Downloaded video is empty".to_string()));
        }
        debug!(bytes = written, "Downloaded generated video");
        Ok(written)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> GenResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = GenResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Generative request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn check_status(response: Response) -> GenResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GenError::from_status(status, body))
}
