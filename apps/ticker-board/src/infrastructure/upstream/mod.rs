//! Upstream HTTP Client
//!
//! Thin `reqwest` wrapper shared by every exchange adapter and the proxy
//! routes. One GET per call: no retries, no backoff. Failures are reported
//! to the caller, which keeps its previous state and retries on the next
//! poll.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::application::ports::SourceError;
use crate::infrastructure::metrics::{self, Upstream};

/// Upstream request errors.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// Connection failed or timed out.
    #[error("request to {url} failed: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error.
        message: String,
    },

    /// Upstream answered with a non-success status.
    #[error("{url} responded with {status}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Body was not the expected JSON.
    #[error("invalid JSON from {url}: {message}")]
    JsonParse {
        /// Requested URL.
        url: String,
        /// Parse error.
        message: String,
    },
}

impl From<UpstreamError> for SourceError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Build(message) | UpstreamError::Network { message, .. } => {
                Self::Network(message)
            }
            UpstreamError::Status { status, body, .. } => Self::Status {
                status,
                message: body,
            },
            UpstreamError::JsonParse { message, .. } => Self::Decode(message),
        }
    }
}

const MAX_ERROR_BODY: usize = 512;

/// Shared HTTP client for upstream APIs.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    /// Create a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ticker-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Build(e.to_string()))?;
        Ok(Self { client })
    }

    /// GET a URL and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or a body
    /// that does not decode as `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        upstream: Upstream,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let started = Instant::now();
        let result = self.fetch(url, query).await.and_then(|body| {
            serde_json::from_str(&body).map_err(|e| UpstreamError::JsonParse {
                url: url.to_string(),
                message: e.to_string(),
            })
        });
        metrics::record_upstream_request(upstream, result.is_ok(), started.elapsed());

        if let Err(e) = &result {
            tracing::debug!(upstream = upstream.as_str(), error = %e, "Upstream request failed");
        }
        result
    }

    async fn fetch(&self, url: &str, query: &[(&str, &str)]) -> Result<String, UpstreamError> {
        let network = |e: reqwest::Error| UpstreamError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        let body = response.text().await.map_err(network)?;

        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
