//! Upstream HTTP fetcher
//!
//! One GET per call, 10 second timeout, static identifying headers.
//! Every outcome is returned as data: callers get either the decoded JSON body
//! or a [`FailureReason`] they can show next to fallback content.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const CLIENT_USER_AGENT: &str = concat!("livedash-backend/", env!("CARGO_PKG_VERSION"));

/// Shown when a 429 arrives without a usable Retry-After header
const RETRY_AFTER_PLACEHOLDER: &str = "a bit";

/// Why a fetch produced no data
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("429 Too Many Requests: try again after {}", retry_hint(.retry_after))]
    RateLimited { retry_after: String },

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Unexpected response shape: {message}")]
    Malformed { message: String },
}

impl FailureReason {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// "12" reads as "12s"; anything non-numeric ("a bit", an HTTP date) as-is
fn retry_hint(retry_after: &str) -> String {
    if retry_after.parse::<u64>().is_ok() {
        format!("{}s", retry_after)
    } else {
        retry_after.to_string()
    }
}

pub type FetchResult<T> = Result<T, FailureReason>;

/// Shared HTTP client used by every upstream service
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` and decode the body as JSON
    pub async fn get_json(&self, url: &str) -> FetchResult<serde_json::Value> {
        debug!("GET {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                return Err(FailureReason::Network {
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| RETRY_AFTER_PLACEHOLDER.to_string());
            warn!("Rate limited by {} (retry after {})", url, retry_after);
            return Err(FailureReason::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = status.canonical_reason().unwrap_or("Unknown status");
            let message = if body.trim().is_empty() {
                reason.to_string()
            } else {
                format!("{} ({})", reason, body.trim())
            };
            warn!("Upstream {} returned {}", url, status);
            return Err(FailureReason::Http {
                status: status.as_u16(),
                message,
            });
        }

        // A body that fails mid-read is a transport problem, one that reads
        // but doesn't decode is a shape problem.
        let bytes = response.bytes().await.map_err(|e| FailureReason::Network {
            message: e.to_string(),
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            warn!("Undecodable body from {}: {}", url, e);
            FailureReason::malformed(e.to_string())
        })
    }
}
