//! Low-level HTTP access with bounded retry and a wall-clock budget.
//!
//! Every remote interaction goes through [`HttpTransport`]: one reqwest
//! client, one shared [`RetryPolicy`], and a tagged outcome that keeps "the
//! caller made a mistake" (terminal 4xx) distinct from "the remote is
//! unreachable" (exhausted retries or budget). The transport mutates no
//! shared state; health accounting happens in the layers above from the
//! errors it returns.

mod error;
mod policy;


pub use error::{TransportError, TransportResult};
pub use policy::{RetryKind, RetryPolicy};

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

/// Authentication header the remote expects on every request.
const API_KEY_HEADER: &str = "Api-Key";

/// Longest error-body excerpt carried in errors and logs.
const BODY_SNIPPET_LEN: usize = 200;

/// A successful (2xx) response with its parsed JSON body. Endpoints that
/// reply with an empty body parse as [`Value::Null`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Outcome of one attempt, before retry bookkeeping.
enum AttemptOutcome {
    Success(ApiResponse),
    Terminal(TransportError),
    Retryable {
        kind: RetryKind,
        error: String,
        retry_after: Option<Duration>,
    },
}

/// HTTP transport bound to one API key.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    api_key: SecretString,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(
        api_key: SecretString,
        policy: RetryPolicy,
        connect_timeout: Duration,
    ) -> TransportResult<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            api_key,
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issues `method url` with an optional JSON body, retrying per the
    /// shared policy.
    ///
    /// Connection failures, per-attempt timeouts, 429 and 5xx retry with
    /// exponential backoff until the retry count or the wall-clock budget
    /// runs out; a 429 `Retry-After` header overrides the computed delay
    /// (still capped). Any other 4xx returns immediately as
    /// [`TransportError::ClientError`].
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> TransportResult<ApiResponse> {
        self.request_with(method, url, body, &self.policy).await
    }

    /// Single-attempt variant with a short timeout, used for availability
    /// probes where waiting out the full schedule would defeat the point.
    pub async fn request_once(&self, method: Method, url: &str) -> TransportResult<ApiResponse> {
        self.request_with(method, url, None, &self.policy.probe())
            .await
    }

    /// Retry loop around [`Self::attempt`] driven by an explicit policy.
    pub async fn request_with(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        policy: &RetryPolicy,
    ) -> TransportResult<ApiResponse> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match self
                .attempt(method.clone(), url, body, policy.attempt_timeout)
                .await
            {
                AttemptOutcome::Success(response) => return Ok(response),
                AttemptOutcome::Terminal(err) => return Err(err),
                AttemptOutcome::Retryable {
                    kind,
                    error,
                    retry_after,
                } => {
                    if attempt >= policy.max_retries {
                        return Err(TransportError::RetriesExhausted {
                            attempts: attempt + 1,
                            last_error: error,
                        });
                    }
                    let delay = match retry_after {
                        Some(hinted) => policy.clamp(hinted),
                        None => policy.backoff(attempt, kind),
                    };
                    if started.elapsed() + delay > policy.budget {
                        return Err(TransportError::BudgetExhausted {
                            budget_ms: policy.budget.as_millis() as u64,
                            attempts: attempt + 1,
                            last_error: error,
                        });
                    }
                    warn!(
                        "Request to {} failed (attempt {}): {}; retrying in {}ms",
                        url,
                        attempt + 1,
                        error,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> AttemptOutcome {
        let mut builder = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .timeout(timeout);
        if let Some(json) = body {
            builder = builder.json(json);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                return AttemptOutcome::Retryable {
                    kind: RetryKind::Network,
                    error: err.to_string(),
                    retry_after: None,
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            return self.read_success(status, response).await;
        }

        let retry_after = parse_retry_after(response.headers());
        let body_text = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            return AttemptOutcome::Retryable {
                kind: RetryKind::RateLimited,
                error: format!("HTTP 429: {}", snippet(&body_text)),
                retry_after,
            };
        }
        if status.is_server_error() {
            return AttemptOutcome::Retryable {
                kind: RetryKind::Server,
                error: format!("HTTP {}: {}", status.as_u16(), snippet(&body_text)),
                retry_after: None,
            };
        }
        AttemptOutcome::Terminal(TransportError::ClientError {
            status: status.as_u16(),
            body: snippet(&body_text),
        })
    }

    async fn read_success(&self, status: StatusCode, response: reqwest::Response) -> AttemptOutcome {
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                return AttemptOutcome::Retryable {
                    kind: RetryKind::Network,
                    error: format!("Reading response body: {err}"),
                    retry_after: None,
                };
            }
        };
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(err) => {
                    return AttemptOutcome::Terminal(TransportError::InvalidResponse {
                        reason: format!("Malformed JSON body: {err}"),
                    });
                }
            }
        };
        debug!("Request succeeded with HTTP {}", status.as_u16());
        AttemptOutcome::Success(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Parses a `Retry-After` header in its delay-seconds form.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// First [`BODY_SNIPPET_LEN`] characters of an error body.
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(BODY_SNIPPET_LEN).collect();
        cut.push_str("...");
        cut
    }
}
