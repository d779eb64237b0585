//! Transport-level error types.

use thiserror::Error;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Tagged failure outcomes of [`HttpTransport::request`].
///
/// The split matters to callers: a [`ClientError`] is a caller mistake and
/// says nothing about reachability, while [`RetriesExhausted`] and
/// [`BudgetExhausted`] mean the remote could not be reached and should feed
/// availability accounting.
///
/// [`HttpTransport::request`]: super::HttpTransport::request
/// [`ClientError`]: TransportError::ClientError
/// [`RetriesExhausted`]: TransportError::RetriesExhausted
/// [`BudgetExhausted`]: TransportError::BudgetExhausted
#[derive(Debug, Error)]
pub enum TransportError {
    /// Terminal 4xx other than 429. Never retried.
    #[error("Client error (HTTP {status}): {body}")]
    ClientError { status: u16, body: String },

    /// Every allowed attempt failed with a retryable condition.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The wall-clock budget ran out before the retry count did.
    #[error("Retry budget of {budget_ms} ms exhausted after {attempts} attempts: {last_error}")]
    BudgetExhausted {
        budget_ms: u64,
        attempts: u32,
        last_error: String,
    },

    /// A 2xx response whose body was not the JSON the wire contract
    /// promises.
    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// The request could not be constructed (bad URL or similar).
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Failure building the underlying HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TransportError {
    /// True for outcomes that mean "the remote is unreachable right now",
    /// which is what availability re-checks and degraded routing key off.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::RetriesExhausted { .. } | Self::BudgetExhausted { .. }
        )
    }
}
