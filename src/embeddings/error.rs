//! Error types for embedding providers

use thiserror::Error;

/// Result type for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors that can occur while producing embeddings
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider answered with a failure status
    #[error("Embedding API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Request never produced an HTTP response
    #[error("Embedding request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Response arrived but did not carry usable embeddings
    #[error("Invalid embedding response: {reason}")]
    InvalidResponse { reason: String },

    /// No API key configured for the provider
    #[error("Embedding API key is not configured")]
    MissingApiKey,
}
