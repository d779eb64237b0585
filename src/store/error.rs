//! Error types for the document store facade.

use thiserror::Error;

use crate::config::ConfigError;
use crate::connection::ConnectError;
use crate::embeddings::EmbeddingError;
use crate::transport::TransportError;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Caller-facing failures of [`DocumentStore`] operations.
///
/// Transport details stop here: callers see operation-level outcomes, and
/// availability accounting has already happened by the time one of these
/// surfaces.
///
/// [`DocumentStore`]: super::DocumentStore
#[derive(Debug, Error)]
pub enum StoreError {
    /// Fatal configuration problem. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Connection negotiation failed.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectError),

    /// A remote call failed after transport-level retries.
    #[error("Remote operation failed: {0}")]
    Transport(#[from] TransportError),

    /// The embedding collaborator failed; fatal to the calling operation
    /// regardless of mode.
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Neither the remote path nor degraded mode can serve the operation.
    #[error("Vector store unavailable: {reason}")]
    Unavailable { reason: String },

    /// An embedding's length does not match the index dimension.
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// The call itself was malformed.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl StoreError {
    /// True when the failure means the remote store is unreachable rather
    /// than rejecting this particular request.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Transport(err) => err.is_unavailable(),
            StoreError::Connection(ConnectError::NoPath { .. }) => true,
            StoreError::Unavailable { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        let exhausted = StoreError::Transport(TransportError::RetriesExhausted {
            attempts: 5,
            last_error: "connection refused".to_string(),
        });
        assert!(exhausted.is_unavailable());

        let no_path = StoreError::Connection(ConnectError::NoPath {
            control_plane: "refused".to_string(),
            index_host: "refused".to_string(),
        });
        assert!(no_path.is_unavailable());

        let unavailable = StoreError::Unavailable {
            reason: "down".to_string(),
        };
        assert!(unavailable.is_unavailable());

        let terminal = StoreError::Transport(TransportError::ClientError {
            status: 400,
            body: "bad filter".to_string(),
        });
        assert!(!terminal.is_unavailable());

        let dimension = StoreError::InvalidDimension {
            expected: 1536,
            actual: 8,
        };
        assert!(!dimension.is_unavailable());
    }

    #[test]
    fn test_messages_carry_the_operation_context() {
        let err = StoreError::InvalidDimension {
            expected: 1536,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "Invalid embedding dimension: expected 1536, got 384"
        );
    }
}
