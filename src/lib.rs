//! askdoc-store - resilient vector-store access layer for document QA
//!
//! This crate provides the storage backbone for an "ask the doc" style
//! application including:
//! - HTTP transport with bounded retry, backoff and a wall-clock budget
//! - Connection negotiation across two wire paths, creating the index on
//!   first use
//! - A document store facade that routes between the remote index and an
//!   in-memory fallback
//! - Automatic degraded mode for constrained deployments where the remote
//!   is periodically unreachable
//! - A hosted embedding client for document chunks and queries

pub mod config;
pub mod connection;
pub mod degraded;
pub mod embeddings;
pub mod remote;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used items
pub use config::{ConfigError, Metric, StoreConfig};
pub use connection::{ConnectError, ConnectionHealth, HealthSnapshot, Negotiator, Route};
pub use degraded::DegradedIndex;
pub use embeddings::{Embedder, EmbeddingError, OpenAiEmbedder, OpenAiEmbedderConfig};
pub use store::{DocumentStore, StoreError, StoreResult, UPSERT_BATCH_SIZE};
pub use transport::{RetryPolicy, TransportError};
pub use types::{SearchFilter, SearchHit, UpsertReport, VectorRecord};
