//! Embedding generation for ingest and query time.
//!
//! The store needs vectors in two places: document chunks are embedded when
//! they are uploaded, and a question is embedded before it is matched against
//! them. [`Embedder`] abstracts the provider so the store never cares where
//! the vectors come from; [`OpenAiEmbedder`] is the hosted implementation.

mod error;
mod openai;

#[cfg(test)]
mod tests;

pub use error::{EmbeddingError, EmbeddingResult};
pub use openai::{OpenAiEmbedder, OpenAiEmbedderConfig, ENV_OPENAI_API_KEY};

use async_trait::async_trait;

/// A source of dense embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a batch of texts, returning one vector per input in input
    /// order. An empty batch yields an empty result without provider
    /// traffic.
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Embeds a single query string.
    async fn embed_query(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors.pop().ok_or_else(|| EmbeddingError::InvalidResponse {
            reason: "provider returned no embedding for the query".to_string(),
        })
    }

    /// Length of the vectors this embedder produces.
    fn dimension(&self) -> usize;
}
