//! Tests for the embedding providers.

use async_trait::async_trait;

use super::openai::{vectors_from, EmbeddingDatum, EmbeddingResponse};
use super::*;

fn response(rows: Vec<(usize, Vec<f32>)>) -> EmbeddingResponse {
    EmbeddingResponse {
        data: rows
            .into_iter()
            .map(|(index, embedding)| EmbeddingDatum { index, embedding })
            .collect(),
    }
}

#[test]
fn test_vectors_come_back_in_request_order() {
    let out_of_order = response(vec![
        (2, vec![3.0, 3.0]),
        (0, vec![1.0, 1.0]),
        (1, vec![2.0, 2.0]),
    ]);
    let vectors = vectors_from(out_of_order, 3, 2).unwrap();
    assert_eq!(vectors[0], vec![1.0, 1.0]);
    assert_eq!(vectors[1], vec![2.0, 2.0]);
    assert_eq!(vectors[2], vec![3.0, 3.0]);
}

#[test]
fn test_short_batches_are_rejected() {
    let short = response(vec![(0, vec![1.0, 1.0])]);
    let err = vectors_from(short, 2, 2).unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidResponse { .. }));
    assert!(err.to_string().contains("expected 2"));
}

#[test]
fn test_wrong_dimension_is_rejected() {
    let narrow = response(vec![(0, vec![1.0])]);
    let err = vectors_from(narrow, 1, 1536).unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidResponse { .. }));
}

#[test]
fn test_provider_payload_parses() {
    let payload = r#"{
        "object": "list",
        "data": [
            {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]},
            {"object": "embedding", "index": 1, "embedding": [0.3, 0.4]}
        ],
        "model": "text-embedding-ada-002",
        "usage": {"prompt_tokens": 8, "total_tokens": 8}
    }"#;
    let parsed: EmbeddingResponse = serde_json::from_str(payload).unwrap();
    let vectors = vectors_from(parsed, 2, 2).unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[1], vec![0.3, 0.4]);
}

#[test]
fn test_config_defaults_target_the_hosted_model() {
    let config = OpenAiEmbedderConfig::default();
    assert_eq!(config.model, "text-embedding-ada-002");
    assert_eq!(config.dimension, 1536);
    assert!(config.endpoint.contains("/v1/embeddings"));
}

#[test]
fn test_constructing_without_a_key_fails() {
    let err = OpenAiEmbedder::new(OpenAiEmbedderConfig::default()).unwrap_err();
    assert!(matches!(err, EmbeddingError::MissingApiKey));
}

#[test]
fn test_from_env_requires_the_key() {
    std::env::remove_var(ENV_OPENAI_API_KEY);
    assert!(matches!(
        OpenAiEmbedderConfig::from_env(),
        Err(EmbeddingError::MissingApiKey)
    ));

    std::env::set_var(ENV_OPENAI_API_KEY, "env-key");
    let config = OpenAiEmbedderConfig::from_env().unwrap();
    assert_eq!(config.model, "text-embedding-ada-002");
    std::env::remove_var(ENV_OPENAI_API_KEY);
}

#[tokio::test]
async fn test_empty_batch_never_touches_the_network() {
    // Endpoint that would refuse every connection; the call must short
    // circuit before reaching it.
    let embedder = OpenAiEmbedder::new(
        OpenAiEmbedderConfig::default()
            .with_api_key("key")
            .with_endpoint("http://127.0.0.1:1/v1/embeddings"),
    )
    .unwrap();
    let vectors = embedder.embed(&[]).await.unwrap();
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn test_unreachable_provider_surfaces_a_network_error() {
    let embedder = OpenAiEmbedder::new(
        OpenAiEmbedderConfig::default()
            .with_api_key("key")
            .with_endpoint("http://127.0.0.1:1/v1/embeddings"),
    )
    .unwrap();
    let err = embedder.embed(&["hello".to_string()]).await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Network(_)));
}

/// Serves canned vectors; enough to exercise the trait's default method.
struct FixedEmbedder {
    vectors: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(self.vectors.iter().cloned().take(texts.len()).collect())
    }

    fn dimension(&self) -> usize {
        4
    }
}

#[tokio::test]
async fn test_embed_query_unwraps_the_single_vector() {
    let embedder = FixedEmbedder {
        vectors: vec![vec![1.0, 2.0, 3.0, 4.0]],
    };
    let vector = embedder.embed_query("what is the rent subsidy?").await.unwrap();
    assert_eq!(vector, vec![1.0, 2.0, 3.0, 4.0]);
}

#[tokio::test]
async fn test_embed_query_rejects_an_empty_provider_answer() {
    let embedder = FixedEmbedder { vectors: vec![] };
    let err = embedder.embed_query("anything").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidResponse { .. }));
}
