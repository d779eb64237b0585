//! Hosted embedding provider client.
//!
//! One POST per batch; retry sits with the caller because a failed embedding
//! usually means the whole request should be re-planned, not hammered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::error::{EmbeddingError, EmbeddingResult};
use super::Embedder;

/// Environment variable holding the embedding provider API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_DIMENSION: usize = 1536;

/// Configuration for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    pub api_key: SecretString,
    pub model: String,
    pub endpoint: String,
    /// Vector length the model produces; must match the index dimension.
    pub dimension: usize,
    pub timeout: Duration,
}

impl Default for OpenAiEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::new(String::new()),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            dimension: DEFAULT_DIMENSION,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenAiEmbedderConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = SecretString::new(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Reads the API key from the environment, keeping every other default.
    pub fn from_env() -> EmbeddingResult<Self> {
        let api_key =
            std::env::var(ENV_OPENAI_API_KEY).map_err(|_| EmbeddingError::MissingApiKey)?;
        Ok(Self::default().with_api_key(api_key))
    }
}

/// Embedder backed by the hosted `/v1/embeddings` endpoint.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> EmbeddingResult<Self> {
        if config.api_key.expose_secret().is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiEmbedderConfig {
        &self.config
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.config.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload = response.text().await?;
        if !status.is_success() {
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body: payload,
            });
        }

        let parsed: EmbeddingResponse =
            serde_json::from_str(&payload).map_err(|err| EmbeddingError::InvalidResponse {
                reason: format!("malformed embedding payload: {err}"),
            })?;

        let vectors = vectors_from(parsed, texts.len(), self.config.dimension)?;
        debug!(
            "Embedded {} text(s) with model '{}'",
            texts.len(),
            self.config.model
        );
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct EmbeddingResponse {
    #[serde(default)]
    pub(super) data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
pub(super) struct EmbeddingDatum {
    /// Position of this row in the request batch. The provider may answer
    /// out of order.
    #[serde(default)]
    pub(super) index: usize,
    pub(super) embedding: Vec<f32>,
}

/// Orders provider rows by their declared index and checks the batch shape.
pub(super) fn vectors_from(
    response: EmbeddingResponse,
    expected_count: usize,
    expected_dimension: usize,
) -> EmbeddingResult<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected_count {
        return Err(EmbeddingError::InvalidResponse {
            reason: format!(
                "expected {expected_count} embeddings, provider returned {}",
                data.len()
            ),
        });
    }

    data.sort_by_key(|datum| datum.index);
    let vectors: Vec<Vec<f32>> = data.into_iter().map(|datum| datum.embedding).collect();

    if let Some(bad) = vectors.iter().find(|v| v.len() != expected_dimension) {
        return Err(EmbeddingError::InvalidResponse {
            reason: format!(
                "embedding dimension {} does not match the configured {expected_dimension}",
                bad.len()
            ),
        });
    }
    Ok(vectors)
}
