//! Store configuration: the narrow, read-once configuration surface.
//!
//! The negotiator reads one [`StoreConfig`] when it runs; nothing re-reads
//! the environment afterwards. Secrets stay inside [`SecretString`] until
//! header construction.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::RetryPolicy;

/// Environment variable holding the vector-store API key.
pub const ENV_API_KEY: &str = "PINECONE_API_KEY";
/// Environment variable for the provider region.
pub const ENV_ENVIRONMENT: &str = "PINECONE_ENVIRONMENT";
/// Environment variable for the index name.
pub const ENV_INDEX: &str = "PINECONE_INDEX";
/// Environment variable for the namespace.
pub const ENV_NAMESPACE: &str = "PINECONE_NAMESPACE";

const DEFAULT_INDEX: &str = "ask-the-doc";
const DEFAULT_NAMESPACE: &str = "ask_the_doc_collection";
const DEFAULT_ENVIRONMENT: &str = "us-west1-gcp";
const DEFAULT_API_BASE: &str = "https://api.pinecone.io";
const DEFAULT_DIMENSION: usize = 1536;

/// Configuration errors are fatal and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("Missing index name")]
    MissingIndexName,

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Similarity metric used when the index has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

impl Metric {
    /// The metric's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::DotProduct => "dotproduct",
        }
    }
}

/// Everything the access layer needs to reach (or create) one index.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// API key for the remote vector store.
    pub api_key: SecretString,
    pub index_name: String,
    /// Namespace partition all data-plane calls address.
    pub namespace: String,
    /// Provider region; used to derive the per-index data-plane host.
    pub environment: String,
    /// Control-plane base URL.
    pub api_base: String,
    /// Index dimensionality; every record embedding must match it.
    pub dimension: usize,
    pub metric: Metric,
    /// The deployment runs somewhere the remote may be unreachable, which
    /// arms the automatic degraded mode.
    pub constrained_runtime: bool,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    /// Settling wait after index creation; the remote creates asynchronously.
    pub create_grace: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::new(String::new()),
            index_name: DEFAULT_INDEX.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            dimension: DEFAULT_DIMENSION,
            metric: Metric::default(),
            constrained_runtime: false,
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            create_grace: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = SecretString::new(api_key.into());
        self
    }

    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_constrained_runtime(mut self, constrained: bool) -> Self {
        self.constrained_runtime = constrained;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_create_grace(mut self, create_grace: Duration) -> Self {
        self.create_grace = create_grace;
        self
    }

    /// Reads the narrow configuration-source interface: API key (required),
    /// region, index and namespace. Anything unset keeps its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(ENV_API_KEY).map_err(|_| ConfigError::MissingApiKey)?;
        let mut config = Self::default().with_api_key(api_key);
        if let Ok(environment) = std::env::var(ENV_ENVIRONMENT) {
            config.environment = environment;
        }
        if let Ok(index_name) = std::env::var(ENV_INDEX) {
            config.index_name = index_name;
        }
        if let Ok(namespace) = std::env::var(ENV_NAMESPACE) {
            config.namespace = namespace;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.index_name.is_empty() {
            return Err(ConfigError::MissingIndexName);
        }
        if self.dimension == 0 {
            return Err(ConfigError::Invalid {
                reason: "Dimension must be positive".to_string(),
            });
        }
        if self.environment.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "Environment must not be empty".to_string(),
            });
        }
        if self.api_base.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "API base URL must not be empty".to_string(),
            });
        }
        if self.retry.base_delay > self.retry.max_delay
            || self.retry.rate_limit_delay > self.retry.max_delay
        {
            return Err(ConfigError::Invalid {
                reason: "Backoff base delay exceeds the cap".to_string(),
            });
        }
        Ok(())
    }
}
