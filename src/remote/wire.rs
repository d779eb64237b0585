//! Wire-format types for the remote vector store API.
//!
//! Request bodies are assembled with `serde_json::json!` at the call sites;
//! the structs here mirror the response shapes the contract promises. Every
//! field defaults so a sparse response still deserializes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One vector as transmitted in an upsert batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireVector {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

/// One query match; `score` is similarity, not distance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

/// Entry in a fetch response, keyed by record id in [`FetchResponse`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FetchedVector {
    #[serde(default)]
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub vectors: HashMap<String, FetchedVector>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NamespaceStats {
    #[serde(default)]
    pub vector_count: usize,
}

/// `describe_index_stats` response; namespaces the index has never seen are
/// simply absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexStatsResponse {
    #[serde(default)]
    pub namespaces: HashMap<String, NamespaceStats>,
}

impl IndexStatsResponse {
    /// Vector count for `namespace`; 0 when the namespace is absent.
    pub fn namespace_count(&self, namespace: &str) -> usize {
        self.namespaces
            .get(namespace)
            .map(|stats| stats.vector_count)
            .unwrap_or(0)
    }
}
