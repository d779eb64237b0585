//! Remote data-plane operations behind one trait with two wire
//! implementations.
//!
//! The negotiator selects exactly one implementation per establishment:
//! [`ControlPlaneTransport`] speaks the `…/vectors/upsert/{index}` path
//! style against the API base, [`IndexHostTransport`] speaks the same
//! operations against the per-index data-plane host. Both are stateless
//! beyond their base URL; retries live in the HTTP transport underneath and
//! health accounting in the facade above.

mod control;
mod host;
mod wire;


pub use control::ControlPlaneTransport;
pub use host::IndexHostTransport;
pub use wire::{
    FetchResponse, FetchedVector, IndexStatsResponse, NamespaceStats, QueryMatch, QueryResponse,
    WireVector,
};

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{TransportError, TransportResult};

/// Which wire path a transport speaks; surfaces in logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Control-plane path style against the API base.
    ControlPlane,
    /// Dedicated per-index data-plane host.
    IndexHost,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::ControlPlane => "control-plane",
            TransportKind::IndexHost => "index-host",
        }
    }
}

/// The data-plane operation set both wire paths implement.
#[async_trait]
pub trait VectorTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Upserts one already-normalized batch into `namespace`.
    async fn upsert(&self, vectors: &[WireVector], namespace: &str) -> TransportResult<()>;

    /// Similarity query; matches come back in the remote's score order.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Value>,
        namespace: &str,
    ) -> TransportResult<Vec<QueryMatch>>;

    /// Deletes by id; the remote treats absent ids as already deleted.
    async fn delete(&self, ids: &[String], namespace: &str) -> TransportResult<()>;

    /// Point lookup by id. Ids the remote does not know are absent from the
    /// result.
    async fn fetch(
        &self,
        ids: &[String],
        namespace: &str,
    ) -> TransportResult<HashMap<String, FetchedVector>>;

    /// Per-namespace statistics for the whole index.
    async fn stats(&self) -> TransportResult<IndexStatsResponse>;

    /// Single-attempt liveness check used by availability re-checks.
    async fn probe(&self) -> TransportResult<()>;
}

/// Deserializes a response body into the promised shape.
pub(crate) fn parse_body<T>(body: Value) -> TransportResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(body).map_err(|err| TransportError::InvalidResponse {
        reason: format!("Unexpected response shape: {err}"),
    })
}

/// Builds the query body shared by both wire paths.
pub(crate) fn query_body(
    vector: &[f32],
    top_k: usize,
    filter: Option<&Value>,
    namespace: &str,
) -> Value {
    let mut body = serde_json::json!({
        "vector": vector,
        "topK": top_k,
        "includeMetadata": true,
        "namespace": namespace,
    });
    if let (Some(filter), Some(object)) = (filter, body.as_object_mut()) {
        object.insert("filter".to_string(), filter.clone());
    }
    body
}

/// Builds a fetch URL with properly encoded repeated `ids` parameters.
pub(crate) fn fetch_url(
    base: &str,
    ids: &[String],
    namespace: &str,
) -> TransportResult<String> {
    let mut url = reqwest::Url::parse(base).map_err(|err| TransportError::InvalidRequest {
        reason: format!("Bad fetch URL {base}: {err}"),
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        for id in ids {
            pairs.append_pair("ids", id);
        }
        pairs.append_pair("namespace", namespace);
    }
    Ok(url.to_string())
}
