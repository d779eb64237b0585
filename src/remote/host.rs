//! Data-plane wire path addressed to the dedicated per-index host, the way
//! the provider's native client resolves it. Used when the control plane is
//! unreachable but the index itself still answers.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::transport::{HttpTransport, TransportResult};

use super::wire::{FetchResponse, IndexStatsResponse, QueryMatch, QueryResponse, WireVector};
use super::{fetch_url, parse_body, query_body, FetchedVector, TransportKind, VectorTransport};

#[derive(Debug, Clone)]
pub struct IndexHostTransport {
    http: HttpTransport,
    host: String,
}

impl IndexHostTransport {
    pub fn new(http: HttpTransport, host: impl Into<String>) -> Self {
        Self {
            http,
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    /// Conventional data-plane host for an index in a region.
    pub fn host_for(index_name: &str, environment: &str) -> String {
        format!("https://{index_name}.svc.{environment}.pinecone.io")
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Data-plane URL: `{host}/{operation}`, no index segment.
    pub(super) fn url(&self, operation: &str) -> String {
        format!("{}/{}", self.host, operation)
    }
}

#[async_trait]
impl VectorTransport for IndexHostTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::IndexHost
    }

    async fn upsert(&self, vectors: &[WireVector], namespace: &str) -> TransportResult<()> {
        let body = serde_json::json!({ "vectors": vectors, "namespace": namespace });
        self.http
            .request(Method::POST, &self.url("vectors/upsert"), Some(&body))
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Value>,
        namespace: &str,
    ) -> TransportResult<Vec<QueryMatch>> {
        let body = query_body(vector, top_k, filter, namespace);
        let response = self
            .http
            .request(Method::POST, &self.url("query"), Some(&body))
            .await?;
        let parsed: QueryResponse = parse_body(response.body)?;
        Ok(parsed.matches)
    }

    async fn delete(&self, ids: &[String], namespace: &str) -> TransportResult<()> {
        let body = serde_json::json!({ "ids": ids, "namespace": namespace });
        self.http
            .request(Method::POST, &self.url("vectors/delete"), Some(&body))
            .await?;
        Ok(())
    }

    async fn fetch(
        &self,
        ids: &[String],
        namespace: &str,
    ) -> TransportResult<HashMap<String, FetchedVector>> {
        let url = fetch_url(&self.url("vectors/fetch"), ids, namespace)?;
        let response = self.http.request(Method::GET, &url, None).await?;
        let parsed: FetchResponse = parse_body(response.body)?;
        Ok(parsed.vectors)
    }

    async fn stats(&self) -> TransportResult<IndexStatsResponse> {
        let response = self
            .http
            .request(Method::GET, &self.url("describe_index_stats"), None)
            .await?;
        parse_body(response.body)
    }

    async fn probe(&self) -> TransportResult<()> {
        self.http
            .request_once(Method::GET, &self.url("describe_index_stats"))
            .await?;
        Ok(())
    }
}
