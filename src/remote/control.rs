//! Control-plane wire path: every operation addressed to the API base with
//! the index name as a path segment. Also carries the index-management
//! calls only the control plane offers (list/describe/create).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::transport::{HttpTransport, TransportError, TransportResult};

use super::wire::{FetchResponse, IndexStatsResponse, QueryMatch, QueryResponse, WireVector};
use super::{fetch_url, parse_body, query_body, FetchedVector, TransportKind, VectorTransport};

#[derive(Debug, Clone)]
pub struct ControlPlaneTransport {
    http: HttpTransport,
    api_base: String,
    index_name: String,
}

impl ControlPlaneTransport {
    pub fn new(
        http: HttpTransport,
        api_base: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Data-plane URL: `{base}/{operation}/{index}`.
    pub(super) fn url(&self, operation: &str) -> String {
        format!("{}/{}/{}", self.api_base, operation, self.index_name)
    }

    pub(super) fn indexes_url(&self) -> String {
        format!("{}/indexes", self.api_base)
    }

    /// `GET /indexes`: the connectivity probe and first index-existence
    /// source; [`Self::describe_index`] confirms an absence before creation.
    pub async fn list_indexes(&self) -> TransportResult<Vec<String>> {
        let response = self
            .http
            .request(Method::GET, &self.indexes_url(), None)
            .await?;
        parse_body(response.body)
    }

    /// `GET /indexes/{name}`: `Ok(true)` when it exists, `Ok(false)` on 404.
    pub async fn describe_index(&self) -> TransportResult<bool> {
        let url = format!("{}/{}", self.indexes_url(), self.index_name);
        match self.http.request(Method::GET, &url, None).await {
            Ok(_) => Ok(true),
            Err(TransportError::ClientError { status: 404, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// `POST /indexes`. The remote may answer 202 and finish creation
    /// asynchronously; the negotiator owns the grace wait.
    pub async fn create_index(&self, dimension: usize, metric: &str) -> TransportResult<()> {
        let body = serde_json::json!({
            "name": self.index_name,
            "dimension": dimension,
            "metric": metric,
        });
        let response = self
            .http
            .request(Method::POST, &self.indexes_url(), Some(&body))
            .await?;
        debug!(
            "Index creation for '{}' accepted with HTTP {}",
            self.index_name, response.status
        );
        Ok(())
    }
}

#[async_trait]
impl VectorTransport for ControlPlaneTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ControlPlane
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
            .request_once(Method::GET, &self.indexes_url())
            .await?;
        Ok(())
    }
}
