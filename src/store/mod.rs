//! The document store facade: one front door over the remote index and the
//! in-memory fallback.
//!
//! Every operation consults [`ConnectionHealth`] first and routes to the
//! remote transport, to the [`DegradedIndex`], or to a refusal. Remote
//! outcomes feed back into health: a success refreshes it, and an
//! unreachable-class failure triggers one availability probe (never a blind
//! retry of the failed operation) before the error surfaces.

mod error;


pub use error::{StoreError, StoreResult};

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, StoreConfig};
use crate::connection::{ConnectionHealth, Negotiator, Route};
use crate::degraded::DegradedIndex;
use crate::embeddings::Embedder;
use crate::remote::{VectorTransport, WireVector};
use crate::transport::{TransportError, TransportResult};
use crate::types::{split_text_metadata, SearchFilter, SearchHit, UpsertReport, VectorRecord};

/// Records per upsert request; the remote rejects larger batches.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Document-oriented access to one vector index.
///
/// Owns the connection health and the degraded index; the transport is the
/// one the negotiator selected, swapped only by another establishment.
pub struct DocumentStore {
    config: StoreConfig,
    negotiator: Negotiator,
    health: Arc<ConnectionHealth>,
    transport: RwLock<Option<Arc<dyn VectorTransport>>>,
    degraded: DegradedIndex,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.config)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Builds the store and runs one connection negotiation.
    ///
    /// A failed negotiation is not fatal here: the failure is recorded on
    /// health and, in constrained deployments, repeated failures park the
    /// store in degraded mode instead. Configuration problems do fail
    /// immediately.
    pub async fn connect(config: StoreConfig, embedder: Arc<dyn Embedder>) -> StoreResult<Self> {
        if embedder.dimension() != config.dimension {
            return Err(StoreError::Configuration(ConfigError::Invalid {
                reason: format!(
                    "embedder produces {}-dimensional vectors but the index expects {}",
                    embedder.dimension(),
                    config.dimension
                ),
            }));
        }

        let negotiator = Negotiator::new(config.clone())?;
        let health = Arc::new(ConnectionHealth::new(config.constrained_runtime));
        let store = Self {
            config,
            negotiator,
            health,
            transport: RwLock::new(None),
            degraded: DegradedIndex::new(),
            embedder,
        };
        store.try_establish().await;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Shared health state; snapshot this for status surfaces.
    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }

    /// Where the next operation would go.
    pub fn route(&self) -> Route {
        self.health.route()
    }

    /// Number of records currently held by the degraded index.
    pub async fn degraded_len(&self) -> usize {
        self.degraded.len().await
    }

    /// Operator-driven reconnect. One negotiation attempt, outcome recorded
    /// on health; returns the resulting route.
    pub async fn reconnect(&self) -> Route {
        self.try_establish().await;
        self.health.route()
    }

    /// Operator-driven exit from degraded mode.
    ///
    /// Clears the temporary-failure flag and failure counter, then drains
    /// the degraded index. The drained records are returned to the caller
    /// for explicit re-upload; nothing is migrated automatically.
    pub async fn exit_degraded_mode(&self) -> Vec<VectorRecord> {
        self.health.exit_degraded();
        let records = self.degraded.drain().await;
        info!(
            "Left degraded mode; {} drained record(s) returned to the caller",
            records.len()
        );
        records
    }

    /// Stores records, routed per health state.
    ///
    /// On the remote path records go out sequentially in batches of
    /// [`UPSERT_BATCH_SIZE`]. A batch failure stops the call: the report
    /// then carries how much of the prefix was sent and which batch failed,
    /// and later batches are not attempted. Sent batches stay committed.
    pub async fn upsert(&self, records: Vec<VectorRecord>) -> StoreResult<UpsertReport> {
        if records.is_empty() {
            return Err(StoreError::InvalidArgument {
                reason: "no records to upsert".to_string(),
            });
        }

        let mut records = records;
        for record in &mut records {
            self.check_dimension(record.embedding.len())?;
            record.normalize_metadata();
        }

        match self.health.route() {
            Route::Unavailable => Err(self.unavailable("upsert")),
            Route::Degraded => {
                let total = records.len();
                self.degraded.upsert(records).await;
                debug!("Upsert of {} record(s) served by the degraded index", total);
                Ok(UpsertReport::complete(total))
            }
            Route::Remote => self.upsert_remote(records).await,
        }
    }

    /// Embeds `texts` and upserts the resulting records in one call.
    ///
    /// `ids` and `metadatas`, when given, must match `texts` in length; ids
    /// left out are generated. Returns the assigned ids alongside the
    /// report. Availability is checked before the embedding spend.
    pub async fn upsert_texts(
        &self,
        texts: &[String],
        metadatas: Option<Vec<HashMap<String, Value>>>,
        ids: Option<Vec<String>>,
    ) -> StoreResult<(Vec<String>, UpsertReport)> {
        if texts.is_empty() {
            return Err(StoreError::InvalidArgument {
                reason: "no texts to upsert".to_string(),
            });
        }
        if let Some(ids) = &ids {
            if ids.len() != texts.len() {
                return Err(StoreError::InvalidArgument {
                    reason: format!("{} ids supplied for {} texts", ids.len(), texts.len()),
                });
            }
        }
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != texts.len() {
                return Err(StoreError::InvalidArgument {
                    reason: format!(
                        "{} metadata entries supplied for {} texts",
                        metadatas.len(),
                        texts.len()
                    ),
                });
            }
        }
        if matches!(self.health.route(), Route::Unavailable) {
            return Err(self.unavailable("upsert"));
        }

        let embeddings = self.embedder.embed(texts).await?;

        let ids: Vec<String> = match ids {
            Some(ids) => ids,
            None => (0..texts.len()).map(VectorRecord::generated_id).collect(),
        };
        let mut metadatas = metadatas.unwrap_or_default();
        metadatas.resize(texts.len(), HashMap::new());

        let records: Vec<VectorRecord> = ids
            .iter()
            .zip(texts.iter())
            .zip(embeddings.into_iter())
            .zip(metadatas.into_iter())
            .map(|(((id, text), embedding), metadata)| {
                VectorRecord::new(id.clone(), embedding, text.clone()).with_metadata(metadata)
            })
            .collect();

        let report = self.upsert(records).await?;
        Ok((ids, report))
    }

    /// Embeds the query and returns matches in ascending distance order.
    ///
    /// An empty result is a valid answer, distinct from unavailability,
    /// which fails before the query embedding is even computed.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> StoreResult<Vec<SearchHit>> {
        let route = self.health.route();
        if matches!(route, Route::Unavailable) {
            return Err(self.unavailable("search"));
        }

        let embedding = self.embedder.embed_query(query).await?;
        self.check_dimension(embedding.len())?;

        if matches!(route, Route::Degraded) {
            return Ok(self.degraded.search(&embedding, top_k, filter).await);
        }
        self.search_remote(&embedding, top_k, filter).await
    }

    /// Removes records by id. Ids absent from the active store are not an
    /// error.
    pub async fn delete(&self, ids: &[String]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        match self.health.route() {
            Route::Unavailable => Err(self.unavailable("delete")),
            Route::Degraded => {
                self.degraded.delete(ids).await;
                Ok(())
            }
            Route::Remote => {
                let transport = self.remote().await?;
                let result = transport.delete(ids, &self.config.namespace).await;
                self.finish_remote(transport.as_ref(), result).await
            }
        }
    }

    /// Vector count in the configured namespace. A namespace the remote has
    /// never seen counts as 0.
    pub async fn count(&self) -> StoreResult<usize> {
        match self.health.route() {
            Route::Unavailable => Err(self.unavailable("count")),
            Route::Degraded => Ok(self.degraded.len().await),
            Route::Remote => {
                let transport = self.remote().await?;
                let result = transport.stats().await;
                let stats = self.finish_remote(transport.as_ref(), result).await?;
                Ok(stats.namespace_count(&self.config.namespace))
            }
        }
    }

    /// Direct retrieval by id; unknown ids are absent from the result.
    ///
    /// The remote cannot enumerate "all ids", so an empty request is served
    /// as explicitly empty instead of becoming a scan.
    pub async fn fetch(&self, ids: &[String]) -> StoreResult<HashMap<String, VectorRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        match self.health.route() {
            Route::Unavailable => Err(self.unavailable("fetch")),
            Route::Degraded => Ok(self.degraded.fetch(ids).await),
            Route::Remote => {
                let transport = self.remote().await?;
                let result = transport.fetch(ids, &self.config.namespace).await;
                let vectors = self.finish_remote(transport.as_ref(), result).await?;
                let records = vectors
                    .into_iter()
                    .map(|(id, fetched)| {
                        let record =
                            VectorRecord::from_wire(id.clone(), fetched.values, fetched.metadata);
                        (id, record)
                    })
                    .collect();
                Ok(records)
            }
        }
    }

    /// One negotiation attempt. Failures land on health, not on the caller;
    /// a previously established transport is kept so the grace window can
    /// still route through it.
    async fn try_establish(&self) {
        match self.negotiator.establish(&self.health).await {
            Ok(transport) => {
                *self.transport.write().await = Some(transport);
            }
            Err(err) => {
                warn!("Vector store connection attempt failed: {}", err);
            }
        }
    }

    async fn upsert_remote(&self, records: Vec<VectorRecord>) -> StoreResult<UpsertReport> {
        let transport = self.remote().await?;
        let total = records.len();
        let mut sent = 0usize;

        for (batch_index, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            let wire: Vec<WireVector> = batch
                .iter()
                .map(|record| WireVector {
                    id: record.id.clone(),
                    values: record.embedding.clone(),
                    metadata: record.wire_metadata(),
                })
                .collect();

            if let Err(err) = transport.upsert(&wire, &self.config.namespace).await {
                warn!(
                    "Upsert batch {} failed after {}/{} record(s) sent; later batches not attempted: {}",
                    batch_index, sent, total, err
                );
                self.after_remote_failure(transport.as_ref(), &err).await;
                return Ok(UpsertReport::partial(total, sent, batch_index, err.to_string()));
            }

            sent += batch.len();
            debug!("Upsert batch {} accepted ({}/{} sent)", batch_index, sent, total);
        }

        self.health.record_success();
        Ok(UpsertReport::complete(total))
    }

    async fn search_remote(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> StoreResult<Vec<SearchHit>> {
        let transport = self.remote().await?;
        let remote_filter = filter.and_then(SearchFilter::to_remote);
        let result = transport
            .query(embedding, top_k, remote_filter.as_ref(), &self.config.namespace)
            .await;
        let matches = self.finish_remote(transport.as_ref(), result).await?;

        let hits = matches
            .into_iter()
            .map(|m| {
                let (text, metadata) = split_text_metadata(m.metadata);
                SearchHit {
                    id: m.id,
                    text,
                    metadata,
                    distance: 1.0 - m.score,
                }
            })
            .collect();
        Ok(hits)
    }

    /// The established transport, or an unavailability error if negotiation
    /// has never succeeded.
    async fn remote(&self) -> StoreResult<Arc<dyn VectorTransport>> {
        self.transport
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Unavailable {
                reason: "no transport has been established".to_string(),
            })
    }

    /// Books a remote outcome into health and converts the error.
    async fn finish_remote<T>(
        &self,
        transport: &dyn VectorTransport,
        result: TransportResult<T>,
    ) -> StoreResult<T> {
        match result {
            Ok(value) => {
                self.health.record_success();
                Ok(value)
            }
            Err(err) => {
                self.after_remote_failure(transport, &err).await;
                Err(err.into())
            }
        }
    }

    /// Availability re-check after a failed remote call: one single-attempt
    /// probe, not a retry of the operation. Terminal client errors say
    /// nothing about reachability and leave health untouched.
    async fn after_remote_failure(&self, transport: &dyn VectorTransport, err: &TransportError) {
        if !err.is_unavailable() {
            return;
        }

        match transport.probe().await {
            Ok(()) => {
                debug!("Probe succeeded after an operation failure; remote still reachable");
                self.health.record_success();
            }
            Err(probe_err) => {
                let failures = self.health.record_failure();
                warn!(
                    "Probe failed after an operation failure ({} consecutive): {}",
                    failures, probe_err
                );
            }
        }
    }

    fn check_dimension(&self, actual: usize) -> StoreResult<()> {
        if actual != self.config.dimension {
            return Err(StoreError::InvalidDimension {
                expected: self.config.dimension,
                actual,
            });
        }
        Ok(())
    }

    fn unavailable(&self, operation: &str) -> StoreError {
        StoreError::Unavailable {
            reason: format!(
                "{operation} refused: remote store unreachable ({} consecutive failures) and degraded mode is not active",
                self.health.failed_attempts()
            ),
        }
    }
}
