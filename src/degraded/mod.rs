//! In-memory fallback index engaged while the remote store is unreachable.
//!
//! Records land here append-only and queries run as a linear cosine scan.
//! Nothing migrates back to the remote automatically; leaving degraded mode
//! is an operator action that drains the records for explicit re-upload.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::types::{SearchFilter, SearchHit, VectorRecord};


/// Append-only local index with the same query contract as the remote path.
///
/// All operations are infallible: a read against an empty index yields an
/// empty result, never an error, so callers in degraded mode keep working
/// without a second error path to handle.
pub struct DegradedIndex {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Insertion-ordered storage. Deleted records leave a `None` tombstone
    /// behind so the ordinals in `by_id` stay valid.
    slots: Vec<Option<VectorRecord>>,
    /// Record id to slot ordinal, live records only.
    by_id: HashMap<String, usize>,
}

impl DegradedIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Stores records, replacing in place when an id is already present.
    ///
    /// A replaced record keeps its original slot, so its rank among
    /// equal-similarity results does not move.
    pub async fn upsert(&self, records: Vec<VectorRecord>) {
        if records.is_empty() {
            return;
        }

        let mut inner = self.inner.write().await;
        let stored = records.len();
        for record in records {
            match inner.by_id.get(&record.id).copied() {
                Some(slot) => inner.slots[slot] = Some(record),
                None => {
                    let slot = inner.slots.len();
                    inner.by_id.insert(record.id.clone(), slot);
                    inner.slots.push(Some(record));
                }
            }
        }

        debug!(
            "Stored {} record(s) in the degraded index ({} live)",
            stored,
            inner.by_id.len()
        );
    }

    /// Removes the given ids, skipping any that are not present.
    ///
    /// Returns how many records were actually removed.
    pub async fn delete(&self, ids: &[String]) -> usize {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for id in ids {
            if let Some(slot) = inner.by_id.remove(id) {
                inner.slots[slot] = None;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Deleted {} record(s) from the degraded index", removed);
        }
        removed
    }

    /// Linear scan: filter, score by cosine similarity, then take the top
    /// `top_k` in descending similarity.
    ///
    /// The sort is stable, so records with equal similarity come back in
    /// insertion order.
    pub async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Vec<SearchHit> {
        let inner = self.inner.read().await;

        let mut scored: Vec<(f32, &VectorRecord)> = inner
            .slots
            .iter()
            .flatten()
            .filter(|record| filter.map_or(true, |f| f.matches(&record.metadata)))
            .map(|record| (cosine_similarity(embedding, &record.embedding), record))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, record)| SearchHit {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                distance: 1.0 - similarity,
            })
            .collect();

        debug!(
            "Degraded index served a search: {} hit(s) (top_k {})",
            hits.len(),
            top_k
        );
        hits
    }

    /// Looks up records by id. Unknown ids are simply absent from the map.
    pub async fn fetch(&self, ids: &[String]) -> HashMap<String, VectorRecord> {
        let inner = self.inner.read().await;
        ids.iter()
            .filter_map(|id| {
                let slot = inner.by_id.get(id).copied()?;
                inner.slots[slot]
                    .as_ref()
                    .map(|record| (id.clone(), record.clone()))
            })
            .collect()
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Empties the index and hands every live record back in insertion
    /// order. The caller decides what to re-upload; nothing is retried here.
    pub async fn drain(&self) -> Vec<VectorRecord> {
        let mut inner = self.inner.write().await;
        inner.by_id.clear();
        let records: Vec<VectorRecord> = inner.slots.drain(..).flatten().collect();

        if !records.is_empty() {
            info!("Drained {} record(s) from the degraded index", records.len());
        }
        records
    }
}

impl Default for DegradedIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity in [-1, 1]. A zero-norm vector on either side scores
/// 0.0 rather than dividing by zero.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
