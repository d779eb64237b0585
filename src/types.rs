//! Core data model shared by the remote transports, the degraded index, and
//! the document store facade.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(test)]
use proptest::prelude::*;
#[cfg(test)]
use proptest_derive::Arbitrary;

/// Metadata key that carries the chunk text on the wire. The remote schema
/// has no first-class text field, so records fold their text into metadata on
/// the way out and split it back off on the way in.
pub const TEXT_METADATA_KEY: &str = "text";

/// Zero-padding width of the character offset in generated chunk ids.
pub const CHUNK_OFFSET_WIDTH: usize = 8;

/// A single embedded document chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct VectorRecord {
    /// Unique id within the namespace.
    #[cfg_attr(test, proptest(strategy = "\"[a-z0-9_-]{1,24}\""))]
    pub id: String,
    /// Dense embedding; length must match the index dimension.
    #[cfg_attr(test, proptest(strategy = "proptest::collection::vec(-1.0f32..1.0, 8)"))]
    pub embedding: Vec<f32>,
    /// Chunk text. Travels under the `"text"` metadata key remotely.
    #[cfg_attr(test, proptest(strategy = "\"[a-zA-Z0-9 ]{0,120}\""))]
    pub text: String,
    /// Scalar metadata. Empty-string values are dropped before either store
    /// sees the record.
    #[serde(default)]
    #[cfg_attr(test, proptest(strategy = "metadata_strategy()"))]
    pub metadata: HashMap<String, Value>,
}

#[cfg(test)]
fn metadata_strategy() -> impl Strategy<Value = HashMap<String, Value>> {
    proptest::collection::hash_map(
        "[a-z_]{1,12}",
        "[a-zA-Z0-9 ]{0,24}".prop_map(Value::String),
        0..4,
    )
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            embedding,
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Id for the chunk of `source_stem` starting at character `offset`,
    /// e.g. `("guide", 512)` becomes `guide_00000512`.
    pub fn chunk_id(source_stem: &str, offset: usize) -> String {
        format!("{}_{:0width$}", source_stem, offset, width = CHUNK_OFFSET_WIDTH)
    }

    /// Fallback id for callers that do not supply their own:
    /// `doc_{position}_{uuid}`.
    pub fn generated_id(position: usize) -> String {
        format!("doc_{}_{}", position, Uuid::new_v4())
    }

    /// Drops metadata keys whose value is the empty string. The remote
    /// treats an empty string as "field not set", so normalizing here keeps
    /// both store paths presenting the same contract.
    pub fn normalize_metadata(&mut self) {
        self.metadata
            .retain(|_, value| !matches!(value, Value::String(s) if s.is_empty()));
    }

    /// Metadata as transmitted: normalized, with the text folded in.
    pub fn wire_metadata(&self) -> HashMap<String, Value> {
        let mut metadata = self.metadata.clone();
        metadata.retain(|_, value| !matches!(value, Value::String(s) if s.is_empty()));
        metadata.insert(
            TEXT_METADATA_KEY.to_string(),
            Value::String(self.text.clone()),
        );
        metadata
    }

    /// Rebuilds a record from a wire-side `(values, metadata)` pair,
    /// splitting the text back out of metadata.
    pub fn from_wire(id: String, embedding: Vec<f32>, metadata: HashMap<String, Value>) -> Self {
        let (text, metadata) = split_text_metadata(metadata);
        Self {
            id,
            embedding,
            text,
            metadata,
        }
    }
}

/// Splits the `"text"` entry off a wire metadata map, returning the text and
/// the remaining metadata. A missing or non-string text entry becomes an
/// empty string.
pub fn split_text_metadata(
    mut metadata: HashMap<String, Value>,
) -> (String, HashMap<String, Value>) {
    let text = match metadata.remove(TEXT_METADATA_KEY) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    (text, metadata)
}

/// Exact-match metadata filter.
///
/// Every entry must match (logical AND) and comparison is case-sensitive.
/// Only string metadata values can match; other scalar types never equal a
/// string filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub equals: HashMap<String, String>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    /// Remote filter document: one `{key: {"$eq": value}}` entry per pair;
    /// the remote ANDs sibling keys together.
    pub fn to_remote(&self) -> Option<Value> {
        if self.equals.is_empty() {
            return None;
        }
        let mut document = serde_json::Map::new();
        for (key, value) in &self.equals {
            document.insert(key.clone(), serde_json::json!({ "$eq": value }));
        }
        Some(Value::Object(document))
    }

    /// Local evaluation with the same semantics the remote applies: a
    /// missing key fails the match.
    pub fn matches(&self, metadata: &HashMap<String, Value>) -> bool {
        self.equals.iter().all(|(key, want)| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .map_or(false, |have| have == want)
        })
    }
}

/// A search match returned by either store path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    /// Chunk text recovered from metadata.
    pub text: String,
    /// Remaining metadata, text key already split off.
    pub metadata: HashMap<String, Value>,
    /// Cosine distance, `1.0 - similarity`; lower is closer.
    pub distance: f32,
}

impl SearchHit {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Outcome of a batched upsert.
///
/// Batches are transmitted sequentially, so `sent` is always a prefix of the
/// input: callers can retry `records[sent..]` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertReport {
    pub total: usize,
    pub sent: usize,
    /// Set when a batch failed after transport retries; later batches were
    /// not attempted.
    pub failure: Option<BatchFailure>,
}

/// Details of the batch that stopped an upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Zero-based index of the failing batch.
    pub batch: usize,
    pub reason: String,
}

impl UpsertReport {
    pub fn complete(total: usize) -> Self {
        Self {
            total,
            sent: total,
            failure: None,
        }
    }

    pub fn partial(total: usize, sent: usize, batch: usize, reason: impl Into<String>) -> Self {
        Self {
            total,
            sent,
            failure: Some(BatchFailure {
                batch,
                reason: reason.into(),
            }),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.sent == self.total && self.failure.is_none()
    }

    /// Records that were not sent.
    pub fn failed(&self) -> usize {
        self.total - self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_zero_pads_offset() {
        assert_eq!(VectorRecord::chunk_id("guide", 512), "guide_00000512");
        assert_eq!(VectorRecord::chunk_id("guide", 0), "guide_00000000");
    }

    #[test]
    fn test_chunk_id_keeps_wide_offsets_intact() {
        assert_eq!(
            VectorRecord::chunk_id("doc", 123_456_789),
            "doc_123456789"
        );
    }

    #[test]
    fn test_generated_ids_carry_position_and_are_unique() {
        let a = VectorRecord::generated_id(0);
        let b = VectorRecord::generated_id(0);
        assert!(a.starts_with("doc_0_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize_drops_only_empty_string_values() {
        let mut record = VectorRecord::new("r1", vec![1.0], "body").with_metadata(
            [
                ("source".to_string(), Value::String("guide.pdf".into())),
                ("municipality".to_string(), Value::String(String::new())),
                ("latitude".to_string(), serde_json::json!(35.6)),
            ]
            .into_iter()
            .collect(),
        );
        record.normalize_metadata();
        assert_eq!(record.metadata.len(), 2);
        assert!(record.metadata.contains_key("source"));
        assert!(record.metadata.contains_key("latitude"));
        assert!(!record.metadata.contains_key("municipality"));
    }

    #[test]
    fn test_wire_metadata_folds_text_in() {
        let record = VectorRecord::new("r1", vec![1.0], "chunk body").with_metadata(
            [
                ("source".to_string(), Value::String("a.txt".into())),
                ("empty".to_string(), Value::String(String::new())),
            ]
            .into_iter()
            .collect(),
        );
        let wire = record.wire_metadata();
        assert_eq!(wire.get(TEXT_METADATA_KEY), Some(&Value::String("chunk body".into())));
        assert!(wire.contains_key("source"));
        assert!(!wire.contains_key("empty"));
    }

    #[test]
    fn test_from_wire_splits_text_back_out() {
        let record = VectorRecord::new("r1", vec![0.5, 0.5], "round trip").with_metadata(
            [("source".to_string(), Value::String("a.txt".into()))]
                .into_iter()
                .collect(),
        );
        let rebuilt =
            VectorRecord::from_wire("r1".to_string(), record.embedding.clone(), record.wire_metadata());
        assert_eq!(rebuilt.text, "round trip");
        assert_eq!(rebuilt.metadata, record.metadata);
        assert!(!rebuilt.metadata.contains_key(TEXT_METADATA_KEY));
    }

    #[test]
    fn test_filter_requires_every_pair_to_match() {
        let metadata: HashMap<String, Value> = [
            ("municipality".to_string(), Value::String("Sapporo".into())),
            ("major_category".to_string(), Value::String("housing".into())),
        ]
        .into_iter()
        .collect();

        let both = SearchFilter::new()
            .with("municipality", "Sapporo")
            .with("major_category", "housing");
        assert!(both.matches(&metadata));

        let one_wrong = SearchFilter::new()
            .with("municipality", "Sapporo")
            .with("major_category", "transport");
        assert!(!one_wrong.matches(&metadata));
    }

    #[test]
    fn test_filter_match_is_case_sensitive() {
        let metadata: HashMap<String, Value> =
            [("municipality".to_string(), Value::String("Sapporo".into()))]
                .into_iter()
                .collect();
        assert!(SearchFilter::new().with("municipality", "Sapporo").matches(&metadata));
        assert!(!SearchFilter::new().with("municipality", "sapporo").matches(&metadata));
    }

    #[test]
    fn test_filter_missing_key_fails_the_match() {
        let metadata = HashMap::new();
        assert!(!SearchFilter::new().with("source", "a.txt").matches(&metadata));
    }

    #[test]
    fn test_filter_ignores_non_string_values() {
        let metadata: HashMap<String, Value> =
            [("latitude".to_string(), serde_json::json!(35.6))].into_iter().collect();
        assert!(!SearchFilter::new().with("latitude", "35.6").matches(&metadata));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(SearchFilter::new().matches(&HashMap::new()));
    }

    #[test]
    fn test_remote_filter_uses_eq_operators() {
        let filter = SearchFilter::new().with("municipality", "Sapporo");
        let remote = filter.to_remote().unwrap();
        assert_eq!(remote["municipality"]["$eq"], Value::String("Sapporo".into()));
        assert!(SearchFilter::new().to_remote().is_none());
    }

    #[test]
    fn test_upsert_report_accounting() {
        let complete = UpsertReport::complete(250);
        assert!(complete.is_complete());
        assert_eq!(complete.failed(), 0);

        let partial = UpsertReport::partial(250, 100, 1, "HTTP 503");
        assert!(!partial.is_complete());
        assert_eq!(partial.sent, 100);
        assert_eq!(partial.failed(), 150);
        assert_eq!(partial.failure.as_ref().unwrap().batch, 1);
    }

    #[test]
    fn test_similarity_is_one_minus_distance() {
        let hit = SearchHit {
            id: "r1".to_string(),
            text: String::new(),
            metadata: HashMap::new(),
            distance: 0.25,
        };
        assert!((hit.similarity() - 0.75).abs() < f32::EPSILON);
    }
}
