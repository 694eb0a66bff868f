//! Hybrid retrieval: vector similarity over the cached corpus, exact
//! metadata filters, and an inverse-log recency weight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use switchyard_core::config::AttendeeMatch;
use switchyard_core::error::Result;
use switchyard_core::types::UserId;

use crate::corpus::{
    CorpusStore, EventFilters, EventRecord, FileFilters, FileRecord, MessageFilters,
    MessageRecord, Timestamped,
};
use crate::embeddings::CachedEmbedder;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A ranked retrieval hit. Similarity is kept alongside the combined score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalCandidate<T> {
    #[serde(flatten)]
    pub record: T,
    pub similarity: f32,
    pub recency_weight: f64,
    pub combined_score: f64,
}

/// Filters for the untyped entry point, one variant per resource type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceFilters {
    Messages(MessageFilters),
    Events(EventFilters),
    Files(FileFilters),
}

/// `1 / ln(days_ago + 2)`: decreasing, positive, and finite at zero.
/// Future timestamps count as zero days old.
pub fn recency_weight(days_ago: f64) -> f64 {
    1.0 / (days_ago.max(0.0) + 2.0).ln()
}

/// Days between `reference` and `now`; a missing timestamp counts as zero.
pub fn days_ago(reference: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match reference {
        Some(ts) => (now - ts).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY,
        None => 0.0,
    }
}

/// Turn `(record, cosine_distance)` rows into candidates ordered by
/// combined score, highest first.
pub fn rank<T: Timestamped>(rows: Vec<(T, f32)>, now: DateTime<Utc>) -> Vec<RetrievalCandidate<T>> {
    let mut ranked: Vec<RetrievalCandidate<T>> = rows
        .into_iter()
        .map(|(record, distance)| {
            let similarity = 1.0 - distance;
            let weight = recency_weight(days_ago(record.reference_time(), now));
            RetrievalCandidate {
                record,
                similarity,
                recency_weight: weight,
                combined_score: similarity as f64 * weight,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Whether an event's attendee list satisfies any of the wanted values.
pub fn attendees_match(attendees: &[String], wanted: &[String], mode: AttendeeMatch) -> bool {
    match mode {
        AttendeeMatch::Structured => wanted
            .iter()
            .any(|w| attendees.iter().any(|a| a.trim().eq_ignore_ascii_case(w.trim()))),
        AttendeeMatch::Substring => {
            let flat = serde_json::to_string(attendees).unwrap_or_default();
            wanted.iter().any(|w| flat.contains(w.as_str()))
        }
    }
}

/// Combines nearest-neighbour lookup over the cached corpus with metadata
/// filters and recency weighting.
pub struct HybridRetriever {
    store: Arc<dyn CorpusStore>,
    embedder: Arc<CachedEmbedder>,
    attendee_match: AttendeeMatch,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn CorpusStore>, embedder: Arc<CachedEmbedder>) -> Self {
        Self {
            store,
            embedder,
            attendee_match: AttendeeMatch::default(),
        }
    }

    pub fn with_attendee_match(mut self, mode: AttendeeMatch) -> Self {
        self.attendee_match = mode;
        self
    }

    pub async fn search_messages(
        &self,
        user: &UserId,
        query: &str,
        filters: &MessageFilters,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate<MessageRecord>>> {
        let vector = self.embedder.embed(query).await?;
        let rows = self.store.nearest_messages(user, &vector, filters, limit).await?;
        debug!(%user, candidates = rows.len(), "Message retrieval");
        Ok(rank(rows, Utc::now()))
    }

    /// Attendee filtering runs in memory after ranking, so fewer than
    /// `limit` events may come back.
    pub async fn search_events(
        &self,
        user: &UserId,
        query: &str,
        filters: &EventFilters,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate<EventRecord>>> {
        let vector = self.embedder.embed(query).await?;
        let rows = self.store.nearest_events(user, &vector, filters, limit).await?;
        let fetched = rows.len();

        let mut ranked = rank(rows, Utc::now());
        if !filters.attendees.is_empty() {
            ranked.retain(|c| {
                attendees_match(&c.record.attendees, &filters.attendees, self.attendee_match)
            });
        }
        debug!(%user, fetched, kept = ranked.len(), "Event retrieval");
        Ok(ranked)
    }

    pub async fn search_files(
        &self,
        user: &UserId,
        query: &str,
        filters: &FileFilters,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate<FileRecord>>> {
        let vector = self.embedder.embed(query).await?;
        let rows = self.store.nearest_files(user, &vector, filters, limit).await?;
        debug!(%user, candidates = rows.len(), "File retrieval");
        Ok(rank(rows, Utc::now()))
    }

    /// Untyped entry point returning serialized candidates.
    pub async fn search(
        &self,
        user: &UserId,
        query: &str,
        filters: &ResourceFilters,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>> {
        let values = match filters {
            ResourceFilters::Messages(f) => to_values(self.search_messages(user, query, f, limit).await?)?,
            ResourceFilters::Events(f) => to_values(self.search_events(user, query, f, limit).await?)?,
            ResourceFilters::Files(f) => to_values(self.search_files(user, query, f, limit).await?)?,
        };
        Ok(values)
    }
}

fn to_values<T: Serialize>(items: Vec<T>) -> Result<Vec<serde_json::Value>> {
    items
        .into_iter()
        .map(|c| serde_json::to_value(c).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingProvider;
    use crate::store::SqliteCorpus;
    use chrono::Duration;
    use futures::future::BoxFuture;
    use switchyard_core::error::SwitchyardError;

    /// Maps known words to fixed axes; anything else points along the last axis.
    struct AxisEmbedder;

    impl EmbeddingProvider for AxisEmbedder {
        fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
            let out = texts
                .iter()
                .map(|t| match t.as_str() {
                    "flight" => vec![1.0, 0.0, 0.0],
                    "budget" => vec![0.0, 1.0, 0.0],
                    _ => vec![0.0, 0.0, 1.0],
                })
                .collect();
            Box::pin(async move { Ok(out) })
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        fn embed(&self, _texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
            Box::pin(async { Err(SwitchyardError::Embedding("provider down".into())) })
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn retriever(store: Arc<SqliteCorpus>, provider: Arc<dyn EmbeddingProvider>) -> HybridRetriever {
        let embedder = Arc::new(CachedEmbedder::new(provider, std::time::Duration::from_secs(60)));
        HybridRetriever::new(store, embedder)
    }

    #[test]
    fn test_recency_weight_strictly_decreasing() {
        let mut prev = recency_weight(0.0);
        assert!(prev.is_finite() && prev > 0.0);
        for d in [0.5, 1.0, 2.0, 7.0, 30.0, 365.0, 3650.0] {
            let w = recency_weight(d);
            assert!(w < prev, "weight at {} days not below previous", d);
            assert!(w > 0.0);
            prev = w;
        }
    }

    #[test]
    fn test_recency_weight_clamps_future() {
        assert_eq!(recency_weight(-5.0), recency_weight(0.0));
        assert!((recency_weight(0.0) - 1.0 / 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_days_ago() {
        let now = Utc::now();
        assert_eq!(days_ago(None, now), 0.0);
        let d = days_ago(Some(now - Duration::hours(36)), now);
        assert!((d - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_rank_prefers_recent_at_equal_similarity() {
        let now = Utc::now();
        let old = MessageRecord {
            external_id: "old".into(),
            received_at: Some(now - Duration::days(60)),
            ..Default::default()
        };
        let fresh = MessageRecord {
            external_id: "fresh".into(),
            received_at: Some(now - Duration::days(1)),
            ..Default::default()
        };
        let ranked = rank(vec![(old, 0.1), (fresh, 0.1)], now);
        assert_eq!(ranked[0].record.external_id, "fresh");
        assert!((ranked[0].similarity - 0.9).abs() < 1e-6);
        assert!(ranked[0].combined_score > ranked[1].combined_score);
    }

    #[test]
    fn test_attendee_structured_vs_substring() {
        let attendees = vec!["john.smith@acme.com".to_string()];
        let partial = vec!["john@acme.com".to_string(), "smith".to_string()];
        let exact = vec!["John.Smith@acme.com".to_string()];

        assert!(!attendees_match(&attendees, &partial, AttendeeMatch::Structured));
        assert!(attendees_match(&attendees, &exact, AttendeeMatch::Structured));
        assert!(attendees_match(&attendees, &partial, AttendeeMatch::Substring));
    }

    #[tokio::test]
    async fn test_empty_corpus_is_empty_not_error() {
        let store = Arc::new(SqliteCorpus::in_memory().unwrap());
        let r = retriever(store, Arc::new(AxisEmbedder));
        let out = r
            .search_messages(&UserId::new(), "flight", &MessageFilters::default(), 5)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_search_messages_ranks_by_combined_score() {
        let store = Arc::new(SqliteCorpus::in_memory().unwrap());
        let user = UserId::new();
        let now = Utc::now();
        let record = |id: &str, days: i64| MessageRecord {
            external_id: id.into(),
            received_at: Some(now - Duration::days(days)),
            ..Default::default()
        };
        store.upsert_message(&user, &record("booking", 40), Some(&[1.0, 0.0, 0.0])).unwrap();
        store.upsert_message(&user, &record("budget", 1), Some(&[0.0, 1.0, 0.0])).unwrap();
        store.upsert_message(&user, &record("similar-recent", 1), Some(&[0.9, 0.1, 0.0])).unwrap();

        let r = retriever(store, Arc::new(AxisEmbedder));
        let out = r
            .search_messages(&user, "flight", &MessageFilters::default(), 3)
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].record.external_id, "similar-recent");
        assert_eq!(out[2].record.external_id, "budget");
        assert!(out.windows(2).all(|w| w[0].combined_score >= w[1].combined_score));
    }

    #[tokio::test]
    async fn test_search_events_filters_attendees_after_ranking() {
        let store = Arc::new(SqliteCorpus::in_memory().unwrap());
        let user = UserId::new();
        let event = |id: &str, who: &str| EventRecord {
            external_id: id.into(),
            attendees: vec![who.into()],
            ..Default::default()
        };
        store.upsert_event(&user, &event("e1", "john@acme.com"), Some(&[1.0, 0.0, 0.0])).unwrap();
        store.upsert_event(&user, &event("e2", "jane@acme.com"), Some(&[1.0, 0.0, 0.0])).unwrap();

        let r = retriever(store, Arc::new(AxisEmbedder));
        let filters = EventFilters {
            attendees: vec!["john@acme.com".into()],
            ..Default::default()
        };
        let out = r.search_events(&user, "flight", &filters, 10).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.external_id, "e1");
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let store = Arc::new(SqliteCorpus::in_memory().unwrap());
        let r = retriever(store, Arc::new(FailingEmbedder));
        let err = r
            .search_files(&UserId::new(), "x", &FileFilters::default(), 5)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("provider down"));
    }

    #[tokio::test]
    async fn test_untyped_search_serializes_candidates() {
        let store = Arc::new(SqliteCorpus::in_memory().unwrap());
        let user = UserId::new();
        let file = FileRecord {
            external_id: "f1".into(),
            name: Some("Budget.xlsx".into()),
            ..Default::default()
        };
        store.upsert_file(&user, &file, Some(&[0.0, 1.0, 0.0])).unwrap();

        let r = retriever(store, Arc::new(AxisEmbedder));
        let out = r
            .search(&user, "budget", &ResourceFilters::Files(FileFilters::default()), 5)
            .await
            .unwrap();
        assert_eq!(out[0]["external_id"], "f1");
        assert!(out[0]["combined_score"].as_f64().unwrap() > 0.0);
    }
}
