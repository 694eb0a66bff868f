use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use switchyard_core::error::Result;
use switchyard_core::types::UserId;

/// A cached mail message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub external_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipients: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

/// A cached calendar event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub external_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A cached storage file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub external_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub content_preview: Option<String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Records that carry the timestamp recency weighting is measured from.
pub trait Timestamped {
    fn reference_time(&self) -> Option<DateTime<Utc>>;
}

impl Timestamped for MessageRecord {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }
}

impl Timestamped for EventRecord {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }
}

impl Timestamped for FileRecord {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }
}

/// Message filters. `sender` is a case-insensitive substring; the date
/// bounds on `received_at` are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFilters {
    pub sender: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Event filters. `date_from` bounds `start_time` and `date_to` bounds
/// `end_time`, both inclusive. `attendees` is applied after ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilters {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// File filters. `mime_type` is exact; the date bounds on `modified_at`
/// are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFilters {
    pub mime_type: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Per-user cached corpus queryable by nearest-neighbour distance.
///
/// Each method returns at most `limit` `(record, cosine_distance)` pairs in
/// ascending distance order, considering only rows with a stored embedding
/// that satisfy every exact filter. An empty result is not an error.
pub trait CorpusStore: Send + Sync + 'static {
    fn nearest_messages(
        &self,
        user: &UserId,
        query: &[f32],
        filters: &MessageFilters,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(MessageRecord, f32)>>>;

    fn nearest_events(
        &self,
        user: &UserId,
        query: &[f32],
        filters: &EventFilters,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(EventRecord, f32)>>>;

    fn nearest_files(
        &self,
        user: &UserId,
        query: &[f32],
        filters: &FileFilters,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(FileRecord, f32)>>>;
}
