use std::sync::Arc;

use tracing::info;

use switchyard_core::error::Result;
use switchyard_core::types::UserId;

use crate::corpus::{EventRecord, FileRecord, MessageRecord};
use crate::embeddings::CachedEmbedder;
use crate::store::SqliteCorpus;

const MESSAGE_PREVIEW_CHARS: usize = 500;
const EVENT_DESCRIPTION_CHARS: usize = 300;
const FILE_PREVIEW_CHARS: usize = 500;

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn message_text(record: &MessageRecord) -> String {
    format!(
        "{} | From: {} | {}",
        record.subject.as_deref().unwrap_or(""),
        record.sender.as_deref().unwrap_or(""),
        truncate_chars(record.body_preview.as_deref().unwrap_or(""), MESSAGE_PREVIEW_CHARS)
    )
}

pub fn event_text(record: &EventRecord) -> String {
    let mut parts = vec![record.title.clone().unwrap_or_default()];
    if let Some(desc) = record.description.as_deref().filter(|d| !d.is_empty()) {
        parts.push(truncate_chars(desc, EVENT_DESCRIPTION_CHARS).to_string());
    }
    if !record.attendees.is_empty() {
        parts.push(format!("Attendees: {}", record.attendees.join(", ")));
    }
    parts.join(" | ")
}

pub fn file_text(record: &FileRecord) -> String {
    let mut parts = vec![record.name.clone().unwrap_or_default()];
    if let Some(mime) = record.mime_type.as_deref().filter(|m| !m.is_empty()) {
        parts.push(mime.to_string());
    }
    if let Some(preview) = record.content_preview.as_deref().filter(|p| !p.is_empty()) {
        parts.push(truncate_chars(preview, FILE_PREVIEW_CHARS).to_string());
    }
    parts.join(" | ")
}

/// Embeds records and writes them into the cached corpus.
pub struct Indexer {
    store: Arc<SqliteCorpus>,
    embedder: Arc<CachedEmbedder>,
}

impl Indexer {
    pub fn new(store: Arc<SqliteCorpus>, embedder: Arc<CachedEmbedder>) -> Self {
        Self { store, embedder }
    }

    pub async fn index_messages(&self, user: &UserId, records: &[MessageRecord]) -> Result<usize> {
        let texts: Vec<String> = records.iter().map(message_text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (record, vector) in records.iter().zip(&vectors) {
            self.store.upsert_message(user, record, Some(vector))?;
        }
        info!(%user, count = records.len(), "Indexed messages");
        Ok(records.len())
    }

    pub async fn index_events(&self, user: &UserId, records: &[EventRecord]) -> Result<usize> {
        let texts: Vec<String> = records.iter().map(event_text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (record, vector) in records.iter().zip(&vectors) {
            self.store.upsert_event(user, record, Some(vector))?;
        }
        info!(%user, count = records.len(), "Indexed events");
        Ok(records.len())
    }

    pub async fn index_files(&self, user: &UserId, records: &[FileRecord]) -> Result<usize> {
        let texts: Vec<String> = records.iter().map(file_text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        for (record, vector) in records.iter().zip(&vectors) {
            self.store.upsert_file(user, record, Some(vector))?;
        }
        info!(%user, count = records.len(), "Indexed files");
        Ok(records.len())
    }
}
