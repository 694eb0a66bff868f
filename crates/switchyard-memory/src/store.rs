use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::UserId;

use crate::corpus::{
    CorpusStore, EventFilters, EventRecord, FileFilters, FileRecord, MessageFilters,
    MessageRecord,
};
use crate::embeddings::cosine_similarity;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS mail_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        external_id TEXT NOT NULL,
        subject TEXT,
        sender TEXT,
        recipients TEXT,
        body_preview TEXT,
        received_at TEXT,
        embedding BLOB,
        synced_at TEXT NOT NULL,
        UNIQUE (user_id, external_id)
    );

    CREATE INDEX IF NOT EXISTS idx_mail_user ON mail_cache(user_id, received_at);

    CREATE TABLE IF NOT EXISTS calendar_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        external_id TEXT NOT NULL,
        title TEXT,
        description TEXT,
        start_time TEXT,
        end_time TEXT,
        attendees TEXT,
        location TEXT,
        embedding BLOB,
        synced_at TEXT NOT NULL,
        UNIQUE (user_id, external_id)
    );

    CREATE INDEX IF NOT EXISTS idx_calendar_user ON calendar_cache(user_id, start_time);

    CREATE TABLE IF NOT EXISTS storage_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        external_id TEXT NOT NULL,
        name TEXT,
        mime_type TEXT,
        content_preview TEXT,
        modified_at TEXT,
        embedding BLOB,
        synced_at TEXT NOT NULL,
        UNIQUE (user_id, external_id)
    );

    CREATE INDEX IF NOT EXISTS idx_storage_user ON storage_cache(user_id, modified_at);";

/// SQLite-backed per-user cache of mail, calendar, and storage items.
///
/// Embeddings are stored as little-endian `f32` blobs; similarity is
/// computed in process over the rows that pass the SQL filters.
pub struct SqliteCorpus {
    conn: Mutex<Connection>,
}

impl SqliteCorpus {
    /// Open or create a corpus database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SwitchyardError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Corpus store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SwitchyardError::Database(e.to_string()))
    }

    /// Insert or replace a message keyed by `(user, external_id)`.
    pub fn upsert_message(
        &self,
        user: &UserId,
        record: &MessageRecord,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO mail_cache
                (user_id, external_id, subject, sender, recipients, body_preview, received_at, embedding, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (user_id, external_id) DO UPDATE SET
                subject = excluded.subject,
                sender = excluded.sender,
                recipients = excluded.recipients,
                body_preview = excluded.body_preview,
                received_at = excluded.received_at,
                embedding = excluded.embedding,
                synced_at = excluded.synced_at",
            params![
                user.to_string(),
                record.external_id,
                record.subject,
                record.sender,
                record.recipients,
                record.body_preview,
                record.received_at.map(format_ts),
                embedding.map(encode_embedding),
                format_ts(Utc::now()),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Insert or replace an event keyed by `(user, external_id)`.
    pub fn upsert_event(
        &self,
        user: &UserId,
        record: &EventRecord,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let attendees = serde_json::to_string(&record.attendees)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO calendar_cache
                (user_id, external_id, title, description, start_time, end_time, attendees, location, embedding, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (user_id, external_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                attendees = excluded.attendees,
                location = excluded.location,
                embedding = excluded.embedding,
                synced_at = excluded.synced_at",
            params![
                user.to_string(),
                record.external_id,
                record.title,
                record.description,
                record.start_time.map(format_ts),
                record.end_time.map(format_ts),
                attendees,
                record.location,
                embedding.map(encode_embedding),
                format_ts(Utc::now()),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Insert or replace a file keyed by `(user, external_id)`.
    pub fn upsert_file(
        &self,
        user: &UserId,
        record: &FileRecord,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO storage_cache
                (user_id, external_id, name, mime_type, content_preview, modified_at, embedding, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (user_id, external_id) DO UPDATE SET
                name = excluded.name,
                mime_type = excluded.mime_type,
                content_preview = excluded.content_preview,
                modified_at = excluded.modified_at,
                embedding = excluded.embedding,
                synced_at = excluded.synced_at",
            params![
                user.to_string(),
                record.external_id,
                record.name,
                record.mime_type,
                record.content_preview,
                record.modified_at.map(format_ts),
                embedding.map(encode_embedding),
                format_ts(Utc::now()),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

/// Accumulates `AND` predicates with positional parameters.
struct Predicates {
    sql: String,
    args: Vec<SqlValue>,
}

impl Predicates {
    fn new(base: &str, user: &UserId) -> Self {
        Self {
            sql: format!("{} WHERE user_id = ?1 AND embedding IS NOT NULL", base),
            args: vec![SqlValue::Text(user.to_string())],
        }
    }

    fn push(&mut self, clause: &str, value: SqlValue) {
        self.args.push(value);
        self.sql
            .push_str(&format!(" AND {} ?{}", clause, self.args.len()));
    }

    fn push_ts(&mut self, clause: &str, value: Option<DateTime<Utc>>) {
        if let Some(ts) = value {
            self.push(clause, SqlValue::Text(format_ts(ts)));
        }
    }
}

impl CorpusStore for SqliteCorpus {
    fn nearest_messages(
        &self,
        user: &UserId,
        query: &[f32],
        filters: &MessageFilters,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(MessageRecord, f32)>>> {
        let mut preds = Predicates::new(
            "SELECT external_id, subject, sender, recipients, body_preview, received_at, embedding
             FROM mail_cache",
            user,
        );
        if let Some(ref sender) = filters.sender {
            preds.push("sender LIKE", SqlValue::Text(format!("%{}%", sender)));
        }
        preds.push_ts("received_at >=", filters.date_from);
        preds.push_ts("received_at <=", filters.date_to);
        let query = query.to_vec();

        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&preds.sql).map_err(db_err)?;
            let rows = stmt
                .query_map(params_from_iter(preds.args.iter()), |row| {
                    let received_at: Option<String> = row.get(5)?;
                    let blob: Vec<u8> = row.get(6)?;
                    Ok((
                        MessageRecord {
                            external_id: row.get(0)?,
                            subject: row.get(1)?,
                            sender: row.get(2)?,
                            recipients: row.get(3)?,
                            body_preview: row.get(4)?,
                            received_at: received_at.as_deref().and_then(parse_ts),
                        },
                        blob,
                    ))
                })
                .map_err(db_err)?;

            let mut candidates = Vec::new();
            for row in rows {
                candidates.push(row.map_err(db_err)?);
            }
            Ok(nearest(candidates, &query, limit))
        })
    }

    fn nearest_events(
        &self,
        user: &UserId,
        query: &[f32],
        filters: &EventFilters,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(EventRecord, f32)>>> {
        let mut preds = Predicates::new(
            "SELECT external_id, title, description, start_time, end_time, attendees, location, embedding
             FROM calendar_cache",
            user,
        );
        preds.push_ts("start_time >=", filters.date_from);
        preds.push_ts("end_time <=", filters.date_to);
        let query = query.to_vec();

        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&preds.sql).map_err(db_err)?;
            let rows = stmt
                .query_map(params_from_iter(preds.args.iter()), |row| {
                    let start_time: Option<String> = row.get(3)?;
                    let end_time: Option<String> = row.get(4)?;
                    let attendees: Option<String> = row.get(5)?;
                    let blob: Vec<u8> = row.get(7)?;
                    Ok((
                        EventRecord {
                            external_id: row.get(0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                            start_time: start_time.as_deref().and_then(parse_ts),
                            end_time: end_time.as_deref().and_then(parse_ts),
                            attendees: attendees
                                .and_then(|a| serde_json::from_str(&a).ok())
                                .unwrap_or_default(),
                            location: row.get(6)?,
                        },
                        blob,
                    ))
                })
                .map_err(db_err)?;

            let mut candidates = Vec::new();
            for row in rows {
                candidates.push(row.map_err(db_err)?);
            }
            Ok(nearest(candidates, &query, limit))
        })
    }

    fn nearest_files(
        &self,
        user: &UserId,
        query: &[f32],
        filters: &FileFilters,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(FileRecord, f32)>>> {
        let mut preds = Predicates::new(
            "SELECT external_id, name, mime_type, content_preview, modified_at, embedding
             FROM storage_cache",
            user,
        );
        if let Some(ref mime) = filters.mime_type {
            preds.push("mime_type =", SqlValue::Text(mime.clone()));
        }
        preds.push_ts("modified_at >=", filters.date_from);
        preds.push_ts("modified_at <=", filters.date_to);
        let query = query.to_vec();

        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&preds.sql).map_err(db_err)?;
            let rows = stmt
                .query_map(params_from_iter(preds.args.iter()), |row| {
                    let modified_at: Option<String> = row.get(4)?;
                    let blob: Vec<u8> = row.get(5)?;
                    Ok((
                        FileRecord {
                            external_id: row.get(0)?,
                            name: row.get(1)?,
                            mime_type: row.get(2)?,
                            content_preview: row.get(3)?,
                            modified_at: modified_at.as_deref().and_then(parse_ts),
                        },
                        blob,
                    ))
                })
                .map_err(db_err)?;

            let mut candidates = Vec::new();
            for row in rows {
                candidates.push(row.map_err(db_err)?);
            }
            Ok(nearest(candidates, &query, limit))
        })
    }
}

/// Rank rows by ascending cosine distance and keep the closest `limit`.
/// Rows embedded at a different dimension than the query are skipped.
fn nearest<T>(rows: Vec<(T, Vec<u8>)>, query: &[f32], limit: usize) -> Vec<(T, f32)> {
    let mut skipped = 0usize;
    let mut scored: Vec<(T, f32)> = rows
        .into_iter()
        .filter_map(|(record, blob)| {
            let embedding = decode_embedding(&blob);
            if embedding.len() != query.len() {
                skipped += 1;
                return None;
            }
            Some((record, 1.0 - cosine_similarity(query, &embedding)))
        })
        .collect();
    if skipped > 0 {
        debug!(skipped, dimensions = query.len(), "Skipped rows with stale embeddings");
    }

    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Fixed-width UTC form so that text comparison orders chronologically.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn db_err(e: rusqlite::Error) -> SwitchyardError {
    SwitchyardError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn msg(id: &str, sender: &str, days_ago: i64) -> MessageRecord {
        MessageRecord {
            external_id: id.into(),
            subject: Some(format!("subject {}", id)),
            sender: Some(sender.into()),
            received_at: Some(Utc::now() - Duration::days(days_ago)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_no_rows() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        let rows = store
            .nearest_messages(&user, &[1.0, 0.0], &MessageFilters::default(), 5)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_orders_by_distance_and_limits() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        store.upsert_message(&user, &msg("far", "a@x.com", 1), Some(&[0.0, 1.0])).unwrap();
        store.upsert_message(&user, &msg("near", "a@x.com", 1), Some(&[1.0, 0.1])).unwrap();
        store.upsert_message(&user, &msg("mid", "a@x.com", 1), Some(&[1.0, 1.0])).unwrap();

        let rows = store
            .nearest_messages(&user, &[1.0, 0.0], &MessageFilters::default(), 2)
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|(r, _)| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(rows[0].1 < rows[1].1);
    }

    #[tokio::test]
    async fn test_rows_without_embedding_and_other_users_excluded() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        let other = UserId::new();
        store.upsert_message(&user, &msg("pending", "a@x.com", 1), None).unwrap();
        store.upsert_message(&other, &msg("theirs", "a@x.com", 1), Some(&[1.0, 0.0])).unwrap();

        let rows = store
            .nearest_messages(&user, &[1.0, 0.0], &MessageFilters::default(), 5)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_sender_and_date_filters() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        store.upsert_message(&user, &msg("m1", "Sarah@Company.com", 2), Some(&[1.0, 0.0])).unwrap();
        store.upsert_message(&user, &msg("m2", "bob@other.com", 2), Some(&[1.0, 0.0])).unwrap();
        store.upsert_message(&user, &msg("m3", "sarah@company.com", 40), Some(&[1.0, 0.0])).unwrap();

        let filters = MessageFilters {
            sender: Some("sarah@company".into()),
            date_from: Some(Utc::now() - Duration::days(7)),
            date_to: None,
        };
        let rows = store.nearest_messages(&user, &[1.0, 0.0], &filters, 5).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.external_id, "m1");
    }

    #[tokio::test]
    async fn test_rows_with_other_dimension_excluded() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        store.upsert_message(&user, &msg("stale", "a@x.com", 1), Some(&[1.0, 0.0])).unwrap();
        store.upsert_message(&user, &msg("blank", "a@x.com", 1), Some(&[])).unwrap();

        let rows = store
            .nearest_messages(&user, &[1.0, 0.0, 0.0], &MessageFilters::default(), 5)
            .await
            .unwrap();
        assert!(rows.is_empty());

        store.upsert_message(&user, &msg("fresh", "a@x.com", 1), Some(&[0.0, 1.0, 0.0])).unwrap();
        let rows = store
            .nearest_messages(&user, &[1.0, 0.0, 0.0], &MessageFilters::default(), 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.external_id, "fresh");
    }

    #[tokio::test]
    async fn test_message_date_bounds_are_inclusive() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        let from = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap();
        let one_us = Duration::microseconds(1);
        let at = |id: &str, ts: DateTime<Utc>| MessageRecord {
            external_id: id.into(),
            received_at: Some(ts),
            ..Default::default()
        };
        store.upsert_message(&user, &at("on_from", from), Some(&[1.0, 0.0])).unwrap();
        store.upsert_message(&user, &at("on_to", to), Some(&[1.0, 0.0])).unwrap();
        store.upsert_message(&user, &at("before", from - one_us), Some(&[1.0, 0.0])).unwrap();
        store.upsert_message(&user, &at("after", to + one_us), Some(&[1.0, 0.0])).unwrap();

        let filters = MessageFilters {
            sender: None,
            date_from: Some(from),
            date_to: Some(to),
        };
        let rows = store.nearest_messages(&user, &[1.0, 0.0], &filters, 10).await.unwrap();
        let mut ids: Vec<_> = rows.iter().map(|(r, _)| r.external_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["on_from", "on_to"]);
    }

    #[tokio::test]
    async fn test_file_date_bounds_are_inclusive() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        let from = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 2, 20, 12, 0, 0).unwrap();
        let one_us = Duration::microseconds(1);
        let at = |id: &str, ts: DateTime<Utc>| FileRecord {
            external_id: id.into(),
            modified_at: Some(ts),
            ..Default::default()
        };
        store.upsert_file(&user, &at("on_from", from), Some(&[1.0, 0.0])).unwrap();
        store.upsert_file(&user, &at("on_to", to), Some(&[1.0, 0.0])).unwrap();
        store.upsert_file(&user, &at("before", from - one_us), Some(&[1.0, 0.0])).unwrap();
        store.upsert_file(&user, &at("after", to + one_us), Some(&[1.0, 0.0])).unwrap();

        let filters = FileFilters {
            mime_type: None,
            date_from: Some(from),
            date_to: Some(to),
        };
        let rows = store.nearest_files(&user, &[1.0, 0.0], &filters, 10).await.unwrap();
        let mut ids: Vec<_> = rows.iter().map(|(r, _)| r.external_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["on_from", "on_to"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        store.upsert_message(&user, &msg("m1", "a@x.com", 1), None).unwrap();
        let mut updated = msg("m1", "a@x.com", 1);
        updated.subject = Some("updated".into());
        store.upsert_message(&user, &updated, Some(&[1.0, 0.0])).unwrap();

        let rows = store
            .nearest_messages(&user, &[1.0, 0.0], &MessageFilters::default(), 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.subject.as_deref(), Some("updated"));
    }

    #[tokio::test]
    async fn test_event_window_and_attendees_roundtrip() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        let day = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let event = |id: &str, start_h: i64| EventRecord {
            external_id: id.into(),
            title: Some(id.into()),
            start_time: Some(day + Duration::hours(start_h)),
            end_time: Some(day + Duration::hours(start_h + 1)),
            attendees: vec!["john@acme.com".into()],
            ..Default::default()
        };
        store.upsert_event(&user, &event("in", 9), Some(&[1.0, 0.0])).unwrap();
        store.upsert_event(&user, &event("late", 23), Some(&[1.0, 0.0])).unwrap();

        let filters = EventFilters {
            date_from: Some(day),
            date_to: Some(day + Duration::days(1)),
            attendees: vec![],
        };
        let rows = store.nearest_events(&user, &[1.0, 0.0], &filters, 10).await.unwrap();
        assert_eq!(rows.len(), 2);

        let tight = EventFilters {
            date_to: Some(day + Duration::hours(12)),
            ..filters
        };
        let rows = store.nearest_events(&user, &[1.0, 0.0], &tight, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.attendees, vec!["john@acme.com".to_string()]);
    }

    #[tokio::test]
    async fn test_file_mime_filter() {
        let store = SqliteCorpus::in_memory().unwrap();
        let user = UserId::new();
        let file = |id: &str, mime: &str| FileRecord {
            external_id: id.into(),
            name: Some(id.into()),
            mime_type: Some(mime.into()),
            ..Default::default()
        };
        store.upsert_file(&user, &file("a.pdf", "application/pdf"), Some(&[1.0, 0.0])).unwrap();
        store.upsert_file(&user, &file("b.doc", "application/msword"), Some(&[1.0, 0.0])).unwrap();

        let filters = FileFilters {
            mime_type: Some("application/pdf".into()),
            ..Default::default()
        };
        let rows = store.nearest_files(&user, &[1.0, 0.0], &filters, 5).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.external_id, "a.pdf");
        assert!(rows[0].0.modified_at.is_none());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("corpus.db");
        SqliteCorpus::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_timestamp_text_orders_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 9, 23, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 10, 1, 0, 0).unwrap();
        assert!(format_ts(early) < format_ts(late));
        assert_eq!(parse_ts(&format_ts(early)), Some(early));
    }
}
