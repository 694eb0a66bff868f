//! Mocks and fixtures shared by the Switchyard test suites.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use serde_json::Value;

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::ServiceExecutor;
use switchyard_core::types::{Operation, Params, Service, UserId};
use switchyard_memory::{
    CachedEmbedder, EmbeddingProvider, EventRecord, FileRecord, HybridRetriever, Indexer,
    MessageRecord, SqliteCorpus,
};

#[derive(Debug, Clone)]
enum Reply {
    Payload(Value),
    Failure(String),
}

#[derive(Debug, Clone)]
struct Script {
    reply: Reply,
    delay: Duration,
}

/// Scriptable [`ServiceExecutor`] that records every invocation.
///
/// Unscripted operations answer `null` immediately.
pub struct MockExecutor {
    service: Service,
    scripts: Mutex<HashMap<Operation, Script>>,
    calls: Mutex<Vec<(Operation, Params)>>,
}

impl MockExecutor {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_payload(self, operation: Operation, payload: Value) -> Self {
        self.script(operation, Reply::Payload(payload), Duration::ZERO)
    }

    pub fn with_failure(self, operation: Operation, message: &str) -> Self {
        self.script(operation, Reply::Failure(message.to_string()), Duration::ZERO)
    }

    /// Payload returned only after `delay` has elapsed.
    pub fn with_delayed_payload(self, operation: Operation, payload: Value, delay: Duration) -> Self {
        self.script(operation, Reply::Payload(payload), delay)
    }

    fn script(self, operation: Operation, reply: Reply, delay: Duration) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(operation, Script { reply, delay });
        self
    }

    /// Every `(operation, params)` received so far, in call order.
    pub fn calls(&self) -> Vec<(Operation, Params)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ServiceExecutor for MockExecutor {
    fn service(&self) -> Service {
        self.service
    }

    fn invoke(&self, operation: Operation, params: Params) -> BoxFuture<'_, Result<Value>> {
        self.calls.lock().unwrap().push((operation, params));
        let script = self.scripts.lock().unwrap().get(&operation).cloned();
        let service = self.service;
        Box::pin(async move {
            let Some(script) = script else {
                return Ok(Value::Null);
            };
            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
            match script.reply {
                Reply::Payload(v) => Ok(v),
                Reply::Failure(message) => Err(SwitchyardError::ServiceRequest {
                    service: service.to_string(),
                    message,
                }),
            }
        })
    }
}

/// Embeds text as a bag of known words: one axis per vocabulary word, plus
/// a final axis for text that contains none of them.
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(words: &[&str]) -> Self {
        Self {
            vocabulary: words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v = vec![0.0; self.vocabulary.len() + 1];
        for (i, word) in self.vocabulary.iter().enumerate() {
            if lower.contains(word.as_str()) {
                v[i] = 1.0;
            }
        }
        if v.iter().all(|x| *x == 0.0) {
            v[self.vocabulary.len()] = 1.0;
        }
        v
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let out = texts.iter().map(|t| self.vector(t)).collect();
        Box::pin(async move { Ok(out) })
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len() + 1
    }
}

/// Vocabulary used by the fixture corpus.
pub const FIXTURE_VOCABULARY: &[&str] = &["booking", "flight", "acme", "invoice", "offsite", "ooo"];

pub fn keyword_embedder() -> Arc<CachedEmbedder> {
    Arc::new(CachedEmbedder::new(
        Arc::new(KeywordEmbedder::new(FIXTURE_VOCABULARY)),
        Duration::from_secs(300),
    ))
}

fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
}

pub fn sample_messages() -> Vec<MessageRecord> {
    vec![
        MessageRecord {
            external_id: "msg-booking".into(),
            subject: Some("Your flight booking TK1234".into()),
            sender: Some("reservations@airline.com".into()),
            recipients: Some("me@example.com".into()),
            body_preview: Some("Booking reference ABC123".into()),
            received_at: Some(ts(2025, 3, 1)),
        },
        MessageRecord {
            external_id: "msg-invoice".into(),
            subject: Some("Acme invoice for March".into()),
            sender: Some("billing@acme.com".into()),
            recipients: Some("me@example.com".into()),
            body_preview: Some("Please find the invoice attached".into()),
            received_at: Some(ts(2025, 3, 2)),
        },
    ]
}

pub fn sample_events() -> Vec<EventRecord> {
    vec![
        EventRecord {
            external_id: "evt-acme".into(),
            title: Some("Acme quarterly review".into()),
            description: Some("Review with the Acme team".into()),
            start_time: Some(ts(2025, 3, 10)),
            end_time: Some(ts(2025, 3, 10) + chrono::Duration::hours(1)),
            attendees: vec!["john@acme.com".into(), "me@example.com".into()],
            location: Some("Room 4".into()),
        },
        EventRecord {
            external_id: "evt-offsite".into(),
            title: Some("Team offsite".into()),
            description: None,
            start_time: Some(ts(2025, 3, 12)),
            end_time: Some(ts(2025, 3, 13)),
            attendees: vec!["johnny@example.com".into()],
            location: None,
        },
    ]
}

pub fn sample_files() -> Vec<FileRecord> {
    vec![
        FileRecord {
            external_id: "file-ooo".into(),
            name: Some("OOO schedule".into()),
            mime_type: Some("application/vnd.google-apps.document".into()),
            content_preview: Some("Out of office 10-14 March".into()),
            modified_at: Some(ts(2025, 2, 20)),
        },
        FileRecord {
            external_id: "file-acme".into(),
            name: Some("Acme contract".into()),
            mime_type: Some("application/pdf".into()),
            content_preview: None,
            modified_at: Some(ts(2025, 1, 5)),
        },
    ]
}

/// In-memory corpus holding the sample records for `user`, plus a
/// retriever over it.
pub async fn seeded_corpus(user: &UserId) -> (Arc<SqliteCorpus>, HybridRetriever) {
    let store = Arc::new(SqliteCorpus::in_memory().unwrap());
    let embedder = keyword_embedder();
    let indexer = Indexer::new(store.clone(), embedder.clone());
    indexer.index_messages(user, &sample_messages()).await.unwrap();
    indexer.index_events(user, &sample_events()).await.unwrap();
    indexer.index_files(user, &sample_files()).await.unwrap();
    let retriever = HybridRetriever::new(store.clone(), embedder);
    (store, retriever)
}

/// Write `content` to a temporary `.toml` file.
pub fn temp_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}
