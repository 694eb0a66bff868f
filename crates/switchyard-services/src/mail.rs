use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::{debug, info};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::ServiceExecutor;
use switchyard_core::types::{Operation, Params, Service, UserId};
use switchyard_memory::{HybridRetriever, MessageFilters};

use crate::http::ApiClient;
use crate::params::{
    context_items, date_param, query_text, required_str, resource_id, str_param, string_list,
    usize_param,
};

/// Mail operations: hybrid search over the cached inbox, plus live reads
/// and writes against the mail API.
pub struct MailExecutor {
    user: UserId,
    api: ApiClient,
    retriever: Arc<HybridRetriever>,
    default_limit: usize,
}

impl MailExecutor {
    pub fn new(
        user: UserId,
        api: ApiClient,
        retriever: Arc<HybridRetriever>,
        default_limit: usize,
    ) -> Self {
        Self {
            user,
            api,
            retriever,
            default_limit,
        }
    }

    async fn search_messages(&self, params: &Params) -> Result<Value> {
        let query = query_text(params);
        let limit = usize_param(params, "limit").unwrap_or(self.default_limit);
        let filters = MessageFilters {
            sender: str_param(params, "sender").map(String::from),
            date_from: date_param(params, "date_from")?,
            date_to: date_param(params, "date_to")?,
        };

        let hits = self
            .retriever
            .search_messages(&self.user, &query, &filters, limit)
            .await?;
        if !hits.is_empty() {
            return Ok(serde_json::to_value(hits)?);
        }

        debug!(user = %self.user, "Cache miss, searching mail live");
        self.live_search(&query, filters.sender.as_deref(), limit).await
    }

    async fn live_search(&self, query: &str, sender: Option<&str>, limit: usize) -> Result<Value> {
        let mut q = Vec::new();
        if !query.is_empty() {
            q.push(query.to_string());
        }
        if let Some(sender) = sender {
            q.push(format!("from:{}", sender));
        }

        let listing = self
            .api
            .get(
                "messages",
                &[("q", q.join(" ")), ("maxResults", limit.to_string())],
            )
            .await?;

        let ids: Vec<&str> = listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|msgs| msgs.iter().filter_map(|m| m.get("id")?.as_str()).collect())
            .unwrap_or_default();

        let mut results = Vec::with_capacity(ids.len().min(limit));
        for id in ids.into_iter().take(limit) {
            results.push(self.fetch_message(id).await?);
        }
        Ok(Value::Array(results))
    }

    async fn fetch_message(&self, id: &str) -> Result<Value> {
        let data = self
            .api
            .get(&format!("messages/{}", id), &[("format", "metadata".to_string())])
            .await?;

        let header = |name: &str| -> String {
            data.pointer("/payload/headers")
                .and_then(Value::as_array)
                .and_then(|hs| {
                    hs.iter()
                        .find(|h| h.get("name").and_then(Value::as_str) == Some(name))
                })
                .and_then(|h| h.get("value"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };

        Ok(json!({
            "email_id": data.get("id").cloned().unwrap_or_else(|| json!(id)),
            "thread_id": data.get("threadId"),
            "subject": header("Subject"),
            "sender": header("From"),
            "to": header("To"),
            "date": header("Date"),
            "snippet": data.get("snippet").and_then(Value::as_str).unwrap_or(""),
            "labels": data.get("labelIds").cloned().unwrap_or_else(|| json!([])),
        }))
    }

    async fn draft_message(&self, params: &Params) -> Result<Value> {
        let mut to = str_param(params, "to").map(String::from);
        let mut subject = str_param(params, "subject").map(String::from);

        if to.is_none() {
            let upstream = context_items(params).into_iter().find(|item| {
                item.get("sender")
                    .and_then(Value::as_str)
                    .is_some_and(|s| !s.is_empty())
            });
            if let Some(item) = upstream {
                to = item.get("sender").and_then(Value::as_str).map(String::from);
                if subject.is_none() {
                    let original = item.get("subject").and_then(Value::as_str).unwrap_or("");
                    subject = Some(format!("Re: {}", original));
                }
            }
        }

        let to = to.unwrap_or_default();
        let subject = subject.unwrap_or_default();
        let raw = encode_message(&to, &subject, str_param(params, "body").unwrap_or(""));

        let data = self.api.post("drafts", &json!({"message": {"raw": raw}})).await?;
        info!(user = %self.user, "Draft created");
        Ok(json!({
            "draft_id": data.get("id"),
            "to": to,
            "subject": subject,
            "status": "drafted",
        }))
    }

    async fn send_message(&self, params: &Params) -> Result<Value> {
        let to = required_str(params, "to")?;
        let subject = required_str(params, "subject")?;
        let body = required_str(params, "body")?;

        let raw = encode_message(to, subject, body);
        let data = self.api.post("messages/send", &json!({"raw": raw})).await?;
        info!(user = %self.user, "Message sent");
        Ok(json!({
            "message_id": data.get("id"),
            "to": to,
            "subject": subject,
            "status": "sent",
        }))
    }

    async fn update_labels(&self, params: &Params) -> Result<Value> {
        let id = required_str(params, "email_id")?;
        let mut body = serde_json::Map::new();
        let add = string_list(params, "add_labels");
        if !add.is_empty() {
            body.insert("addLabelIds".into(), json!(add));
        }
        let remove = string_list(params, "remove_labels");
        if !remove.is_empty() {
            body.insert("removeLabelIds".into(), json!(remove));
        }

        self.api
            .post(&format!("messages/{}/modify", id), &Value::Object(body))
            .await?;
        Ok(json!({"email_id": id, "status": "labels_updated"}))
    }
}

impl ServiceExecutor for MailExecutor {
    fn service(&self) -> Service {
        Service::Mail
    }

    fn invoke(&self, operation: Operation, params: Params) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            match operation {
                Operation::SearchMessages => self.search_messages(&params).await,
                Operation::GetMessage => {
                    let id = resource_id(&params, "email_id")?;
                    self.fetch_message(&id).await
                }
                Operation::DraftMessage => self.draft_message(&params).await,
                Operation::SendMessage => self.send_message(&params).await,
                Operation::UpdateLabels => self.update_labels(&params).await,
                other => Err(SwitchyardError::UnsupportedOperation {
                    service: Service::Mail.to_string(),
                    operation: other.to_string(),
                }),
            }
        })
    }
}

/// RFC 822 plain-text message, base64url encoded for the `raw` field.
pub fn encode_message(to: &str, subject: &str, body: &str) -> String {
    let message = format!(
        "Content-Type: text/plain; charset=\"utf-8\"\r\n\
         MIME-Version: 1.0\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         to: {}\r\n\
         subject: {}\r\n\
         \r\n\
         {}",
        to, subject, body
    );
    URL_SAFE.encode(message.as_bytes())
}
