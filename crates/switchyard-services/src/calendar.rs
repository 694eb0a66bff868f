use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::{debug, info};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::ServiceExecutor;
use switchyard_core::types::{Operation, Params, Service, UserId};
use switchyard_memory::{EventFilters, HybridRetriever};

use crate::http::ApiClient;
use crate::params::{
    date_param, query_text, required_str, resource_id, str_param, string_list, usize_param,
};

const EVENTS_PATH: &str = "calendars/primary/events";

/// Calendar operations against the primary calendar.
pub struct CalendarExecutor {
    user: UserId,
    api: ApiClient,
    retriever: Arc<HybridRetriever>,
    default_limit: usize,
}

impl CalendarExecutor {
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

    async fn search_events(&self, params: &Params) -> Result<Value> {
        let mut query = query_text(params);
        if let Some(name) = str_param(params, "attendee") {
            if !query.is_empty() {
                query.push(' ');
            }
            query.push_str(name);
        }
        let limit = usize_param(params, "limit").unwrap_or(self.default_limit);

        let mut date_from = date_param(params, "date_from")?;
        let mut date_to = date_param(params, "date_to")?;
        if date_from.is_none() {
            if let Some((from, to)) = str_param(params, "date").and_then(|d| day_window(d, Utc::now())) {
                date_from = Some(from);
                date_to = Some(to);
            }
        }

        let filters = EventFilters {
            date_from,
            date_to,
            attendees: str_param(params, "attendee_email")
                .map(|e| vec![e.to_string()])
                .unwrap_or_default(),
        };

        let hits = self
            .retriever
            .search_events(&self.user, &query, &filters, limit)
            .await?;
        if !hits.is_empty() {
            return Ok(serde_json::to_value(hits)?);
        }

        debug!(user = %self.user, "Cache miss, listing events live");
        let mut q = vec![
            ("maxResults", limit.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if !query.is_empty() {
            q.push(("q", query));
        }
        if let Some(from) = date_from {
            q.push(("timeMin", from.to_rfc3339()));
        }
        if let Some(to) = date_to {
            q.push(("timeMax", to.to_rfc3339()));
        }

        let listing = self.api.get(EVENTS_PATH, &q).await?;
        let events = listing
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(event_summary).collect())
            .unwrap_or_default();
        Ok(Value::Array(events))
    }

    async fn get_event(&self, params: &Params) -> Result<Value> {
        let id = resource_id(params, "event_id")?;
        let data = self.api.get(&format!("{}/{}", EVENTS_PATH, id), &[]).await?;
        Ok(event_summary(&data))
    }

    async fn create_event(&self, params: &Params) -> Result<Value> {
        let title = required_str(params, "title")?;
        let mut body = json!({
            "summary": title,
            "start": {"dateTime": required_str(params, "start")?},
            "end": {"dateTime": required_str(params, "end")?},
        });
        if let Some(desc) = str_param(params, "description") {
            body["description"] = json!(desc);
        }
        let attendees = string_list(params, "attendees");
        if !attendees.is_empty() {
            body["attendees"] = attendees.iter().map(|e| json!({"email": e})).collect();
        }

        let data = self.api.post(EVENTS_PATH, &body).await?;
        info!(user = %self.user, "Event created");
        Ok(json!({"event_id": data.get("id"), "title": title, "status": "created"}))
    }

    async fn update_event(&self, params: &Params) -> Result<Value> {
        let id = required_str(params, "event_id")?;
        let mut body = serde_json::Map::new();
        if let Some(title) = str_param(params, "title") {
            body.insert("summary".into(), json!(title));
        }
        if let Some(start) = str_param(params, "start") {
            body.insert("start".into(), json!({"dateTime": start}));
        }
        if let Some(end) = str_param(params, "end") {
            body.insert("end".into(), json!({"dateTime": end}));
        }
        if let Some(desc) = str_param(params, "description") {
            body.insert("description".into(), json!(desc));
        }

        let data = self
            .api
            .patch(&format!("{}/{}", EVENTS_PATH, id), &[], &Value::Object(body))
            .await?;
        Ok(json!({
            "event_id": data.get("id").cloned().unwrap_or_else(|| json!(id)),
            "status": "updated",
        }))
    }

    async fn delete_event(&self, params: &Params) -> Result<Value> {
        let id = required_str(params, "event_id")?;
        self.api.delete(&format!("{}/{}", EVENTS_PATH, id)).await?;
        info!(user = %self.user, event_id = id, "Event deleted");
        Ok(json!({"event_id": id, "status": "deleted"}))
    }
}

impl ServiceExecutor for CalendarExecutor {
    fn service(&self) -> Service {
        Service::Calendar
    }

    fn invoke(&self, operation: Operation, params: Params) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            match operation {
                Operation::SearchEvents => self.search_events(&params).await,
                Operation::GetEvent => self.get_event(&params).await,
                Operation::CreateEvent => self.create_event(&params).await,
                Operation::UpdateEvent => self.update_event(&params).await,
                Operation::DeleteEvent => self.delete_event(&params).await,
                other => Err(SwitchyardError::UnsupportedOperation {
                    service: Service::Calendar.to_string(),
                    operation: other.to_string(),
                }),
            }
        })
    }
}

/// One-day UTC window for `today` or `tomorrow`.
pub fn day_window(word: &str, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
    let start = match word.trim().to_lowercase().as_str() {
        "today" => midnight,
        "tomorrow" => midnight + Duration::days(1),
        _ => return None,
    };
    Some((start, start + Duration::days(1)))
}

fn event_summary(ev: &Value) -> Value {
    let when = |key: &str| {
        ev.get(key)
            .and_then(|t| t.get("dateTime").or_else(|| t.get("date")))
            .cloned()
            .unwrap_or(Value::Null)
    };
    let attendees: Vec<Value> = ev
        .get("attendees")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(|a| a.get("email").cloned()).collect())
        .unwrap_or_default();
    let text = |key: &str| ev.get(key).and_then(Value::as_str).unwrap_or("").to_string();

    json!({
        "event_id": ev.get("id"),
        "title": text("summary"),
        "description": text("description"),
        "start_time": when("start"),
        "end_time": when("end"),
        "attendees": attendees,
        "location": text("location"),
        "status": text("status"),
    })
}
