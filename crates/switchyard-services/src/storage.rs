use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::{debug, info};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::ServiceExecutor;
use switchyard_core::types::{Operation, Params, Service, UserId};
use switchyard_memory::{FileFilters, HybridRetriever};

use crate::http::ApiClient;
use crate::params::{date_param, query_text, required_str, resource_id, str_param, usize_param};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// File-storage operations.
pub struct StorageExecutor {
    user: UserId,
    api: ApiClient,
    retriever: Arc<HybridRetriever>,
    default_limit: usize,
}

impl StorageExecutor {
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

    async fn search_files(&self, params: &Params) -> Result<Value> {
        let query = query_text(params);
        let limit = usize_param(params, "limit").unwrap_or(self.default_limit);
        let filters = FileFilters {
            mime_type: str_param(params, "mime_type").map(String::from),
            date_from: date_param(params, "date_from")?,
            date_to: date_param(params, "date_to")?,
        };

        let hits = self
            .retriever
            .search_files(&self.user, &query, &filters, limit)
            .await?;
        if !hits.is_empty() {
            return Ok(serde_json::to_value(hits)?);
        }

        debug!(user = %self.user, "Cache miss, searching files live");
        let listing = self
            .api
            .get(
                "files",
                &[
                    ("q", drive_query(&query, filters.mime_type.as_deref())),
                    ("pageSize", limit.to_string()),
                    (
                        "fields",
                        "files(id,name,mimeType,modifiedTime,description)".to_string(),
                    ),
                ],
            )
            .await?;

        let files = listing
            .get("files")
            .and_then(Value::as_array)
            .map(|files| files.iter().map(file_summary).collect())
            .unwrap_or_default();
        Ok(Value::Array(files))
    }

    async fn get_file(&self, params: &Params) -> Result<Value> {
        let id = resource_id(params, "file_id")?;
        let data = self
            .api
            .get(
                &format!("files/{}", id),
                &[(
                    "fields",
                    "id,name,mimeType,modifiedTime,description,webViewLink,owners".to_string(),
                )],
            )
            .await?;

        let mut summary = file_summary(&data);
        summary["web_link"] = data.get("webViewLink").cloned().unwrap_or(Value::Null);
        summary["owners"] = data
            .get("owners")
            .and_then(Value::as_array)
            .map(|owners| {
                owners
                    .iter()
                    .filter_map(|o| o.get("emailAddress").cloned())
                    .collect()
            })
            .unwrap_or_else(|| json!([]));
        Ok(summary)
    }

    async fn share_file(&self, params: &Params) -> Result<Value> {
        let id = required_str(params, "file_id")?;
        let email = required_str(params, "email")?;
        let role = str_param(params, "role").unwrap_or("reader");

        self.api
            .post(
                &format!("files/{}/permissions", id),
                &json!({"type": "user", "role": role, "emailAddress": email}),
            )
            .await?;
        info!(user = %self.user, file_id = id, role, "File shared");
        Ok(json!({"file_id": id, "shared_with": email, "role": role, "status": "shared"}))
    }

    async fn create_folder(&self, params: &Params) -> Result<Value> {
        let name = required_str(params, "name")?;
        let mut body = json!({"name": name, "mimeType": FOLDER_MIME});
        if let Some(parent) = str_param(params, "parent_id") {
            body["parents"] = json!([parent]);
        }

        let data = self.api.post("files", &body).await?;
        Ok(json!({"file_id": data.get("id"), "name": name, "status": "folder_created"}))
    }

    async fn move_file(&self, params: &Params) -> Result<Value> {
        let id = required_str(params, "file_id")?;
        let destination = required_str(params, "destination_folder_id")?;

        let current = self
            .api
            .get(&format!("files/{}", id), &[("fields", "parents".to_string())])
            .await?;
        let parents: Vec<&str> = current
            .get("parents")
            .and_then(Value::as_array)
            .map(|ps| ps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        self.api
            .patch(
                &format!("files/{}", id),
                &[
                    ("addParents", destination.to_string()),
                    ("removeParents", parents.join(",")),
                ],
                &json!({}),
            )
            .await?;
        Ok(json!({"file_id": id, "destination": destination, "status": "moved"}))
    }
}

impl ServiceExecutor for StorageExecutor {
    fn service(&self) -> Service {
        Service::Storage
    }

    fn invoke(&self, operation: Operation, params: Params) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            match operation {
                Operation::SearchFiles => self.search_files(&params).await,
                Operation::GetFile => self.get_file(&params).await,
                Operation::ShareFile => self.share_file(&params).await,
                Operation::CreateFolder => self.create_folder(&params).await,
                Operation::MoveFile => self.move_file(&params).await,
                other => Err(SwitchyardError::UnsupportedOperation {
                    service: Service::Storage.to_string(),
                    operation: other.to_string(),
                }),
            }
        })
    }
}

/// Live search expression: full text, optional MIME type, never trashed.
pub fn drive_query(text: &str, mime_type: Option<&str>) -> String {
    let mut clauses = Vec::new();
    if !text.is_empty() {
        clauses.push(format!("fullText contains '{}'", escape(text)));
    }
    if let Some(mime) = mime_type {
        clauses.push(format!("mimeType = '{}'", escape(mime)));
    }
    clauses.push("trashed = false".to_string());
    clauses.join(" and ")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn file_summary(f: &Value) -> Value {
    let text = |key: &str| f.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    json!({
        "file_id": f.get("id"),
        "name": text("name"),
        "mime_type": text("mimeType"),
        "modified_at": f.get("modifiedTime"),
        "description": text("description"),
    })
}
