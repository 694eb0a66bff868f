use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved parameter key under which upstream payloads are injected.
pub const CONTEXT_KEY: &str = "_context";

/// Step invocation parameters.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Identifier of the user whose cached corpus and credentials are in play.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External service a step is bound to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Mail,
    Calendar,
    Storage,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Mail => "mail",
            Service::Calendar => "calendar",
            Service::Storage => "storage",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every operation an executor can perform. Each variant belongs to exactly
/// one [`Service`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    // mail
    SearchMessages,
    GetMessage,
    DraftMessage,
    SendMessage,
    UpdateLabels,
    // calendar
    SearchEvents,
    GetEvent,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    // storage
    SearchFiles,
    GetFile,
    ShareFile,
    CreateFolder,
    MoveFile,
}

impl Operation {
    pub fn service(&self) -> Service {
        use Operation::*;
        match self {
            SearchMessages | GetMessage | DraftMessage | SendMessage | UpdateLabels => {
                Service::Mail
            }
            SearchEvents | GetEvent | CreateEvent | UpdateEvent | DeleteEvent => Service::Calendar,
            SearchFiles | GetFile | ShareFile | CreateFolder | MoveFile => Service::Storage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use Operation::*;
        match self {
            SearchMessages => "search_messages",
            GetMessage => "get_message",
            DraftMessage => "draft_message",
            SendMessage => "send_message",
            UpdateLabels => "update_labels",
            SearchEvents => "search_events",
            GetEvent => "get_event",
            CreateEvent => "create_event",
            UpdateEvent => "update_event",
            DeleteEvent => "delete_event",
            SearchFiles => "search_files",
            GetFile => "get_file",
            ShareFile => "share_file",
            CreateFolder => "create_folder",
            MoveFile => "move_file",
        }
    }

    /// Whether this operation reads through hybrid retrieval.
    pub fn is_search(&self) -> bool {
        matches!(
            self,
            Operation::SearchMessages | Operation::SearchEvents | Operation::SearchFiles
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities extracted from the user's request by the intent source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityBag(HashMap<String, serde_json::Value>);

impl EntityBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, serde_json::Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One unit of work bound to a service operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    /// The step name as supplied by the intent source.
    pub name: String,
    pub service: Service,
    pub operation: Operation,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, operation: Operation) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            service: operation.service(),
            operation,
            params: Params::new(),
            depends_on: vec![],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn depending_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// A dependency-respecting execution plan: steps plus their parallel layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<Step>,
    pub layers: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Index of the layer containing `id`.
    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|s| s == id))
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// Terminal record of one step's execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub service: Service,
    pub operation: Operation,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl StepOutcome {
    pub fn success(step: &Step, payload: serde_json::Value, elapsed_ms: u64) -> Self {
        Self {
            step_id: step.id.clone(),
            service: step.service,
            operation: step.operation,
            status: StepStatus::Success,
            payload: Some(payload),
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(step: &Step, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            step_id: step.id.clone(),
            service: step.service,
            operation: step.operation,
            status: StepStatus::Failed,
            payload: None,
            error: Some(error.into()),
            elapsed_ms,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Success
    }

    /// The payload, only when the step succeeded with non-empty data.
    pub fn usable_payload(&self) -> Option<&serde_json::Value> {
        if !self.succeeded() {
            return None;
        }
        self.payload.as_ref().filter(|p| !is_empty_payload(p))
    }
}

/// `null`, `""`, `[]` and `{}` carry nothing worth forwarding downstream.
pub fn is_empty_payload(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
