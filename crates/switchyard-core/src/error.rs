use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwitchyardError {
    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // Embedding errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    // Service transport errors
    #[error("{service} request failed: {message}")]
    ServiceRequest { service: String, message: String },

    #[error("{service} API error {status}: {body}")]
    ServiceApi {
        service: String,
        status: u16,
        body: String,
    },

    // Dispatch errors
    #[error("Service {service} does not support operation '{operation}'")]
    UnsupportedOperation { service: String, operation: String },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("No executor registered for service: {0}")]
    NoExecutor(String),

    // Plan errors
    #[error("Dependency graph stalled with unresolved steps: {}", .remaining.join(", "))]
    PlanStalled { remaining: Vec<String> },

    // Execution errors
    #[error("Timeout after {}s: {step}", as_secs(.timeout_ms))]
    StepTimeout { step: String, timeout_ms: u64 },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SwitchyardError {
    /// Whether a transport-level failure is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            SwitchyardError::ServiceApi { status, .. } => *status == 429 || *status >= 500,
            SwitchyardError::ServiceRequest { message, .. } => {
                message.contains("timed out")
                    || message.contains("timeout")
                    || message.contains("connect")
            }
            _ => false,
        }
    }
}

fn as_secs(ms: &u64) -> f64 {
    *ms as f64 / 1000.0
}

pub type Result<T> = std::result::Result<T, SwitchyardError>;
