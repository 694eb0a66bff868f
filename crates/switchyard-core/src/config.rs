use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitchyardError};
use crate::types::{Operation, Service};

/// Top-level Switchyard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-step deadline in seconds.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout(),
        }
    }
}

fn default_step_timeout() -> u64 { 10 }

/// How the event attendee filter compares values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeMatch {
    /// Case-insensitive equality against one attendee entry.
    #[default]
    Structured,
    /// Substring of the stringified attendee list (legacy output parity).
    Substring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_limit")]
    pub default_limit: usize,
    #[serde(default = "default_event_limit")]
    pub event_limit: usize,
    #[serde(default)]
    pub attendee_match: AttendeeMatch,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_retrieval_limit(),
            event_limit: default_event_limit(),
            attendee_match: AttendeeMatch::default(),
        }
    }
}

fn default_retrieval_limit() -> usize { 5 }
fn default_event_limit() -> usize { 10 }

/// Embedding model configuration for the cached corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "ollama", or any OpenAI-compatible API.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name (e.g., "text-embedding-3-small", "nomic-embed-text").
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Base URL for the embedding API (e.g., "http://localhost:11434/v1").
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key (optional, for cloud providers).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Embedding dimensions (default: 1536).
    #[serde(default = "default_embedding_dims")]
    pub dimensions: usize,
    /// How long a query embedding stays cached, keyed by exact text.
    #[serde(default = "default_embedding_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl EmbeddingConfig {
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }
}

fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dims() -> usize { 1536 }
fn default_embedding_cache_ttl() -> u64 { 3600 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String { "~/.switchyard/corpus.db".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_mail_base_url")]
    pub mail_base_url: String,
    #[serde(default = "default_calendar_base_url")]
    pub calendar_base_url: String,
    #[serde(default = "default_storage_base_url")]
    pub storage_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            mail_base_url: default_mail_base_url(),
            calendar_base_url: default_calendar_base_url(),
            storage_base_url: default_storage_base_url(),
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_mail_base_url() -> String { "https://www.googleapis.com/gmail/v1/users/me".to_string() }
fn default_calendar_base_url() -> String { "https://www.googleapis.com/calendar/v3".to_string() }
fn default_storage_base_url() -> String { "https://www.googleapis.com/drive/v3".to_string() }
fn default_request_timeout() -> u64 { 15 }

/// Retry configuration for external service requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// A step-name mapping supplied from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRef {
    pub service: Service,
    pub operation: Operation,
}

/// Extra planner rows layered on top of the built-in tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub actions: HashMap<String, ActionRef>,
    #[serde(default)]
    pub dependencies: HashMap<String, Vec<String>>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SwitchyardError::ConfigNotFound(path.display().to_string()))?;
        Self::parse(&content)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn parse(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| SwitchyardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.orchestrator.step_timeout_secs == 0 {
            return Err(SwitchyardError::Config(
                "orchestrator.step_timeout_secs must be positive".into(),
            ));
        }
        for (name, action) in &self.planner.actions {
            if action.operation.service() != action.service {
                return Err(SwitchyardError::Config(format!(
                    "planner action '{}': operation '{}' belongs to {}, not {}",
                    name,
                    action.operation,
                    action.operation.service(),
                    action.service
                )));
            }
        }
        Ok(())
    }

    /// Resolve the corpus database path (expand ~).
    pub fn database_path(&self) -> PathBuf {
        let path = &self.database.path;
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
