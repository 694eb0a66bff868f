use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use switchyard_core::config::PlannerConfig;
use switchyard_core::types::{EntityBag, Operation, Params, Service};

/// Canonical step names and the operation each one runs.
const STEP_ACTIONS: &[(&str, Operation)] = &[
    ("search_gmail", Operation::SearchMessages),
    ("search_gmail_for_booking", Operation::SearchMessages),
    ("search_emails", Operation::SearchMessages),
    ("search_emails_acme_corp", Operation::SearchMessages),
    ("get_email", Operation::GetMessage),
    ("extract_booking_reference", Operation::GetMessage),
    ("draft_email", Operation::DraftMessage),
    ("draft_cancellation_email", Operation::DraftMessage),
    ("send_email", Operation::SendMessage),
    ("search_calendar", Operation::SearchEvents),
    ("search_calendar_events", Operation::SearchEvents),
    ("search_calendar_events_next_week", Operation::SearchEvents),
    ("search_calendar_events_with_john", Operation::SearchEvents),
    ("search_calendar_next_week", Operation::SearchEvents),
    ("find_calendar_event", Operation::SearchEvents),
    ("find_calendar_event_tomorrow_acme", Operation::SearchEvents),
    ("find_conflicting_events", Operation::SearchEvents),
    ("create_event", Operation::CreateEvent),
    ("update_event", Operation::UpdateEvent),
    ("delete_event", Operation::DeleteEvent),
    ("search_drive", Operation::SearchFiles),
    ("search_drive_acme_documents", Operation::SearchFiles),
    ("search_drive_ooo_document", Operation::SearchFiles),
    ("get_file", Operation::GetFile),
    ("extract_ooo_dates", Operation::GetFile),
    ("share_file", Operation::ShareFile),
];

/// Name tokens routing an unknown step, checked in order.
const HEURISTICS: &[(&[&str], Operation)] = &[
    (&["gmail", "email", "mail"], Operation::SearchMessages),
    (&["calendar", "event", "gcal"], Operation::SearchEvents),
    (&["drive", "file", "doc"], Operation::SearchFiles),
];

const FALLBACK: Operation = Operation::SearchMessages;

/// Entity path to parameter name. Later rows win on the same parameter.
const PARAM_RULES: &[(&str, &str)] = &[
    ("date_range.from", "date_from"),
    ("date_range.to", "date_to"),
    ("date", "date"),
    ("sender", "sender"),
    ("attendee_name", "attendee"),
    ("attendee_email", "attendee_email"),
    ("company", "keyword"),
    ("airline", "keyword"),
    ("keyword", "keyword"),
    ("document_type", "keyword"),
    ("mime_type", "mime_type"),
];

/// A step name resolved to its service binding and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAction {
    pub service: Service,
    pub operation: Operation,
    pub params: Params,
}

/// Maps abstract step names onto service operations.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Operation>,
}

impl ActionRegistry {
    /// Registry holding the built-in step table.
    pub fn new() -> Self {
        let actions = STEP_ACTIONS
            .iter()
            .map(|(name, op)| (name.to_string(), *op))
            .collect();
        Self { actions }
    }

    /// Built-in table plus the `[planner.actions]` rows, which take precedence.
    pub fn with_config(config: &PlannerConfig) -> Self {
        let mut registry = Self::new();
        for (name, action) in &config.actions {
            registry.register(name, action.operation);
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, operation: Operation) {
        self.actions.insert(name.into(), operation);
    }

    /// Exact-match lookup only.
    pub fn lookup(&self, name: &str) -> Option<Operation> {
        self.actions.get(name).copied()
    }

    /// Resolve a step name: exact table first, then name heuristics.
    pub fn resolve(&self, name: &str, entities: &EntityBag) -> ResolvedAction {
        let operation = match self.lookup(name) {
            Some(op) => op,
            None => {
                let op = classify(name);
                debug!(step = name, operation = %op, "Step name resolved heuristically");
                op
            }
        };
        ResolvedAction {
            service: operation.service(),
            operation,
            params: extract_params(entities),
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Route an unrecognized step name by the tokens it contains.
/// Names matching nothing fall back to a mail search.
pub fn classify(name: &str) -> Operation {
    let lower = name.to_lowercase();
    HEURISTICS
        .iter()
        .find(|(tokens, _)| tokens.iter().any(|t| lower.contains(t)))
        .map(|(_, op)| *op)
        .unwrap_or(FALLBACK)
}

/// Apply the parameter rules to an entity bag. Null values are skipped.
pub fn extract_params(entities: &EntityBag) -> Params {
    let mut params = Params::new();
    for (path, param) in PARAM_RULES {
        if let Some(value) = lookup_path(entities, path).filter(|v| !v.is_null()) {
            params.insert(param.to_string(), value.clone());
        }
    }
    params
}

fn lookup_path<'a>(entities: &'a EntityBag, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = entities.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_core::config::ActionRef;

    #[test]
    fn test_synonyms_share_operation() {
        let registry = ActionRegistry::new();
        for name in ["search_gmail", "search_gmail_for_booking", "search_emails"] {
            assert_eq!(registry.lookup(name), Some(Operation::SearchMessages));
        }
        assert_eq!(registry.lookup("extract_ooo_dates"), Some(Operation::GetFile));
        assert_eq!(registry.lookup("delete_event"), Some(Operation::DeleteEvent));
    }

    #[test]
    fn test_heuristic_routing() {
        assert_eq!(classify("check_my_gmail_inbox"), Operation::SearchMessages);
        assert_eq!(classify("list_upcoming_EVENTS"), Operation::SearchEvents);
        assert_eq!(classify("look_in_gcal"), Operation::SearchEvents);
        assert_eq!(classify("find_doc_about_q3"), Operation::SearchFiles);
        assert_eq!(classify("open_drive"), Operation::SearchFiles);
    }

    #[test]
    fn test_unmatched_name_defaults_to_mail_search() {
        let registry = ActionRegistry::new();
        let resolved = registry.resolve("do_something_vague", &EntityBag::new());
        assert_eq!(resolved.service, Service::Mail);
        assert_eq!(resolved.operation, Operation::SearchMessages);
    }

    #[test]
    fn test_mail_tokens_checked_before_calendar() {
        assert_eq!(classify("email_about_event"), Operation::SearchMessages);
    }

    #[test]
    fn test_param_rules() {
        let entities = EntityBag::new()
            .with("date_range", json!({"from": "2025-03-01", "to": null}))
            .with("sender", json!("ops@acme.com"))
            .with("attendee_name", json!("John"))
            .with("mime_type", json!("application/pdf"))
            .with("unrelated", json!(42));
        let params = extract_params(&entities);

        assert_eq!(params["date_from"], json!("2025-03-01"));
        assert!(!params.contains_key("date_to"));
        assert_eq!(params["sender"], json!("ops@acme.com"));
        assert_eq!(params["attendee"], json!("John"));
        assert_eq!(params["mime_type"], json!("application/pdf"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_later_keyword_rules_overwrite() {
        let entities = EntityBag::new()
            .with("company", json!("Acme"))
            .with("airline", json!("Turkish Airlines"));
        assert_eq!(extract_params(&entities)["keyword"], json!("Turkish Airlines"));

        let entities = entities.with("document_type", json!("OOO"));
        assert_eq!(extract_params(&entities)["keyword"], json!("OOO"));
    }

    #[test]
    fn test_params_ignore_resolved_operation() {
        let registry = ActionRegistry::new();
        let entities = EntityBag::new().with("mime_type", json!("text/plain"));
        let resolved = registry.resolve("search_gmail", &entities);
        assert_eq!(resolved.params["mime_type"], json!("text/plain"));
    }

    #[test]
    fn test_config_rows_extend_table() {
        let mut config = PlannerConfig::default();
        config.actions.insert(
            "summarize_inbox".into(),
            ActionRef {
                service: Service::Mail,
                operation: Operation::SearchMessages,
            },
        );
        config.actions.insert(
            "search_gmail".into(),
            ActionRef {
                service: Service::Storage,
                operation: Operation::SearchFiles,
            },
        );
        let registry = ActionRegistry::with_config(&config);
        assert_eq!(registry.lookup("summarize_inbox"), Some(Operation::SearchMessages));
        assert_eq!(registry.lookup("search_gmail"), Some(Operation::SearchFiles));
    }
}
