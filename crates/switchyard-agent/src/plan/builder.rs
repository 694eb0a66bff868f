use std::collections::HashMap;

use tracing::{debug, info};

use switchyard_core::config::PlannerConfig;
use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::{EntityBag, ExecutionPlan, Step};

use super::registry::ActionRegistry;

const DEPENDENCY_RULES: &[(&str, &[&str])] = &[
    (
        "draft_cancellation_email",
        &["search_gmail_for_booking", "extract_booking_reference"],
    ),
    ("extract_booking_reference", &["search_gmail_for_booking"]),
    ("extract_ooo_dates", &["search_drive_ooo_document"]),
    (
        "find_conflicting_events",
        &["extract_ooo_dates", "search_calendar_next_week"],
    ),
];

/// Step name to the names of the steps whose output it consumes.
#[derive(Debug, Clone)]
pub struct DependencyRules {
    rules: HashMap<String, Vec<String>>,
}

impl DependencyRules {
    pub fn new() -> Self {
        let rules = DEPENDENCY_RULES
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect();
        Self { rules }
    }

    /// Built-in rules plus `[planner.dependencies]`, which replace a
    /// built-in rule of the same name.
    pub fn with_config(config: &PlannerConfig) -> Self {
        let mut rules = Self::new();
        for (name, deps) in &config.dependencies {
            rules.insert(name.clone(), deps.clone());
        }
        rules
    }

    pub fn insert(&mut self, name: impl Into<String>, deps: Vec<String>) {
        self.rules.insert(name.into(), deps);
    }

    pub fn get(&self, name: &str) -> &[String] {
        self.rules.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for DependencyRules {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns an ordered list of step names into a layered execution plan.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    registry: ActionRegistry,
    rules: DependencyRules,
}

impl PlanBuilder {
    pub fn new(registry: ActionRegistry, rules: DependencyRules) -> Self {
        Self { registry, rules }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(
            ActionRegistry::with_config(config),
            DependencyRules::with_config(config),
        )
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Build a plan. Step `i` gets id `step_i`; repeated names are distinct
    /// steps.
    ///
    /// A dependency edge is recorded only when the dependency name occurs
    /// earlier in `names`, and it points at that name's first occurrence.
    /// Rules naming a step that is absent from the list are dropped.
    pub fn build<S: AsRef<str>>(&self, names: &[S], entities: &EntityBag) -> Result<ExecutionPlan> {
        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        let mut steps = Vec::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(SwitchyardError::InvalidParams(format!(
                    "step {} has an empty name",
                    i
                )));
            }

            let resolved = self.registry.resolve(name, entities);
            let mut depends_on: Vec<String> = Vec::new();
            for dep in self.rules.get(name) {
                match first_seen.get(dep.as_str()) {
                    Some(&j) => {
                        let id = step_id(j);
                        if !depends_on.contains(&id) {
                            depends_on.push(id);
                        }
                    }
                    None => {
                        debug!(step = name, dependency = %dep, "Dependency not in step list, dropped");
                    }
                }
            }

            steps.push(Step {
                id: step_id(i),
                name: name.to_string(),
                service: resolved.service,
                operation: resolved.operation,
                params: resolved.params,
                depends_on,
            });
            first_seen.entry(name).or_insert(i);
        }

        let layers = topological_layers(&steps)?;
        info!(steps = steps.len(), layers = layers.len(), "Execution plan built");
        Ok(ExecutionPlan { steps, layers })
    }
}

fn step_id(index: usize) -> String {
    format!("step_{}", index)
}

/// Kahn's algorithm over `depends_on` edges.
///
/// Each layer holds the steps whose dependencies all sit in earlier layers,
/// in step order. Fails on duplicate ids or unknown dependency ids, and with
/// [`SwitchyardError::PlanStalled`] when steps remain that can never become
/// ready (a cycle or self-dependency).
pub fn topological_layers(steps: &[Step]) -> Result<Vec<Vec<String>>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        if index.insert(step.id.as_str(), i).is_some() {
            return Err(SwitchyardError::InvalidParams(format!(
                "duplicate step id: {}",
                step.id
            )));
        }
    }

    let mut in_degree = vec![0usize; steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    for (i, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            let &j = index.get(dep.as_str()).ok_or_else(|| {
                SwitchyardError::InvalidParams(format!(
                    "step {} depends on unknown step {}",
                    step.id, dep
                ))
            })?;
            in_degree[i] += 1;
            dependents[j].push(i);
        }
    }

    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<usize> = (0..steps.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut placed = 0;

    while !current.is_empty() {
        placed += current.len();
        let mut next = Vec::new();
        for &i in &current {
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    next.push(d);
                }
            }
        }
        layers.push(current.iter().map(|&i| steps[i].id.clone()).collect());
        next.sort_unstable();
        current = next;
    }

    if placed < steps.len() {
        let remaining = (0..steps.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| steps[i].id.clone())
            .collect();
        return Err(SwitchyardError::PlanStalled { remaining });
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_core::types::{Operation, Service};

    fn build(names: &[&str]) -> ExecutionPlan {
        PlanBuilder::default().build(names, &EntityBag::new()).unwrap()
    }

    fn assert_partition(plan: &ExecutionPlan) {
        let mut seen: Vec<&String> = plan.layers.iter().flatten().collect();
        seen.sort();
        let mut ids: Vec<&String> = plan.steps.iter().map(|s| &s.id).collect();
        ids.sort();
        assert_eq!(seen, ids);

        for step in &plan.steps {
            let layer = plan.layer_of(&step.id).unwrap();
            for dep in &step.depends_on {
                assert!(plan.layer_of(dep).unwrap() < layer, "{} before {}", dep, step.id);
            }
            if step.depends_on.is_empty() {
                assert_eq!(layer, 0);
            }
        }
    }

    #[test]
    fn test_booking_cancellation_layers() {
        let plan = build(&[
            "search_gmail_for_booking",
            "find_calendar_event",
            "extract_booking_reference",
            "draft_cancellation_email",
        ]);
        assert_eq!(
            plan.layers,
            vec![
                vec!["step_0".to_string(), "step_1".to_string()],
                vec!["step_2".to_string()],
                vec!["step_3".to_string()],
            ]
        );
        assert_eq!(plan.steps[3].depends_on, vec!["step_0", "step_2"]);
        assert_eq!(plan.steps[3].operation, Operation::DraftMessage);
        assert_eq!(plan.steps[1].service, Service::Calendar);
        assert_partition(&plan);
    }

    #[test]
    fn test_absent_dependency_is_dropped() {
        let plan = build(&["find_calendar_event", "draft_cancellation_email"]);
        assert!(plan.steps[1].depends_on.is_empty());
        assert_eq!(plan.layers, vec![vec!["step_0".to_string(), "step_1".to_string()]]);
    }

    #[test]
    fn test_dependency_must_precede() {
        // The upstream step appears after its dependent, so no edge.
        let plan = build(&["extract_booking_reference", "search_gmail_for_booking"]);
        assert!(plan.steps[0].depends_on.is_empty());
        assert_eq!(plan.layers.len(), 1);
    }

    #[test]
    fn test_duplicate_names_get_distinct_ids() {
        let plan = build(&[
            "search_gmail_for_booking",
            "search_gmail_for_booking",
            "extract_booking_reference",
        ]);
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[1].id, "step_1");
        assert_eq!(plan.steps[2].depends_on, vec!["step_0"]);
        assert_partition(&plan);
    }

    #[test]
    fn test_ooo_conflict_chain() {
        let plan = build(&[
            "search_drive_ooo_document",
            "search_calendar_next_week",
            "extract_ooo_dates",
            "find_conflicting_events",
        ]);
        assert_eq!(plan.layers.len(), 3);
        assert_eq!(plan.layer_of("step_3"), Some(2));
        assert_eq!(plan.steps[3].depends_on, vec!["step_2", "step_1"]);
        assert_partition(&plan);
    }

    #[test]
    fn test_partition_over_many_orderings() {
        let names = [
            "search_gmail_for_booking",
            "extract_booking_reference",
            "draft_cancellation_email",
            "search_drive_ooo_document",
            "extract_ooo_dates",
            "search_calendar_next_week",
            "find_conflicting_events",
            "unknown_step",
        ];
        // Every rotation of the list is a different step order.
        for shift in 0..names.len() {
            let mut rotated = names.to_vec();
            rotated.rotate_left(shift);
            assert_partition(&build(&rotated));
        }
    }

    #[test]
    fn test_empty_list_gives_empty_plan() {
        let plan = build(&[]);
        assert!(plan.is_empty());
        assert!(plan.layers.is_empty());
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = PlanBuilder::default()
            .build(&["search_gmail", "  "], &EntityBag::new())
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::InvalidParams(_)));
    }

    #[test]
    fn test_entities_flow_into_every_step() {
        let entities = EntityBag::new().with("airline", json!("Turkish Airlines"));
        let plan = PlanBuilder::default()
            .build(&["search_gmail_for_booking", "find_calendar_event"], &entities)
            .unwrap();
        for step in &plan.steps {
            assert_eq!(step.params["keyword"], json!("Turkish Airlines"));
        }
    }

    #[test]
    fn test_config_dependencies() {
        let mut config = PlannerConfig::default();
        config
            .dependencies
            .insert("summarize_inbox".into(), vec!["search_emails".into()]);
        let plan = PlanBuilder::from_config(&config)
            .build(&["search_emails", "summarize_inbox"], &EntityBag::new())
            .unwrap();
        assert_eq!(plan.steps[1].depends_on, vec!["step_0"]);
        assert_eq!(plan.layers.len(), 2);
    }

    #[test]
    fn test_cycle_stalls() {
        let steps = vec![
            Step::new("a", Operation::SearchMessages).depending_on(&["b"]),
            Step::new("b", Operation::SearchMessages).depending_on(&["a"]),
            Step::new("c", Operation::SearchFiles),
        ];
        match topological_layers(&steps).unwrap_err() {
            SwitchyardError::PlanStalled { remaining } => assert_eq!(remaining, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_stalls() {
        let steps = vec![Step::new("a", Operation::GetFile).depending_on(&["a"])];
        assert!(matches!(
            topological_layers(&steps),
            Err(SwitchyardError::PlanStalled { .. })
        ));
    }

    #[test]
    fn test_unknown_and_duplicate_ids_rejected() {
        let unknown = vec![Step::new("a", Operation::GetFile).depending_on(&["zzz"])];
        assert!(matches!(
            topological_layers(&unknown),
            Err(SwitchyardError::InvalidParams(_))
        ));

        let dup = vec![
            Step::new("a", Operation::GetFile),
            Step::new("a", Operation::GetEvent),
        ];
        assert!(matches!(
            topological_layers(&dup),
            Err(SwitchyardError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_diamond_layers() {
        let steps = vec![
            Step::new("root", Operation::SearchMessages),
            Step::new("left", Operation::GetMessage).depending_on(&["root"]),
            Step::new("right", Operation::GetEvent).depending_on(&["root"]),
            Step::new("join", Operation::DraftMessage).depending_on(&["left", "right"]),
        ];
        let layers = topological_layers(&steps).unwrap();
        assert_eq!(
            layers,
            vec![
                vec!["root".to_string()],
                vec!["left".to_string(), "right".to_string()],
                vec!["join".to_string()],
            ]
        );
    }
}
