use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use switchyard_core::config::OrchestratorConfig;
use switchyard_core::error::SwitchyardError;
use switchyard_core::traits::ServiceExecutor;
use switchyard_core::types::{ExecutionPlan, Params, Service, Step, StepOutcome, CONTEXT_KEY};

/// Runs an [`ExecutionPlan`] layer by layer against per-service executors.
///
/// Layers run strictly in order. Every step of a layer is dispatched at once
/// and the layer is joined before the next one starts. A step never fails the
/// plan: a missing executor, a timeout, or an executor error each produce a
/// failed [`StepOutcome`] and downstream steps simply receive less context.
pub struct Orchestrator {
    executors: HashMap<Service, Arc<dyn ServiceExecutor>>,
    step_timeout: Duration,
}

impl Orchestrator {
    pub fn new(step_timeout: Duration) -> Self {
        Self {
            executors: HashMap::new(),
            step_timeout,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(Duration::from_secs(config.step_timeout_secs))
    }

    /// Register an executor under the service it reports. Replaces any
    /// executor already registered for that service.
    pub fn register(&mut self, executor: Arc<dyn ServiceExecutor>) {
        self.executors.insert(executor.service(), executor);
    }

    pub fn with_executor(mut self, executor: Arc<dyn ServiceExecutor>) -> Self {
        self.register(executor);
        self
    }

    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Execute the whole plan and return one outcome per step, in layer order.
    pub async fn execute(&self, plan: &ExecutionPlan) -> Vec<StepOutcome> {
        let started = Instant::now();
        info!(
            steps = plan.steps.len(),
            layers = plan.layers.len(),
            "Executing plan"
        );

        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(plan.steps.len());
        let mut by_id: HashMap<String, usize> = HashMap::with_capacity(plan.steps.len());

        for (depth, layer) in plan.layers.iter().enumerate() {
            let mut futs = Vec::with_capacity(layer.len());
            for step_id in layer {
                let Some(step) = plan.step(step_id) else {
                    error!(step_id = %step_id, "Layer references a step missing from the plan");
                    continue;
                };
                let params = build_params(step, |id| {
                    by_id.get(id).map(|&i| &outcomes[i])
                });
                futs.push(self.run_step(step, params));
            }

            debug!(layer = depth, width = futs.len(), "Dispatching layer");
            let results = futures::future::join_all(futs).await;

            for outcome in results {
                by_id.insert(outcome.step_id.clone(), outcomes.len());
                outcomes.push(outcome);
            }
        }

        let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
        info!(
            steps = outcomes.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Plan finished"
        );
        outcomes
    }

    async fn run_step(&self, step: &Step, params: Params) -> StepOutcome {
        let start = Instant::now();

        let Some(executor) = self.executors.get(&step.service) else {
            let err = SwitchyardError::NoExecutor(step.service.to_string());
            warn!(step_id = %step.id, service = %step.service, "No executor registered");
            return StepOutcome::failed(step, err.to_string(), 0);
        };

        debug!(step_id = %step.id, operation = %step.operation, "Step started");
        let result = tokio::time::timeout(
            self.step_timeout,
            executor.invoke(step.operation, params),
        )
        .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(payload)) => {
                debug!(step_id = %step.id, elapsed_ms, "Step succeeded");
                StepOutcome::success(step, payload, elapsed_ms)
            }
            Ok(Err(e)) => {
                warn!(step_id = %step.id, operation = %step.operation, error = %e, "Step failed");
                StepOutcome::failed(step, e.to_string(), elapsed_ms)
            }
            Err(_) => {
                let err = SwitchyardError::StepTimeout {
                    step: step.id.clone(),
                    timeout_ms: self.step_timeout.as_millis() as u64,
                };
                error!(step_id = %step.id, elapsed_ms, "Step timed out");
                StepOutcome::failed(step, err.to_string(), elapsed_ms)
            }
        }
    }
}

/// Merge a step's own params with the payloads of its usable dependencies.
///
/// Each dependency that succeeded with a non-empty payload lands under
/// `_context[dep_id]`. When none qualify the params are returned as-is.
pub fn build_params<'a, F>(step: &Step, outcome_of: F) -> Params
where
    F: Fn(&str) -> Option<&'a StepOutcome>,
{
    let mut usable = Vec::new();
    for dep in &step.depends_on {
        match outcome_of(dep).and_then(StepOutcome::usable_payload) {
            Some(payload) => usable.push((dep.clone(), payload.clone())),
            None => debug!(step_id = %step.id, dependency = %dep, "No usable context from dependency"),
        }
    }

    let mut params = step.params.clone();
    if usable.is_empty() {
        return params;
    }

    let mut context = match params.remove(CONTEXT_KEY) {
        Some(Value::Object(existing)) => existing,
        Some(other) => {
            debug!(step_id = %step.id, value = %other, "Replacing non-object context param");
            Params::new()
        }
        None => Params::new(),
    };
    context.extend(usable);
    params.insert(CONTEXT_KEY.to_string(), Value::Object(context));
    params
}
