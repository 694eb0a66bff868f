pub mod orchestrator;
pub mod plan;

pub use orchestrator::{build_params, Orchestrator};
pub use plan::{ActionRegistry, DependencyRules, PlanBuilder, ResolvedAction};
