//! Turning step names into a dependency-respecting [`ExecutionPlan`].
//!
//! [`ExecutionPlan`]: switchyard_core::types::ExecutionPlan

pub mod builder;
pub mod registry;

pub use builder::{topological_layers, DependencyRules, PlanBuilder};
pub use registry::{classify, extract_params, ActionRegistry, ResolvedAction};
