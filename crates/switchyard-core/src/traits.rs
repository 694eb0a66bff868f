use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{Operation, Params, Service};

/// Performs operations against one external service.
///
/// `params` may carry an injected [`CONTEXT_KEY`](crate::types::CONTEXT_KEY)
/// map of upstream payloads keyed by dependency step id. Retries, if any,
/// belong to the executor.
pub trait ServiceExecutor: Send + Sync + 'static {
    /// The service this executor is bound to.
    fn service(&self) -> Service;

    /// Perform `operation` and return its raw payload.
    fn invoke(&self, operation: Operation, params: Params) -> BoxFuture<'_, Result<serde_json::Value>>;
}
