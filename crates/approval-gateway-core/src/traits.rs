//! Core traits for storage and execution.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::request::{ActionRequest, Decision, ExecutionOutcome, RequestFilter, RequestId, RequestStatus};

/// Storage error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Request not found: {0}")]
    NotFound(RequestId),
    #[error("Request {id} already {status}")]
    AlreadyDecided { id: RequestId, status: RequestStatus },
    #[error("Request {id} is not awaiting an execution outcome")]
    NotExecutable { id: RequestId },
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for request storage backends.
///
/// Implementations must make [`RequestStore::decide`] an atomic
/// check-and-set: of any number of concurrent decisions on one pending
/// request, exactly one succeeds.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Create a new pending request.
    async fn create(&self, action: &str, params: Value) -> Result<RequestId, StoreError>;

    /// Get a request by ID.
    async fn get(&self, id: RequestId) -> Result<Option<ActionRequest>, StoreError>;

    /// List requests in insertion order.
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ActionRequest>, StoreError>;

    /// Move a pending request to the decision's target status.
    ///
    /// Fails with [`StoreError::AlreadyDecided`] if the request is terminal.
    async fn decide(&self, id: RequestId, decision: &Decision) -> Result<ActionRequest, StoreError>;

    /// Attach the execution outcome to an approved request.
    ///
    /// Accepted once; fails with [`StoreError::NotExecutable`] for pending or
    /// denied requests and for requests that already carry an outcome.
    async fn complete(
        &self,
        id: RequestId,
        outcome: ExecutionOutcome,
    ) -> Result<ActionRequest, StoreError>;
}

/// Executor error.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),
    #[error("{0}")]
    InvalidParams(String),
    #[error("{0} not found in vault")]
    MissingSecret(String),
    #[error("{0}")]
    Backend(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Action timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Trait for action executors.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Names of the actions this executor can run, in registration order.
    fn actions(&self) -> Vec<String>;

    /// Whether `action` can be run.
    fn supports(&self, action: &str) -> bool {
        self.actions().iter().any(|a| a == action)
    }

    /// Run an approved action against its backend.
    async fn execute(&self, action: &str, params: &Value) -> Result<Value, ExecutorError>;
}
