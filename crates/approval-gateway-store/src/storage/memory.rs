//! In-memory request storage.

use std::{collections::HashMap, sync::RwLock};

use approval_gateway_core::{
    ActionRequest, Decision, ExecutionOutcome, RequestFilter, RequestId, RequestStatus,
    RequestStore, StoreError, now_millis,
};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Default)]
struct Inner {
    requests: HashMap<RequestId, ActionRequest>,
    /// Insertion order.
    order: Vec<RequestId>,
}

/// In-memory storage implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create(&self, action: &str, params: Value) -> Result<RequestId, StoreError> {
        let request = ActionRequest::new(action, params);
        let id = request.id;

        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        if inner.requests.contains_key(&id) {
            return Err(StoreError::Internal(format!("duplicate request id {id}")));
        }
        inner.requests.insert(id, request);
        inner.order.push(id);

        Ok(id)
    }

    async fn get(&self, id: RequestId) -> Result<Option<ActionRequest>, StoreError> {
        Ok(self
            .inner
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .requests
            .get(&id)
            .cloned())
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ActionRequest>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        if let Some(id) = filter.id {
            return Ok(inner
                .requests
                .get(&id)
                .filter(|r| filter.matches(r))
                .cloned()
                .into_iter()
                .collect());
        }

        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.requests.get(id))
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn decide(&self, id: RequestId, decision: &Decision) -> Result<ActionRequest, StoreError> {
        // Check and set under one write guard.
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        let request = inner.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if request.status.is_terminal() {
            return Err(StoreError::AlreadyDecided {
                id,
                status: request.status,
            });
        }

        request.status = decision.target_status();
        request.decided_at = Some(now_millis());
        request.error = decision.denial_message();

        Ok(request.clone())
    }

    async fn complete(
        &self,
        id: RequestId,
        outcome: ExecutionOutcome,
    ) -> Result<ActionRequest, StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        let request = inner.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if request.status != RequestStatus::Approved || !request.is_executing() {
            return Err(StoreError::NotExecutable { id });
        }

        match outcome {
            ExecutionOutcome::Success(result) => request.result = Some(result),
            ExecutionOutcome::Failure(error) => request.error = Some(error),
        }

        Ok(request.clone())
    }
}
