//! Gateway service: submission, listing and decision endpoints over a store.

use std::{sync::Arc, time::Duration};

use approval_gateway_core::{
    ActionExecutor, ActionRequest, AuditKind, AuditLog, Decision, ExecutionOutcome, ExecutorError,
    GatewayConfig, RequestFilter, RequestId, RequestStatus, RequestStore, StoreError,
};
use serde_json::{Value, json};

/// Gateway error.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unsupported action '{action}'. Allowed: {}", .allowed.join(", "))]
    UnsupportedAction { action: String, allowed: Vec<String> },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Request not found: {0}")]
    NotFound(RequestId),
    #[error("Request already {status}")]
    AlreadyDecided { id: RequestId, status: RequestStatus },
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl GatewayError {
    /// Stable error code used on the wire.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedAction { .. } => "UnsupportedAction",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::NotFound(_) => "NotFound",
            Self::AlreadyDecided { .. } => "AlreadyDecided",
            Self::Storage(_) => "Internal",
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::AlreadyDecided { id, status } => Self::AlreadyDecided { id, status },
            other => Self::Storage(other),
        }
    }
}

/// The broker: owns the store handle, the executor and the audit log.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn RequestStore>,
    executor: Arc<dyn ActionExecutor>,
    audit: Arc<AuditLog>,
    executor_timeout: Duration,
    allowed_actions: Option<Vec<String>>,
}

impl Gateway {
    /// Create a gateway from its collaborators and config.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        executor: Arc<dyn ActionExecutor>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            store,
            executor,
            audit: Arc::new(AuditLog::new(config.audit_history)),
            executor_timeout: config.executor_timeout(),
            allowed_actions: config.allowed_actions.clone(),
        }
    }

    /// Audit log shared by all clones.
    #[must_use]
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Actions accepted by [`Gateway::submit`].
    #[must_use]
    pub fn supported_actions(&self) -> Vec<String> {
        self.executor
            .actions()
            .into_iter()
            .filter(|a| self.is_allowed(a))
            .collect()
    }

    fn is_allowed(&self, action: &str) -> bool {
        self.allowed_actions
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|a| a == action))
    }

    /// Submission endpoint: validate and create a pending request.
    ///
    /// Nothing is stored when validation fails.
    ///
    /// # Errors
    /// Returns `UnsupportedAction` for empty or unknown actions.
    pub async fn submit(&self, action: &str, params: Value) -> Result<RequestId, GatewayError> {
        let action = action.trim();
        if action.is_empty() || !self.executor.supports(action) || !self.is_allowed(action) {
            let err = GatewayError::UnsupportedAction {
                action: action.to_string(),
                allowed: self.supported_actions(),
            };
            tracing::warn!("Rejected submission: {err}");
            self.audit.record(
                AuditKind::RequestRejected,
                None,
                Some(action),
                err.to_string(),
                None,
            );
            return Err(err);
        }

        let params = if params.is_null() { json!({}) } else { params };
        let param_keys = object_keys(&params);

        let id = self.store.create(action, params).await?;

        tracing::info!(request_id = %id, action, "Request created");
        self.audit.record(
            AuditKind::RequestCreated,
            Some(id),
            Some(action),
            format!("Request created: {id}"),
            Some(json!({ "action": action, "paramKeys": param_keys })),
        );

        Ok(id)
    }

    /// Listing endpoint. Read-only.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub async fn list(&self, filter: &RequestFilter) -> Result<Vec<ActionRequest>, GatewayError> {
        Ok(self.store.list(filter).await?)
    }

    /// Fetch one request.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown ids.
    pub async fn get(&self, id: RequestId) -> Result<ActionRequest, GatewayError> {
        self.store.get(id).await?.ok_or(GatewayError::NotFound(id))
    }

    /// Decision endpoint.
    ///
    /// Approval runs the executor after the transition commits and returns
    /// the request with its outcome attached. Executor failures are captured
    /// on the request, never returned as errors.
    ///
    /// # Errors
    /// Returns `NotFound` or `AlreadyDecided`; the request is left untouched.
    pub async fn decide(
        &self,
        id: RequestId,
        decision: Decision,
    ) -> Result<ActionRequest, GatewayError> {
        let decided = match self.store.decide(id, &decision).await {
            Ok(request) => request,
            Err(e) => {
                let err = GatewayError::from(e);
                tracing::warn!(request_id = %id, "Decision rejected: {err}");
                return Err(err);
            }
        };

        if decided.status == RequestStatus::Denied {
            tracing::info!(request_id = %id, action = %decided.action, "Request denied");
            self.audit.record(
                AuditKind::RequestDenied,
                Some(id),
                Some(&decided.action),
                format!("Request {id} denied"),
                None,
            );
            return Ok(decided);
        }

        // Detached so a dropped caller cannot strand the request mid-execution.
        let this = self.clone();
        tokio::spawn(async move { this.execute_approved(decided).await })
            .await
            .map_err(|e| GatewayError::Storage(StoreError::Internal(format!("execution task failed: {e}"))))?
    }

    async fn execute_approved(&self, request: ActionRequest) -> Result<ActionRequest, GatewayError> {
        let id = request.id;
        tracing::info!(request_id = %id, action = %request.action, "Request approved, executing");

        let outcome = self.run_executor(&request).await;

        let completed = self.store.complete(id, outcome).await?;
        match (&completed.result, &completed.error) {
            (_, Some(error)) => {
                tracing::error!(request_id = %id, action = %completed.action, "Execution failed: {error}");
                self.audit.record(
                    AuditKind::RequestFailed,
                    Some(id),
                    Some(&completed.action),
                    format!("Request {id} failed: {error}"),
                    None,
                );
            }
            (result, None) => {
                tracing::info!(request_id = %id, action = %completed.action, "Execution succeeded");
                self.audit.record(
                    AuditKind::RequestApproved,
                    Some(id),
                    Some(&completed.action),
                    format!("Request {id} executed successfully"),
                    Some(json!({ "resultKeys": result.as_ref().map(object_keys).unwrap_or_default() })),
                );
            }
        }

        Ok(completed)
    }

    async fn run_executor(&self, request: &ActionRequest) -> ExecutionOutcome {
        let executor = Arc::clone(&self.executor);
        let action = request.action.clone();
        let params = request.params.clone();
        let handle = tokio::spawn(async move { executor.execute(&action, &params).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(self.executor_timeout, handle).await {
            Ok(Ok(Ok(result))) => ExecutionOutcome::Success(result),
            Ok(Ok(Err(e))) => ExecutionOutcome::Failure(e.to_string()),
            Ok(Err(join_err)) => ExecutionOutcome::Failure(format!("Action aborted: {join_err}")),
            Err(_) => {
                abort.abort();
                ExecutionOutcome::Failure(ExecutorError::Timeout(self.executor_timeout).to_string())
            }
        }
    }
}

fn object_keys(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::MemoryStore;

    /// Echo-style executor; `fail` and `panic` actions misbehave on purpose.
    struct TestExecutor;

    #[async_trait]
    impl ActionExecutor for TestExecutor {
        fn actions(&self) -> Vec<String> {
            ["echo", "fail", "slow", "panic"].map(String::from).to_vec()
        }

        async fn execute(&self, action: &str, params: &Value) -> Result<Value, ExecutorError> {
            match action {
                "echo" => Ok(params.clone()),
                "fail" => Err(ExecutorError::Backend("backend unreachable".into())),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Value::Null)
                }
                "panic" => panic!("handler bug"),
                other => Err(ExecutorError::UnsupportedAction(other.into())),
            }
        }
    }

    fn gateway() -> Gateway {
        gateway_with(&GatewayConfig::default())
    }

    fn gateway_with(config: &GatewayConfig) -> Gateway {
        Gateway::new(Arc::new(MemoryStore::new()), Arc::new(TestExecutor), config)
    }

    #[tokio::test]
    async fn test_submit_creates_pending() {
        let gw = gateway();
        let id = gw.submit("echo", json!({"x": 1})).await.unwrap();

        let req = gw.get(id).await.unwrap();
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(gw.audit().recent(1)[0].kind, AuditKind::RequestCreated);
    }

    #[tokio::test]
    async fn test_submit_null_params_become_empty_object() {
        let gw = gateway();
        let id = gw.submit("echo", Value::Null).await.unwrap();
        assert_eq!(gw.get(id).await.unwrap().params, json!({}));
    }

    #[tokio::test]
    async fn test_unknown_action_creates_nothing() {
        let gw = gateway();
        let before = gw.list(&RequestFilter::default()).await.unwrap().len();

        for action in ["delete_universe", "", "   "] {
            let err = gw.submit(action, json!({})).await.unwrap_err();
            assert_eq!(err.code(), "UnsupportedAction");
        }

        assert_eq!(gw.list(&RequestFilter::default()).await.unwrap().len(), before);
        assert_eq!(gw.audit().recent(1)[0].kind, AuditKind::RequestRejected);
    }

    #[tokio::test]
    async fn test_allow_list_narrows_actions() {
        let config = GatewayConfig {
            allowed_actions: Some(vec!["echo".into()]),
            ..GatewayConfig::default()
        };
        let gw = gateway_with(&config);
        assert_eq!(gw.supported_actions(), ["echo"]);

        let err = gw.submit("fail", json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedAction { .. }));
    }

    #[tokio::test]
    async fn test_approve_attaches_result() {
        let gw = gateway();
        let id = gw.submit("echo", json!({"x": 1})).await.unwrap();

        let req = gw.decide(id, Decision::Approve).await.unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
        assert_eq!(req.result, Some(json!({"x": 1})));
        assert!(req.error.is_none());

        let entry = &gw.audit().recent(1)[0];
        assert_eq!(entry.kind, AuditKind::RequestApproved);
        assert_eq!(entry.meta, Some(json!({"resultKeys": ["x"]})));
    }

    #[tokio::test]
    async fn test_executor_failure_stays_approved() {
        let gw = gateway();
        let id = gw.submit("fail", json!({})).await.unwrap();

        let req = gw.decide(id, Decision::Approve).await.unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
        assert_eq!(req.error.as_deref(), Some("backend unreachable"));
        assert!(req.result.is_none());
        assert_eq!(gw.audit().recent(1)[0].kind, AuditKind::RequestFailed);
    }

    #[tokio::test]
    async fn test_executor_panic_is_captured() {
        let gw = gateway();
        let id = gw.submit("panic", json!({})).await.unwrap();

        let req = gw.decide(id, Decision::Approve).await.unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
        assert!(req.error.unwrap().starts_with("Action aborted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_timeout_is_captured() {
        let config = GatewayConfig {
            executor_timeout_secs: 5,
            ..GatewayConfig::default()
        };
        let gw = gateway_with(&config);
        let id = gw.submit("slow", json!({})).await.unwrap();

        let req = gw.decide(id, Decision::Approve).await.unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
        assert!(req.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_deny_records_reason() {
        let gw = gateway();
        let id = gw.submit("echo", json!({})).await.unwrap();

        let req = gw
            .decide(id, Decision::Deny { reason: Some("not allowed".into()) })
            .await
            .unwrap();
        assert_eq!(req.status, RequestStatus::Denied);
        assert_eq!(req.error.as_deref(), Some("not allowed"));
        assert!(req.result.is_none());
    }

    #[tokio::test]
    async fn test_second_decision_fails_without_change() {
        let gw = gateway();
        let id = gw.submit("echo", json!({"x": 1})).await.unwrap();
        let first = gw.decide(id, Decision::Approve).await.unwrap();

        let err = gw
            .decide(id, Decision::Deny { reason: None })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AlreadyDecided");
        assert_eq!(gw.get(id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_decide_unknown_id() {
        let gw = gateway();
        let err = gw
            .decide(uuid::Uuid::new_v4(), Decision::Approve)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_decisions_one_succeeds() {
        let gw = gateway();
        let id = gw.submit("echo", json!({})).await.unwrap();

        let (a, b) = tokio::join!(
            gw.decide(id, Decision::Approve),
            gw.decide(id, Decision::Deny { reason: None })
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, GatewayError::AlreadyDecided { .. }))
        );
    }
}
