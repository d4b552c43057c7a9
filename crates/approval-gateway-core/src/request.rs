//! The action request record and its lifecycle.

use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Request identifier.
pub type RequestId = Uuid;

/// Error message attached to a denial without an explicit reason.
pub const DEFAULT_DENIAL: &str = "Denied by human";

/// Lifecycle status of an action request.
///
/// `Pending` is the only non-terminal state. A request leaves it exactly
/// once, either to `Approved` or to `Denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting a human decision.
    Pending,
    /// Approved; execution result or error is attached once the backend returns.
    Approved,
    /// Denied by the approver.
    Denied,
}

impl RequestStatus {
    /// Whether no further transition is permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// Human decision on a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny { reason: Option<String> },
}

impl Decision {
    /// Build a decision from the `approved` flag used on the wire.
    #[must_use]
    pub fn from_flag(approved: bool, reason: Option<String>) -> Self {
        if approved {
            Self::Approve
        } else {
            Self::Deny { reason }
        }
    }

    /// Status the request moves to.
    #[must_use]
    pub const fn target_status(&self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Deny { .. } => RequestStatus::Denied,
        }
    }

    /// Error message recorded on denial. Blank reasons fall back to the default.
    #[must_use]
    pub fn denial_message(&self) -> Option<String> {
        match self {
            Self::Approve => None,
            Self::Deny { reason } => Some(
                reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(DEFAULT_DENIAL)
                    .to_string(),
            ),
        }
    }
}

/// Outcome of running an approved action.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(Value),
    Failure(String),
}

/// Persisted request data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// Unique request identifier.
    pub id: RequestId,
    /// Action name, interpreted only by the executor.
    pub action: String,
    /// Action payload, interpreted only by the executor.
    #[serde(default)]
    pub params: Value,
    /// Current status.
    pub status: RequestStatus,
    /// Creation timestamp (Unix epoch millis).
    pub created_at: i64,
    /// Decision timestamp (Unix epoch millis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<i64>,
    /// Execution result, present only after a successful run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Execution failure or denial message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionRequest {
    /// Create a fresh pending request.
    #[must_use]
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            params,
            status: RequestStatus::Pending,
            created_at: now_millis(),
            decided_at: None,
            result: None,
            error: None,
        }
    }

    /// Approved but neither result nor error attached yet.
    #[must_use]
    pub const fn is_executing(&self) -> bool {
        matches!(self.status, RequestStatus::Approved) && self.result.is_none() && self.error.is_none()
    }

    /// Terminal and nothing more will be attached.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.status.is_terminal() && !self.is_executing()
    }
}

/// Request filter for listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    /// Filter by status.
    pub status: Option<RequestStatus>,
    /// Filter by id.
    pub id: Option<RequestId>,
}

impl RequestFilter {
    #[must_use]
    pub fn matches(&self, request: &ActionRequest) -> bool {
        self.status.is_none_or(|s| s == request.status) && self.id.is_none_or(|id| id == request.id)
    }
}

/// Current time in Unix epoch millis.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_request_is_pending_and_bare() {
        let req = ActionRequest::new("echo", json!({"x": 1}));
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.result.is_none());
        assert!(req.error.is_none());
        assert!(req.decided_at.is_none());
        assert!(!req.is_settled());
    }

    #[test]
    fn test_wire_shape_omits_absent_fields() {
        let req = ActionRequest::new("echo", json!({}));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["status"], "pending");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("result").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("decidedAt").is_none());
    }

    #[test]
    fn test_denial_message_defaults() {
        assert_eq!(
            Decision::Deny { reason: None }.denial_message().as_deref(),
            Some(DEFAULT_DENIAL)
        );
        assert_eq!(
            Decision::Deny { reason: Some("  ".into()) }.denial_message().as_deref(),
            Some(DEFAULT_DENIAL)
        );
        assert_eq!(
            Decision::from_flag(false, Some("not allowed".into()))
                .denial_message()
                .as_deref(),
            Some("not allowed")
        );
        assert_eq!(Decision::Approve.denial_message(), None);
    }

    #[test]
    fn test_executing_vs_settled() {
        let mut req = ActionRequest::new("echo", json!({}));
        req.status = RequestStatus::Approved;
        assert!(req.is_executing());
        assert!(!req.is_settled());

        req.result = Some(json!({"text": "hi"}));
        assert!(!req.is_executing());
        assert!(req.is_settled());
    }

    #[test]
    fn test_filter_matches() {
        let req = ActionRequest::new("echo", json!({}));
        assert!(RequestFilter::default().matches(&req));
        assert!(
            RequestFilter { status: Some(RequestStatus::Pending), id: Some(req.id) }.matches(&req)
        );
        assert!(!RequestFilter { status: Some(RequestStatus::Denied), id: None }.matches(&req));
        assert!(!RequestFilter { status: None, id: Some(Uuid::new_v4()) }.matches(&req));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("approved".parse::<RequestStatus>(), Ok(RequestStatus::Approved));
        assert!("done".parse::<RequestStatus>().is_err());
    }
}
