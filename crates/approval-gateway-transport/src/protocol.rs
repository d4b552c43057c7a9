//! Wire protocol for client-server communication.

use approval_gateway_core::{ActionRequest, AuditEntry, RequestFilter, RequestId, RequestStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /api/request` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

/// `POST /api/request` response.
///
/// `ok: true` carries `requestId`; `ok: false` carries an error code and
/// a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub ok: bool,
    /// Opaque to clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmitResponse {
    #[must_use]
    pub fn accepted(id: RequestId) -> Self {
        Self {
            ok: true,
            request_id: Some(id.to_string()),
            status: Some(RequestStatus::Pending),
            error: None,
            message: Some("Request created. Awaiting human approval.".to_string()),
        }
    }

    #[must_use]
    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            request_id: None,
            status: None,
            error: Some(code.to_string()),
            message: Some(message.into()),
        }
    }
}

/// `GET /api/requests` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ListQuery {
    /// Store filter for this query.
    ///
    /// `None` when `id` cannot name a stored request, so nothing matches.
    #[must_use]
    pub fn to_filter(&self) -> Option<RequestFilter> {
        let id = match self.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<RequestId>().ok()?),
        };
        Some(RequestFilter {
            status: self.status,
            id,
        })
    }
}

/// `GET /api/requests` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub requests: Vec<ActionRequest>,
}

/// A request as clients see it.
///
/// Only `id`, `action` and `status` are required. Ids are opaque strings
/// and the timestamps are optional, so any gateway speaking the listing
/// shape can be polled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub params: Value,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<i64>,
}

impl RequestRecord {
    /// Approved but neither result nor error attached yet.
    #[must_use]
    pub const fn is_executing(&self) -> bool {
        matches!(self.status, RequestStatus::Approved) && self.result.is_none() && self.error.is_none()
    }
}

impl From<ActionRequest> for RequestRecord {
    fn from(r: ActionRequest) -> Self {
        Self {
            id: r.id.to_string(),
            action: r.action,
            params: r.params,
            status: r.status,
            result: r.result,
            error: r.error,
            created_at: Some(r.created_at),
            decided_at: r.decided_at,
        }
    }
}

/// `GET /api/requests/{id}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResponse {
    pub request: ActionRequest,
}

/// `POST /api/approve` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    /// Absent means deny.
    #[serde(default)]
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `POST /api/approve` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub ok: bool,
    pub request_id: String,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ActionRequest> for DecisionResponse {
    fn from(r: ActionRequest) -> Self {
        Self {
            ok: true,
            request_id: r.id.to_string(),
            status: r.status,
            result: r.result,
            error: r.error,
        }
    }
}

/// Error body for every failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    /// Stable error code (`UnsupportedAction`, `NotFound`, ...).
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: code.to_string(),
            message: message.into(),
        }
    }
}

/// `GET /api/logs` query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

impl LogsQuery {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 500;

    /// Requested limit, defaulted and clamped.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            None | Some(0) => Self::DEFAULT_LIMIT,
            Some(n) => n.min(Self::MAX_LIMIT),
        }
    }
}

/// `GET /api/logs` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<AuditEntry>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_submit_request_defaults() {
        let body: SubmitRequest = serde_json::from_value(json!({"action": "echo"})).unwrap();
        assert_eq!(body.action, "echo");
        assert!(body.params.is_null());
    }

    #[test]
    fn test_submit_response_shapes() {
        let id = uuid::Uuid::new_v4();
        let ok = serde_json::to_value(SubmitResponse::accepted(id)).unwrap();
        assert_eq!(ok["ok"], true);
        assert_eq!(ok["requestId"], id.to_string());
        assert!(ok.get("error").is_none());

        let rejected =
            serde_json::to_value(SubmitResponse::rejected("UnsupportedAction", "nope")).unwrap();
        assert_eq!(rejected, json!({"ok": false, "error": "UnsupportedAction", "message": "nope"}));
    }

    #[test]
    fn test_record_accepts_minimal_listing_entry() {
        let record: RequestRecord = serde_json::from_value(json!({
            "id": "req_1700000000000_1",
            "action": "openai_chat",
            "params": {"prompt": "hi"},
            "status": "approved",
            "result": {"text": "hi"}
        }))
        .unwrap();
        assert_eq!(record.id, "req_1700000000000_1");
        assert_eq!(record.created_at, None);
        assert!(!record.is_executing());

        let accepted: SubmitResponse =
            serde_json::from_value(json!({"ok": true, "requestId": "req_1700000000000_1"})).unwrap();
        assert_eq!(accepted.request_id.as_deref(), Some("req_1700000000000_1"));
    }

    #[test]
    fn test_record_from_stored_request() {
        let stored = ActionRequest::new("echo", json!({"x": 1}));
        let record = RequestRecord::from(stored.clone());
        assert_eq!(record.id, stored.id.to_string());
        assert_eq!(record.created_at, Some(stored.created_at));
        assert!(record.status == RequestStatus::Pending && !record.is_executing());
    }

    #[test]
    fn test_list_query_filter() {
        let id = uuid::Uuid::new_v4();
        let by_id = ListQuery { status: None, id: Some(id.to_string()) };
        assert_eq!(by_id.to_filter().and_then(|f| f.id), Some(id));

        let foreign = ListQuery { status: None, id: Some("req_1".into()) };
        assert_eq!(foreign.to_filter(), None);

        let pending = ListQuery { status: Some(RequestStatus::Pending), id: None };
        assert_eq!(pending.to_filter().and_then(|f| f.status), Some(RequestStatus::Pending));
    }

    #[test]
    fn test_decision_request_defaults_to_deny() {
        let body: DecisionRequest =
            serde_json::from_value(json!({"requestId": "abc", "reason": "no"})).unwrap();
        assert!(!body.approved);
        assert_eq!(body.request_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_logs_limit_clamped() {
        assert_eq!(LogsQuery { limit: None }.effective_limit(), 100);
        assert_eq!(LogsQuery { limit: Some(0) }.effective_limit(), 100);
        assert_eq!(LogsQuery { limit: Some(20) }.effective_limit(), 20);
        assert_eq!(LogsQuery { limit: Some(10_000) }.effective_limit(), 500);
    }
}
