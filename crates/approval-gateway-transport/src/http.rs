//! HTTP transport: the gateway's JSON API.

use std::{convert::Infallible, str::FromStr};

use approval_gateway_core::{Decision, RequestId};
use approval_gateway_store::{Gateway, GatewayError};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{
        HeaderValue, Method, StatusCode,
        header::{CONTENT_TYPE, InvalidHeaderValue},
    },
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::protocol::{
    DecisionRequest, DecisionResponse, ErrorResponse, ListQuery, ListResponse, LogsQuery,
    LogsResponse, RequestResponse, SubmitRequest, SubmitResponse,
};

/// HTTP status for a gateway error.
#[must_use]
pub const fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::UnsupportedAction { .. } | GatewayError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::AlreadyDecided { .. } => StatusCode::CONFLICT,
        GatewayError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// API error rendered as `{ok:false, error, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::from(GatewayError::InvalidRequest(message.into()))
    }

    /// Malformed ids cannot name a stored request.
    fn unknown_id(raw: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse::new("NotFound", format!("Request not found: {raw}")),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self {
            status: status_for(&err),
            body: ErrorResponse::new(err.code(), err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build the API router over a gateway.
///
/// Routes:
/// - `POST /api/request` - submit
/// - `GET /api/requests` - list (`?status=`, `?id=`)
/// - `GET /api/requests/{id}` - fetch one
/// - `POST /api/approve` - decide
/// - `GET /api/logs` - audit log (`?limit=`)
/// - `GET /api/events` - audit log as server-sent events
/// - `GET /healthz`
///
/// No CORS layer is installed, so browsers only reach the API from the
/// gateway's own origin. See [`cors_layer`] to admit one more.
pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/request", post(submit))
        .route("/api/requests", get(list_requests))
        .route("/api/requests/{id}", get(get_request))
        .route("/api/approve", post(approve))
        .route("/api/logs", get(logs))
        .route("/api/events", get(events))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// CORS layer admitting only the origin of `public_url`.
///
/// # Errors
/// Returns error if the origin is not a valid header value.
pub fn cors_layer(public_url: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin = HeaderValue::from_str(origin_of(public_url))?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]))
}

/// `scheme://host[:port]` part of a URL.
fn origin_of(url: &str) -> &str {
    let url = url.trim();
    let host_start = url.find("://").map_or(0, |i| i + 3);
    match url[host_start..].find('/') {
        Some(end) => &url[..host_start + end],
        None => url,
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn submit(
    State(gateway): State<Gateway>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> (StatusCode, Json<SubmitResponse>) {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmitResponse::rejected("InvalidRequest", rejection.body_text())),
            );
        }
    };

    match gateway.submit(&body.action, body.params).await {
        Ok(id) => (StatusCode::OK, Json(SubmitResponse::accepted(id))),
        Err(err) => (
            status_for(&err),
            Json(SubmitResponse::rejected(err.code(), err.to_string())),
        ),
    }
}

async fn list_requests(
    State(gateway): State<Gateway>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::invalid(e.body_text()))?;
    let Some(filter) = query.to_filter() else {
        return Ok(Json(ListResponse::default()));
    };
    let requests = gateway.list(&filter).await?;
    Ok(Json(ListResponse { requests }))
}

async fn get_request(
    State(gateway): State<Gateway>,
    Path(raw_id): Path<String>,
) -> Result<Json<RequestResponse>, ApiError> {
    let id = RequestId::from_str(&raw_id).map_err(|_| ApiError::unknown_id(&raw_id))?;
    let request = gateway.get(id).await?;
    Ok(Json(RequestResponse { request }))
}

async fn approve(
    State(gateway): State<Gateway>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::invalid(e.body_text()))?;
    let raw_id = body
        .request_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::invalid("Missing requestId"))?;
    let id = RequestId::from_str(raw_id).map_err(|_| ApiError::unknown_id(raw_id))?;

    let decided = gateway
        .decide(id, Decision::from_flag(body.approved, body.reason))
        .await?;
    Ok(Json(DecisionResponse::from(decided)))
}

async fn logs(
    State(gateway): State<Gateway>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Json<LogsResponse> {
    let limit = query.map_or(LogsQuery::DEFAULT_LIMIT, |Query(q)| q.effective_limit());
    Json(LogsResponse {
        logs: gateway.audit().recent(limit),
    })
}

async fn events(
    State(gateway): State<Gateway>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(gateway.audit().sse_stream()).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of() {
        assert_eq!(origin_of("http://localhost:3000"), "http://localhost:3000");
        assert_eq!(origin_of("https://gw.example.com/approvals"), "https://gw.example.com");
        assert_eq!(origin_of("http://localhost:3000/"), "http://localhost:3000");
    }
}
