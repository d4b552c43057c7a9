//! Polling client: submit a request, then poll until it settles.

use std::time::Duration;

use approval_gateway_core::RequestStatus;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use crate::protocol::{
    DecisionRequest, DecisionResponse, ErrorResponse, ListQuery, LogsResponse, RequestRecord,
    SubmitRequest, SubmitResponse,
};

/// Default base URL of a local gateway.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3000";

/// Client error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    SubmissionRejected(String),
    #[error("{0}")]
    Denied(String),
    #[error("{0}")]
    ExecutionFailed(String),
    #[error("Timed out after {0:?} waiting for a decision")]
    Timeout(Duration),
    #[error("{code}: {message}")]
    Api { code: String, message: String },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected response: {0}")]
    Protocol(String),
}

/// The two calls the poll loop needs.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// `POST /api/request`.
    async fn submit(&self, action: &str, params: &Value) -> Result<SubmitResponse, ClientError>;

    /// `GET /api/requests`.
    async fn list(&self, query: &ListQuery) -> Result<Vec<RequestRecord>, ClientError>;
}

/// Poll loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Sleep between list calls.
    pub interval: Duration,
    /// Give up after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: None,
        }
    }
}

/// Client that submits requests and waits for their terminal state.
pub struct PollingClient<A> {
    api: A,
    options: PollOptions,
}

impl<A: GatewayApi> PollingClient<A> {
    #[must_use]
    pub const fn new(api: A, options: PollOptions) -> Self {
        Self { api, options }
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Submit and wait for the outcome.
    ///
    /// # Errors
    /// `SubmissionRejected`, `Denied`, `ExecutionFailed`, `Timeout`, or any
    /// transport error, which is never retried.
    pub async fn submit_and_await(&self, action: &str, params: &Value) -> Result<Value, ClientError> {
        let id = self.submit(action, params).await?;
        self.wait_for(&id).await
    }

    /// Submit only. Returns the gateway's request id.
    ///
    /// # Errors
    /// Returns `SubmissionRejected` if the gateway answers `ok: false`.
    pub async fn submit(&self, action: &str, params: &Value) -> Result<String, ClientError> {
        let out = self.api.submit(action, params).await?;
        if !out.ok {
            let message = out
                .message
                .or(out.error)
                .unwrap_or_else(|| "Request failed".to_string());
            return Err(ClientError::SubmissionRejected(message));
        }
        out.request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::Protocol("missing requestId".to_string()))
    }

    /// Poll until `id` settles.
    ///
    /// A request that is not yet visible, still pending, or approved but
    /// still executing counts as not done. With a timeout set, a list call
    /// in flight at the deadline is abandoned.
    ///
    /// # Errors
    /// See [`PollingClient::submit_and_await`].
    pub async fn wait_for(&self, id: &str) -> Result<Value, ClientError> {
        let deadline = self.options.timeout.map(|t| (t, Instant::now() + t));
        let query = ListQuery {
            status: None,
            id: Some(id.to_string()),
        };

        loop {
            let listing = self.api.list(&query);
            let requests = match deadline {
                Some((limit, at)) => tokio::time::timeout_at(at, listing)
                    .await
                    .map_err(|_| ClientError::Timeout(limit))??,
                None => listing.await?,
            };

            if let Some(request) = requests.into_iter().find(|r| r.id == id) {
                if let Some(outcome) = settle(request) {
                    return outcome;
                }
            }

            let mut pause = self.options.interval;
            if let Some((limit, at)) = deadline {
                let now = Instant::now();
                if now >= at {
                    return Err(ClientError::Timeout(limit));
                }
                pause = pause.min(at - now);
            }
            tokio::time::sleep(pause).await;
        }
    }
}

/// Terminal outcome for a request, or `None` while it is still in flight.
fn settle(request: RequestRecord) -> Option<Result<Value, ClientError>> {
    match request.status {
        RequestStatus::Pending => None,
        RequestStatus::Approved if request.is_executing() => None,
        RequestStatus::Approved => Some(match request.error {
            Some(error) => Err(ClientError::ExecutionFailed(error)),
            None => Ok(extract_reply(request.result)),
        }),
        RequestStatus::Denied => Some(Err(ClientError::Denied(
            request
                .error
                .unwrap_or_else(|| "Request was denied".to_string()),
        ))),
    }
}

/// The `text` field of an object result, else the raw result.
#[must_use]
pub fn extract_reply(result: Option<Value>) -> Value {
    match result {
        Some(Value::Object(mut map)) if map.contains_key("text") => {
            map.remove("text").unwrap_or(Value::Null)
        }
        Some(other) => other,
        None => Value::Null,
    }
}

/// Render a reply for display: strings unquoted, everything else as JSON.
#[must_use]
pub fn reply_to_string(reply: &Value) -> String {
    match reply {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Listing body as received; entries are decoded one by one.
#[derive(Debug, Default, Deserialize)]
struct Listing {
    #[serde(default)]
    requests: Vec<Value>,
}

/// Decode a listing, skipping entries that do not parse.
fn parse_listing(bytes: &[u8]) -> Result<Vec<RequestRecord>, ClientError> {
    let listing: Listing =
        serde_json::from_slice(bytes).map_err(|e| ClientError::Protocol(e.to_string()))?;
    Ok(listing
        .requests
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable listing entry: {e}");
                None
            }
        })
        .collect())
}

/// Gateway API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGatewayApi {
    http: reqwest::Client,
    base_url: String,
}

impl Default for HttpGatewayApi {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

impl HttpGatewayApi {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the approvals page.
    #[must_use]
    pub fn approvals_url(&self) -> String {
        format!("{}/approvals", self.base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `POST /api/approve`.
    ///
    /// # Errors
    /// Returns `Api` with the gateway's error code on rejection.
    pub async fn decide(
        &self,
        id: &str,
        approved: bool,
        reason: Option<String>,
    ) -> Result<DecisionResponse, ClientError> {
        let body = DecisionRequest {
            request_id: Some(id.to_string()),
            approved,
            reason,
        };
        let res = self.http.post(self.url("/api/approve")).json(&body).send().await?;
        let (status, bytes) = (res.status(), res.bytes().await?);
        decode(status, &bytes)
    }

    /// `GET /api/logs`.
    ///
    /// # Errors
    /// Returns error on transport or decode failure.
    pub async fn logs(&self, limit: usize) -> Result<LogsResponse, ClientError> {
        let res = self
            .http
            .get(self.url("/api/logs"))
            .query(&[("limit", limit)])
            .send()
            .await?;
        let (status, bytes) = (res.status(), res.bytes().await?);
        decode(status, &bytes)
    }
}

#[async_trait]
impl GatewayApi for HttpGatewayApi {
    async fn submit(&self, action: &str, params: &Value) -> Result<SubmitResponse, ClientError> {
        let body = SubmitRequest {
            action: action.to_string(),
            params: params.clone(),
        };
        let res = self.http.post(self.url("/api/request")).json(&body).send().await?;

        // Rejections arrive as 4xx with an `{ok:false}` body; read the body either way.
        let status = res.status();
        let bytes = res.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Protocol(format!("HTTP {}: {e}", status.as_u16())))
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<RequestRecord>, ClientError> {
        let res = self
            .http
            .get(self.url("/api/requests"))
            .query(query)
            .send()
            .await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }
        parse_listing(&bytes)
    }
}

/// Decode a success body, or turn an error body into `ClientError::Api`.
fn decode<T: serde::de::DeserializeOwned>(
    status: reqwest::StatusCode,
    bytes: &[u8],
) -> Result<T, ClientError> {
    if status.is_success() {
        serde_json::from_slice(bytes).map_err(|e| ClientError::Protocol(e.to_string()))
    } else {
        Err(api_error(status, bytes))
    }
}

fn api_error(status: reqwest::StatusCode, bytes: &[u8]) -> ClientError {
    match serde_json::from_slice::<ErrorResponse>(bytes) {
        Ok(err) => ClientError::Api {
            code: err.error,
            message: err.message,
        },
        Err(_) => ClientError::Protocol(format!("HTTP {}", status.as_u16())),
    }
}
