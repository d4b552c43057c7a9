//! Bounded audit log with broadcast for live subscribers.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::request::{RequestId, now_millis};

/// Default number of entries kept in history.
pub const DEFAULT_HISTORY: usize = 1000;

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    RequestCreated,
    RequestRejected,
    RequestApproved,
    RequestFailed,
    RequestDenied,
}

/// One audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    /// Unix epoch millis.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: AuditKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub message: String,
    /// Key names and counts only; never parameter or secret values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

struct Inner {
    history: VecDeque<AuditEntry>,
    next_id: u64,
}

/// Audit log with broadcast and history support.
///
/// Late subscribers receive history first, then live entries.
pub struct AuditLog {
    inner: RwLock<Inner>,
    capacity: usize,
    sender: broadcast::Sender<AuditEntry>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl AuditLog {
    /// Create a log retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(capacity.min(64)),
                next_id: 0,
            }),
            capacity: capacity.max(1),
            sender,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn record(
        &self,
        kind: AuditKind,
        request_id: Option<RequestId>,
        action: Option<&str>,
        message: impl Into<String>,
        meta: Option<Value>,
    ) -> AuditEntry {
        let entry = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            inner.next_id += 1;
            let entry = AuditEntry {
                id: format!("log_{}", inner.next_id),
                timestamp: now_millis(),
                kind,
                request_id,
                action: action.map(str::to_string),
                message: message.into(),
                meta,
            };
            while inner.history.len() >= self.capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(entry.clone());
            entry
        };

        let _ = self.sender.send(entry.clone()); // live listeners
        entry
    }

    /// Most recent entries, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEntry> {
        self.sender.subscribe()
    }

    /// Stream that yields history (oldest first), then live entries.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, AuditEntry> {
        // Subscribe before the snapshot so nothing falls between the two.
        let rx = self.subscribe();
        let history: Vec<AuditEntry> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .cloned()
            .collect();
        let last_seen = history.last().map(|e| e.seq());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(move |res| async move {
            let entry = res.ok()?;
            match last_seen {
                Some(seen) if entry.seq() <= seen => None,
                _ => Some(entry),
            }
        });

        Box::pin(hist.chain(live))
    }

    /// SSE stream (requires `sse` feature).
    #[cfg(feature = "sse")]
    #[must_use]
    pub fn sse_stream(
        &self,
    ) -> futures::stream::BoxStream<'static, Result<axum::response::sse::Event, std::convert::Infallible>>
    {
        self.history_plus_stream()
            .map(|entry| Ok(entry.to_sse_event()))
            .boxed()
    }
}

impl AuditEntry {
    /// Sequence number parsed from the `log_<n>` id.
    fn seq(&self) -> u64 {
        self.id
            .strip_prefix("log_")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    /// Render as a server-sent event.
    #[cfg(feature = "sse")]
    #[must_use]
    pub fn to_sse_event(&self) -> axum::response::sse::Event {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        axum::response::sse::Event::default()
            .event(self.kind.as_event_name())
            .id(self.id.clone())
            .data(data)
    }
}

impl AuditKind {
    #[must_use]
    pub const fn as_event_name(self) -> &'static str {
        match self {
            Self::RequestCreated => "request_created",
            Self::RequestRejected => "request_rejected",
            Self::RequestApproved => "request_approved",
            Self::RequestFailed => "request_failed",
            Self::RequestDenied => "request_denied",
        }
    }
}
