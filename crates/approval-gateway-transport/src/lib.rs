//! Transport layer for the approval gateway.
//!
//! Provides:
//! - Wire protocol (JSON bodies)
//! - HTTP router (feature: server)
//! - Polling client (feature: client)

pub mod protocol;

#[cfg(feature = "server")]
pub mod http;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "client")]
pub use client::{
    ClientError, DEFAULT_GATEWAY_URL, GatewayApi, HttpGatewayApi, PollOptions, PollingClient,
    extract_reply, reply_to_string,
};
#[cfg(feature = "server")]
pub use http::{cors_layer, router};
pub use protocol::{
    DecisionRequest, DecisionResponse, ErrorResponse, ListQuery, ListResponse, LogsResponse,
    RequestRecord, SubmitRequest, SubmitResponse,
};
