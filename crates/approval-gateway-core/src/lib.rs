//! Core abstractions for the human-in-the-loop approval gateway.
//!
//! This crate provides the fundamental building blocks:
//! - `ActionRequest` - The request record and its lifecycle state
//! - `AuditLog` - Bounded history + broadcast of gateway events
//! - `GatewayConfig` - Runtime configuration
//! - Storage and Executor traits

pub mod audit;
pub mod config;
pub mod request;
pub mod traits;

pub use audit::{AuditEntry, AuditKind, AuditLog};
pub use config::{ConfigError, GatewayConfig};
pub use request::{
    ActionRequest, Decision, ExecutionOutcome, RequestFilter, RequestId, RequestStatus, now_millis,
};
pub use traits::{ActionExecutor, ExecutorError, RequestStore, StoreError};
