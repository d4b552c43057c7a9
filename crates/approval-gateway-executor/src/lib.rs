//! Action execution for the approval gateway.
//!
//! Provides:
//! - `ActionRegistry` - Dispatches approved actions to their handlers
//! - `ActionHandler` trait for custom actions
//! - `SecretSource` seam to the external vault
//! - Built-in actions (demo, LLM chat, GitHub issues)

pub mod actions;
pub mod registry;
pub mod secrets;

pub use registry::{ActionContext, ActionHandler, ActionRegistry, Endpoints};
pub use secrets::{EnvSecrets, SecretSource, StaticSecrets};
