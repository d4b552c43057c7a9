//! Request storage and the gateway service for the approval gateway.
//!
//! Provides:
//! - `Gateway` - Submission, listing and decision endpoints
//! - Storage implementations (memory)

pub mod gateway;
pub mod storage;

pub use gateway::{Gateway, GatewayError};
#[cfg(feature = "memory")]
pub use storage::MemoryStore;
