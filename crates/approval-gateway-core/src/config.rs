//! Gateway runtime configuration.

use std::{net::SocketAddr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::DEFAULT_HISTORY;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Gateway configuration.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Externally reachable base URL, used in approval links.
    pub public_url: String,
    /// Upper bound on a single backend call, in seconds.
    pub executor_timeout_secs: u64,
    /// Audit entries retained in memory.
    pub audit_history: usize,
    /// Optional allow-list narrowing the registered actions.
    pub allowed_actions: Option<Vec<String>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            public_url: "http://localhost:3000".to_string(),
            executor_timeout_secs: 60,
            audit_history: DEFAULT_HISTORY,
            allowed_actions: None,
        }
    }
}

impl GatewayConfig {
    /// Load a config from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the gateway cannot run with.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "executor_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn executor_timeout(&self) -> Duration {
        Duration::from_secs(self.executor_timeout_secs)
    }

    /// URL of the approvals page.
    #[must_use]
    pub fn approvals_url(&self) -> String {
        format!("{}/approvals", self.public_url.trim_end_matches('/'))
    }
}
