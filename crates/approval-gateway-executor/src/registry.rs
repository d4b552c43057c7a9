//! Action registry: maps action names to handlers.

use std::{sync::Arc, time::Duration};

use approval_gateway_core::{ActionExecutor, ExecutorError};
use async_trait::async_trait;
use serde_json::Value;

use crate::{
    actions,
    secrets::{EnvSecrets, SecretSource},
};

/// Default HTTP timeout for backend calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Backend base URLs (overridable for testing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub openai: String,
    pub anthropic: String,
    pub google: String,
    pub github: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openai: "https://api.openai.com".to_string(),
            anthropic: "https://api.anthropic.com".to_string(),
            google: "https://generativelanguage.googleapis.com".to_string(),
            github: "https://api.github.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every backend at one base URL.
    #[must_use]
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            openai: base.clone(),
            anthropic: base.clone(),
            google: base.clone(),
            github: base,
        }
    }
}

/// Shared resources handed to every handler.
#[derive(Clone)]
pub struct ActionContext {
    pub http: reqwest::Client,
    pub secrets: Arc<dyn SecretSource>,
    pub endpoints: Endpoints,
}

impl ActionContext {
    /// Create a context with the default HTTP client.
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretSource>, endpoints: Endpoints) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("approval-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            http,
            secrets,
            endpoints,
        }
    }
}

impl Default for ActionContext {
    fn default() -> Self {
        Self::new(Arc::new(EnvSecrets), Endpoints::default())
    }
}

/// Trait for a single action kind.
///
/// Implement this to add actions to the gateway. Handlers own parameter
/// validation; errors are captured on the request, not propagated.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Action name used in submissions.
    fn name(&self) -> &'static str;

    /// Perform the backend call.
    async fn run(&self, params: &Value, ctx: &ActionContext) -> Result<Value, ExecutorError>;
}

/// Registry dispatching actions to handlers, in registration order.
pub struct ActionRegistry {
    handlers: Vec<Arc<dyn ActionHandler>>,
    ctx: ActionContext,
}

impl ActionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new(ctx: ActionContext) -> Self {
        Self {
            handlers: Vec::new(),
            ctx,
        }
    }

    /// Registry with every built-in action.
    #[must_use]
    pub fn with_builtins(ctx: ActionContext) -> Self {
        let mut registry = Self::new(ctx);
        for handler in actions::builtins() {
            registry.register(handler);
        }
        registry
    }

    /// Add a handler, replacing any handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) -> &mut Self {
        self.handlers.retain(|h| h.name() != handler.name());
        self.handlers.push(handler);
        self
    }

    fn handler(&self, action: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.iter().find(|h| h.name() == action)
    }
}

#[async_trait]
impl ActionExecutor for ActionRegistry {
    fn actions(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    fn supports(&self, action: &str) -> bool {
        self.handler(action).is_some()
    }

    async fn execute(&self, action: &str, params: &Value) -> Result<Value, ExecutorError> {
        let handler = self
            .handler(action)
            .ok_or_else(|| ExecutorError::UnsupportedAction(action.to_string()))?;

        tracing::debug!(action, "Dispatching action");
        handler.run(params, &self.ctx).await
    }
}
