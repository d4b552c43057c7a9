//! Demo actions that need no secret.

use approval_gateway_core::ExecutorError;
use async_trait::async_trait;
use serde_json::{Value, json};

use super::str_param;
use crate::registry::{ActionContext, ActionHandler};

/// Greets `params.message` (default "World") and echoes the params.
#[derive(Debug, Default, Clone)]
pub struct HelloWorld;

#[async_trait]
impl ActionHandler for HelloWorld {
    fn name(&self) -> &'static str {
        "hello_world"
    }

    async fn run(&self, params: &Value, _ctx: &ActionContext) -> Result<Value, ExecutorError> {
        let message = str_param(params, "message").unwrap_or("World");
        Ok(json!({
            "message": format!("Hello, {message}!"),
            "echoed": params,
            "note": "Gateway executed this; no vault secret was used.",
        }))
    }
}

/// Returns the params unchanged.
#[derive(Debug, Default, Clone)]
pub struct Echo;

#[async_trait]
impl ActionHandler for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn run(&self, params: &Value, _ctx: &ActionContext) -> Result<Value, ExecutorError> {
        Ok(params.clone())
    }
}
