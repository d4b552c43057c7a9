//! Built-in actions.

use std::sync::Arc;

use approval_gateway_core::ExecutorError;
use serde_json::Value;

use crate::registry::ActionHandler;

pub mod demo;
pub mod github;
pub mod llm;

pub use demo::{Echo, HelloWorld};
pub use github::GithubCreateIssue;
pub use llm::{LlmChat, OpenAiChat, Provider};

/// Every built-in handler, in the order they are advertised.
#[must_use]
pub fn builtins() -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(HelloWorld),
        Arc::new(Echo),
        Arc::new(OpenAiChat),
        Arc::new(LlmChat),
        Arc::new(GithubCreateIssue),
    ]
}

/// Non-blank string parameter.
pub(crate) fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Read a JSON body, tolerating empty or malformed payloads.
pub(crate) async fn read_json(res: reqwest::Response) -> Value {
    res.json::<Value>().await.unwrap_or(Value::Null)
}

/// Error for a non-success backend response.
///
/// Prefers the backend's own message (`error.message` or `message`).
pub(crate) fn backend_error(status: reqwest::StatusCode, body: &Value) -> ExecutorError {
    let message = body
        .pointer("/error/message")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string);
    ExecutorError::Backend(message)
}

pub(crate) fn http_error(err: &reqwest::Error) -> ExecutorError {
    ExecutorError::Http(err.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_backend_error_prefers_body_message() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        let err = backend_error(status, &json!({"error": {"message": "bad key"}}));
        assert_eq!(err.to_string(), "bad key");

        let err = backend_error(status, &json!({"message": "Bad credentials"}));
        assert_eq!(err.to_string(), "Bad credentials");

        let err = backend_error(status, &Value::Null);
        assert_eq!(err.to_string(), "HTTP 401");
    }

    #[test]
    fn test_str_param_rejects_blank() {
        let params = json!({"a": "x", "b": "  ", "c": 3});
        assert_eq!(str_param(&params, "a"), Some("x"));
        assert_eq!(str_param(&params, "b"), None);
        assert_eq!(str_param(&params, "c"), None);
        assert_eq!(str_param(&params, "d"), None);
    }
}
