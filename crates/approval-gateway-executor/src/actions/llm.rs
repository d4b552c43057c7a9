//! Chat completion actions for OpenAI, Anthropic and Google.
//!
//! Keys come from the [`SecretSource`](crate::SecretSource) at call time.
//! Only the model's text and model name are returned.

use std::{fmt, str::FromStr};

use approval_gateway_core::ExecutorError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{backend_error, http_error, read_json, str_param};
use crate::registry::{ActionContext, ActionHandler};

/// Token cap applied to every completion.
const MAX_TOKENS: u32 = 256;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Chat backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-20241022",
            Self::Google => "gemini-1.5-flash",
        }
    }

    /// Secret names tried in order.
    #[must_use]
    pub const fn secret_names(self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_KEY", "OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Google => &["GEMINI_API_KEY"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            _ => Err(ExecutorError::InvalidParams(
                "Invalid provider. Use one of: openai, anthropic, google".to_string(),
            )),
        }
    }
}

/// Text reply from a chat backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub model: Option<String>,
}

// -- Provider response shapes (only the fields we read) --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleResponse {
    candidates: Vec<GoogleCandidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleContent {
    parts: Vec<GooglePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GooglePart {
    text: Option<String>,
}

/// Send one user prompt to `provider`.
///
/// # Errors
/// Returns error on empty prompt, missing key, transport failure or a
/// non-success backend response.
pub async fn chat(
    provider: Provider,
    prompt: &str,
    model: Option<&str>,
    ctx: &ActionContext,
) -> Result<ChatReply, ExecutorError> {
    if prompt.trim().is_empty() {
        return Err(ExecutorError::InvalidParams("Missing or empty prompt".to_string()));
    }

    let names = provider.secret_names();
    let api_key = ctx
        .secrets
        .first_of(names)
        .ok_or_else(|| ExecutorError::MissingSecret(names.join(" or ")))?;
    let model = model.unwrap_or_else(|| provider.default_model());

    let request = match provider {
        Provider::OpenAi => ctx
            .http
            .post(format!("{}/v1/chat/completions", ctx.endpoints.openai))
            .bearer_auth(&api_key)
            .json(&json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": MAX_TOKENS,
            })),
        Provider::Anthropic => ctx
            .http
            .post(format!("{}/v1/messages", ctx.endpoints.anthropic))
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "messages": [{ "role": "user", "content": prompt }],
            })),
        Provider::Google => ctx
            .http
            .post(format!(
                "{}/v1beta/models/{model}:generateContent",
                ctx.endpoints.google
            ))
            .query(&[("key", api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": { "maxOutputTokens": MAX_TOKENS },
            })),
    };

    tracing::debug!(provider = %provider, model, "Sending chat request");
    let res = request.send().await.map_err(|e| http_error(&e))?;
    let status = res.status();
    let body = read_json(res).await;
    if !status.is_success() {
        return Err(backend_error(status, &body));
    }

    Ok(parse_reply(provider, model, body))
}

fn parse_reply(provider: Provider, model: &str, body: Value) -> ChatReply {
    match provider {
        Provider::OpenAi => {
            let parsed: OpenAiResponse = serde_json::from_value(body).unwrap_or_default();
            ChatReply {
                text: parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message)
                    .and_then(|m| m.content)
                    .unwrap_or_default(),
                model: parsed.model,
            }
        }
        Provider::Anthropic => {
            let parsed: AnthropicResponse = serde_json::from_value(body).unwrap_or_default();
            ChatReply {
                text: parsed
                    .content
                    .into_iter()
                    .find(|b| b.kind.as_deref() == Some("text"))
                    .and_then(|b| b.text)
                    .unwrap_or_default(),
                model: parsed.model,
            }
        }
        Provider::Google => {
            let parsed: GoogleResponse = serde_json::from_value(body).unwrap_or_default();
            ChatReply {
                text: parsed
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.content)
                    .and_then(|c| c.parts.into_iter().next())
                    .and_then(|p| p.text)
                    .unwrap_or_default(),
                model: Some(model.to_string()),
            }
        }
    }
}

/// `openai_chat`: `{prompt, model?}` -> `{text, model}`.
#[derive(Debug, Default, Clone)]
pub struct OpenAiChat;

#[async_trait]
impl ActionHandler for OpenAiChat {
    fn name(&self) -> &'static str {
        "openai_chat"
    }

    async fn run(&self, params: &Value, ctx: &ActionContext) -> Result<Value, ExecutorError> {
        let prompt = str_param(params, "prompt").unwrap_or_default();
        let reply = chat(Provider::OpenAi, prompt, str_param(params, "model"), ctx).await?;
        Ok(json!({ "text": reply.text, "model": reply.model }))
    }
}

/// `llm_chat`: `{provider, prompt, model?}` -> `{text, model, provider}`.
#[derive(Debug, Default, Clone)]
pub struct LlmChat;

#[async_trait]
impl ActionHandler for LlmChat {
    fn name(&self) -> &'static str {
        "llm_chat"
    }

    async fn run(&self, params: &Value, ctx: &ActionContext) -> Result<Value, ExecutorError> {
        let prompt = str_param(params, "prompt").unwrap_or_default();
        if prompt.is_empty() {
            return Err(ExecutorError::InvalidParams("Missing or empty prompt".to_string()));
        }
        let provider: Provider = str_param(params, "provider").unwrap_or_default().parse()?;

        let reply = chat(provider, prompt, str_param(params, "model"), ctx).await?;
        Ok(json!({ "text": reply.text, "model": reply.model, "provider": provider.as_str() }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{Endpoints, StaticSecrets};

    fn ctx(server: &MockServer, secrets: StaticSecrets) -> ActionContext {
        ActionContext::new(Arc::new(secrets), Endpoints::all(&server.uri()))
    }

    #[tokio::test]
    async fn test_openai_chat_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 256})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o-mini-2024",
                "choices": [{"message": {"role": "assistant", "content": "Hello there."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ctx(&server, StaticSecrets::new().with("OPENAI_API_KEY", "sk-test"));
        let out = OpenAiChat.run(&json!({"prompt": "Say hello"}), &ctx).await.unwrap();
        assert_eq!(out, json!({"text": "Hello there.", "model": "gpt-4o-mini-2024"}));
    }

    #[tokio::test]
    async fn test_openai_error_message_from_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
            )
            .mount(&server)
            .await;

        let ctx = ctx(&server, StaticSecrets::new().with("OPENAI_KEY", "bad"));
        let err = OpenAiChat.run(&json!({"prompt": "hi"}), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Incorrect API key provided");
    }

    #[tokio::test]
    async fn test_missing_secret_and_empty_prompt() {
        let server = MockServer::start().await;
        let ctx = ctx(&server, StaticSecrets::new());

        let err = OpenAiChat.run(&json!({"prompt": "hi"}), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "OPENAI_KEY or OPENAI_API_KEY not found in vault");

        let err = OpenAiChat.run(&json!({"prompt": "  "}), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing or empty prompt");
    }

    #[tokio::test]
    async fn test_llm_chat_anthropic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "claude-3-5-haiku-20241022",
                "content": [{"type": "text", "text": "Hi!"}]
            })))
            .mount(&server)
            .await;

        let ctx = ctx(&server, StaticSecrets::new().with("ANTHROPIC_API_KEY", "ak-test"));
        let out = LlmChat
            .run(&json!({"provider": "Anthropic", "prompt": "hello"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["text"], "Hi!");
        assert_eq!(out["provider"], "anthropic");
    }

    #[tokio::test]
    async fn test_llm_chat_google() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "g-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Bonjour"}]}}]
            })))
            .mount(&server)
            .await;

        let ctx = ctx(&server, StaticSecrets::new().with("GEMINI_API_KEY", "g-test"));
        let out = LlmChat
            .run(&json!({"provider": "google", "prompt": "hello"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({"text": "Bonjour", "model": "gemini-1.5-flash", "provider": "google"})
        );
    }

    #[tokio::test]
    async fn test_llm_chat_rejects_unknown_provider() {
        let server = MockServer::start().await;
        let ctx = ctx(&server, StaticSecrets::new());
        let err = LlmChat
            .run(&json!({"provider": "acme", "prompt": "hello"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid provider"));
    }
}
