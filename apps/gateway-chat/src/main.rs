//! Chat client that asks the gateway to run an LLM call on its behalf.
//!
//! Run with: cargo run -p gateway-chat -- "Write a haiku about Rust"
//!
//! The request waits until someone approves it on the approvals page.

use std::{process::ExitCode, time::Duration};

use approval_gateway_transport::{
    DEFAULT_GATEWAY_URL, HttpGatewayApi, PollOptions, PollingClient, reply_to_string,
};
use clap::Parser;
use serde_json::{Map, Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gateway-chat", version, about = "Send a prompt through the approval gateway")]
struct Args {
    /// Prompt to send
    #[arg(default_value = "Say hello in one sentence.")]
    prompt: Vec<String>,

    /// Gateway base URL
    #[arg(long, env = "GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    url: String,

    /// Action to request
    #[arg(long, default_value = "openai_chat")]
    action: String,

    /// LLM provider (openai, anthropic, google); implies `--action llm_chat`
    #[arg(long)]
    provider: Option<String>,

    /// Model override
    #[arg(long)]
    model: Option<String>,

    /// Delay between status checks
    #[arg(long, env = "GATEWAY_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Give up after this many seconds; waits indefinitely when unset
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl Args {
    fn action(&self) -> &str {
        if self.provider.is_some() {
            "llm_chat"
        } else {
            &self.action
        }
    }

    fn params(&self) -> Value {
        let mut params = Map::new();
        params.insert("prompt".into(), json!(self.prompt.join(" ")));
        if let Some(provider) = &self.provider {
            params.insert("provider".into(), json!(provider));
        }
        if let Some(model) = &self.model {
            params.insert("model".into(), json!(model));
        }
        Value::Object(params)
    }

    fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();
    let api = HttpGatewayApi::new(&args.url);
    let approvals_url = api.approvals_url();
    let client = PollingClient::new(api, args.poll_options());

    let id = match client.submit(args.action(), &args.params()).await {
        Ok(id) => id,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("Request {id} created. Approve at: {approvals_url}");
    tracing::debug!(request_id = %id, "Waiting for decision");

    match client.wait_for(&id).await {
        Ok(reply) => {
            println!("Reply: {}", reply_to_string(&reply));
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["gateway-chat"]);
        assert_eq!(args.action(), "openai_chat");
        assert_eq!(args.params(), json!({"prompt": "Say hello in one sentence."}));
        assert_eq!(args.poll_options().interval, Duration::from_secs(2));
        assert_eq!(args.poll_options().timeout, None);
    }

    #[test]
    fn test_provider_switches_action() {
        let args = Args::parse_from([
            "gateway-chat",
            "--provider",
            "anthropic",
            "--timeout-secs",
            "30",
            "Write",
            "a",
            "haiku",
        ]);
        assert_eq!(args.action(), "llm_chat");
        assert_eq!(args.params(), json!({"prompt": "Write a haiku", "provider": "anthropic"}));
        assert_eq!(args.poll_options().timeout, Some(Duration::from_secs(30)));
    }
}
