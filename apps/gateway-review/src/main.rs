//! Command-line reviewer: list pending requests and decide them.
//!
//! Run with: cargo run -p gateway-review -- list

use anyhow::Context;
use approval_gateway_core::RequestStatus;
use approval_gateway_transport::{
    DEFAULT_GATEWAY_URL, DecisionResponse, GatewayApi, HttpGatewayApi, ListQuery, RequestRecord,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gateway-review", version, about = "Review requests held by the approval gateway")]
struct Cli {
    /// Gateway base URL
    #[arg(long, global = true, env = "GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    url: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List pending requests
    List {
        /// Include decided requests
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Approve a request and run its action
    Approve { id: String },

    /// Deny a request
    Deny {
        id: String,

        /// Reason shown to the requester
        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let api = HttpGatewayApi::new(&cli.url);

    match cli.cmd {
        Command::List { all } => {
            let query = ListQuery {
                status: (!all).then_some(RequestStatus::Pending),
                id: None,
            };
            let requests = api
                .list(&query)
                .await
                .with_context(|| format!("Failed to list requests from {}", api.base_url()))?;
            if requests.is_empty() {
                println!("No requests.");
            }
            for request in &requests {
                println!("{}", summary(request));
            }
        }
        Command::Approve { id } => {
            let decided = api.decide(&id, true, None).await?;
            println!("{}", outcome(&decided));
        }
        Command::Deny { id, reason } => {
            let decided = api.decide(&id, false, reason).await?;
            println!("{}", outcome(&decided));
        }
    }

    Ok(())
}

fn summary(request: &RequestRecord) -> String {
    format!(
        "{}  {:<8}  {}  {}",
        request.id, request.status, request.action, request.params
    )
}

fn outcome(decided: &DecisionResponse) -> String {
    match (&decided.result, &decided.error) {
        (_, Some(error)) => format!("{} {}: {error}", decided.request_id, decided.status),
        (Some(result), None) => format!("{} {}: {result}", decided.request_id, decided.status),
        (None, None) => format!("{} {}", decided.request_id, decided.status),
    }
}
