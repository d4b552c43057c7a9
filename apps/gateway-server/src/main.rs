//! Approval gateway server.
//!
//! Run with: cargo run -p gateway-server
//!
//! Then open http://localhost:3000/approvals in your browser.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use approval_gateway_core::GatewayConfig;
use approval_gateway_executor::{ActionContext, ActionRegistry};
use approval_gateway_store::{Gateway, MemoryStore};
use axum::{
    Router,
    response::{Html, Redirect},
    routing::get,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gateway-server", version, about = "Human-in-the-loop approval gateway")]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "GATEWAY_ADDR")]
    addr: Option<SocketAddr>,

    /// Externally reachable base URL, used in approval links
    #[arg(long, env = "GATEWAY_URL")]
    public_url: Option<String>,

    /// Upper bound on a single backend call
    #[arg(long, env = "GATEWAY_TIMEOUT_SECS")]
    executor_timeout_secs: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => GatewayConfig::default(),
        };
        if let Some(addr) = self.addr {
            config.bind_addr = addr;
        }
        if let Some(url) = self.public_url {
            config.public_url = url;
        }
        if let Some(secs) = self.executor_timeout_secs {
            config.executor_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Args::parse().into_config()?;

    let executor = ActionRegistry::with_builtins(ActionContext::default());
    let gateway = Gateway::new(Arc::new(MemoryStore::new()), Arc::new(executor), &config);
    tracing::info!(actions = ?gateway.supported_actions(), "Registered actions");

    let app = Router::new()
        .route("/", get(|| async { Redirect::temporary("/approvals") }))
        .route("/approvals", get(approvals_handler))
        .merge(approval_gateway_transport::router(gateway))
        .layer(
            approval_gateway_transport::cors_layer(&config.public_url)
                .with_context(|| format!("Invalid public URL {}", config.public_url))?,
        );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Server listening on http://{}", config.bind_addr);
    tracing::info!("Approvals page: {}", config.approvals_url());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn approvals_handler() -> Html<&'static str> {
    Html(APPROVALS_HTML)
}

const APPROVALS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Approval Gateway - Pending Requests</title>
    <meta charset="utf-8" />
    <style>
        body { font-family: system-ui, sans-serif; margin: 2rem; background: #f7f7f8; color: #1f2328; }
        h1 { font-size: 1.4rem; }
        .card { background: #fff; border: 1px solid #d0d7de; border-radius: 8px; padding: 1rem; margin-bottom: 1rem; }
        .meta { color: #57606a; font-size: 0.85rem; }
        pre { background: #f6f8fa; padding: 0.5rem; border-radius: 4px; overflow-x: auto; }
        button { margin-right: 0.5rem; padding: 0.4rem 1rem; border-radius: 4px; border: 1px solid #d0d7de; cursor: pointer; }
        .approve { background: #1f883d; color: #fff; }
        .deny { background: #cf222e; color: #fff; }
        #status { margin-bottom: 1rem; color: #57606a; }
        #empty { color: #57606a; }
    </style>
</head>
<body>
    <h1>Pending requests</h1>
    <div id="status"></div>
    <div id="list"></div>
    <script>
        const list = document.getElementById('list');
        const status = document.getElementById('status');

        function card(req) {
            const el = document.createElement('div');
            el.className = 'card';

            const title = document.createElement('strong');
            title.textContent = req.action;
            const meta = document.createElement('div');
            meta.className = 'meta';
            meta.textContent = req.id + ' - ' + new Date(req.createdAt).toLocaleString();
            const params = document.createElement('pre');
            params.textContent = JSON.stringify(req.params, null, 2);

            const approve = document.createElement('button');
            approve.className = 'approve';
            approve.textContent = 'Approve';
            approve.onclick = () => decide(req.id, true);

            const deny = document.createElement('button');
            deny.className = 'deny';
            deny.textContent = 'Deny';
            deny.onclick = () => {
                const reason = prompt('Reason (optional)') || undefined;
                decide(req.id, false, reason);
            };

            el.append(title, meta, params, approve, deny);
            return el;
        }

        async function refresh() {
            try {
                const res = await fetch('/api/requests?status=pending');
                const body = await res.json();
                list.replaceChildren();
                if (!body.requests.length) {
                    const empty = document.createElement('p');
                    empty.id = 'empty';
                    empty.textContent = 'Nothing waiting for approval.';
                    list.append(empty);
                    return;
                }
                body.requests.forEach(req => list.append(card(req)));
            } catch (e) {
                status.textContent = 'Failed to load requests: ' + e;
            }
        }

        async function decide(requestId, approved, reason) {
            status.textContent = approved ? 'Executing...' : 'Denying...';
            const res = await fetch('/api/approve', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ requestId, approved, reason }),
            });
            const body = await res.json();
            if (!body.ok) {
                status.textContent = body.error + ': ' + body.message;
            } else if (body.error) {
                status.textContent = 'Request ' + body.status + ': ' + body.error;
            } else {
                status.textContent = 'Request ' + body.status + '.';
            }
            refresh();
        }

        refresh();
        setInterval(refresh, 2000);
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = Args::parse_from(["gateway-server", "--public-url", "https://gw.example.com"])
            .into_config()
            .unwrap();
        assert_eq!(config.approvals_url(), "https://gw.example.com/approvals");
        assert_eq!(config.executor_timeout_secs, 60);
    }

    #[test]
    fn test_zero_timeout_flag_is_rejected() {
        let err = Args::parse_from(["gateway-server", "--executor-timeout-secs", "0"])
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("executor_timeout_secs"));
    }
}
