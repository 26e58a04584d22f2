use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use fellowship_feed::{AppState, InMemoryContentStore, ServerConfig, build_router};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fellowship-feed")]
#[command(about = "Serves the fellowship content API from a seeded in-memory store")]
struct Cli {
    /// Overrides APP_HOST
    #[arg(long)]
    host: Option<String>,
    /// Overrides APP_PORT
    #[arg(long)]
    port: Option<u16>,
    /// Accept a bearer token, as `token=user`; repeatable
    #[arg(long = "session", value_name = "TOKEN=USER")]
    sessions: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env().context("failed to load server configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let store = InMemoryContentStore::with_fixtures().await;
    for entry in &cli.sessions {
        let Some((token, user)) = entry.split_once('=') else {
            bail!("--session expects TOKEN=USER, got '{entry}'");
        };
        store.register_session(token.trim(), user.trim()).await;
    }
    info!(sessions = cli.sessions.len(), "content store seeded");

    let app = build_router(AppState::new(Arc::new(store), config.feed.page_size));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "fellowship feed started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fellowship_feed=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
