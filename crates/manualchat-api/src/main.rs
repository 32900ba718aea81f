use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use manualchat_api::{AppState, BackendClient, create_router};
use manualchat_core::{Config, ConnectionManager};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn try_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .common
        .config
        .map(|path| Config::expand_path(&path.to_string_lossy()))
        .unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    let connections = ConnectionManager::new(config.database.clone());
    let db = connections.database().clone();
    if db.is_configured() {
        if let Err(err) = db.migrate().await {
            warn!(error = %err, "Schema migration failed, store requests will error");
        }
    }
    connections.probe().await;

    let backend = BackendClient::new(&config.backend)?;
    info!(backend_url = backend.base_url(), "Using inference backend");

    let app = create_router(AppState { db, backend });

    let port = cli.common.port.unwrap_or(config.server.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting API server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connections.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[derive(Debug, Parser)]
#[command(author, version, about = "HTTP API server for manualchat")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port to listen on (defaults to `server.port` from config)
    #[arg(short, long)]
    port: Option<u16>,
}
