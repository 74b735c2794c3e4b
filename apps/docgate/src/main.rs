use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use docgate_service::build_router;
use docgate_service::config::{Config, ConfigOverrides, LogFormat};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docgate-service")]
#[command(about = "Single-endpoint gateway for the document and workspace API")]
struct Args {
    /// Overrides DOCGATE_BIND_ADDR.
    #[arg(long)]
    bind_addr: Option<SocketAddr>,
    /// Overrides DOCGATE_UPSTREAM_BASE_URL.
    #[arg(long)]
    upstream_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env_with_overrides(ConfigOverrides {
        bind_addr: args.bind_addr,
        upstream_base_url: args.upstream_base_url,
    })
    .context("failed to load docgate config")?;

    init_tracing(&config);
    if config.uploads_unrestricted() {
        warn!(
            "DOCGATE_UPLOAD_ROOT is not set; documents.upload_file can read any file this process can open"
        );
    }

    let bind_addr = config.bind_addr;
    let upstream = config.upstream_base_url.clone();
    let app = build_router(config).context("failed to build upstream client")?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(%bind_addr, upstream = %upstream, "docgate service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("docgate server failed")?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(config.log_filter.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
