//! mw-server — MangaWatch watchlist tracking service
//!
//! Watches a user-curated list of series against an upstream metadata API
//! and pushes a notification when new chapters land. The background poller
//! and the manual refresh endpoint drive the same reconciliation engine.

use anyhow::Result;
use clap::Parser;
use mw_server::channels::build_channels;
use mw_server::poller::poll_loop;
use mw_server::upstream::MangabakaClient;
use mw_server::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mw-server", version, about = "MangaWatch tracking service")]
struct Args {
    /// Alternative TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding watchlist.json and notifications.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// HTTP listen port
    #[arg(long)]
    port: Option<u16>,

    /// Background poll interval in seconds (<= 0 disables polling)
    #[arg(long)]
    poll_interval_sec: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting MangaWatch (mw-server) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let overrides = mw_common::config::Overrides {
        config_file: args.config,
        data_dir: args.data_dir,
        port: args.port,
        poll_interval_sec: args.poll_interval_sec,
    };
    let settings = mw_common::config::load_settings(&overrides)?;
    info!("Data directory: {}", settings.data_dir.display());
    info!("Upstream API: {}", settings.upstream_base);

    let upstream = Arc::new(MangabakaClient::new(&settings.upstream_base));
    let channels = build_channels(&settings);
    for channel in &channels {
        info!(
            channel = channel.name(),
            configured = channel.configured(),
            "notification channel"
        );
    }

    let port = settings.port;
    let poll_interval_sec = settings.poll_interval_sec;
    let state = AppState::new(settings, upstream, channels);

    // Background poller; a non-positive interval makes this a no-op task
    let cancel = CancellationToken::new();
    let poller_task = tokio::spawn(poll_loop(
        Arc::clone(&state.engine),
        poll_interval_sec,
        Arc::clone(&state.poller),
        cancel.clone(),
    ));

    let app = mw_server::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("mw-server listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight pass finish, then stop the poller at its next
    // sleep boundary.
    cancel.cancel();
    let _ = poller_task.await;
    info!("mw-server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
