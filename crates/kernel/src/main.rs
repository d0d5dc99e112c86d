//! Cadence Site Kernel
//!
//! HTTP server for the marketing site and blog CMS, plus the sitemap
//! generator.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cadence_kernel::store::{ContentStore, PgContentStore};
use cadence_kernel::{AppState, Config, build_router, db, services::sitemap};

#[derive(Parser)]
#[command(name = "cadence", about = "Cadence site server and tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Write sitemap.xml and robots.txt for the published posts.
    Sitemap {
        /// Output directory.
        #[arg(long, default_value = "public")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, "Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Sitemap { out } => write_sitemap(config, out).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Cadence site");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn write_sitemap(config: Config, out: PathBuf) -> Result<()> {
    let pool = db::create_pool(&config)
        .await
        .context("failed to create database pool")?;
    let store = Arc::new(PgContentStore::new(pool));
    let posts = store.list_posts().await.context("failed to load posts")?;

    let written = sitemap::write_artifacts(&out, &config.site(), &posts).await?;
    for path in written {
        info!(path = %path.display(), "wrote");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
