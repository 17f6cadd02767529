//! Catchment API Server
//!
//! Serves catchment choropleths, dissolves and tiles from a GeoPackage and
//! MBTiles archives loaded at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use catchment_api::config::ServiceConfig;
use catchment_api::state::AppState;

/// Catchment API Server
#[derive(Parser, Debug)]
#[command(name = "catchment-api")]
#[command(about = "Catchment scenario comparison API and tile server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "CATCHMENT_LISTEN_ADDR")]
    listen: String,

    /// Path to the service YAML configuration
    #[arg(short, long, default_value = "config/catchment-api.yaml", env = "CATCHMENT_CONFIG")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "CATCHMENT_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("failed to create Tokio runtime")?;

    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    info!(config = %args.config.display(), "Starting catchment API server");
    let config = ServiceConfig::from_yaml_file(&args.config)?;

    // Data files that fail to load are fatal
    let state = Arc::new(AppState::new(&config, Some(prometheus_handle)).await?);

    let app = catchment_api::app(state);

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("invalid listen address: {}", args.listen))?;

    info!("Catchment API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
