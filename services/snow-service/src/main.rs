//! Snow depth service
//!
//! Loads the land mask once, rebuilds the coastal snow field on a timer and
//! serves point queries over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use snow_processor::{CoastMap, SnowDepthService};
use snow_service::{start_server, RefreshOutcome, RefreshPipeline, ServerState, ServiceConfig};

/// Snow depth service
#[derive(Parser, Debug)]
#[command(name = "snow-service")]
#[command(about = "Coastal snow depth correction and query server")]
struct Args {
    /// YAML configuration file; environment variables are used when absent
    #[arg(short, long, env = "SNOW_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Build the field once and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_yaml_file(path)?,
        None => ServiceConfig::from_env()?,
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;

    info!(
        raster = %config.raster_path.display(),
        samples = %config.samples_path,
        port = config.port,
        "Starting snow-service"
    );

    let coast = match CoastMap::load(&config.raster_path, &config.processor.raster) {
        Ok(coast) => Arc::new(coast),
        Err(e) => {
            error!(error = %e, code = e.code(), "Failed to load land mask");
            std::process::exit(1);
        }
    };

    let service = Arc::new(SnowDepthService::new(coast, &config.processor)?);
    let pipeline = Arc::new(RefreshPipeline::from_config(Arc::clone(&service), &config));

    if args.once {
        match pipeline.run_once().await? {
            RefreshOutcome::Published { generation, cycle } => {
                info!(generation, cycle = %cycle, "Build complete")
            }
            RefreshOutcome::Skipped => info!("Build skipped"),
        }
        return Ok(());
    }

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    let refresher = Arc::clone(&pipeline);
    tokio::spawn(async move {
        if let Err(e) = refresher.run_forever().await {
            error!(error = %e, "Refresh loop stopped");
        }
    });

    let state = Arc::new(ServerState {
        service,
        pipeline,
        metrics: Some(prometheus_handle),
    });
    start_server(state, config.port).await
}
