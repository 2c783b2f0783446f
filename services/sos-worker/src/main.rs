//! SOS Worker
//!
//! Runs one Sensor Observation Service worker and serves a single KVP
//! request given on the command line, printing the JSON response or the
//! OWS exception report.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use sos_protocol::kvp::KvpParams;
use sos_worker::{ServiceConfiguration, ServiceManager};

/// SOS Worker
#[derive(Parser, Debug)]
#[command(name = "sos-worker")]
#[command(about = "OGC Sensor Observation Service worker")]
struct Args {
    /// Service configuration file
    #[arg(short, long, env = "SOS_CONFIG")]
    config: Option<PathBuf>,

    /// Identifier of the hosted service
    #[arg(long, default_value = "default", env = "SOS_SERVICE_ID")]
    service_id: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "SOS_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// Request parameters as key=value pairs
    #[arg(trailing_var_arg = true)]
    request: Vec<String>,
}

fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<ExitCode> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .with_writer(std::io::stderr)
        .init();

    info!(service = %args.service_id, "Starting SOS worker");

    let manager = ServiceManager::default();
    let started = match &args.config {
        Some(path) => manager.start_from_file(&args.service_id, path).await,
        None => {
            info!("No configuration file given, using in-memory defaults");
            manager
                .start(&args.service_id, Some(ServiceConfiguration::default()))
                .await
        }
    };
    if let Err(e) = &started {
        error!(error = %e, "SOS worker did not start");
    }

    let worker = manager
        .get(&args.service_id)
        .await
        .context("SOS worker was not registered")?;

    let params = KvpParams::from_args(&args.request);
    let response = match params {
        Ok(params) => worker.handle_kvp(&params).await,
        Err(e) => Err(e),
    };

    match response {
        Ok(response) => {
            let body = serde_json::to_string_pretty(&response)
                .context("Failed to serialize the response")?;
            println!("{}", body);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let report = serde_json::to_string_pretty(&e.to_exception_report())
                .context("Failed to serialize the exception report")?;
            println!("{}", report);
            Ok(ExitCode::FAILURE)
        }
    }
}
