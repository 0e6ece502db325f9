#![forbid(unsafe_code)]

//! `farm-autopilot-worker`: per-account automation worker binary.
//!
//! Reads coordinator commands from stdin, writes messages to stdout, and logs
//! diagnostics to stderr. Exits once the worker stops.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use farm_autopilot::config::WorkerConfig;
use farm_autopilot::control::reader::run_reader;
use farm_autopilot::control::writer::run_writer;
use farm_autopilot::control::ControlSender;
use farm_autopilot::game::offline::OfflineGame;
use farm_autopilot::models::session::Identity;
use farm_autopilot::worker::Worker;
use farm_autopilot::{AppError, Result};

/// Buffered inbound commands.
const COMMAND_BUFFER: usize = 64;

/// Time allowed for background tasks after the worker stops.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "farm-autopilot-worker", about = "Per-account farm automation worker", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("farm-autopilot worker bootstrap");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let outcome = runtime.block_on(run(args));
    // A pending stdin read would otherwise hold the process open.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    outcome
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => WorkerConfig::load_from_path(path)?,
        None => WorkerConfig::default(),
    };
    info!(platform = %config.platform, "configuration loaded");

    let services = OfflineGame::new(Identity {
        name: "offline".into(),
        level: 1,
        platform: config.platform.clone(),
        ..Identity::default()
    })
    .into_services();

    let (outbound, outbound_rx) = ControlSender::channel();
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let io_ct = CancellationToken::new();

    let writer_ct = io_ct.clone();
    let writer_handle = tokio::spawn(async move {
        if let Err(err) = run_writer(tokio::io::stdout(), outbound_rx, writer_ct).await {
            error!(%err, "control writer failed");
        }
    });

    let reader_ct = io_ct.clone();
    let reader_outbound = outbound.clone();
    let reader_handle = tokio::spawn(async move {
        if let Err(err) = run_reader(tokio::io::stdin(), command_tx, reader_outbound, reader_ct).await {
            error!(%err, "control reader failed");
        }
    });

    let worker = Worker::new(config, services, outbound);
    info!("worker ready");

    tokio::select! {
        () = worker.run(command_rx) => {}
        () = shutdown_signal() => {
            info!("shutdown signal received");
            worker.stop();
        }
    }

    // Writer drains whatever is already queued before exiting.
    io_ct.cancel();
    let _ = writer_handle.await;
    reader_handle.abort();
    info!("farm-autopilot worker exited");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Diagnostics go to stderr; stdout carries the control channel.
fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
