//! Knob Bridge - Rust implementation
//!
//! Aggregates smart knob events into a dimmer state and reports it as
//! light commands.

use anyhow::{Context, Result};
use clap::Parser;
use knob_bridge::config::{AppConfig, ConfigWatcher};
use knob_bridge::transport::ConsoleTransport;
use knob_bridge::KnobService;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Knob Bridge - Drive a dimmer from a rotary smart knob
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Override the state lock timeout (milliseconds)
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Validate the configuration, print the effective settings and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = AppConfig::load_or_default(&args.config).await?;
    if let Some(lock_timeout_ms) = args.lock_timeout_ms {
        config.store.lock_timeout_ms = lock_timeout_ms;
        config.validate()?;
    }

    if args.check_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args.log_level, config.log.file.as_deref())?;

    info!("Starting Knob Bridge...");
    info!("Configuration file: {}", args.config.display());
    info!(
        "Knob topic: {} → dimmer topic: {} (broker {}:{})",
        config.transport.topic,
        config.transport.publish_topic,
        config.transport.broker,
        config.transport.port
    );

    let config_watcher = if args.config.exists() {
        match ConfigWatcher::new(&args.config) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Hot-reload disabled: {:#}", e);
                None
            }
        }
    } else {
        info!("No configuration file found, using defaults");
        None
    };

    let transport = ConsoleTransport::stdin(config.transport.topic.clone());
    let service = KnobService::new(&config);

    service
        .run(&transport, config_watcher, shutdown_signal())
        .await?;

    info!("Knob Bridge shutdown complete");
    Ok(())
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name.to_string_lossy().into_owned())
                .build(directory)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
