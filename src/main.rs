//! CLI entry point for the GTFS-RT feed monitor.
//!
//! Loads the feed list, then polls every feed on its own timer and writes
//! one InfluxDB point per poll until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gtfs_rt_monitor::{
    config::AppConfig,
    fetch::BasicClient,
    pipeline::FeedPipeline,
    scheduler::FeedJobScheduler,
    writer::InfluxWriter,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_monitor")]
#[command(about = "Collect metrics from GTFS-rt feeds and log to InfluxDB", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config_file: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Warning)]
    log: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
    #[value(name = "CRITICAL")]
    Critical,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_rt_monitor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_monitor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from(cli.log).into())
                .from_env_lossy(),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::builder()
                .with_env_var("RUST_LOG_JSON")
                .with_default_directive(LevelFilter::DEBUG.into())
                .from_env_lossy(),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let config = AppConfig::load(&cli.config_file)?;
    info!(
        interval_secs = config.interval.as_secs(),
        feeds = config.jobs.len(),
        influxdb_host = %config.influxdb.host,
        "Configuration loaded"
    );

    let writer = InfluxWriter::new(&config.influxdb).context("invalid influxdb settings")?;
    info!(write_url = %writer.write_url(), "Writing points to InfluxDB");
    let pipeline = FeedPipeline::new(
        Arc::new(BasicClient::new().context("failed to build HTTP client")?),
        Arc::new(writer),
    );
    let scheduler = FeedJobScheduler::new(Arc::new(pipeline));

    scheduler.run_until(config.jobs, shutdown_signal()).await;

    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed the monitor keeps
/// running and must be killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
