//! lamco-input-sender - loopback demo of reliable input delivery
//!
//! Entry point for the demo binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamco_input_sender::config::{Config, LoggingConfig};
use lamco_input_sender::utils::{format_user_error, metric_names, MetricsCollector};

/// Command-line arguments for lamco-input-sender
#[derive(Parser, Debug)]
#[command(name = "lamco-input-sender")]
#[command(version, about = "Reliable input delivery loopback demo", long_about = None)]
pub struct Args {
    /// Configuration file path (defaults are used when absent)
    #[arg(short, long, env = "LAMCO_INPUT_CONFIG")]
    pub config: Option<String>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Response timeout in milliseconds
    #[arg(long, env = "LAMCO_INPUT_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Print the metrics as JSON instead of Prometheus text
    #[arg(long)]
    pub json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (config, load_error) = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default_config(), Some(e)),
        },
        None => (Config::default_config(), None),
    };
    let config = config.with_overrides(
        args.timeout_ms,
        args.log_format.clone(),
        args.log_file.clone(),
    );

    init_logging(&config.logging, args.verbose)?;

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-input-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    if let Some(e) = load_error {
        tracing::warn!("Failed to load config: {:#}, using defaults", e);
    }
    if let Err(e) = config.validate() {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    info!("Configuration loaded successfully");
    tracing::debug!("Config: {:?}", config);

    let metrics = Arc::new(MetricsCollector::new());
    let summary = match lamco_input_sender::loopback::run(&config, metrics.clone()) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };

    info!(
        consumed = metrics.counter_or_zero(metric_names::EVENTS_CONSUMED),
        not_consumed = metrics.counter_or_zero(metric_names::EVENTS_NOT_CONSUMED),
        timed_out = metrics.counter_or_zero(metric_names::EVENTS_FAILED_TIMED_OUT),
        surface_gone = metrics.counter_or_zero(metric_names::EVENTS_FAILED_SURFACE_GONE),
        "Delivery outcomes"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        println!("{}", metrics.export_json()?);
    } else {
        for client in &summary.clients {
            println!(
                "surface {}: received {} acknowledged {} ignored {}",
                client.surface, client.received, client.acknowledged, client.ignored
            );
        }
        print!("{}", metrics.export_prometheus());
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    use std::fs::File;

    let log_level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_input_sender={level},warn",
            level = log_level
        ))
    });

    // If log file is specified, write to both stdout and file
    if let Some(log_file_path) = &logging.log_file {
        let file = File::create(log_file_path)?;

        match logging.format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stdout),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stdout),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stdout),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path.display());
    } else {
        match logging.format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json())
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().compact())
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .init();
            }
        }
    }

    Ok(())
}
