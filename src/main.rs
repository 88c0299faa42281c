//! smart-collector
//!
//! Collects S.M.A.R.T. data for every local storage device, or for a single
//! device, and prints it as JSON on stdout.
//!
//! ```text
//! smart-collector                         # all devices, decoded
//! smart-collector --raw                   # all devices, smartctl payloads
//! smart-collector --device /dev/sda       # one device health summary
//! smart-collector --device /dev/bus/0 --raid-type megaraid,3
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smart_collector::{CollectorConfig, FetchMode, SmartCollector};

// =============================================================================
// CLI Arguments
// =============================================================================

/// smart-collector - S.M.A.R.T. data collection through smartctl
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "SMART_COLLECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the smartctl binary
    #[arg(long, env = "SMARTCTL_PATH")]
    smartctl_path: Option<PathBuf>,

    /// Timeout for a single smartctl invocation in seconds
    #[arg(long, env = "SMARTCTL_TIMEOUT_SECONDS")]
    timeout_secs: Option<u64>,

    /// Concurrent workers per fetch phase
    #[arg(long, env = "SMART_COLLECTOR_WORKERS")]
    workers: Option<usize>,

    /// Run smartctl through sudo
    #[arg(long, env = "SMARTCTL_SUDO")]
    sudo: bool,

    /// Print smartctl payloads instead of decoded reports
    #[arg(long)]
    raw: bool,

    /// Fetch a single device instead of running discovery
    #[arg(long)]
    device: Option<String>,

    /// smartctl -d type for --device (e.g., sat, megaraid,0)
    #[arg(long, requires = "device")]
    raid_type: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    info!("Starting smart-collector");
    info!("  smartctl: {}", config.smartctl_path.display());
    info!("  Workers: {}", config.worker_count());
    info!("  Timeout: {:?}", config.timeout);

    let collector =
        SmartCollector::from_config(&config).context("invalid collector configuration")?;

    let output = match &args.device {
        Some(device) => {
            let report = collector
                .device(device, args.raid_type.as_deref())
                .await
                .with_context(|| format!("failed to fetch SMART data for {}", device))?;
            serde_json::to_string_pretty(&report.health())?
        }
        None => {
            let mode = if args.raw { FetchMode::Raw } else { FetchMode::Structured };
            let reports = collector
                .collect(mode)
                .await
                .context("SMART collection failed")?;
            serde_json::to_string_pretty(&reports)?
        }
    };

    println!("{}", output);
    Ok(())
}

/// Load the config file, if any, then apply command-line overrides.
fn load_config(args: &Args) -> Result<CollectorConfig> {
    let mut config = match &args.config {
        Some(path) => CollectorConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => CollectorConfig::default(),
    };

    if let Some(path) = &args.smartctl_path {
        config.smartctl_path = path.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.sudo {
        config.use_sudo = true;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries the JSON result, so logs go to stderr.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
