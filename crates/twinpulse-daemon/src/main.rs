//! twinpulse replay daemon entry point.
//!
//! Loads monitor configuration, replays a recorded edge trace through the
//! pulse state machines, and prints periodic rotation reports.

mod replay;
mod trace;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use twinpulse_common::config::DaemonConfig;

use crate::replay::{Replayer, Report};
use crate::trace::TraceReader;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One human-readable line per monitor.
    Text,
    /// One JSON object per report.
    Json,
}

/// twinpulse daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "twinpulse",
    about = "Replay dual-channel edge traces and report rotation direction and rate",
    version,
    long_about = None
)]
struct Args {
    /// Edge trace to replay (`-` for stdin).
    #[arg(value_name = "TRACE", default_value = "-")]
    trace: PathBuf,

    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Trace time between reports, e.g. "500ms" (overrides config file).
    #[arg(long, short = 'i', value_parser = humantime::parse_duration)]
    report_interval: Option<Duration>,

    /// Keep accumulating between reports instead of resetting.
    #[arg(long)]
    no_reset: bool,

    /// Report output format.
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting twinpulse replay");

    let mut config = load_config(&args)?;
    if let Some(interval) = args.report_interval {
        config.report_interval = interval;
    }
    if args.no_reset {
        config.reset_on_report = false;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        report_interval = %humantime::format_duration(config.report_interval),
        reset_on_report = config.reset_on_report,
        monitors = config.monitors.len(),
        "Configuration loaded"
    );

    let input = open_trace(&args.trace)?;
    let stdout = io::stdout();
    run_replay(&config, input, &mut stdout.lock(), args.format)
}

/// Initialize logging with the specified log level.
///
/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(level: &str) {
    let filter = format!(
        "twinpulse={level},twinpulse_daemon={level},twinpulse_core={level},twinpulse_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `TWINPULSE_CONFIG` environment variable
/// 3. `config/default.toml` (local development)
/// 4. Built-in defaults
fn load_config(args: &Args) -> Result<DaemonConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return DaemonConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("TWINPULSE_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from TWINPULSE_CONFIG");
            return DaemonConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from TWINPULSE_CONFIG={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "TWINPULSE_CONFIG set but file does not exist, checking other locations"
        );
    }

    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return DaemonConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {local_path:?}"));
    }

    info!("No config file found, using built-in defaults");
    Ok(DaemonConfig::default())
}

/// Open the trace file, or stdin for `-`.
fn open_trace(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        info!("Reading trace from stdin");
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open trace {path:?}"))?;
    info!(?path, "Reading trace file");
    Ok(Box::new(BufReader::new(file)))
}

/// Replay every trace event and write the reports.
fn run_replay(
    config: &DaemonConfig,
    input: impl BufRead,
    out: &mut impl Write,
    format: OutputFormat,
) -> Result<()> {
    let mut replayer = Replayer::new(config).context("Failed to register monitors")?;

    for event in TraceReader::new(input) {
        let event = event.context("Failed to read trace")?;
        if let Some(report) = replayer.feed(&event) {
            write_report(out, &report, format)?;
        }
    }

    let report = replayer.finish();
    write_report(out, &report, format)?;
    out.flush().context("Failed to flush output")?;

    let summary = replayer.summary();
    info!(
        events = summary.events,
        skipped = summary.skipped,
        reports = summary.reports,
        "Replay complete"
    );
    Ok(())
}

fn write_report(out: &mut impl Write, report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{report}"),
        OutputFormat::Json => {
            let json = serde_json::to_string(report).context("Failed to encode report")?;
            writeln!(out, "{json}")
        }
    }
    .context("Failed to write report")
}
