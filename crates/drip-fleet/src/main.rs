//! # Drip Fleet CLI
//!
//! Runs a fleet of simulated APM agents until interrupted, then prints a
//! summary of the run.
//!
//! ## Usage
//!
//! ```bash
//! drip-fleet --key $LICENSE_KEY --count 50 --heap "8 GB"
//! ```

use anyhow::Context;
use clap::Parser;
use drip_fleet::config::DEFAULT_API_ROOT;
use drip_fleet::{FleetConfig, FleetRunner, HeapSize};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "drip-fleet")]
#[command(version)]
#[command(about = "Simulated APM agent fleet for ingestion load testing", long_about = None)]
struct Cli {
    /// License key
    #[arg(short, long, env = "DRIP_LICENSE_KEY", hide_env_values = true)]
    key: String,

    /// Number of agents
    #[arg(short, long, default_value = "1")]
    count: usize,

    /// Index of the first agent
    #[arg(short, long, default_value = "1")]
    start: u64,

    /// Heap size to report
    #[arg(long, default_value = "512 GB")]
    heap: String,

    /// Dump HTTP traffic
    #[arg(short, long)]
    debug: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// API root every request path is appended to
    #[arg(long, default_value = DEFAULT_API_ROOT)]
    api_root: String,

    /// Seconds between metric reports
    #[arg(long, default_value = "60")]
    interval_secs: u64,

    /// Request timeout in seconds
    #[arg(long, default_value = "60")]
    timeout_secs: u64,

    /// Upper bound of the delay between agent launches, in milliseconds
    #[arg(long, default_value = "100")]
    max_jitter_ms: u64,

    /// Application name prefix
    #[arg(long, default_value = "guava")]
    app_prefix: String,

    /// Write the run summary as JSON to this file on shutdown
    #[arg(short, long)]
    output: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<FleetConfig> {
        let heap: HeapSize = self
            .heap
            .parse()
            .with_context(|| format!("--heap {:?}", self.heap))?;

        Ok(FleetConfig {
            license_key: self.key,
            api_root: self.api_root,
            fleet_size: self.count,
            start_index: self.start,
            heap,
            debug: self.debug,
            report_interval_secs: self.interval_secs,
            request_timeout_secs: self.timeout_secs,
            max_jitter_ms: self.max_jitter_ms,
            app_prefix: self.app_prefix,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let output = cli.output.clone();
    let config = cli.into_config()?;

    info!("Drip Fleet v{}", env!("CARGO_PKG_VERSION"));

    let runner = FleetRunner::new(config).context("Invalid configuration")?;
    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, stopping sessions");
                cancel.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        }
    });

    let report = runner.run().await;
    report.summary.print_report();

    for session in report.sessions.iter().filter(|s| s.failed()) {
        warn!(
            "{} failed: {}",
            session.app_name,
            session.error.as_deref().unwrap_or("unknown")
        );
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path))?;
        info!("Results saved to {}", path);
    }

    Ok(())
}
