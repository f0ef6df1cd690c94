//! vitalsd - Telemetry agent daemon.
//!
//! Runs one collection loop per process: either the host resource
//! sampler or the stock quote sampler, selected by subcommand. Samples
//! are POSTed to the central collector; the loop honors a remote stop
//! command polled from a status endpoint and Ctrl-C.

mod collector;
mod sampler;
mod uplink;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use collector::CollectorLoop;
use sampler::{ResourceSampler, StockSampler};
use uplink::HttpUplink;

/// Telemetry agent daemon.
#[derive(Parser)]
#[command(name = "vitalsd", about = "Telemetry agent daemon", version = vitals_core::VERSION)]
struct Args {
    #[command(subcommand)]
    family: Family,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(clap::Subcommand)]
enum Family {
    /// Collect host CPU/memory utilization and CPU temperature.
    System(SystemArgs),
    /// Collect stock quotes for a list of ticker symbols.
    Stock(StockArgs),
}

#[derive(clap::Args)]
struct SystemArgs {
    /// Ingestion endpoint URL.
    #[arg(
        long,
        default_value = "http://127.0.0.1:8080/metrics",
        env = "VITALS_METRICS_URL"
    )]
    ingest_url: String,

    /// Status URL polled for a remote stop command. Unset = never stop remotely.
    #[arg(long, env = "VITALS_STATUS_URL")]
    status_url: Option<String>,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "5")]
    interval: u64,
}

#[derive(clap::Args)]
struct StockArgs {
    /// Ingestion endpoint URL.
    #[arg(
        long,
        default_value = "http://127.0.0.1:8080/stock_metrics",
        env = "VITALS_STOCK_METRICS_URL"
    )]
    ingest_url: String,

    /// Status URL polled for a remote stop command. Unset = never stop remotely.
    #[arg(long, env = "VITALS_STATUS_URL")]
    status_url: Option<String>,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "300")]
    interval: u64,

    /// Comma-separated ticker symbols to poll, in order.
    #[arg(
        long,
        default_value = "AAPL,MSFT,GOOGL",
        value_delimiter = ',',
        env = "VITALS_STOCK_SYMBOLS"
    )]
    symbols: Vec<String>,

    /// Quote provider API key.
    #[arg(long, env = "VITALS_QUOTE_API_KEY")]
    api_key: String,

    /// Quote provider base URL.
    #[arg(
        long,
        default_value = "https://finnhub.io/api/v1",
        env = "VITALS_QUOTE_BASE_URL"
    )]
    quote_url: String,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("vitalsd={}", level).parse().unwrap())
        .add_directive(format!("vitals_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("vitalsd {} starting", env!("CARGO_PKG_VERSION"));

    // The running flag is the only process-shutdown channel; the loop
    // checks it between sleep slices.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    match args.family {
        Family::System(sys) => {
            info!(
                "Config: interval={}s, ingest={}, status={}",
                sys.interval,
                sys.ingest_url,
                sys.status_url.as_deref().unwrap_or("-")
            );
            let uplink = HttpUplink::new(sys.ingest_url, sys.status_url);
            let mut sampler = ResourceSampler::new();
            info!(group_key = %sampler.group_key(), "host identity derived");

            let mut collector = CollectorLoop::new(
                "system",
                uplink,
                Duration::from_secs(sys.interval),
                running,
            );
            collector.run(&mut sampler);
        }
        Family::Stock(stock) => {
            info!(
                "Config: interval={}s, ingest={}, symbols={}",
                stock.interval,
                stock.ingest_url,
                stock.symbols.join(",")
            );
            let uplink = HttpUplink::new(stock.ingest_url, stock.status_url);
            let mut sampler = StockSampler::new(stock.quote_url, stock.api_key, stock.symbols);

            let mut collector = CollectorLoop::new(
                "stock",
                uplink,
                Duration::from_secs(stock.interval),
                running,
            );
            collector.run(&mut sampler);
        }
    }

    info!("Shutdown complete");
}
