//! rfsend - Selective sensor-reading publisher
//!
//! Pulls decoded wireless sensor readings from a source, keeps per-sensor
//! change state, and pushes changed fields to a REST or InfluxDB endpoint.

use std::path::PathBuf;
use std::pin::pin;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use rfsend_core::{ChangeTracker, ConfigLoader, SenderConfig, SinkTarget};
use rfsend_export::{Publisher, PublisherOptions, TransportClient, TransportOptions};
use rfsend_source::{DemoSource, DemoSourceConfig, JsonlSource, ReadingSource};

#[derive(Parser)]
#[command(name = "rfsend")]
#[command(author)]
#[command(version)]
#[command(about = "Selective sensor-reading publisher", long_about = None)]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Sink URL to publish readings to
    #[arg(short = 's', long, global = true)]
    send_to: Option<String>,

    /// Sink type (REST, InfluxDB)
    #[arg(short = 't', long, global = true)]
    server_type: Option<String>,

    /// Publish every reading, not only changes
    #[arg(short = 'A', long, global = true)]
    all: bool,

    /// Path to the persistent log file
    #[arg(short = 'l', long, global = true)]
    log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "RFSEND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish readings from a JSON-lines stream
    Run {
        /// Input file, stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Run with generated demo readings (no receiver hardware required)
    Demo {
        /// Reading generation interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,

        /// Number of readings to generate (0 = infinite)
        #[arg(long, default_value = "0")]
        count: u64,

        /// Number of simulated sensors
        #[arg(long, default_value = "3")]
        sensors: u8,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::new().with_cli_path(cli.config.clone());
    let mut config = loader.load().context("Failed to load configuration")?;
    apply_cli_overrides(&mut config, &cli);
    loader
        .validate(&config)
        .context("Invalid configuration")?;

    init_logging(cli.verbose, &config)?;

    match cli.command {
        Commands::Run { input } => run_command(config, input).await,
        Commands::Demo {
            interval,
            count,
            sensors,
        } => demo_command(config, interval, count, sensors).await,
    }
}

/// CLI flags take precedence over file and environment values.
fn apply_cli_overrides(config: &mut SenderConfig, cli: &Cli) {
    if let Some(url) = &cli.send_to {
        config.sink.url = url.clone();
    }
    if let Some(kind) = &cli.server_type {
        config.sink.server_type = kind.clone();
    }
    if cli.all {
        config.publish.send_all = true;
    }
    if let Some(path) = &cli.log_file {
        config.logging.log_file = path.display().to_string();
    }
}

/// Setup logging - CLI verbose flag takes precedence, then config, then default.
///
/// Two layers: a compact one on stderr and a plain one into the log file,
/// which is truncated on every start.
fn init_logging(verbose: u8, config: &SenderConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose > 0 {
        match verbose {
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
        .to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let log_path = config.logging.log_file_path();
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file)),
        )
        .with(filter)
        .init();

    Ok(())
}

fn build_publisher(config: &SenderConfig, target: SinkTarget) -> anyhow::Result<Publisher> {
    let transport = TransportClient::new(
        target,
        TransportOptions {
            timeout: config.sink.timeout(),
        },
    )
    .context("Failed to build HTTP client")?;

    Ok(Publisher::new(
        transport,
        PublisherOptions {
            send_all: config.publish.send_all,
        },
        config.buffers.payload_capacity,
        config.buffers.response_capacity,
    ))
}

async fn run_command(config: SenderConfig, input: Option<PathBuf>) -> anyhow::Result<()> {
    let target = config.sink_target()?;

    println!();
    println!("  rfsend v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Sink: {} ({})", target.url, target.kind);
    match &input {
        Some(path) => println!("  Input: {}", path.display()),
        None => println!("  Input: stdin"),
    }
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    info!("Starting rfsend...");

    let publisher = build_publisher(&config, target)?;
    let source = JsonlSource::new(input);
    run_loop(source, publisher).await
}

/// Demo mode - generates fake readings to exercise the publish pipeline.
async fn demo_command(
    config: SenderConfig,
    interval: u64,
    count: u64,
    sensors: u8,
) -> anyhow::Result<()> {
    let target = config.sink_target()?;

    println!();
    println!("  rfsend v{} - DEMO MODE", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Sink: {} ({})", target.url, target.kind);
    println!("  Generating readings every {}ms", interval);
    if count > 0 {
        println!("  Will generate {} readings total", count);
    } else {
        println!("  Generating readings indefinitely");
    }
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    info!("Starting rfsend in demo mode...");

    let publisher = build_publisher(&config, target)?;
    let source = DemoSource::with_config(DemoSourceConfig {
        interval_ms: interval,
        count,
        sensors,
        ..Default::default()
    });
    run_loop(source, publisher).await
}

/// Pull readings until the source ends or Ctrl+C arrives, publishing each
/// through the change gate. The baseline only advances after a publish the
/// sink acknowledged, so a failed delta is carried into the next attempt.
async fn run_loop<S: ReadingSource>(mut source: S, mut publisher: Publisher) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel(16);
    source.start(tx).await?;
    info!(source = source.name(), "Reading source started");

    let mut tracker = ChangeTracker::new();
    let mut received = 0u64;
    let mut undecoded = 0u64;
    let mut shutdown = pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(reading) = maybe else {
                    info!("Reading source ended");
                    break;
                };
                received += 1;
                trace!(?reading, "reading received");

                if reading.decode_status != 0 {
                    undecoded += 1;
                    warn!(
                        sensor = %reading.key(),
                        "skipping reading with decode status {:04x}",
                        reading.decode_status
                    );
                    continue;
                }

                let mask = tracker.update(&reading);
                let sent = publisher.publish(&reading, mask).await;
                if sent && publisher.last_outcome().is_some_and(|o| o.success) {
                    tracker.acknowledge(&reading);
                }
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    source.stop().await;

    let stats = publisher.stats();
    println!();
    println!("  Readings received    {:>8}", received);
    println!("  Published            {:>8}", stats.published);
    println!("  Publish failures     {:>8}", stats.failed);
    println!("  Skipped undecoded    {:>8}", undecoded);
    println!("  Skipped invalid      {:>8}", stats.skipped_invalid);
    println!("  Skipped unchanged    {:>8}", stats.skipped_unchanged);
    println!("  Empty payloads       {:>8}", stats.skipped_empty);
    println!("  Sensors seen         {:>8}", tracker.sensors_seen());
    println!();

    info!(
        received,
        undecoded,
        published = stats.published,
        failed = stats.failed,
        "Sender stopped"
    );

    Ok(())
}
