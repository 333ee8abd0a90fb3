//! wavefeed - Live Waveform Feed Demo
//!
//! Runs the full feed pipeline against the built-in simulated source and
//! prints one JSON line per published display frame. Useful for watching
//! the buffer behave without a real server on the other end.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wavefeed::{
    config::FeedConfig,
    ingest::StreamIngestor,
    registry::ChannelRegistry,
    scheduler::SnapshotScheduler,
    sink::JsonLinesSink,
    source::{sim::SimulatedSource, PacketSource},
    store::TimeSeriesStore,
};

#[derive(Debug, Parser)]
#[command(name = "wavefeed", about = "Live waveform feed buffer demo")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Server address with port (recorded in the config; the demo source
    /// never connects to it)
    #[arg(long = "seedlink-server")]
    server: Option<String>,

    /// Multiselect stream string, e.g. "IU_KONO:BHE BHN,MN_AQU:HH?.D"
    #[arg(short = 's', long = "seedlink-streams")]
    streams: Option<String>,

    /// Hours of data to backfill before "now"
    #[arg(short = 'b', long = "backtrace-time")]
    backtrace_hours: Option<f64>,

    /// Scheduler tick interval in milliseconds
    #[arg(long = "update-time")]
    update_ms: Option<u64>,

    /// Trailing display window in seconds
    #[arg(long)]
    window: Option<f64>,

    /// How long to run before shutting down, in seconds
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = match args.verbose {
        0 => "info,wavefeed=info",
        1 => "info,wavefeed=debug",
        _ => "debug,wavefeed=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting wavefeed demo");

    // Load the configuration file if given, then overlay CLI arguments
    let mut config = match &args.config {
        Some(path) => FeedConfig::load(path)?,
        None => FeedConfig::default(),
    };
    if let Some(server) = args.server {
        config.server = server;
    }
    if let Some(streams) = args.streams {
        config.streams = streams;
    }
    if let Some(hours) = args.backtrace_hours {
        config.backtrace_secs = hours * 3600.0;
    }
    if let Some(ms) = args.update_ms {
        config.tick_interval_ms = ms;
    }
    if let Some(window) = args.window {
        config.window_secs = window;
    }
    config.validate()?;

    // The simulated session starts in the past so the buffer fills as if
    // the server honored the backfill request
    let session_start = chrono::Utc::now()
        - chrono::Duration::milliseconds((config.backtrace_secs * 1000.0) as i64);
    let mut source =
        SimulatedSource::new(config.subscriptions()?).with_session_start(session_start);
    source.open()?;

    let registry = ChannelRegistry::from_subscriptions(&source.subscriptions());
    tracing::info!(server = %config.server, channels = registry.len(), "feed configured");

    let store = TimeSeriesStore::new();
    let ingestor = StreamIngestor::new(Box::new(source), store.clone()).spawn();
    let scheduler = SnapshotScheduler::new(
        store,
        registry,
        Box::new(JsonLinesSink::stdout()),
        config.scheduler_config(),
    )
    .spawn();

    std::thread::sleep(Duration::from_secs_f64(args.duration));

    tracing::info!("Shutting down...");
    ingestor.stop();
    scheduler.stop();
    let ingest_stats = ingestor.join();
    let scheduler_stats = scheduler.join();
    tracing::info!(
        packets = ingest_stats.packets_received,
        segments = ingest_stats.segments_appended,
        frames = scheduler_stats.frames_published,
        "done"
    );

    Ok(())
}
