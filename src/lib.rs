//! # wavefeed: real-time waveform feed buffering
//!
//! Ingests a continuous feed of timestamped waveform packets (SEED-style
//! seismic station data) and maintains a bounded, queryable in-memory
//! time-series buffer that a renderer reads concurrently while the feed
//! keeps writing.
//!
//! ## Architecture
//!
//! - **Store** ([`store::TimeSeriesStore`]): the shared buffer. Segments
//!   are appended in arrival order and compacted on demand into a
//!   canonical, gap-aware, time-sorted form; all state sits behind an
//!   internal lock reachable only through the method contracts.
//! - **Ingestor** ([`ingest::StreamIngestor`]): producer thread pulling
//!   packets from an opaque [`source::PacketSource`] session and
//!   appending decoded segments; only the single append holds the lock.
//! - **Scheduler** ([`scheduler::SnapshotScheduler`]): consumer loop that
//!   periodically merges, slices a trailing window per channel and hands
//!   (x, y) frames to an opaque [`sink::DisplaySink`].
//! - **Registry** ([`registry::ChannelRegistry`]): the immutable universe
//!   of channel ids, derived once from the source's resolved
//!   subscriptions.
//!
//! The wire protocol and the rendering technology are both external
//! collaborators behind the source and sink traits; a deterministic
//! simulated source ships behind the default `sim-source` feature.
//!
//! ## Example
//!
//! ```ignore
//! use wavefeed::{
//!     config::FeedConfig,
//!     ingest::StreamIngestor,
//!     registry::ChannelRegistry,
//!     scheduler::SnapshotScheduler,
//!     sink::JsonLinesSink,
//!     source::{sim::SimulatedSource, PacketSource},
//!     store::TimeSeriesStore,
//! };
//!
//! let config = FeedConfig::default();
//! let mut source = SimulatedSource::new(config.subscriptions()?);
//! source.open()?;
//!
//! let registry = ChannelRegistry::from_subscriptions(&source.subscriptions());
//! let store = TimeSeriesStore::new();
//!
//! let ingestor = StreamIngestor::new(Box::new(source), store.clone()).spawn();
//! let scheduler = SnapshotScheduler::new(
//!     store,
//!     registry,
//!     Box::new(JsonLinesSink::stdout()),
//!     config.scheduler_config(),
//! )
//! .spawn();
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::FeedConfig;
pub use error::{FeedError, Result};
pub use ingest::{IngestStats, IngestorHandle, StreamIngestor};
pub use registry::ChannelRegistry;
pub use scheduler::{SchedulerConfig, SchedulerHandle, SchedulerStats, SnapshotScheduler};
pub use sink::{ChannelSink, DisplaySink, JsonLinesSink};
pub use source::{DataPacket, PacketSource, SourceEvent, StreamSubscription, TraceBlock};
pub use store::TimeSeriesStore;
pub use types::{ChannelId, ChannelSegment, DisplayWindow, DEFAULT_WINDOW_SECS};
