//! Snapshot scheduler: the consumer side of the feed pipeline
//!
//! Runs at a fixed interval. Each tick merges the store, slices the
//! trailing display window for every registered channel under a single
//! lock acquisition, and then — with the lock already released, so a slow
//! renderer can never hold back the ingestor — publishes one (x, y) frame
//! per channel that had data. An empty store skips the tick entirely; an
//! empty channel is skipped for the tick, leaving whatever frame the sink
//! saw last.
//!
//! Re-merging the full history every 10 ms regardless of whether anything
//! arrived is wasted work, so by default a tick whose store revision
//! matches the previous tick is skipped; set
//! [`SchedulerConfig::remerge_unchanged`] to publish on every tick
//! anyway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::registry::ChannelRegistry;
use crate::sink::DisplaySink;
use crate::store::TimeSeriesStore;
use crate::types::{DisplayWindow, DEFAULT_WINDOW_SECS};

/// Tuning knobs for the snapshot loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks
    pub tick_interval: Duration,
    /// Trailing display window per channel, in seconds
    pub window_secs: f64,
    /// Re-merge and re-publish even when no data arrived since the last
    /// tick
    pub remerge_unchanged: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            window_secs: DEFAULT_WINDOW_SECS,
            remerge_unchanged: false,
        }
    }
}

/// Counters summarizing one scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ticks executed
    pub ticks: u64,
    /// Ticks skipped because the store was empty or unchanged
    pub skipped_ticks: u64,
    /// Frames handed to the sink
    pub frames_published: u64,
}

/// The consumer loop: periodically snapshots the store into the sink
pub struct SnapshotScheduler {
    store: TimeSeriesStore,
    registry: ChannelRegistry,
    sink: Box<dyn DisplaySink>,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    last_revision: Option<u64>,
    stats: SchedulerStats,
}

impl SnapshotScheduler {
    /// Create a scheduler over the shared store and an immutable registry
    pub fn new(
        store: TimeSeriesStore,
        registry: ChannelRegistry,
        sink: Box<dyn DisplaySink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            sink,
            config,
            running: Arc::new(AtomicBool::new(true)),
            last_revision: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Flag that stops the loop when cleared; observed once per tick
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Execute a single merge/slice/publish cycle
    ///
    /// Exposed so embedders can drive the cycle from their own loop
    /// instead of [`run`](Self::run).
    pub fn tick(&mut self) {
        self.stats.ticks += 1;

        if self.store.is_empty() {
            self.stats.skipped_ticks += 1;
            return;
        }
        if !self.config.remerge_unchanged && self.last_revision == Some(self.store.revision()) {
            self.stats.skipped_ticks += 1;
            return;
        }

        let (revision, frames) = self
            .store
            .snapshot(self.config.window_secs, self.registry.channel_ids());
        self.last_revision = Some(revision);

        // Lock released; sink delivery happens outside the critical section
        for (id, segments) in frames {
            if let Some(window) = DisplayWindow::from_segments(id, &segments) {
                self.sink.publish(&window.channel, &window.xs, &window.ys);
                self.stats.frames_published += 1;
            }
        }
    }

    /// Run the snapshot loop on the current thread until stopped
    pub fn run(mut self) -> SchedulerStats {
        tracing::info!(
            channels = self.registry.len(),
            interval_ms = self.config.tick_interval.as_millis() as u64,
            window_secs = self.config.window_secs,
            "snapshot scheduler started"
        );

        while self.running.load(Ordering::SeqCst) {
            self.tick();
            std::thread::sleep(self.config.tick_interval);
        }

        tracing::info!(
            ticks = self.stats.ticks,
            frames = self.stats.frames_published,
            "snapshot scheduler stopped"
        );
        self.stats
    }

    /// Run the snapshot loop on a dedicated thread
    pub fn spawn(self) -> SchedulerHandle {
        let running = self.running.clone();
        let handle = std::thread::spawn(move || self.run());
        SchedulerHandle { handle, running }
    }
}

/// Handle to a spawned scheduler thread
pub struct SchedulerHandle {
    handle: JoinHandle<SchedulerStats>,
    running: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Request the loop to stop; it exits within one tick interval
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for the loop to finish and return its counters
    ///
    /// A panic on the scheduler thread is resumed on the caller, never
    /// reported as a clean zero-stats run.
    pub fn join(self) -> SchedulerStats {
        match self.handle.join() {
            Ok(stats) => stats,
            Err(payload) => {
                tracing::error!("scheduler thread panicked");
                std::panic::resume_unwind(payload)
            }
        }
    }
}
