//! Stream ingestor: the producer side of the feed pipeline
//!
//! Owns an opened [`PacketSource`] session and runs on its own thread,
//! pulling packets and appending decoded segments to the shared
//! [`TimeSeriesStore`]. Packet decoding happens before the store lock is
//! taken; the lock is held for exactly one append.
//!
//! # Termination
//!
//! The loop ends on exactly three conditions, all terminal for this
//! component only:
//!
//! - the source signals [`SourceEvent::EndOfSession`]
//! - the source surfaces a connection error
//! - a complete INFO response arrives while
//!   [`StreamIngestor::with_stop_on_info_complete`] is set
//!
//! The ingestor never reconnects; restarting is the job of whatever
//! supervises it. A shared stop flag (checked once per received packet)
//! allows an orderly external shutdown.
//!
//! # Failure Handling
//!
//! A data packet that claims waveform data but yields no trace is a
//! transient decode failure: logged, counted, skipped. Nothing short of
//! session loss stops the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::source::{PacketSource, SourceEvent};
use crate::store::TimeSeriesStore;

/// Counters summarizing one ingestor run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Data packets received (with or without a decodable trace)
    pub packets_received: u64,
    /// Segments successfully appended to the store
    pub segments_appended: u64,
    /// Data packets skipped because they carried no trace
    pub decode_failures: u64,
    /// Informational packets observed
    pub info_packets: u64,
}

/// The producer loop: receives packets and appends segments to the store
pub struct StreamIngestor {
    source: Box<dyn PacketSource>,
    store: TimeSeriesStore,
    running: Arc<AtomicBool>,
    stop_on_info_complete: bool,
    stats: IngestStats,
}

impl StreamIngestor {
    /// Create an ingestor over an already-opened source
    pub fn new(source: Box<dyn PacketSource>, store: TimeSeriesStore) -> Self {
        Self {
            source,
            store,
            running: Arc::new(AtomicBool::new(true)),
            stop_on_info_complete: false,
            stats: IngestStats::default(),
        }
    }

    /// Terminate the loop once a complete INFO response has been seen
    pub fn with_stop_on_info_complete(mut self, stop: bool) -> Self {
        self.stop_on_info_complete = stop;
        self
    }

    /// Flag that stops the loop when cleared; observed once per packet
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the ingest loop on the current thread until a terminal state
    pub fn run(mut self) -> IngestStats {
        tracing::info!("stream ingestor started");

        while self.running.load(Ordering::SeqCst) {
            let event = match self.source.next_packet() {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "connection error, stopping ingestor");
                    break;
                }
            };

            match event {
                SourceEvent::NoData => continue,
                SourceEvent::Informational { complete } => {
                    self.stats.info_packets += 1;
                    if complete {
                        tracing::info!("complete INFO response received");
                        if self.stop_on_info_complete {
                            break;
                        }
                    }
                }
                SourceEvent::Data(packet) => {
                    self.stats.packets_received += 1;
                    let id = packet.channel_id();
                    match packet.trace {
                        Some(trace) => {
                            let segment = trace.into_segment();
                            tracing::trace!(
                                channel = %id,
                                samples = segment.len(),
                                "appending segment"
                            );
                            self.store.append(id, segment);
                            self.stats.segments_appended += 1;
                        }
                        None => {
                            self.stats.decode_failures += 1;
                            tracing::warn!(channel = %id, "data packet carries no trace; skipping");
                        }
                    }
                }
                SourceEvent::EndOfSession => {
                    tracing::info!("session ended by server");
                    break;
                }
            }
        }

        self.source.close();
        tracing::info!(
            packets = self.stats.packets_received,
            segments = self.stats.segments_appended,
            decode_failures = self.stats.decode_failures,
            "stream ingestor stopped"
        );
        self.stats
    }

    /// Run the ingest loop on a dedicated thread
    pub fn spawn(self) -> IngestorHandle {
        let running = self.running.clone();
        let handle = std::thread::spawn(move || self.run());
        IngestorHandle { handle, running }
    }
}

/// Handle to a spawned ingestor thread
pub struct IngestorHandle {
    handle: JoinHandle<IngestStats>,
    running: Arc<AtomicBool>,
}

impl IngestorHandle {
    /// Request the loop to stop; it exits within one packet receive
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for the loop to finish and return its counters
    ///
    /// A panic on the ingestor thread is resumed on the caller, never
    /// reported as a clean zero-stats run.
    pub fn join(self) -> IngestStats {
        match self.handle.join() {
            Ok(stats) => stats,
            Err(payload) => {
                tracing::error!("ingestor thread panicked");
                std::panic::resume_unwind(payload)
            }
        }
    }
}

#[cfg(all(test, feature = "sim-source"))]
mod tests {
    use super::*;
    use crate::source::sim::SimulatedSource;
    use crate::source::StreamSubscription;
    use std::time::Duration;

    fn sim(max_packets: u64) -> SimulatedSource {
        let subs = StreamSubscription::parse_multiselect("IU_KONO:BHE BHN").unwrap();
        let mut src = SimulatedSource::new(subs)
            .with_packet_interval(Duration::ZERO)
            .with_samples_per_packet(10)
            .with_max_packets(max_packets);
        src.open().unwrap();
        src
    }

    #[test]
    fn test_runs_until_end_of_session() {
        let store = TimeSeriesStore::new();
        let stats = StreamIngestor::new(Box::new(sim(6)), store.clone()).run();

        assert_eq!(stats.packets_received, 6);
        assert_eq!(stats.segments_appended, 6);
        assert_eq!(stats.decode_failures, 0);
        assert_eq!(stats.info_packets, 1);
        assert_eq!(store.total_samples(), 60);
        assert_eq!(store.channel_ids().len(), 2);
    }

    #[test]
    fn test_decode_failures_are_skipped_not_fatal() {
        let subs = StreamSubscription::parse_multiselect("IU_KONO:BHE").unwrap();
        let mut src = SimulatedSource::new(subs)
            .with_packet_interval(Duration::ZERO)
            .with_samples_per_packet(10)
            .with_empty_trace_every(3)
            .with_max_packets(9);
        src.open().unwrap();

        let store = TimeSeriesStore::new();
        let stats = StreamIngestor::new(Box::new(src), store.clone()).run();

        assert_eq!(stats.packets_received, 9);
        assert_eq!(stats.decode_failures, 3);
        assert_eq!(stats.segments_appended, 6);
        assert_eq!(store.total_samples(), 60);
    }

    #[test]
    fn test_stop_flag_terminates_loop() {
        // No packet budget: the loop would run forever without the flag
        let subs = StreamSubscription::parse_multiselect("IU_KONO:BHE").unwrap();
        let mut src = SimulatedSource::new(subs)
            .with_packet_interval(Duration::from_millis(1))
            .with_samples_per_packet(10);
        src.open().unwrap();

        let store = TimeSeriesStore::new();
        let handle = StreamIngestor::new(Box::new(src), store).spawn();
        std::thread::sleep(Duration::from_millis(20));
        handle.stop();
        let stats = handle.join();
        assert!(stats.segments_appended > 0);
    }

    struct PanickingSource;

    impl PacketSource for PanickingSource {
        fn open(&mut self) -> crate::error::Result<()> {
            Ok(())
        }

        fn next_packet(&mut self) -> crate::error::Result<SourceEvent> {
            panic!("receive blew up")
        }

        fn subscriptions(&self) -> Vec<StreamSubscription> {
            Vec::new()
        }
    }

    #[test]
    #[should_panic(expected = "receive blew up")]
    fn test_join_resumes_worker_panic() {
        let handle =
            StreamIngestor::new(Box::new(PanickingSource), TimeSeriesStore::new()).spawn();
        handle.join();
    }

    #[test]
    fn test_connection_error_is_terminal() {
        // An unopened simulated source fails every receive
        let subs = StreamSubscription::parse_multiselect("IU_KONO:BHE").unwrap();
        let src = SimulatedSource::new(subs).with_packet_interval(Duration::ZERO);

        let store = TimeSeriesStore::new();
        let stats = StreamIngestor::new(Box::new(src), store.clone()).run();
        assert_eq!(stats.packets_received, 0);
        assert!(store.is_empty());
    }
}
