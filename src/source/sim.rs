//! Simulated packet source for testing and demos
//!
//! Generates deterministic waveform segments without any network, so the
//! whole pipeline can run in tests and in the demo binary. Each
//! subscribed channel gets a configurable [`WavePattern`]; packets are
//! produced round-robin across channels, each carrying one fixed-length
//! segment that continues exactly where the channel's previous segment
//! ended.
//!
//! Fault injection knobs mirror what a real feed throws at the ingestor:
//!
//! - [`SimulatedSource::with_retransmit_every`] re-sends a channel's
//!   previous segment periodically, producing the duplicate/overlapping
//!   data the store's merge step must resolve
//! - [`SimulatedSource::with_empty_trace_every`] periodically emits a data
//!   packet with no decodable trace, exercising the skip-and-continue
//!   path
//! - [`SimulatedSource::with_max_packets`] ends the session after a
//!   packet budget, exercising clean ingestor termination
//!
//! Only available with the `sim-source` feature (enabled by default).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{FeedError, Result};
use crate::registry::ChannelRegistry;
use crate::source::{DataPacket, PacketSource, SourceEvent, StreamSubscription, TraceBlock};
use crate::types::ChannelId;

/// Pattern for generating simulated waveform samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WavePattern {
    /// Constant value
    Constant(f64),
    /// Sine wave
    Sine {
        /// Frequency in Hz
        frequency: f64,
        /// Peak amplitude
        amplitude: f64,
        /// Constant offset added to every sample
        offset: f64,
    },
    /// Linear ramp resetting every `period` seconds
    Sawtooth {
        /// Ramp period in seconds
        period: f64,
        /// Ramp height
        amplitude: f64,
    },
}

impl Default for WavePattern {
    fn default() -> Self {
        WavePattern::Sine {
            frequency: 0.2,
            amplitude: 1000.0,
            offset: 0.0,
        }
    }
}

impl WavePattern {
    /// Sample the pattern at `t` seconds after session start
    pub fn value_at(&self, t: f64) -> f64 {
        match *self {
            WavePattern::Constant(v) => v,
            WavePattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin(),
            WavePattern::Sawtooth { period, amplitude } => {
                let t = t.rem_euclid(period);
                amplitude * (t / period)
            }
        }
    }
}

/// Deterministic in-process packet source
pub struct SimulatedSource {
    subscriptions: Vec<StreamSubscription>,
    channels: Vec<ChannelId>,
    default_pattern: WavePattern,
    patterns: HashMap<ChannelId, WavePattern>,
    sample_rate: f64,
    samples_per_packet: usize,
    packet_interval: Duration,
    max_packets: Option<u64>,
    retransmit_every: Option<u64>,
    empty_trace_every: Option<u64>,
    session_start: DateTime<Utc>,
    opened: bool,
    info_sent: bool,
    packets_sent: u64,
    next_segment: Vec<u64>,
    cursor: usize,
}

impl SimulatedSource {
    /// Create a source for the given subscription groups
    ///
    /// Concrete channels are expanded from the selectors the same way
    /// [`ChannelRegistry`] does it. Defaults: 50 Hz, 100 samples per
    /// packet (2 s segments), a 1 ms inter-packet delay, no packet budget
    /// and a session start of "now".
    pub fn new(subscriptions: Vec<StreamSubscription>) -> Self {
        let channels: Vec<ChannelId> = ChannelRegistry::from_subscriptions(&subscriptions)
            .channel_ids()
            .to_vec();
        let next_segment = vec![0; channels.len()];
        Self {
            subscriptions,
            channels,
            default_pattern: WavePattern::default(),
            patterns: HashMap::new(),
            sample_rate: 50.0,
            samples_per_packet: 100,
            packet_interval: Duration::from_millis(1),
            max_packets: None,
            retransmit_every: None,
            empty_trace_every: None,
            session_start: Utc::now(),
            opened: false,
            info_sent: false,
            packets_sent: 0,
            next_segment,
            cursor: 0,
        }
    }

    /// Set the pattern used by channels without a per-channel override
    pub fn with_pattern(mut self, pattern: WavePattern) -> Self {
        self.default_pattern = pattern;
        self
    }

    /// Override the pattern for a single channel
    pub fn with_channel_pattern(mut self, channel: ChannelId, pattern: WavePattern) -> Self {
        self.patterns.insert(channel, pattern);
        self
    }

    /// Set the sample rate in Hz
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set how many samples each packet carries
    pub fn with_samples_per_packet(mut self, samples: usize) -> Self {
        self.samples_per_packet = samples.max(1);
        self
    }

    /// Set the simulated network delay between packets
    pub fn with_packet_interval(mut self, interval: Duration) -> Self {
        self.packet_interval = interval;
        self
    }

    /// End the session after this many packets
    pub fn with_max_packets(mut self, max: u64) -> Self {
        self.max_packets = Some(max);
        self
    }

    /// Re-send the previous segment of a channel every `n` packets
    pub fn with_retransmit_every(mut self, n: u64) -> Self {
        self.retransmit_every = Some(n.max(2));
        self
    }

    /// Emit a trace-less data packet every `n` packets
    pub fn with_empty_trace_every(mut self, n: u64) -> Self {
        self.empty_trace_every = Some(n.max(2));
        self
    }

    /// Pin the session start time (e.g. `now - backtrace`)
    pub fn with_session_start(mut self, start: DateTime<Utc>) -> Self {
        self.session_start = start;
        self
    }

    /// The concrete channels this source emits data for
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    fn packet_for(&self, channel: &ChannelId, trace: Option<TraceBlock>) -> DataPacket {
        DataPacket {
            network: channel.network.clone(),
            station: channel.station.clone(),
            location: if channel.location.is_empty() {
                None
            } else {
                Some(channel.location.clone())
            },
            channel: channel.channel.clone(),
            trace,
        }
    }

    fn trace_for(&self, channel: &ChannelId, segment_index: u64) -> TraceBlock {
        let pattern = self
            .patterns
            .get(channel)
            .copied()
            .unwrap_or(self.default_pattern);
        let first_sample = segment_index * self.samples_per_packet as u64;
        let start_offset_nanos =
            (first_sample as f64 / self.sample_rate * 1e9).round() as i64;
        let samples = (0..self.samples_per_packet)
            .map(|i| pattern.value_at((first_sample + i as u64) as f64 / self.sample_rate))
            .collect();
        TraceBlock {
            start: self.session_start + chrono::Duration::nanoseconds(start_offset_nanos),
            sample_rate: self.sample_rate,
            samples,
        }
    }
}

impl PacketSource for SimulatedSource {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        tracing::debug!(channels = self.channels.len(), "simulated session opened");
        Ok(())
    }

    fn next_packet(&mut self) -> Result<SourceEvent> {
        if !self.opened {
            return Err(FeedError::Connection("session not opened".to_string()));
        }
        if !self.packet_interval.is_zero() {
            std::thread::sleep(self.packet_interval);
        }
        if !self.info_sent {
            self.info_sent = true;
            return Ok(SourceEvent::Informational { complete: false });
        }
        if let Some(max) = self.max_packets {
            if self.packets_sent >= max {
                return Ok(SourceEvent::EndOfSession);
            }
        }
        if self.channels.is_empty() {
            return Ok(SourceEvent::NoData);
        }
        self.packets_sent += 1;

        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % self.channels.len();
        let channel = self.channels[idx].clone();

        if let Some(n) = self.empty_trace_every {
            if self.packets_sent % n == 0 {
                return Ok(SourceEvent::Data(self.packet_for(&channel, None)));
            }
        }

        let retransmit = self
            .retransmit_every
            .is_some_and(|n| self.packets_sent % n == 0 && self.next_segment[idx] > 0);
        let segment_index = if retransmit {
            self.next_segment[idx] - 1
        } else {
            let k = self.next_segment[idx];
            self.next_segment[idx] += 1;
            k
        };

        let trace = self.trace_for(&channel, segment_index);
        Ok(SourceEvent::Data(self.packet_for(&channel, Some(trace))))
    }

    fn subscriptions(&self) -> Vec<StreamSubscription> {
        self.subscriptions.clone()
    }

    fn close(&mut self) {
        self.opened = false;
        tracing::debug!(packets = self.packets_sent, "simulated session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> SimulatedSource {
        let subs = StreamSubscription::parse_multiselect("IU_KONO:BHE BHN").unwrap();
        SimulatedSource::new(subs)
            .with_packet_interval(Duration::ZERO)
            .with_sample_rate(20.0)
            .with_samples_per_packet(10)
            .with_session_start(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    fn expect_data(event: SourceEvent) -> DataPacket {
        match event {
            SourceEvent::Data(packet) => packet,
            other => panic!("expected a data packet, got {:?}", other),
        }
    }

    #[test]
    fn test_requires_open() {
        let mut src = source();
        assert!(src.next_packet().is_err());
        src.open().unwrap();
        assert!(src.next_packet().is_ok());
    }

    #[test]
    fn test_info_packet_first_then_round_robin_data() {
        let mut src = source();
        src.open().unwrap();

        assert!(matches!(
            src.next_packet().unwrap(),
            SourceEvent::Informational { complete: false }
        ));

        let first = expect_data(src.next_packet().unwrap());
        let second = expect_data(src.next_packet().unwrap());
        assert_eq!(first.channel_id().to_string(), "IU.KONO..BHE");
        assert_eq!(second.channel_id().to_string(), "IU.KONO..BHN");
    }

    #[test]
    fn test_segments_are_contiguous_per_channel() {
        let mut src = source();
        src.open().unwrap();
        src.next_packet().unwrap(); // info

        let a = expect_data(src.next_packet().unwrap()).trace.unwrap();
        src.next_packet().unwrap(); // other channel
        let b = expect_data(src.next_packet().unwrap()).trace.unwrap();

        // Segment b starts exactly one segment length after a
        let gap = (b.start - a.start).num_milliseconds();
        assert_eq!(gap, 500); // 10 samples at 20 Hz
    }

    #[test]
    fn test_retransmit_duplicates_previous_segment() {
        let mut src = source().with_retransmit_every(3);
        src.open().unwrap();
        src.next_packet().unwrap(); // info

        let mut packets = Vec::new();
        for _ in 0..6 {
            packets.push(expect_data(src.next_packet().unwrap()));
        }
        // Packet 3 (BHE's second) retransmits BHE's first segment
        let t0 = packets[0].trace.as_ref().unwrap();
        let t2 = packets[2].trace.as_ref().unwrap();
        assert_eq!(packets[0].channel_id(), packets[2].channel_id());
        assert_eq!(t0.start, t2.start);
        assert_eq!(t0.samples, t2.samples);
    }

    #[test]
    fn test_empty_trace_injection() {
        let mut src = source().with_empty_trace_every(2);
        src.open().unwrap();
        src.next_packet().unwrap(); // info

        expect_data(src.next_packet().unwrap());
        let bad = expect_data(src.next_packet().unwrap());
        assert!(bad.trace.is_none());
    }

    #[test]
    fn test_session_ends_after_packet_budget() {
        let mut src = source().with_max_packets(3);
        src.open().unwrap();
        src.next_packet().unwrap(); // info

        for _ in 0..3 {
            expect_data(src.next_packet().unwrap());
        }
        assert!(matches!(
            src.next_packet().unwrap(),
            SourceEvent::EndOfSession
        ));
        // Terminal state is stable
        assert!(matches!(
            src.next_packet().unwrap(),
            SourceEvent::EndOfSession
        ));
    }

    #[test]
    fn test_pattern_values() {
        assert_eq!(WavePattern::Constant(5.0).value_at(12.3), 5.0);
        let sine = WavePattern::Sine {
            frequency: 1.0,
            amplitude: 2.0,
            offset: 1.0,
        };
        assert!((sine.value_at(0.0) - 1.0).abs() < 1e-12);
        assert!((sine.value_at(0.25) - 3.0).abs() < 1e-9);
        let saw = WavePattern::Sawtooth {
            period: 10.0,
            amplitude: 5.0,
        };
        assert!((saw.value_at(12.0) - 1.0).abs() < 1e-9);
    }
}
