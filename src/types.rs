//! Core data types for wavefeed
//!
//! This module contains the fundamental data structures used throughout
//! the feed pipeline for identifying channels and representing waveform
//! data.
//!
//! # Main Types
//!
//! - [`ChannelId`] - SEED-style channel identifier (`NET.STA.LOC.CHA`)
//! - [`ChannelSegment`] - A contiguous run of fixed-rate samples for one channel
//! - [`DisplayWindow`] - Parallel x/y arrays ready for a display sink
//!
//! # Time Model
//!
//! A segment stores an absolute UTC start time, a sample rate in Hz and an
//! ordered sample sequence. Sample *i* of a segment is implicitly located
//! at `start + i / sample_rate`; no per-sample timestamps are stored.
//! Throughout the crate, plot-facing x values are absolute seconds since
//! the Unix epoch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

/// Default trailing display window in seconds
pub const DEFAULT_WINDOW_SECS: f64 = 120.0;

/// Tolerance used when comparing sample rates and aligning sample grids
pub(crate) const RATE_EPSILON: f64 = 1e-6;

/// SEED-style channel identifier: network, station, location and channel
/// code. The location code may be empty.
///
/// The canonical textual form is `NETWORK.STATION.LOCATION.CHANNEL`, e.g.
/// `IU.KONO..BHE` for an empty location code. Ordering and equality follow
/// the component tuple, which matches lexicographic ordering of the dotted
/// form for well-formed ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId {
    /// Network code (e.g. `IU`)
    pub network: String,
    /// Station code (e.g. `KONO`)
    pub station: String,
    /// Location code; empty string when the stream carries none
    pub location: String,
    /// Channel code (e.g. `BHE`)
    pub channel: String,
}

impl ChannelId {
    /// Create a channel id from its four components
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl FromStr for ChannelId {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(FeedError::Selector(format!(
                "channel id '{}' is not of the form NET.STA.LOC.CHA",
                s
            )));
        }
        Ok(ChannelId::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An ordered, contiguous-in-time run of samples for one channel
///
/// Segments arrive from the packet source in arbitrary order and may
/// overlap or duplicate each other in time; the store's merge step is
/// responsible for resolving that.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSegment {
    /// Absolute UTC time of the first sample
    pub start: DateTime<Utc>,
    /// Sample rate in Hz, > 0
    pub sample_rate: f64,
    /// Ordered sample values
    pub samples: Vec<f64>,
}

impl ChannelSegment {
    /// Create a new segment
    pub fn new(start: DateTime<Utc>, sample_rate: f64, samples: Vec<f64>) -> Self {
        Self {
            start,
            sample_rate,
            samples,
        }
    }

    /// Number of samples in the segment
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the segment carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Start time as seconds since the Unix epoch
    pub fn start_secs(&self) -> f64 {
        self.start.timestamp_micros() as f64 / 1e6
    }

    /// Absolute time of sample `i`, as seconds since the Unix epoch
    pub fn sample_time(&self, i: usize) -> f64 {
        self.start_secs() + i as f64 / self.sample_rate
    }

    /// Absolute time of the last sample, as seconds since the Unix epoch
    ///
    /// For an empty segment this degenerates to the start time.
    pub fn end_secs(&self) -> f64 {
        if self.samples.is_empty() {
            self.start_secs()
        } else {
            self.sample_time(self.samples.len() - 1)
        }
    }

    /// Whether another segment shares this segment's sample rate, within
    /// tolerance
    pub fn rate_matches(&self, other: &ChannelSegment) -> bool {
        let scale = self.sample_rate.max(other.sample_rate).max(1.0);
        (self.sample_rate - other.sample_rate).abs() <= RATE_EPSILON * scale
    }

    /// Return a copy containing only samples at or after `cutoff_secs`
    /// (seconds since the Unix epoch), or `None` if nothing remains.
    ///
    /// The cutoff is inclusive: a sample lying exactly on the cutoff is
    /// kept.
    pub fn trim_from(&self, cutoff_secs: f64) -> Option<ChannelSegment> {
        if self.samples.is_empty() {
            return None;
        }
        let k = (cutoff_secs - self.start_secs()) * self.sample_rate;
        let first = if k <= 0.0 {
            0
        } else {
            (k - RATE_EPSILON).ceil() as usize
        };
        if first >= self.samples.len() {
            return None;
        }
        if first == 0 {
            return Some(self.clone());
        }
        let offset_nanos = (first as f64 / self.sample_rate * 1e9).round() as i64;
        Some(ChannelSegment::new(
            self.start + chrono::Duration::nanoseconds(offset_nanos),
            self.sample_rate,
            self.samples[first..].to_vec(),
        ))
    }
}

/// Ephemeral per-channel display frame: parallel x/y arrays for the most
/// recent trailing slice of merged data
///
/// Produced fresh on every scheduler tick and handed to the display sink;
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayWindow {
    /// Channel this frame belongs to
    pub channel: ChannelId,
    /// Absolute time of each sample, seconds since the Unix epoch
    pub xs: Vec<f64>,
    /// Sample values
    pub ys: Vec<f64>,
}

impl DisplayWindow {
    /// Build a display window from time-sorted, non-overlapping segments
    ///
    /// Gaps between segments are left as-is: x values are absolute, so a
    /// gap simply shows up as a jump on the time axis. Returns `None` when
    /// the segments carry no samples at all.
    pub fn from_segments(channel: ChannelId, segments: &[ChannelSegment]) -> Option<Self> {
        let total: usize = segments.iter().map(|s| s.len()).sum();
        if total == 0 {
            return None;
        }
        let mut xs = Vec::with_capacity(total);
        let mut ys = Vec::with_capacity(total);
        for seg in segments {
            let start = seg.start_secs();
            for (i, &value) in seg.samples.iter().enumerate() {
                xs.push(start + i as f64 / seg.sample_rate);
                ys.push(value);
            }
        }
        Some(Self { channel, xs, ys })
    }

    /// Number of samples in the frame
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Whether the frame is empty
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}
