//! Packet source boundary
//!
//! The wire protocol that actually speaks to a waveform server is an
//! external collaborator; this module defines the narrow capability set
//! the rest of the crate relies on:
//!
//! - [`PacketSource`] - open a session, pull packets, report subscriptions
//! - [`SourceEvent`] - closed classification of everything a session can
//!   hand back: no data, informational, a data packet, end of session
//! - [`DataPacket`] / [`TraceBlock`] - a decoded packet and its waveform
//!   payload
//! - [`StreamSubscription`] - one network/station group with its
//!   location+channel selectors, plus parsing of the multiselect string
//!   format (`"IU_KONO:BHE BHN,MN_AQU:HH?.D"`)
//!
//! Real protocol clients implement [`PacketSource`] by composition; the
//! crate never subclasses or wraps their internals. A deterministic
//! in-process implementation for tests and demos lives in [`sim`].

#[cfg(feature = "sim-source")]
pub mod sim;

use chrono::{DateTime, Utc};

use crate::error::{FeedError, Result};
use crate::types::{ChannelId, ChannelSegment};

/// A long-lived session yielding decoded waveform packets
///
/// Implementations must be `Send` so the ingestor can own one on its
/// thread. `next_packet` may block on network receive; connection errors
/// and session teardown are surfaced through its `Result` and
/// [`SourceEvent::EndOfSession`] respectively, and both are terminal: the
/// ingestor never reconnects a source itself.
pub trait PacketSource: Send {
    /// Establish the session and resolve subscriptions
    fn open(&mut self) -> Result<()>;

    /// Block until the next packet (or session state change) arrives
    fn next_packet(&mut self) -> Result<SourceEvent>;

    /// The stream groups this session is subscribed to, resolved at open
    fn subscriptions(&self) -> Vec<StreamSubscription>;

    /// Tear the session down; default is a no-op
    fn close(&mut self) {}
}

/// Everything a packet source can hand back from one receive call
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// The server had nothing for us right now
    NoData,
    /// An informational packet; `complete` marks the final packet of an
    /// INFO response
    Informational {
        /// Whether this packet completes an INFO response
        complete: bool,
    },
    /// A data packet carrying (or claiming to carry) waveform samples
    Data(DataPacket),
    /// The server ended the session cleanly
    EndOfSession,
}

/// A decoded data packet: channel id components plus an optional trace
///
/// A packet that claims to carry waveform data but yields no trace is a
/// transient decode failure; the ingestor logs and skips it.
#[derive(Debug, Clone)]
pub struct DataPacket {
    /// Network code
    pub network: String,
    /// Station code
    pub station: String,
    /// Location code; `None` when the stream carries none
    pub location: Option<String>,
    /// Channel code
    pub channel: String,
    /// Waveform payload, absent on a malformed packet
    pub trace: Option<TraceBlock>,
}

impl DataPacket {
    /// The packet's channel id, with an empty location code when absent
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(
            self.network.clone(),
            self.station.clone(),
            self.location.clone().unwrap_or_default(),
            self.channel.clone(),
        )
    }
}

/// The waveform payload of one data packet
#[derive(Debug, Clone)]
pub struct TraceBlock {
    /// Absolute UTC time of the first sample
    pub start: DateTime<Utc>,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Ordered sample values
    pub samples: Vec<f64>,
}

impl TraceBlock {
    /// Convert the payload into a store segment
    pub fn into_segment(self) -> ChannelSegment {
        ChannelSegment::new(self.start, self.sample_rate, self.samples)
    }
}

/// One subscription group: a network/station pair plus its selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSubscription {
    /// Network code
    pub network: String,
    /// Station code
    pub station: String,
    /// Location+channel selectors, e.g. `BHE`, `00BHZ`, `HH?.D`
    pub selectors: Vec<String>,
}

impl StreamSubscription {
    /// Create a subscription group
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        selectors: Vec<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            selectors,
        }
    }

    /// Parse a multiselect string of the form
    /// `"stream1[:selectors1],stream2[:selectors2],..."` where each stream
    /// is `NETWORK_STATION` and selectors are space separated
    pub fn parse_multiselect(spec: &str) -> Result<Vec<StreamSubscription>> {
        let mut subscriptions = Vec::new();
        for group in spec.split(',') {
            let group = group.trim();
            if group.is_empty() {
                continue;
            }
            let (stream, selectors) = match group.split_once(':') {
                Some((stream, selectors)) => (
                    stream,
                    selectors
                        .split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>(),
                ),
                None => (group, Vec::new()),
            };
            let (network, station) = stream.split_once('_').ok_or_else(|| {
                FeedError::Selector(format!(
                    "stream '{}' is not of the form NETWORK_STATION",
                    stream
                ))
            })?;
            if network.is_empty() || station.is_empty() {
                return Err(FeedError::Selector(format!(
                    "stream '{}' has an empty network or station code",
                    stream
                )));
            }
            subscriptions.push(StreamSubscription::new(network, station, selectors));
        }
        if subscriptions.is_empty() {
            return Err(FeedError::Selector(format!(
                "no stream groups found in '{}'",
                spec
            )));
        }
        Ok(subscriptions)
    }
}
