//! Display sink boundary and in-crate sink implementations
//!
//! The renderer consuming display windows is an external collaborator;
//! the scheduler only knows the [`DisplaySink`] trait. Two implementations
//! ship with the crate:
//!
//! - [`ChannelSink`] - forwards frames over a bounded crossbeam channel to
//!   whatever thread renders them, dropping (and counting) frames when the
//!   consumer lags rather than blocking the scheduler
//! - [`JsonLinesSink`] - writes one JSON object per frame to any writer,
//!   which is what the demo binary points at stdout
//!
//! Per the scheduler contract a sink is called at most once per channel
//! per tick, and only ever with valid (x, y) pairs; errors never travel
//! through this boundary.

use std::io::Write;

use crossbeam_channel::{bounded, Receiver, Sender};

#[cfg(test)]
use mockall::automock;

use crate::types::{ChannelId, DisplayWindow};

/// Consumer of per-channel display windows
///
/// Implementations must be `Send` so the scheduler can own one on its
/// thread. `xs` and `ys` are parallel arrays; `xs` holds absolute seconds
/// since the Unix epoch.
#[cfg_attr(test, automock)]
pub trait DisplaySink: Send {
    /// Deliver the latest display window for one channel
    fn publish(&mut self, channel: &ChannelId, xs: &[f64], ys: &[f64]);
}

/// Sink forwarding frames over a bounded crossbeam channel
///
/// Uses `try_send` so a slow consumer can never hold back the scheduler;
/// frames dropped because the channel was full are counted.
pub struct ChannelSink {
    sender: Sender<DisplayWindow>,
    dropped_frames: u64,
}

impl ChannelSink {
    /// Create a sink and the matching receiver, with the given channel
    /// capacity
    pub fn bounded(capacity: usize) -> (Self, Receiver<DisplayWindow>) {
        let (sender, receiver) = bounded(capacity);
        (
            Self {
                sender,
                dropped_frames: 0,
            },
            receiver,
        )
    }

    /// Frames dropped so far because the consumer lagged
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }
}

impl DisplaySink for ChannelSink {
    fn publish(&mut self, channel: &ChannelId, xs: &[f64], ys: &[f64]) {
        let frame = DisplayWindow {
            channel: channel.clone(),
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        };
        if self.sender.try_send(frame).is_err() {
            self.dropped_frames += 1;
            tracing::trace!(channel = %channel, "display frame dropped, consumer lagging");
        }
    }
}

/// Sink writing one JSON object per frame to a writer
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    frames_written: u64,
}

impl JsonLinesSink<std::io::Stdout> {
    /// JSON-lines sink on stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// JSON-lines sink on an arbitrary writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_written: 0,
        }
    }

    /// Frames successfully written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DisplaySink for JsonLinesSink<W> {
    fn publish(&mut self, channel: &ChannelId, xs: &[f64], ys: &[f64]) {
        let frame = DisplayWindow {
            channel: channel.clone(),
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        };
        match serde_json::to_writer(&mut self.writer, &frame) {
            Ok(()) => {
                if let Err(e) = self.writer.write_all(b"\n") {
                    tracing::warn!(channel = %channel, error = %e, "failed to write frame");
                } else {
                    self.frames_written += 1;
                }
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "failed to serialize frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bhe() -> ChannelId {
        ChannelId::new("IU", "KONO", "", "BHE")
    }

    #[test]
    fn test_channel_sink_forwards_frames() {
        let (mut sink, rx) = ChannelSink::bounded(4);
        sink.publish(&bhe(), &[0.0, 0.1], &[1.0, 2.0]);

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.channel, bhe());
        assert_eq!(frame.xs, vec![0.0, 0.1]);
        assert_eq!(frame.ys, vec![1.0, 2.0]);
        assert_eq!(sink.dropped_frames(), 0);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        sink.publish(&bhe(), &[0.0], &[1.0]);
        sink.publish(&bhe(), &[0.1], &[2.0]);
        assert_eq!(sink.dropped_frames(), 1);
        // The first frame is still delivered
        assert_eq!(rx.try_recv().unwrap().ys, vec![1.0]);
    }

    #[test]
    fn test_json_lines_sink_output_shape() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&bhe(), &[1700000000.0, 1700000000.1], &[3.0, 4.0]);
        assert_eq!(sink.frames_written(), 1);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let line = out.lines().next().unwrap();
        let parsed: DisplayWindow = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.channel, bhe());
        assert_eq!(parsed.ys, vec![3.0, 4.0]);
    }
}
