//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use wavefeed::sink::DisplaySink;
use wavefeed::types::{ChannelId, ChannelSegment, DisplayWindow};

/// Fixed reference instant for deterministic segment arithmetic
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Segment of `len` samples at `rate` Hz starting `offset_secs` after [`t0`],
/// each sample's value equal to its global grid index
pub fn grid_segment(offset_secs: f64, len: usize, rate: f64) -> ChannelSegment {
    let start = t0() + chrono::Duration::nanoseconds((offset_secs * 1e9).round() as i64);
    let first = (offset_secs * rate).round() as usize;
    ChannelSegment::new(start, rate, (first..first + len).map(|i| i as f64).collect())
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Sink that records every published frame for later inspection
#[derive(Clone, Default)]
pub struct CollectingSink {
    frames: Arc<Mutex<Vec<DisplayWindow>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded frames
    pub fn frames(&self) -> Arc<Mutex<Vec<DisplayWindow>>> {
        self.frames.clone()
    }
}

impl DisplaySink for CollectingSink {
    fn publish(&mut self, channel: &ChannelId, xs: &[f64], ys: &[f64]) {
        self.frames.lock().unwrap().push(DisplayWindow {
            channel: channel.clone(),
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        });
    }
}
