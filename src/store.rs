//! Shared time-series store for waveform segments
//!
//! This module implements the buffer shared between the stream ingestor
//! (producer) and the snapshot scheduler (consumer). All state lives
//! behind an internal mutex; callers only ever go through the method
//! contracts, never through raw segment collections.
//!
//! # Contracts
//!
//! - [`TimeSeriesStore::append`] - add a segment for a channel, no
//!   time-order validation; overlaps and duplicates are expected
//! - [`TimeSeriesStore::merge`] - compact every channel into the minimal
//!   set of non-overlapping, time-sorted segments
//! - [`TimeSeriesStore::slice`] - trailing window of a channel's data,
//!   ending at its latest sample
//! - [`TimeSeriesStore::snapshot`] - merge plus slice-all-channels under a
//!   single lock acquisition (the scheduler's critical section)
//!
//! # Merge Policy
//!
//! Segments are sorted by start time (ties broken longest-first) and
//! folded left to right. Overlapping samples at the same timestamp are
//! assumed identical (retransmitted data), so only the non-overlapping
//! tail of a later segment is appended; the earlier segment's samples win
//! on a genuine conflict. A same-rate segment whose sample grid does not
//! line up with the run being built is kept as a separate segment rather
//! than resampled, with any head samples overlapping the run dropped so
//! each channel's merged output stays time-sorted. Segments with
//! mismatched sample rates are kept side by side untouched. The result is
//! deterministic regardless of arrival order, and merging twice is a
//! no-op.
//!
//! # Locking
//!
//! One exclusive lock guards everything. Critical sections are a single
//! append or a single merge+slice cycle; sink delivery and packet
//! decoding happen outside the lock. A sample appended while a snapshot
//! is in progress appears in the next snapshot, never disappears.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{ChannelId, ChannelSegment};

/// Maximum sample-grid misalignment (in sample periods) at which two
/// segments are still considered joinable
const GRID_EPSILON: f64 = 1e-3;

#[derive(Debug, Default)]
struct StoreInner {
    /// Per-channel segments, in arrival order until the next merge
    channels: BTreeMap<ChannelId, Vec<ChannelSegment>>,
    /// Bumped on every append; lets the scheduler skip re-merging when
    /// nothing new arrived
    revision: u64,
}

/// Append-only, mergeable, sliceable collection of waveform segments
/// grouped by channel id
///
/// Cheaply cloneable; clones share the same underlying buffer. Channel
/// ids are never removed once seen.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl TimeSeriesStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Poisoning means a panic inside one of these short critical
        // sections; the store's invariants cannot be trusted past that.
        self.inner.lock().expect("time-series store lock poisoned")
    }

    /// Append a segment to a channel's collection
    ///
    /// No validation against existing segments is performed; duplicate and
    /// overlapping data is resolved later by [`merge`](Self::merge). An
    /// unseen channel id gets a fresh collection.
    pub fn append(&self, id: ChannelId, segment: ChannelSegment) {
        let mut inner = self.lock();
        inner.channels.entry(id).or_default().push(segment);
        inner.revision += 1;
    }

    /// Compact every channel into non-overlapping, time-sorted segments
    ///
    /// Callable with zero segments or a single segment per channel (both
    /// no-ops). Idempotent.
    pub fn merge(&self) {
        let mut inner = self.lock();
        for segments in inner.channels.values_mut() {
            merge_channel(segments);
        }
    }

    /// Trailing `window_secs` of a channel's data, ending at the latest
    /// sample available for that channel
    ///
    /// Returns time-sorted segments trimmed to `[latest - window, latest]`;
    /// an unknown or empty channel yields an empty vector, never an error.
    /// A window larger than the available history returns everything.
    /// Does not mutate the store; call [`merge`](Self::merge) first if a
    /// canonical gap-free representation is required.
    pub fn slice(&self, id: &ChannelId, window_secs: f64) -> Vec<ChannelSegment> {
        let inner = self.lock();
        match inner.channels.get(id) {
            Some(segments) => slice_channel(segments, window_secs),
            None => Vec::new(),
        }
    }

    /// Merge, then slice the trailing window for each of the given
    /// channels, all under one lock acquisition
    ///
    /// Returns the store revision observed inside the lock plus one entry
    /// per channel that currently has data in the window; channels with no
    /// data are omitted.
    pub fn snapshot(
        &self,
        window_secs: f64,
        ids: &[ChannelId],
    ) -> (u64, Vec<(ChannelId, Vec<ChannelSegment>)>) {
        let mut inner = self.lock();
        for segments in inner.channels.values_mut() {
            merge_channel(segments);
        }
        let mut frames = Vec::new();
        for id in ids {
            if let Some(segments) = inner.channels.get(id) {
                let sliced = slice_channel(segments, window_secs);
                if !sliced.is_empty() {
                    frames.push((id.clone(), sliced));
                }
            }
        }
        (inner.revision, frames)
    }

    /// Revision counter, bumped on every append
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Whether the store holds any samples at all
    pub fn is_empty(&self) -> bool {
        self.lock()
            .channels
            .values()
            .all(|segs| segs.iter().all(|s| s.is_empty()))
    }

    /// All channel ids the store has ever seen, in sorted order
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.lock().channels.keys().cloned().collect()
    }

    /// Total number of samples currently held, across all channels
    pub fn total_samples(&self) -> usize {
        self.lock()
            .channels
            .values()
            .flat_map(|segs| segs.iter())
            .map(|s| s.len())
            .sum()
    }
}

/// Fold one channel's segments into the minimal non-overlapping set
fn merge_channel(segments: &mut Vec<ChannelSegment>) {
    segments.retain(|s| !s.is_empty());
    if segments.len() < 2 {
        return;
    }
    segments.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.samples.len().cmp(&a.samples.len()))
    });

    let mut merged: Vec<ChannelSegment> = Vec::with_capacity(segments.len());
    for seg in segments.drain(..) {
        let Some(cur) = merged.last_mut() else {
            merged.push(seg);
            continue;
        };
        if !cur.rate_matches(&seg) {
            merged.push(seg);
            continue;
        }
        // Position of the incoming segment's first sample on the current
        // run's sample grid; >= 0 because of the sort.
        let pos_f = (seg.start_secs() - cur.start_secs()) * cur.sample_rate;
        if (pos_f - pos_f.round()).abs() > GRID_EPSILON {
            // Off the run's grid: keep it as its own segment, minus any
            // head samples that time-overlap the run, so downstream
            // windows stay time-sorted
            let cutoff = cur.end_secs() + 0.5 / cur.sample_rate;
            if let Some(tail) = seg.trim_from(cutoff) {
                merged.push(tail);
            }
            continue;
        }
        let pos = pos_f.round() as usize;
        if pos <= cur.samples.len() {
            let skip = cur.samples.len() - pos;
            if skip < seg.samples.len() {
                cur.samples.extend_from_slice(&seg.samples[skip..]);
            }
        } else {
            merged.push(seg);
        }
    }
    *segments = merged;
}

/// Trim one channel's segments to the trailing window ending at the
/// channel's latest sample
fn slice_channel(segments: &[ChannelSegment], window_secs: f64) -> Vec<ChannelSegment> {
    let latest = segments
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.end_secs())
        .fold(f64::NEG_INFINITY, f64::max);
    if !latest.is_finite() {
        return Vec::new();
    }
    let cutoff = latest - window_secs;
    let mut out: Vec<ChannelSegment> = segments
        .iter()
        .filter_map(|s| s.trim_from(cutoff))
        .collect();
    out.sort_by(|a, b| a.start.cmp(&b.start));
    out
}
