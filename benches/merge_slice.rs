//! Benchmarks for store merge, slice and snapshot operations
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wavefeed::store::TimeSeriesStore;
use wavefeed::types::{ChannelId, ChannelSegment};

const RATE: f64 = 100.0;
const SEG_LEN: usize = 512;

fn segment(index: usize) -> ChannelSegment {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let first = index * SEG_LEN;
    let start = t0 + chrono::Duration::nanoseconds((first as f64 / RATE * 1e9).round() as i64);
    ChannelSegment::new(start, RATE, (0..SEG_LEN).map(|i| (first + i) as f64).collect())
}

/// Store with `segments` unmerged appends per channel, a third of them
/// duplicated to force overlap resolution
fn populated_store(channels: usize, segments: usize) -> (TimeSeriesStore, Vec<ChannelId>) {
    let store = TimeSeriesStore::new();
    let ids: Vec<ChannelId> = (0..channels)
        .map(|i| ChannelId::new("XX", format!("S{:02}", i), "", "BHZ"))
        .collect();
    for id in &ids {
        for j in 0..segments {
            store.append(id.clone(), segment(j));
            if j % 3 == 0 {
                store.append(id.clone(), segment(j));
            }
        }
    }
    (store, ids)
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for &segments in [64, 256, 1024].iter() {
        group.throughput(Throughput::Elements((segments * SEG_LEN) as u64));
        group.bench_with_input(
            BenchmarkId::new("single_channel", segments),
            &segments,
            |b, &segments| {
                b.iter_batched(
                    || populated_store(1, segments).0,
                    |store| store.merge(),
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_slice(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice");

    let (store, ids) = populated_store(1, 1024);
    store.merge();
    for &window in [10.0, 120.0, 3600.0].iter() {
        group.bench_with_input(
            BenchmarkId::new("window_secs", window as u64),
            &window,
            |b, &window| {
                b.iter(|| black_box(store.slice(&ids[0], window)));
            },
        );
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for &channels in [1, 8, 32].iter() {
        group.throughput(Throughput::Elements(channels as u64));
        group.bench_with_input(
            BenchmarkId::new("channels", channels),
            &channels,
            |b, &channels| {
                let (store, ids) = populated_store(channels, 256);
                store.merge();
                b.iter(|| black_box(store.snapshot(120.0, &ids)));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_merge, bench_slice, bench_snapshot);
criterion_main!(benches);
