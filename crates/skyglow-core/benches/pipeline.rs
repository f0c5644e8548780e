//! Benchmarks for the skyglow reduction pipeline.
//!
//! Run with: cargo bench -p skyglow-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use skyglow_core::camera::CameraCache;
use skyglow_core::pipeline::{center_region, channel_stats, region_stats, slice_channels, Hasher};
use std::path::Path;

/// Sensor plane of an 18 MP APS-C camera with a deterministic pattern.
fn sensor_plane() -> Array2<u16> {
    Array2::from_shape_fn((3476, 5208), |(r, c)| ((r * 31 + c * 17) % 4096) as u16)
}

fn benchmark_content_hash(c: &mut Criterion) {
    let bytes = vec![0x5au8; 25 * 1024 * 1024];

    c.bench_function("content_hash_blake3_25mb", |b| {
        b.iter(|| Hasher::content_hash_from_bytes(black_box(&bytes)))
    });
}

fn benchmark_slice_channels(c: &mut Criterion) {
    let plane = sensor_plane();
    let geometry = CameraCache::new(Path::new("/nonexistent/cameras.toml"))
        .lookup("Canon EOS 550D")
        .unwrap();

    c.bench_function("slice_channels_18mp", |b| {
        b.iter(|| slice_channels(black_box(&plane), &geometry, Path::new("bench.CR2")))
    });
}

fn benchmark_region_stats(c: &mut Criterion) {
    let plane = sensor_plane();
    let geometry = CameraCache::new(Path::new("/nonexistent/cameras.toml"))
        .lookup("Canon EOS 550D")
        .unwrap();
    let planes = slice_channels(&plane, &geometry, Path::new("bench.CR2")).unwrap();
    let (rows, cols) = planes[0].dim();
    let roi = center_region(rows, cols, 500, 400);

    c.bench_function("region_stats_500x400", |b| {
        b.iter(|| region_stats(black_box(&planes[0]), black_box(&roi)))
    });

    c.bench_function("channel_stats_500x400", |b| {
        b.iter(|| channel_stats(black_box(&planes), black_box(&roi)))
    });
}

criterion_group!(
    benches,
    benchmark_content_hash,
    benchmark_slice_channels,
    benchmark_region_stats,
);
criterion_main!(benches);
