//! Microbenchmarks for the signal write path.
//!
//! Measures per-record latency including the amortized cost of chunk
//! flushes and dataset growth.
//!
//! Run with: `cargo bench -p simdump -- write`

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use simdump::{Container, ContainerConfig, ElementType, SignalHandle, StorageKind};
use tempfile::tempdir;

/// Opens a container with `count` i64 signals of `kind` and shape `dims`.
fn setup_container(
    count: usize,
    kind: StorageKind,
    dims: &[usize],
) -> (Container, Vec<SignalHandle>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut container =
        Container::open(temp_dir.path().join("bench_dump"), ContainerConfig::default()).unwrap();

    let handles = (0..count)
        .map(|i| {
            container
                .add_signal(&format!("bench.u{i}.data"), kind, dims, ElementType::I64)
                .unwrap()
        })
        .collect();

    (container, handles, temp_dir)
}

fn bench_write_scalar(c: &mut Criterion) {
    let (mut container, handles, _dir) = setup_container(1, StorageKind::Sync, &[]);
    let handle = handles[0];
    let mut value = 0i64;

    c.bench_function("write/sync_scalar", |b| {
        b.iter(|| {
            value += 1;
            container
                .write_values(black_box(handle), 0.0, black_box(&[value]))
                .unwrap();
        });
    });

    container.close().unwrap();
}

fn bench_write_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("write/sync_flat_size");

    for flat in [6usize, 64, 512, 2048] {
        let (mut container, handles, _dir) = setup_container(1, StorageKind::Sync, &[flat]);
        let handle = handles[0];
        let payload = vec![0u8; flat * 8];

        group.throughput(Throughput::Bytes((flat * 8) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(flat), &flat, |b, _| {
            b.iter(|| {
                container
                    .write(black_box(handle), 0.0, black_box(&payload))
                    .unwrap();
            });
        });

        container.close().unwrap();
    }

    group.finish();
}

fn bench_write_async_signals(c: &mut Criterion) {
    let mut group = c.benchmark_group("write/async_signal_count");

    for count in [1usize, 10, 100] {
        let (mut container, handles, _dir) = setup_container(count, StorageKind::Async, &[2, 3]);
        let mut time = 0.0f64;

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                time += 1e-9;
                for handle in &handles {
                    container
                        .write_values(black_box(*handle), black_box(time), &[1i64, 2, 3, 4, 5, 6])
                        .unwrap();
                }
            });
        });

        container.close().unwrap();
    }

    group.finish();
}

fn bench_write_sim_time(c: &mut Criterion) {
    let (mut container, handles, _dir) = setup_container(1, StorageKind::SimTime, &[]);
    let handle = handles[0];
    let mut ns = 0i64;

    c.bench_function("write/sim_time", |b| {
        b.iter(|| {
            ns += 10;
            container
                .write_time(black_box(handle), black_box(ns), 0.5)
                .unwrap();
        });
    });

    container.close().unwrap();
}

criterion_group!(
    benches,
    bench_write_scalar,
    bench_write_array,
    bench_write_async_signals,
    bench_write_sim_time
);
criterion_main!(benches);
