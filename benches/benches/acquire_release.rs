//! Benchmarks for the uncontended and lightly-contended acquire/release
//! path.
//!
//! Run with: `cargo bench --package aqueduct-benches --bench acquire_release`

#![allow(missing_docs)]

use std::time::Duration;

use aqueduct_core::PoolConfig;
use aqueduct_pool::Pool;
use aqueduct_testing::MockFactory;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn config(max_active: usize) -> PoolConfig {
    PoolConfig::new()
        .max_active(max_active)
        .borrow_semaphore_size(max_active.max(1) * 4)
        .max_wait(Duration::from_secs(5))
        .initial_size(max_active)
}

/// A single caller repeatedly acquiring and immediately releasing the one
/// connection a size-1 pool has: the pure hand-off hot path.
fn bench_uncontended_acquire_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("uncontended_acquire_release");
    group.throughput(Throughput::Elements(1));

    group.bench_function("single_connection", |b| {
        let pool = rt.block_on(async {
            let pool = Pool::new(config(1), MockFactory::new()).unwrap();
            pool.init().await.unwrap();
            pool
        });

        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let guard = pool.acquire().await.unwrap();
                drop(guard);
            }
        });
    });

    group.finish();
}

/// Several concurrent tasks sharing a pool whose `max_active` is smaller
/// than the task count, forcing every acquire through the wait queue.
fn bench_contended_acquire_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("contended_acquire_release");

    for concurrency in [2usize, 8, 32] {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_with_input(
            BenchmarkId::new("tasks", concurrency),
            &concurrency,
            |b, &concurrency| {
                let pool = rt.block_on(async {
                    let pool = Pool::new(config(concurrency / 2), MockFactory::new()).unwrap();
                    pool.init().await.unwrap();
                    pool
                });

                b.to_async(&rt).iter(|| {
                    let pool = pool.clone();
                    async move {
                        let mut handles = Vec::with_capacity(concurrency);
                        for _ in 0..concurrency {
                            let pool = pool.clone();
                            handles.push(tokio::spawn(async move {
                                let guard = pool.acquire().await.unwrap();
                                drop(guard);
                            }));
                        }
                        for handle in handles {
                            handle.await.unwrap();
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_acquire_release,
    bench_contended_acquire_release,
);
criterion_main!(benches);
