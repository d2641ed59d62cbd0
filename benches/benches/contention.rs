//! Benchmarks focused on wait-queue pressure: many more callers than
//! available connections, forcing every acquire to suspend and be served
//! by a hand-off from `recycle`.
//!
//! Run with: `cargo bench --package aqueduct-benches --bench contention`

#![allow(missing_docs)]

use std::time::Duration;

use aqueduct_core::{PoolConfig, TransferMode};
use aqueduct_pool::Pool;
use aqueduct_testing::MockFactory;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn config(max_active: usize, mode: TransferMode) -> PoolConfig {
    PoolConfig::new()
        .max_active(max_active)
        .borrow_semaphore_size(max_active.max(1) * 8)
        .max_wait(Duration::from_secs(5))
        .initial_size(max_active)
        .fair_mode(matches!(mode, TransferMode::Fair))
}

async fn run_waves(pool: &std::sync::Arc<Pool<MockFactory>>, tasks: usize) {
    let mut handles = Vec::with_capacity(tasks);
    for _ in 0..tasks {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let guard = pool.acquire().await.unwrap();
            tokio::task::yield_now().await;
            drop(guard);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

/// A single connection serving an increasing crowd of waiters, under each
/// transfer policy, to compare hand-off throughput under heavy contention.
fn bench_single_connection_crowd(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("single_connection_crowd");

    for mode in [TransferMode::Compete, TransferMode::Fair] {
        let mode_name = match mode {
            TransferMode::Compete => "compete",
            TransferMode::Fair => "fair",
        };
        for waiters in [4usize, 16, 64] {
            group.throughput(Throughput::Elements(waiters as u64));
            group.bench_with_input(
                BenchmarkId::new(mode_name, waiters),
                &waiters,
                |b, &waiters| {
                    let pool = rt.block_on(async {
                        let pool = Pool::new(config(1, mode), MockFactory::new()).unwrap();
                        pool.init().await.unwrap();
                        pool
                    });

                    b.to_async(&rt).iter(|| {
                        let pool = pool.clone();
                        async move { run_waves(&pool, waiters).await }
                    });
                },
            );
        }
    }

    group.finish();
}

/// A small pool (`max_active` well below the caller count) under sustained
/// concurrent pressure, exercising admission-gate queuing as well as the
/// wait-queue hand-off.
fn bench_undersized_pool(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("undersized_pool");
    group.throughput(Throughput::Elements(1));

    for (max_active, callers) in [(4usize, 32usize), (8, 64)] {
        group.bench_with_input(
            BenchmarkId::new("max_active", max_active),
            &(max_active, callers),
            |b, &(max_active, callers)| {
                let pool = rt.block_on(async {
                    let pool = Pool::new(config(max_active, TransferMode::Compete), MockFactory::new())
                        .unwrap();
                    pool.init().await.unwrap();
                    pool
                });

                b.to_async(&rt).iter(|| {
                    let pool = pool.clone();
                    async move { run_waves(&pool, callers).await }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_connection_crowd,
    bench_undersized_pool,
);
criterion_main!(benches);
