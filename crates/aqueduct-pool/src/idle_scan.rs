//! The idle-scan worker: periodic eviction of idle, overheld, and closed
//! entries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::ConnState;
use crate::factory::ConnectionFactory;
use crate::pool::Pool;

/// A handle to the spawned idle-scan task.
pub struct IdleScanHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl IdleScanHandle {
    /// Spawn the idle-scan loop for `pool` on the ambient Tokio runtime.
    pub fn spawn<F: ConnectionFactory + 'static>(pool: Arc<Pool<F>>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_task = Arc::clone(&stop);
        let task = tokio::spawn(async move {
            run(pool, stop_for_task).await;
        });
        Self { stop, task }
    }

    /// Signal the worker to exit on its next tick.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.task.abort();
    }
}

async fn run<F: ConnectionFactory + 'static>(pool: Arc<Pool<F>>, stop: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(pool.config().idle_check_time_interval);
    // The first tick fires immediately; skip it so `init`'s warm-up
    // connections get at least one full interval before being eligible.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if stop.load(Ordering::Acquire) {
            return;
        }
        sweep(&pool).await;
    }
}

async fn sweep<F: ConnectionFactory + 'static>(pool: &Arc<Pool<F>>) {
    let config = pool.config();
    let snapshot = pool.snapshot();
    let mut evicted_idle = 0usize;
    let mut evicted_overheld = 0usize;

    for conn in snapshot.iter() {
        match conn.state() {
            ConnState::Idle if conn.is_idle(config.idle_timeout) => {
                if pool.exist_borrower() {
                    // A caller is actively inside admission right now;
                    // don't churn idle supply out from under it.
                } else if conn.try_claim() {
                    // Claimed so nothing else can hand it off mid-removal.
                    pool.remove_pooled_conn(conn, "idle_timeout").await;
                    pool.record_idle_eviction();
                    evicted_idle += 1;
                }
            }
            ConnState::Using if conn.is_overheld(config.hold_timeout) => {
                // The borrower's guard still references this entry; its
                // eventual `Drop` will see `Closed` and no-op in
                // `Pool::recycle` rather than resurrecting it.
                pool.remove_pooled_conn(conn, "hold_timeout").await;
                pool.record_idle_eviction();
                evicted_overheld += 1;
            }
            _ => {}
        }
    }

    pool.sweep_closed();

    if evicted_idle > 0 || evicted_overheld > 0 {
        debug!(evicted_idle, evicted_overheld, "idle-scan eviction pass");
    }
    let stats = pool.stats();
    debug!(idle = stats.idle, using = stats.using, total = stats.total, "idle-scan occupancy");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ConnectionFactory;
    use aqueduct_core::PoolConfig;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingFactory;

    #[derive(Debug, thiserror::Error)]
    #[error("create failed")]
    struct Never;

    #[async_trait]
    impl ConnectionFactory for CountingFactory {
        type Connection = u32;
        type Error = Never;

        async fn create(&self) -> Result<u32, Never> {
            Ok(0)
        }
    }

    fn config() -> PoolConfig {
        PoolConfig::new()
            .max_active(2)
            .borrow_semaphore_size(2)
            .idle_timeout(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn idle_entries_are_evicted_once_past_idle_timeout() {
        let pool = Pool::new(config(), CountingFactory).unwrap();
        pool.init().await.unwrap();
        let guard = pool.acquire().await.unwrap();
        drop(guard);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        sweep(&pool).await;

        assert_eq!(pool.stats().total, 0, "the idle entry should have been evicted");
    }

    #[tokio::test]
    async fn idle_eviction_is_suppressed_while_a_borrower_is_active() {
        let pool = Pool::new(config(), CountingFactory).unwrap();
        pool.init().await.unwrap();
        let guard = pool.acquire().await.unwrap();
        drop(guard);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let _admission_guard = pool
            .admission_for_test()
            .acquire(Duration::from_millis(50))
            .await
            .unwrap();

        sweep(&pool).await;

        assert_eq!(pool.stats().total, 1, "a held permit must suppress idle eviction");
    }
}
