//! The servant worker: a background task that keeps the idle supply ahead
//! of waiters without making any single `acquire` caller pay for creation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::factory::ConnectionFactory;
use crate::pool::Pool;

/// A handle to the spawned servant task. Dropping it does not stop the
/// task; call [`ServantHandle::stop`] explicitly (done by `Pool::close`).
pub struct ServantHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ServantHandle {
    /// Spawn the servant loop for `pool` on the ambient Tokio runtime.
    pub fn spawn<F: ConnectionFactory + 'static>(pool: Arc<Pool<F>>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_task = Arc::clone(&stop);
        let task = tokio::spawn(async move {
            run(pool, stop_for_task).await;
        });
        Self { stop, task }
    }

    /// Signal the servant to exit after its current wakeup. Does not block
    /// on the task actually finishing.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.task.abort();
    }
}

/// Loops between `Waiting` (suspended on the pool's servant event) and
/// `Working` (draining queued creation/scan attempts), exiting once
/// `stop` is set. There is no dedicated thread pool: this is one task on
/// the ambient runtime, matching every other background worker here.
async fn run<F: ConnectionFactory + 'static>(pool: Arc<Pool<F>>, stop: Arc<AtomicBool>) {
    loop {
        if stop.load(Ordering::Acquire) {
            trace!("servant exiting");
            return;
        }

        if pool.take_servant_try() {
            pool.servant_attempt().await;
            // Keep draining while there's queued work; bounded by
            // `take_servant_try` returning `false` once the counter hits
            // zero, so this never spins unboundedly past real demand.
            continue;
        }

        let listener = pool.servant_event().listen();
        // Re-check after registering the listener: a `poke_servant` call
        // between the `take_servant_try` miss above and this listen must
        // not be lost.
        if pool.take_servant_try() {
            pool.servant_attempt().await;
            continue;
        }
        listener.await;
    }
}
