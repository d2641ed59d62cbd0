//! Async testing utilities: timeout wrappers and coordination primitives.

use std::future::Future;
use std::time::Duration;

/// Default timeout for async operations in tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async function with a timeout.
///
/// # Panics
///
/// Panics if the future does not complete within the timeout.
pub async fn with_timeout<T, F>(timeout: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("test timed out")
}

/// Run an async function with [`DEFAULT_TIMEOUT`].
pub async fn with_default_timeout<T, F>(future: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout(DEFAULT_TIMEOUT, future).await
}

/// Assert that an async operation times out.
///
/// # Panics
///
/// Panics if the future completes before the timeout.
pub async fn assert_times_out<T, F>(timeout: Duration, future: F)
where
    F: Future<Output = T>,
{
    let result = tokio::time::timeout(timeout, future).await;
    assert!(
        result.is_err(),
        "expected operation to time out, but it completed"
    );
}

/// Poll a condition until it becomes true or the timeout elapses.
///
/// # Panics
///
/// Panics if the condition is not met within the timeout.
pub async fn wait_for<F>(timeout: Duration, interval: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while !condition() {
        assert!(start.elapsed() <= timeout, "condition not met within timeout");
        tokio::time::sleep(interval).await;
    }
}

/// A reusable rendezvous point for `target` concurrent tasks.
#[derive(Debug)]
pub struct TestBarrier {
    notify: tokio::sync::Notify,
    count: std::sync::atomic::AtomicUsize,
    target: usize,
}

impl TestBarrier {
    /// Build a barrier that releases once `target` parties have arrived.
    #[must_use]
    pub fn new(target: usize) -> Self {
        Self {
            notify: tokio::sync::Notify::new(),
            count: std::sync::atomic::AtomicUsize::new(0),
            target,
        }
    }

    /// Arrive and wait for every other party.
    pub async fn arrive_and_wait(&self) {
        let count = self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        if count >= self.target {
            self.notify.notify_waiters();
        } else {
            self.notify.notified().await;
        }
    }

    /// Reset the arrival count for reuse.
    pub fn reset(&self) {
        self.count.store(0, std::sync::atomic::Ordering::SeqCst);
    }
}

/// A one-shot latch, triggerable once and awaitable any number of times.
#[derive(Debug, Default)]
pub struct TestLatch {
    notify: tokio::sync::Notify,
    triggered: std::sync::atomic::AtomicBool,
}

impl TestLatch {
    /// Build an untriggered latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the latch, waking every waiter.
    pub fn trigger(&self) {
        self.triggered.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Wait for the latch to be triggered.
    pub async fn wait(&self) {
        if self.triggered.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        self.notify.notified().await;
    }

    /// Wait for the latch, bounded by `timeout`. Returns `true` if it was
    /// triggered in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.triggered.load(std::sync::atomic::Ordering::SeqCst) {
            return true;
        }
        tokio::time::timeout(timeout, self.notify.notified()).await.is_ok()
    }

    /// `true` if the latch has already been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_returns_the_value() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result, 42);
    }

    #[tokio::test]
    #[should_panic(expected = "timed out")]
    async fn with_timeout_panics_past_the_deadline() {
        with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .await;
    }

    #[tokio::test]
    async fn test_barrier_releases_once_every_party_arrives() {
        let barrier = std::sync::Arc::new(TestBarrier::new(2));
        let other = std::sync::Arc::clone(&barrier);
        let handle = tokio::spawn(async move {
            other.arrive_and_wait().await;
            "done"
        });
        barrier.arrive_and_wait().await;
        assert_eq!(handle.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_latch_wait_returns_immediately_once_triggered() {
        let latch = TestLatch::new();
        assert!(!latch.is_triggered());
        latch.trigger();
        latch.wait().await;
        assert!(latch.is_triggered());
    }
}
