//! An in-memory `ConnectionFactory` and `ConnectionTester` for exercising
//! `aqueduct-pool` without a real driver.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aqueduct_core::ConnectionDefaults;
use aqueduct_pool::{ConnectionFactory, ConnectionTester};
use async_trait::async_trait;

/// A fake raw connection: an identity plus a mutable log of operations
/// performed against it, useful for asserting a guard's `DerefMut` reached
/// the right underlying value.
#[derive(Debug, Default)]
pub struct MockConnection {
    /// Monotonically assigned by [`MockFactory::create`].
    pub id: u32,
    /// Appended to by test code exercising the guard.
    pub log: Vec<&'static str>,
}

/// Failure injected by [`MockFactory::create`].
#[derive(Debug, thiserror::Error)]
#[error("mock factory failed to create connection #{attempt}")]
pub struct MockCreateError {
    attempt: u32,
}

/// A configurable in-memory [`ConnectionFactory`].
///
/// Build with [`MockFactory::new`], then chain `with_latency`/`fail_next_n`
/// before handing it to `Pool::new`.
pub struct MockFactory {
    next_id: AtomicU32,
    created: AtomicUsize,
    latency: Duration,
    remaining_failures: AtomicU32,
}

impl MockFactory {
    /// A factory that creates connections immediately and never fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(0),
            created: AtomicUsize::new(0),
            latency: Duration::ZERO,
            remaining_failures: AtomicU32::new(0),
        }
    }

    /// Sleep `latency` inside `create`, to simulate a slow dial.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The next `n` calls to `create` fail before any subsequent call
    /// succeeds again.
    #[must_use]
    pub fn fail_next_n(self, n: u32) -> Self {
        self.remaining_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Total number of connections successfully created so far.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;
    type Error = MockCreateError;

    async fn create(&self) -> Result<MockConnection, MockCreateError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        loop {
            let remaining = self.remaining_failures.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if self
                .remaining_failures
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(MockCreateError { attempt: id });
            }
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id,
            log: Vec::new(),
        })
    }

    async fn reset(
        &self,
        conn: &mut MockConnection,
        _defaults: &ConnectionDefaults,
    ) -> Result<(), MockCreateError> {
        conn.log.push("reset");
        Ok(())
    }
}

/// A [`ConnectionTester`] whose verdict is flipped by test code via
/// [`ManualTester::set_alive`], rather than inspecting the connection.
#[derive(Default)]
pub struct ManualTester {
    alive: Arc<AtomicBool>,
}

impl ManualTester {
    /// Build a tester that starts out reporting alive.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A cloneable handle for flipping this tester's verdict from outside
    /// the pool (e.g. from the test body while a pool task runs
    /// concurrently).
    #[must_use]
    pub fn handle(&self) -> ManualTesterHandle {
        ManualTesterHandle {
            alive: Arc::clone(&self.alive),
        }
    }

    /// Set whether subsequent `is_alive` calls report true or false.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }
}

/// A cloneable, `Send + Sync` handle for toggling a [`ManualTester`]'s
/// verdict from test code that does not own the tester itself.
#[derive(Clone)]
pub struct ManualTesterHandle {
    alive: Arc<AtomicBool>,
}

impl ManualTesterHandle {
    /// Set whether subsequent `is_alive` calls report true or false.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionTester<MockConnection> for ManualTester {
    async fn is_alive(&self, _connection: &mut MockConnection) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let factory = MockFactory::new();
        let a = factory.create().await.unwrap();
        let b = factory.create().await.unwrap();
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert_eq!(factory.created_count(), 2);
    }

    #[tokio::test]
    async fn fail_next_n_fails_exactly_that_many_times() {
        let factory = MockFactory::new().fail_next_n(2);
        assert!(factory.create().await.is_err());
        assert!(factory.create().await.is_err());
        assert!(factory.create().await.is_ok());
        assert_eq!(factory.created_count(), 1);
    }

    #[tokio::test]
    async fn manual_tester_reports_the_configured_verdict() {
        let tester = ManualTester::new();
        let mut conn = MockConnection::default();
        assert!(tester.is_alive(&mut conn).await);
        tester.set_alive(false);
        assert!(!tester.is_alive(&mut conn).await);
    }
}
