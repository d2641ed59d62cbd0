//! Liveness testing: the pluggable `is_alive` check.

use async_trait::async_trait;

/// A liveness check run against a raw connection before handing it to a
/// borrower.
///
/// Implementations must never panic and must report `false` rather than
/// propagate an error: a tester fault is logged
/// ([`aqueduct_core::PoolError::TesterFault`]) and treated as "not alive".
#[async_trait]
pub trait ConnectionTester<C>: Send + Sync {
    /// Probe `connection` for liveness, updating any internal bookkeeping
    /// the implementation needs (e.g. resetting a failure counter).
    async fn is_alive(&self, connection: &mut C) -> bool;

    /// Display name, for logging.
    fn name(&self) -> &'static str;
}

/// Uses a driver-native liveness call (e.g. a ping/validate method on the
/// connection type itself), chosen automatically at first successful
/// connection creation when the driver exposes one.
pub struct NativePing<F> {
    probe: F,
}

impl<F> NativePing<F> {
    /// Wrap a synchronous or already-async-flattened probe closure.
    pub const fn new(probe: F) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl<C, F> ConnectionTester<C> for NativePing<F>
where
    C: Send,
    F: Fn(&mut C) -> bool + Send + Sync,
{
    async fn is_alive(&self, connection: &mut C) -> bool {
        (self.probe)(connection)
    }

    fn name(&self) -> &'static str {
        "native_ping"
    }
}

/// Falls back to executing a configured test query on a short-lived
/// statement when the driver has no native liveness call.
///
/// `F` is supplied by the caller's driver integration: given a connection
/// and the configured probe query, run it and report success.
pub struct QueryProbe<F> {
    query: String,
    run: F,
}

impl<F> QueryProbe<F> {
    /// Build a query-based tester for the given probe SQL.
    pub fn new(query: impl Into<String>, run: F) -> Self {
        Self {
            query: query.into(),
            run,
        }
    }

    /// The configured probe query text.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl<C, F, Fut> ConnectionTester<C> for QueryProbe<F>
where
    C: Send,
    F: Fn(&mut C, &str) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = bool> + Send,
{
    async fn is_alive(&self, connection: &mut C) -> bool {
        (self.run)(connection, &self.query).await
    }

    fn name(&self) -> &'static str {
        "query_probe"
    }
}

/// A tester that always reports alive; the default when a pool is built
/// without a configured liveness check (liveness testing is then purely
/// advisory via `connection_test_interval` skip logic elsewhere).
#[derive(Default)]
pub struct AlwaysAlive;

#[async_trait]
impl<C: Send> ConnectionTester<C> for AlwaysAlive {
    async fn is_alive(&self, _connection: &mut C) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "always_alive"
    }
}
