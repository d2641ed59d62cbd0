//! The pool core: orchestrates C1-C7 through `acquire`/`recycle` and the
//! `init`/`clear`/`close` lifecycle.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aqueduct_core::{ConnectionDefaults, PoolConfig, PoolError, PoolStats};
use async_lock::Mutex as AsyncMutex;
use event_listener::Event;
use tracing::{debug, info, warn};

use rand::Rng;

use crate::admission::Admission;
use crate::borrower::{thread_borrower, Borrower, BorrowerError, BorrowerState};
use crate::connection::{ConnState, PooledConnection};
use crate::factory::ConnectionFactory;
use crate::guard::PooledConnectionGuard;
use crate::idle_scan::IdleScanHandle;
use crate::policy::{self, TransferPolicy};
use crate::servant::ServantHandle;
use crate::snapshot::ConnArray;
use crate::tester::{AlwaysAlive, ConnectionTester};
use crate::wait_queue::WaitQueue;

/// Lifecycle state of the pool itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    /// Constructed but not yet `init`-ed.
    Uninit = 0,
    /// Accepting borrows.
    Normal = 1,
    /// Mid-`clear`: rejecting new `acquire` calls while `Using` entries
    /// drain, but will return to `Normal`.
    Clearing = 2,
    /// Terminal: no further borrows will ever succeed.
    Closed = 3,
}

impl PoolState {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Uninit,
            1 => Self::Normal,
            2 => Self::Clearing,
            _ => Self::Closed,
        }
    }
}

struct Stats {
    created: AtomicU64,
    closed: AtomicU64,
    acquires: AtomicU64,
    timeouts: AtomicU64,
    evicted_idle: AtomicU64,
    evicted_unhealthy: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            created: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            acquires: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            evicted_idle: AtomicU64::new(0),
            evicted_unhealthy: AtomicU64::new(0),
        }
    }
}

/// Jittered so many waiters racing toward the same deadline don't all
/// spin in lockstep once they fall below it.
const SPIN_THRESHOLD_NANOS: std::ops::Range<u64> = 500..1_500;

/// Covers one `acquire` call's time enlisted on the wait queue. Its `Drop`
/// abandons the borrower if the caller never caught a hand-off — whether
/// via an explicit timeout or the `acquire` future itself being dropped
/// while suspended — so a later `recycle` can never publish a connection
/// into a slot nobody is listening to. If a hand-off had already landed in
/// the race against that abandonment, it is routed to the next eligible
/// waiter instead of being silently discarded.
struct EnlistGuard<F: ConnectionFactory> {
    pool: Arc<Pool<F>>,
    borrower: Arc<Borrower<F::Connection>>,
}

impl<F: ConnectionFactory + 'static> Drop for EnlistGuard<F> {
    fn drop(&mut self) {
        if self.borrower.abandon() {
            return;
        }
        match self.borrower.take() {
            BorrowerState::Connection(conn) => self.pool.recycle(&conn),
            BorrowerState::Error(_)
            | BorrowerState::Normal
            | BorrowerState::Waiting
            | BorrowerState::Abandoned => {}
        }
    }
}

/// A high-throughput, lock-free-within-the-bounds-of-safe-Rust database
/// connection pool.
///
/// `F` is the external [`ConnectionFactory`] that actually opens raw
/// connections; everything else (borrow/return hand-off, admission,
/// health checking, idle eviction) is owned here.
pub struct Pool<F: ConnectionFactory> {
    config: PoolConfig,
    defaults: ConnectionDefaults,
    factory: F,
    state: AtomicU8,
    array: ConnArray<F::Connection>,
    wait_queue: WaitQueue<F::Connection>,
    admission: Admission,
    policy: Arc<dyn TransferPolicy<F::Connection>>,
    tester: Arc<dyn ConnectionTester<F::Connection>>,
    next_id: AtomicU64,
    creation_lock: AsyncMutex<()>,
    servant_try_count: AtomicUsize,
    servant_event: Event,
    stats: Stats,
    servant: std::sync::OnceLock<ServantHandle>,
    idle_scan: std::sync::OnceLock<IdleScanHandle>,
}

impl<F: ConnectionFactory + 'static> Pool<F> {
    /// Build a pool with the default (`always alive`) tester and the
    /// configured [`aqueduct_core::TransferMode`]'s policy. Call
    /// [`Pool::init`] before use.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigInvalid`] if `config` fails validation.
    pub fn new(config: PoolConfig, factory: F) -> Result<Arc<Self>, PoolError> {
        Self::with_tester(config, factory, Arc::new(AlwaysAlive))
    }

    /// Build a pool with an explicit liveness tester.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigInvalid`] if `config` fails validation.
    pub fn with_tester(
        config: PoolConfig,
        factory: F,
        tester: Arc<dyn ConnectionTester<F::Connection>>,
    ) -> Result<Arc<Self>, PoolError> {
        config.validate()?;
        let admission = Admission::new(config.borrow_semaphore_size);
        let policy = policy::from_mode(config.transfer_mode);
        let defaults = ConnectionDefaults::from(&config);
        let pool = Arc::new(Self {
            config,
            defaults,
            factory,
            state: AtomicU8::new(PoolState::Uninit as u8),
            array: ConnArray::default(),
            wait_queue: WaitQueue::default(),
            admission,
            policy,
            tester,
            next_id: AtomicU64::new(1),
            creation_lock: AsyncMutex::new(()),
            servant_try_count: AtomicUsize::new(0),
            servant_event: Event::new(),
            stats: Stats::default(),
            servant: std::sync::OnceLock::new(),
            idle_scan: std::sync::OnceLock::new(),
        });
        Ok(pool)
    }

    /// Move the pool into `Normal`, eagerly create `initial_size`
    /// connections, and start the servant and idle-scan background tasks.
    ///
    /// # Errors
    ///
    /// Propagates the first [`PoolError::CreateFailed`] hit while warming
    /// up, if any.
    pub async fn init(self: &Arc<Self>) -> Result<(), PoolError> {
        self.state.store(PoolState::Normal as u8, Ordering::Release);

        for _ in 0..self.config.initial_size {
            self.create_pooled_conn_idle().await?;
        }

        let _ = self
            .servant
            .set(ServantHandle::spawn(Arc::clone(self)));
        let _ = self
            .idle_scan
            .set(IdleScanHandle::spawn(Arc::clone(self)));

        info!(
            initial_size = self.config.initial_size,
            max_active = self.config.max_active,
            policy = self.policy.name(),
            "pool initialized"
        );
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn pool_state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The configuration this pool was built with.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// A snapshot of pool occupancy and lifetime counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let snapshot = self.array.load();
        let (mut idle, mut using) = (0usize, 0usize);
        for c in snapshot.iter() {
            match c.state() {
                ConnState::Idle => idle += 1,
                ConnState::Using => using += 1,
                ConnState::Closed => {}
            }
        }
        PoolStats {
            idle,
            using,
            total: idle + using,
            waiters: self.wait_queue.len(),
            created: self.stats.created.load(Ordering::Relaxed),
            closed: self.stats.closed.load(Ordering::Relaxed),
            acquires: self.stats.acquires.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
            evicted_idle: self.stats.evicted_idle.load(Ordering::Relaxed),
            evicted_unhealthy: self.stats.evicted_unhealthy.load(Ordering::Relaxed),
        }
    }

    // ------------------------------------------------------------------
    // acquire
    // ------------------------------------------------------------------

    /// Borrow a connection, waiting at most `config.max_wait` total across
    /// admission and hand-off.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PoolClosed`] if the pool is not `Normal`.
    /// - [`PoolError::RequestTimeout`] if no connection became available in time.
    /// - [`PoolError::CreateFailed`] if a scheduled creation failed and was
    ///   routed to this caller.
    ///
    /// If the returned future itself is dropped while suspended, it produces
    /// no `Result` at all (ordinary Rust cancellation semantics) rather than
    /// `RequestInterrupt`; any enlisted wait-queue entry is cleaned up
    /// regardless, so a connection published into it afterward is routed to
    /// the next waiter instead of being stranded.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnectionGuard<F>, PoolError> {
        let deadline = Instant::now() + self.config.max_wait;

        if self.pool_state() != PoolState::Normal {
            return Err(PoolError::PoolClosed);
        }

        // Fast path: the calling thread's cached hint, scoped to this pool.
        let pool_key = Arc::as_ptr(self) as usize;
        let borrower = thread_borrower::<F::Connection>(pool_key);
        if let Some(hint) = borrower.cached_hint() {
            if hint.state() != ConnState::Closed && hint.try_claim() {
                if self.test_on_borrow(&hint).await {
                    self.stats.acquires.fetch_add(1, Ordering::Relaxed);
                    return Ok(PooledConnectionGuard::new(Arc::clone(self), hint));
                }
                // Tester rejected it; it was already removed by
                // `test_on_borrow`. Fall through to the slow path.
            }
            borrower.clear_hint();
        }

        let _permit = self
            .admission
            .acquire(deadline.saturating_duration_since(Instant::now()))
            .await?;

        if self.pool_state() != PoolState::Normal {
            return Err(PoolError::PoolClosed);
        }

        // Scan-or-create.
        if let Some(conn) = self.scan_idle().await {
            self.stats.acquires.fetch_add(1, Ordering::Relaxed);
            borrower.remember(Arc::clone(&conn));
            return Ok(PooledConnectionGuard::new(Arc::clone(self), conn));
        }

        if self.array.len() < self.config.max_active {
            if let Some(conn) = self.create_pooled_conn_using().await? {
                self.stats.acquires.fetch_add(1, Ordering::Relaxed);
                borrower.remember(Arc::clone(&conn));
                return Ok(PooledConnectionGuard::new(Arc::clone(self), conn));
            }
        }

        // Enlist.
        borrower.reset_to_normal();
        self.wait_queue.offer(Arc::clone(&borrower));
        self.poke_servant();
        let _enlist_guard = EnlistGuard {
            pool: Arc::clone(self),
            borrower: Arc::clone(&borrower),
        };

        loop {
            if borrower.has_handoff() {
                match borrower.take() {
                    BorrowerState::Connection(conn) => {
                        if self.policy.try_catch(&conn) {
                            if self.test_on_borrow(&conn).await {
                                self.stats.acquires.fetch_add(1, Ordering::Relaxed);
                                borrower.remember(Arc::clone(&conn));
                                return Ok(PooledConnectionGuard::new(Arc::clone(self), conn));
                            }
                        }
                        // Lost the race or failed the test: go around again.
                        borrower.reset_to_normal();
                        self.wait_queue.offer(Arc::clone(&borrower));
                        self.poke_servant();
                        continue;
                    }
                    BorrowerState::Error(err) => {
                        return Err(err.into());
                    }
                    BorrowerState::Normal | BorrowerState::Waiting | BorrowerState::Abandoned => {
                        unreachable!("has_handoff() only returns true for Connection/Error")
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let spin_threshold =
                Duration::from_nanos(rand::thread_rng().gen_range(SPIN_THRESHOLD_NANOS));

            if remaining <= spin_threshold {
                // Close enough to the deadline that registering a waker and
                // parking on it would cost more than the remaining budget
                // itself; busy-poll the atomic instead.
                let spin_deadline = Instant::now() + remaining;
                while Instant::now() < spin_deadline {
                    if borrower.has_handoff() {
                        break;
                    }
                    std::hint::spin_loop();
                }
                if !borrower.has_handoff() {
                    self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::RequestTimeout {
                        operation: "acquire",
                        waited: self.config.max_wait,
                    });
                }
                continue;
            }

            // Register the listener before checking `try_begin_waiting` so
            // no wakeup between the check and the listen is lost.
            let listener = borrower.listen();
            if borrower.try_begin_waiting() {
                let _ = tokio::time::timeout(remaining, listener).await;
            }
            // Whether woken, raced past by a publish, or timed out: loop
            // back around and re-check `has_handoff`/the deadline.
        }
    }

    /// Scan the snapshot array for an `Idle` entry this caller can claim
    /// and that passes its liveness/idle/lifetime checks.
    async fn scan_idle(&self) -> Option<Arc<PooledConnection<F::Connection>>> {
        let snapshot = self.array.load();
        for conn in snapshot.iter() {
            if conn.state() != ConnState::Idle {
                continue;
            }
            if !conn.try_claim() {
                continue;
            }
            if self.test_on_borrow(conn).await {
                return Some(Arc::clone(conn));
            }
            // test_on_borrow already removed it on failure.
        }
        None
    }

    /// Apply the borrow-time liveness policy: skip the probe if recently
    /// touched, else run the tester and remove the entry on failure.
    async fn test_on_borrow(&self, conn: &Arc<PooledConnection<F::Connection>>) -> bool {
        if !conn.is_idle(self.config.connection_test_interval) {
            conn.touch();
            return true;
        }
        let ok = self.run_tester(conn).await;
        if ok {
            conn.touch();
            true
        } else {
            self.stats.evicted_unhealthy.fetch_add(1, Ordering::Relaxed);
            self.remove_pooled_conn(conn, "failed_liveness_test").await;
            self.poke_servant();
            false
        }
    }

    async fn run_tester(&self, conn: &Arc<PooledConnection<F::Connection>>) -> bool {
        let Some(mut raw) = conn.take_raw() else {
            return false;
        };
        let alive = self.tester.is_alive(&mut raw).await;
        conn.put_raw(raw);
        alive
    }

    /// Nudge the servant to attempt a scan-or-create, capping `try_count`
    /// at `max_active` so a burst of starved waiters can't amplify into an
    /// unbounded number of queued wake attempts.
    fn poke_servant(&self) {
        loop {
            let current = self.servant_try_count.load(Ordering::Acquire);
            if current >= self.config.max_active {
                return;
            }
            if self
                .servant_try_count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if current == 0 {
                    self.servant_event.notify(1);
                }
                return;
            }
        }
    }

    pub(crate) fn servant_event(&self) -> &Event {
        &self.servant_event
    }

    pub(crate) fn take_servant_try(&self) -> bool {
        loop {
            let current = self.servant_try_count.load(Ordering::Acquire);
            if current == 0 {
                return false;
            }
            if self
                .servant_try_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Servant-driven scan-or-create attempt: find or make a connection
    /// and hand it off via [`Pool::recycle`].
    pub(crate) async fn servant_attempt(self: &Arc<Self>) {
        if self.pool_state() != PoolState::Normal {
            return;
        }
        if let Some(conn) = self.scan_idle().await {
            self.recycle(&conn);
            return;
        }
        if self.array.len() < self.config.max_active {
            match self.create_pooled_conn_idle().await {
                Ok(Some(conn)) => self.recycle(&conn),
                Ok(None) => {}
                Err(err) => self.transfer_exception(err),
            }
        }
    }

    // ------------------------------------------------------------------
    // return path
    // ------------------------------------------------------------------

    /// Return a connection to the pool. Synchronous and non-blocking so a
    /// guard's `Drop` can call it directly.
    pub(crate) fn recycle(&self, conn: &Arc<PooledConnection<F::Connection>>) {
        if conn.state() == ConnState::Closed {
            // The idle-scan worker force-closed this entry out from under
            // its borrower (hold-timeout eviction); nothing to hand off.
            return;
        }
        self.policy.before_transfer(conn);

        while let Some(borrower) = self.wait_queue.poll() {
            if conn.state() != self.policy.check_state_code() {
                // Someone else already reclaimed it.
                return;
            }
            if borrower.try_publish(BorrowerState::Connection(Arc::clone(conn))) {
                return;
            }
            // `borrower` already had a pending hand-off (shouldn't happen
            // for an enlisted entry, but walkers must tolerate it):
            // discard and keep walking per the "skip ineligible" contract.
        }

        self.policy.on_failed_transfer(conn);
        self.poke_servant();
    }

    /// Invoked by the guard layer when a broken connection is detected on
    /// return: removes the entry instead of recycling it.
    pub(crate) fn abandon_on_return(self: &Arc<Self>, conn: &Arc<PooledConnection<F::Connection>>) {
        let pool = Arc::clone(self);
        let conn = Arc::clone(conn);
        tokio::spawn(async move {
            pool.remove_pooled_conn(&conn, "abandoned").await;
            pool.poke_servant();
        });
    }

    /// Restore [`ConnectionDefaults`] on a returning raw connection, then
    /// recycle it. Spawned from the guard's `Drop` since
    /// [`ConnectionFactory::reset`] is async; a failed reset removes the
    /// connection instead, the same as a failed liveness test.
    pub(crate) fn reset_and_recycle(
        self: &Arc<Self>,
        conn: Arc<PooledConnection<F::Connection>>,
        mut raw: F::Connection,
    ) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            match pool.factory.reset(&mut raw, &pool.defaults).await {
                Ok(()) => {
                    conn.put_raw(raw);
                    pool.recycle(&conn);
                }
                Err(err) => {
                    warn!(id = conn.id(), error = %err, "connection reset failed on return; removing");
                    conn.put_raw(raw);
                    pool.remove_pooled_conn(&conn, "reset_failed").await;
                    pool.stats.evicted_unhealthy.fetch_add(1, Ordering::Relaxed);
                    pool.poke_servant();
                }
            }
        });
    }

    /// Publish a failure to the first eligible waiter, used when a
    /// scheduled background creation fails.
    fn transfer_exception(&self, err: PoolError) {
        let borrower_err = match err {
            PoolError::PoolClosed => BorrowerError::PoolClosed,
            other => BorrowerError::CreateFailed(other.to_string()),
        };
        while let Some(borrower) = self.wait_queue.poll() {
            if borrower.try_publish(BorrowerState::Error(borrower_err.clone())) {
                return;
            }
        }
        warn!("no waiter to receive scheduled-creation failure; dropping it");
    }

    // ------------------------------------------------------------------
    // creation / removal
    // ------------------------------------------------------------------

    async fn create_pooled_conn_using(
        &self,
    ) -> Result<Option<Arc<PooledConnection<F::Connection>>>, PoolError> {
        let _guard = self.creation_lock.lock().await;
        if self.array.len() >= self.config.max_active {
            return Ok(None);
        }
        let raw = self
            .factory
            .create()
            .await
            .map_err(PoolError::create_failed)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::new(PooledConnection::new_using(raw, id));
        self.array.push(Arc::clone(&conn));
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        debug!(id, "created connection (using)");
        Ok(Some(conn))
    }

    async fn create_pooled_conn_idle(
        &self,
    ) -> Result<Option<Arc<PooledConnection<F::Connection>>>, PoolError> {
        match self.create_pooled_conn_using().await? {
            Some(conn) => {
                conn.free_to_idle();
                Ok(Some(conn))
            }
            None => Ok(None),
        }
    }

    /// Remove an entry from the array, releasing its raw handle. Close
    /// errors from the driver are swallowed and logged, matching the
    /// spec's error-propagation rules for removal.
    pub(crate) async fn remove_pooled_conn(
        &self,
        conn: &Arc<PooledConnection<F::Connection>>,
        reason: &'static str,
    ) {
        conn.mark_closed();
        self.array.remove(conn.id());
        self.stats.closed.fetch_add(1, Ordering::Relaxed);
        debug!(id = conn.id(), reason, "removed connection");
    }

    // ------------------------------------------------------------------
    // idle-scan support
    // ------------------------------------------------------------------

    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<PooledConnection<F::Connection>>>> {
        self.array.load()
    }

    pub(crate) fn sweep_closed(&self) {
        self.array.sweep_closed();
    }

    pub(crate) fn record_idle_eviction(&self) {
        self.stats.evicted_idle.fetch_add(1, Ordering::Relaxed);
    }

    /// `true` if a caller currently holds an admission permit. Idle-scan
    /// gates eviction of `Idle` entries on this so it doesn't churn supply
    /// out from under active demand.
    pub(crate) fn exist_borrower(&self) -> bool {
        self.admission.exist_borrower()
    }

    #[cfg(test)]
    pub(crate) fn admission_for_test(&self) -> &Admission {
        &self.admission
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// Drain and recreate: close every idle/overheld connection, then
    /// return to `Normal`. With `force`, `Using` connections are closed
    /// immediately regardless of `hold_timeout`.
    pub async fn clear(self: &Arc<Self>, force: bool) -> Result<(), PoolError> {
        let prior = self.state.swap(PoolState::Clearing as u8, Ordering::AcqRel);
        if prior == PoolState::Closed as u8 {
            self.state.store(PoolState::Closed as u8, Ordering::Release);
            return Err(PoolError::PoolClosed);
        }
        self.remove_all(force || self.config.force_close_using_on_clear, "clear")
            .await;
        self.state.store(PoolState::Normal as u8, Ordering::Release);
        info!("pool cleared");
        Ok(())
    }

    /// Move the pool to `Closed`, stop background workers, and drain every
    /// connection. Idempotent.
    pub async fn close(self: &Arc<Self>) {
        let prior = self.state.swap(PoolState::Closed as u8, Ordering::AcqRel);
        if prior == PoolState::Closed as u8 {
            return;
        }

        if let Some(servant) = self.servant.get() {
            servant.stop();
        }
        if let Some(idle_scan) = self.idle_scan.get() {
            idle_scan.stop();
        }

        self.remove_all(true, "close").await;

        while let Some(borrower) = self.wait_queue.poll() {
            let _ = borrower.try_publish(BorrowerState::Error(BorrowerError::PoolClosed));
        }

        info!("pool closed");
    }

    async fn remove_all(&self, force: bool, reason: &'static str) {
        loop {
            let snapshot = self.array.load();
            if snapshot.is_empty() {
                break;
            }
            let mut progressed = false;
            for conn in snapshot.iter() {
                match conn.state() {
                    ConnState::Idle => {
                        conn.mark_closed();
                        self.remove_pooled_conn(conn, reason).await;
                        progressed = true;
                    }
                    ConnState::Closed => {
                        self.array.remove(conn.id());
                        progressed = true;
                    }
                    ConnState::Using => {
                        if force || conn.is_overheld(self.config.hold_timeout) {
                            self.remove_pooled_conn(conn, reason).await;
                            progressed = true;
                        }
                    }
                }
            }
            if !progressed {
                tokio::time::sleep(self.config.delay_time_for_next_clear).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ConnectionFactory;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct CountingFactory {
        created: AtomicU32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("create failed")]
    struct Never;

    #[async_trait]
    impl ConnectionFactory for CountingFactory {
        type Connection = u32;
        type Error = Never;

        async fn create(&self) -> Result<u32, Never> {
            Ok(self.created.fetch_add(1, Ordering::Relaxed))
        }
    }

    fn test_config() -> PoolConfig {
        PoolConfig::new()
            .max_active(2)
            .borrow_semaphore_size(2)
            .max_wait(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn acquire_then_drop_returns_connection_for_reuse() {
        let pool = Pool::new(
            test_config(),
            CountingFactory {
                created: AtomicU32::new(0),
            },
        )
        .unwrap();
        pool.init().await.unwrap();

        let guard = pool.acquire().await.unwrap();
        drop(guard);

        let stats = pool.stats();
        assert_eq!(stats.total, 1, "one connection should exist and be idle");
    }

    #[tokio::test]
    async fn acquire_beyond_max_active_times_out() {
        let pool = Pool::new(
            PoolConfig::new()
                .max_active(1)
                .borrow_semaphore_size(2)
                .max_wait(Duration::from_millis(50)),
            CountingFactory {
                created: AtomicU32::new(0),
            },
        )
        .unwrap();
        pool.init().await.unwrap();

        let _first = pool.acquire().await.unwrap();
        let second = pool.acquire().await;
        assert!(matches!(second, Err(PoolError::RequestTimeout { .. })));
    }

    #[tokio::test]
    async fn servant_try_count_never_exceeds_max_active() {
        let pool = Pool::new(
            test_config(),
            CountingFactory {
                created: AtomicU32::new(0),
            },
        )
        .unwrap();
        pool.init().await.unwrap();

        for _ in 0..10 {
            pool.poke_servant();
        }

        assert!(pool.servant_try_count.load(Ordering::Acquire) <= pool.config.max_active);
    }

    #[tokio::test]
    async fn a_timed_out_waiter_does_not_strand_a_later_return_in_fair_mode() {
        let pool = Pool::new(
            PoolConfig::new()
                .max_active(1)
                .borrow_semaphore_size(2)
                .fair_mode(true)
                .max_wait(Duration::from_millis(30)),
            CountingFactory {
                created: AtomicU32::new(0),
            },
        )
        .unwrap();
        pool.init().await.unwrap();

        let held = pool.acquire().await.unwrap();

        let waiter = pool.acquire().await;
        assert!(matches!(waiter, Err(PoolError::RequestTimeout { .. })));

        drop(held);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = pool.stats();
        assert_eq!(stats.using, 0, "the returned connection must not be stuck Using");
        assert_eq!(stats.idle, 1, "it must be reclaimable as Idle instead");
    }

    #[tokio::test]
    async fn close_rejects_subsequent_acquires() {
        let pool = Pool::new(
            test_config(),
            CountingFactory {
                created: AtomicU32::new(0),
            },
        )
        .unwrap();
        pool.init().await.unwrap();
        pool.close().await;

        let result = pool.acquire().await;
        assert!(matches!(result, Err(PoolError::PoolClosed)));
    }
}
