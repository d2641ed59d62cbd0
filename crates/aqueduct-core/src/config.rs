//! Pool configuration and runtime statistics.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::IsolationLevel;
use crate::error::PoolError;

/// Hand-off discipline used when a connection is returned to the pool.
///
/// See the `compete`/`fair` transfer policy design note: compete frees the
/// connection to `Idle` and lets any racer catch it; fair keeps it `Using`
/// during hand-off so only the longest-waiting borrower can catch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    /// Maximize throughput; no ordering guarantee between waiters.
    Compete,
    /// Maximize starvation resistance; FIFO admission and hand-off.
    Fair,
}

/// Configuration for a connection pool.
///
/// Built with the fluent `const fn` setters below, or layered from the
/// environment with [`PoolConfig::from_env`]. `Default::default()` gives
/// conservative values suitable for a small service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Connections created eagerly at `init`.
    pub initial_size: usize,
    /// Hard cap on live connections (`Idle` + `Using`).
    pub max_active: usize,
    /// Size of the admission semaphore; decoupled from `max_active`, caps
    /// concurrent in-flight borrow attempts.
    pub borrow_semaphore_size: usize,
    /// Deadline for the whole acquire path (admission + hand-off).
    pub max_wait: Duration,
    /// How long an `Idle` connection may sit unused before the idle-scan
    /// worker evicts it.
    pub idle_timeout: Duration,
    /// How long a `Using` connection may be held before the idle-scan
    /// worker force-closes its guard.
    pub hold_timeout: Duration,
    /// Skip `is_alive` on borrow if the connection was touched more
    /// recently than this.
    pub connection_test_interval: Duration,
    /// Per-probe timeout applied to the liveness test, when the driver
    /// supports per-query timeouts.
    pub connection_test_timeout: Duration,
    /// SQL probe used when the driver has no native liveness call.
    pub connection_test_query: Option<String>,
    /// Idle-scan worker tick period.
    pub idle_check_time_interval: Duration,
    /// Delay between `remove_all` sweep passes during `clear`/`close`.
    pub delay_time_for_next_clear: Duration,
    /// Transfer policy: [`TransferMode::Compete`] or [`TransferMode::Fair`].
    pub transfer_mode: TransferMode,
    /// If true, `clear` force-closes `Using` connections regardless of
    /// `hold_timeout`; if false, it waits for them to be returned or to
    /// exceed `hold_timeout`.
    pub force_close_using_on_clear: bool,
    /// Default auto-commit mode restored on return.
    pub default_auto_commit: bool,
    /// Default read-only flag restored on return.
    pub default_read_only: bool,
    /// Default catalog restored on return, if the driver supports it.
    pub default_catalog: Option<String>,
    /// Default schema restored on return, if the driver supports it.
    pub default_schema: Option<String>,
    /// Default transaction isolation restored on return; `None` means
    /// "leave the driver default".
    pub default_transaction_isolation: Option<IsolationLevel>,
}

impl PoolConfig {
    /// Start from [`PoolConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of connections created eagerly at `init`.
    #[must_use]
    pub const fn initial_size(mut self, n: usize) -> Self {
        self.initial_size = n;
        self
    }

    /// Set the hard cap on live connections.
    #[must_use]
    pub const fn max_active(mut self, n: usize) -> Self {
        self.max_active = n;
        self
    }

    /// Set the admission semaphore size.
    #[must_use]
    pub const fn borrow_semaphore_size(mut self, n: usize) -> Self {
        self.borrow_semaphore_size = n;
        self
    }

    /// Set the acquire-path deadline.
    #[must_use]
    pub const fn max_wait(mut self, d: Duration) -> Self {
        self.max_wait = d;
        self
    }

    /// Set the idle-eviction timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, d: Duration) -> Self {
        self.idle_timeout = d;
        self
    }

    /// Set the hold timeout (how long a borrow may stay `Using`).
    #[must_use]
    pub const fn hold_timeout(mut self, d: Duration) -> Self {
        self.hold_timeout = d;
        self
    }

    /// Set the liveness-test skip interval.
    #[must_use]
    pub const fn connection_test_interval(mut self, d: Duration) -> Self {
        self.connection_test_interval = d;
        self
    }

    /// Set the per-probe liveness test timeout.
    #[must_use]
    pub const fn connection_test_timeout(mut self, d: Duration) -> Self {
        self.connection_test_timeout = d;
        self
    }

    /// Set the SQL probe used when no native liveness call exists.
    #[must_use]
    pub fn connection_test_query(mut self, query: impl Into<String>) -> Self {
        self.connection_test_query = Some(query.into());
        self
    }

    /// Set the idle-scan worker tick period.
    #[must_use]
    pub const fn idle_check_time_interval(mut self, d: Duration) -> Self {
        self.idle_check_time_interval = d;
        self
    }

    /// Set the delay between `remove_all` sweep passes.
    #[must_use]
    pub const fn delay_time_for_next_clear(mut self, d: Duration) -> Self {
        self.delay_time_for_next_clear = d;
        self
    }

    /// Select [`TransferMode::Fair`] instead of the default
    /// [`TransferMode::Compete`].
    #[must_use]
    pub const fn fair_mode(mut self, fair: bool) -> Self {
        self.transfer_mode = if fair {
            TransferMode::Fair
        } else {
            TransferMode::Compete
        };
        self
    }

    /// Force-close `Using` connections on `clear`, ignoring `hold_timeout`.
    #[must_use]
    pub const fn force_close_using_on_clear(mut self, force: bool) -> Self {
        self.force_close_using_on_clear = force;
        self
    }

    /// Set the default auto-commit mode restored on return.
    #[must_use]
    pub const fn default_auto_commit(mut self, v: bool) -> Self {
        self.default_auto_commit = v;
        self
    }

    /// Set the default read-only flag restored on return.
    #[must_use]
    pub const fn default_read_only(mut self, v: bool) -> Self {
        self.default_read_only = v;
        self
    }

    /// Set the default transaction isolation restored on return.
    #[must_use]
    pub const fn default_transaction_isolation(mut self, v: Option<IsolationLevel>) -> Self {
        self.default_transaction_isolation = v;
        self
    }

    /// Layer environment-variable overrides (prefixed `AQUEDUCT_POOL_`) on
    /// top of [`PoolConfig::default`]. Only variables that are actually set
    /// override their field; everything else keeps the default.
    ///
    /// Recognized variables: `AQUEDUCT_POOL_INITIAL_SIZE`,
    /// `AQUEDUCT_POOL_MAX_ACTIVE`, `AQUEDUCT_POOL_BORROW_SEMAPHORE_SIZE`,
    /// `AQUEDUCT_POOL_MAX_WAIT_MS`, `AQUEDUCT_POOL_IDLE_TIMEOUT_MS`,
    /// `AQUEDUCT_POOL_HOLD_TIMEOUT_MS`, `AQUEDUCT_POOL_FAIR_MODE`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_usize("AQUEDUCT_POOL_INITIAL_SIZE") {
            config.initial_size = v;
        }
        if let Some(v) = env_usize("AQUEDUCT_POOL_MAX_ACTIVE") {
            config.max_active = v;
        }
        if let Some(v) = env_usize("AQUEDUCT_POOL_BORROW_SEMAPHORE_SIZE") {
            config.borrow_semaphore_size = v;
        }
        if let Some(v) = env_millis("AQUEDUCT_POOL_MAX_WAIT_MS") {
            config.max_wait = v;
        }
        if let Some(v) = env_millis("AQUEDUCT_POOL_IDLE_TIMEOUT_MS") {
            config.idle_timeout = v;
        }
        if let Some(v) = env_millis("AQUEDUCT_POOL_HOLD_TIMEOUT_MS") {
            config.hold_timeout = v;
        }
        if let Some(v) = env_bool("AQUEDUCT_POOL_FAIR_MODE") {
            config = config.fair_mode(v);
        }
        config
    }

    /// Validate the configuration, returning [`PoolError::ConfigInvalid`] on
    /// the first problem found. Called once by `Pool::new`/`init`.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_active == 0 {
            return Err(PoolError::ConfigInvalid(
                "max_active must be greater than zero".into(),
            ));
        }
        if self.initial_size > self.max_active {
            return Err(PoolError::ConfigInvalid(
                "initial_size must not exceed max_active".into(),
            ));
        }
        if self.borrow_semaphore_size == 0 {
            return Err(PoolError::ConfigInvalid(
                "borrow_semaphore_size must be greater than zero".into(),
            ));
        }
        if self.idle_check_time_interval.is_zero() {
            return Err(PoolError::ConfigInvalid(
                "idle_check_time_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_active: 10,
            borrow_semaphore_size: 10,
            max_wait: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            hold_timeout: Duration::from_secs(600),
            connection_test_interval: Duration::from_secs(30),
            connection_test_timeout: Duration::from_secs(5),
            connection_test_query: None,
            idle_check_time_interval: Duration::from_secs(30),
            delay_time_for_next_clear: Duration::from_millis(100),
            transfer_mode: TransferMode::Compete,
            force_close_using_on_clear: false,
            default_auto_commit: true,
            default_read_only: false,
            default_catalog: None,
            default_schema: None,
            default_transaction_isolation: None,
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_usize(name).map(|ms| Duration::from_millis(ms as u64))
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| match v.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    })
}

/// A point-in-time snapshot of pool occupancy and lifetime counters, for
/// embedding in whatever metrics/management surface the host application
/// exposes. This crate itself exposes no exporter wiring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PoolStats {
    /// Connections currently `Idle`.
    pub idle: usize,
    /// Connections currently `Using`.
    pub using: usize,
    /// Live connections total (`idle + using`).
    pub total: usize,
    /// Callers currently suspended on the admission semaphore or the wait
    /// queue.
    pub waiters: usize,
    /// Lifetime count of connections created.
    pub created: u64,
    /// Lifetime count of connections closed (any reason).
    pub closed: u64,
    /// Lifetime count of successful acquires.
    pub acquires: u64,
    /// Lifetime count of acquire timeouts.
    pub timeouts: u64,
    /// Lifetime count of connections evicted by the idle-scan worker for
    /// idle/hold-timeout reasons.
    pub evicted_idle: u64,
    /// Lifetime count of connections removed for failing a liveness test.
    pub evicted_unhealthy: u64,
}
