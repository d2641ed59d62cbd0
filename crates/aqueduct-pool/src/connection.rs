//! The pooled connection wrapper and its atomic state machine.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, OnceLock};
use std::time::{Duration, Instant};

/// A fixed monotonic anchor, lazily created on first use. `last_access` is
/// stored as milliseconds elapsed from this anchor so it fits in an
/// `AtomicU64`; `Instant` itself has no such representation.
fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

fn now_millis() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Lifecycle state of one [`PooledConnection`].
///
/// `Idle -> Using` happens only via a single successful compare-and-swap
/// (see [`PooledConnection::try_claim`]); transitions into `Closed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnState {
    /// Not currently borrowed; eligible to be claimed.
    Idle = 0,
    /// Borrowed by exactly one caller.
    Using = 1,
    /// Removed from the array; the raw handle has been (or is being)
    /// released.
    Closed = 2,
}

impl ConnState {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Using,
            _ => Self::Closed,
        }
    }
}

/// One pool-owned raw connection plus its bookkeeping.
///
/// Generic over `C`, the raw connection type produced by a
/// [`crate::factory::ConnectionFactory`].
pub struct PooledConnection<C> {
    /// The underlying driver connection. Borrowers see this through a
    /// [`crate::guard::PooledConnectionGuard`].
    connection: StdMutex<Option<C>>,
    state: AtomicU8,
    created_at: Instant,
    last_access: AtomicU64,
    id: u64,
}

impl<C> PooledConnection<C> {
    /// Wrap a freshly created raw connection, already in `Using` state
    /// (the creator is its first borrower).
    pub(crate) fn new_using(connection: C, id: u64) -> Self {
        let now = Instant::now();
        Self {
            connection: StdMutex::new(Some(connection)),
            state: AtomicU8::new(ConnState::Using as u8),
            created_at: now,
            last_access: AtomicU64::new(now_millis()),
            id,
        }
    }

    /// Stable identity, used for logging and for "is this the same entry"
    /// comparisons by callers that hold a raw index into the snapshot.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Current state, loaded with `Acquire` ordering so a reader that
    /// observes `Idle` also observes every write that preceded the CAS
    /// that produced it.
    #[must_use]
    pub fn state(&self) -> ConnState {
        ConnState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The single compare-and-swap that may move a connection from `Idle`
    /// to `Using`. Returns `true` iff this call won the race.
    #[must_use]
    pub fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(
                ConnState::Idle as u8,
                ConnState::Using as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Free a `Using` connection back to `Idle`. Used by the `Compete`
    /// transfer policy, which frees before attempting hand-off.
    pub fn free_to_idle(&self) {
        self.state.store(ConnState::Idle as u8, Ordering::Release);
    }

    /// Mark this entry `Closed`. Idempotent; terminal.
    pub fn mark_closed(&self) {
        self.state.store(ConnState::Closed as u8, Ordering::Release);
    }

    /// Take the raw connection out, leaving `None` behind. Used when
    /// closing the entry or handing it to a guard.
    pub(crate) fn take_raw(&self) -> Option<C> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Run `f` against the raw connection without removing it.
    pub(crate) fn with_raw<R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let mut guard = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_mut().map(f)
    }

    /// Put a raw connection back (used when a guard returns it rather than
    /// `take`-ing ownership permanently).
    pub(crate) fn put_raw(&self, connection: C) {
        *self.connection.lock().unwrap_or_else(|e| e.into_inner()) = Some(connection);
    }

    /// Update the last-access timestamp to now.
    pub fn touch(&self) {
        self.last_access.store(now_millis(), Ordering::Relaxed);
    }

    /// Time since this connection was last touched.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let stored = self.last_access.load(Ordering::Relaxed);
        Duration::from_millis(now_millis().saturating_sub(stored))
    }

    /// `true` if this connection has been idle at least `timeout`.
    #[must_use]
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.idle_for() >= timeout
    }

    /// Time since this connection was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// `true` if this connection has been held (in `Using`) since its last
    /// touch for at least `hold_timeout`. Only meaningful while `Using`.
    #[must_use]
    pub fn is_overheld(&self, hold_timeout: Duration) -> bool {
        self.idle_for() >= hold_timeout
    }
}
