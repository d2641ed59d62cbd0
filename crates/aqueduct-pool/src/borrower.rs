//! The per-caller hand-off slot and its thread-local fast-path cache.

use std::cell::RefCell;
use std::sync::{Arc, Mutex as StdMutex};

use aqueduct_core::PoolError;
use event_listener::Event;

use crate::connection::PooledConnection;

/// The sum type a [`Borrower`] slot can hold. A hand-off publishes either
/// `Connection` or `Error` into a borrower that was `Normal` or `Waiting`.
pub enum BorrowerState<C> {
    /// No pending hand-off; the default resting state.
    Normal,
    /// Enlisted and suspended, waiting for a hand-off or a timeout.
    Waiting,
    /// A connection was published for this borrower to catch.
    Connection(Arc<PooledConnection<C>>),
    /// A failure was published for this borrower (e.g. a failed scheduled
    /// creation, or pool shutdown).
    Error(BorrowerError),
    /// The owning caller gave up (timed out or was cancelled) before a
    /// hand-off arrived. Refuses all further publishes; a walker that pops
    /// an entry in this state must discard it and keep walking.
    Abandoned,
}

/// A cloneable subset of [`PoolError`] suitable for storing in
/// [`BorrowerState::Error`] (the original `PoolError` is not `Clone`
/// because of its boxed causes, so a hand-off constructs one of these
/// terminal, owned variants directly).
#[derive(Debug, Clone)]
pub enum BorrowerError {
    /// The pool has closed or is clearing.
    PoolClosed,
    /// A scheduled background creation failed; carries a display-rendered
    /// cause since the original error is not `Clone`.
    CreateFailed(String),
}

impl From<BorrowerError> for PoolError {
    fn from(e: BorrowerError) -> Self {
        match e {
            BorrowerError::PoolClosed => Self::PoolClosed,
            BorrowerError::CreateFailed(msg) => Self::create_failed(StringError(msg)),
        }
    }
}

#[derive(Debug)]
struct StringError(String);

impl std::fmt::Display for StringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StringError {}

/// A per-caller hand-off slot.
///
/// Owned by one calling context at a time; a short-lived `Mutex` guards the
/// sum-type `state` field (the safe substitute for a single-word tagged
/// pointer CAS, required by this workspace's `unsafe_code = "deny"` lint),
/// and an `Event` lets the owner suspend until a hand-off or wakeup occurs.
pub struct Borrower<C> {
    state: StdMutex<BorrowerState<C>>,
    event: Event,
    /// The entry this borrower last successfully caught, kept only as a
    /// fast-path hint for the next acquire on the same cache slot.
    last_used: StdMutex<Option<Arc<PooledConnection<C>>>>,
}

impl<C> Default for Borrower<C> {
    fn default() -> Self {
        Self {
            state: StdMutex::new(BorrowerState::Normal),
            event: Event::new(),
            last_used: StdMutex::new(None),
        }
    }
}

impl<C> Borrower<C> {
    /// Reset to the resting `Normal` state. Called before enlisting on the
    /// wait queue and after losing a race to catch a hand-off.
    pub fn reset_to_normal(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = BorrowerState::Normal;
    }

    /// Transition `Normal -> Waiting`, the state a walker checks before
    /// deciding whether to publish a hand-off. Returns `false` if the
    /// borrower was not `Normal` (a hand-off arrived first).
    #[must_use]
    pub fn try_begin_waiting(&self) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*guard, BorrowerState::Normal) {
            *guard = BorrowerState::Waiting;
            true
        } else {
            false
        }
    }

    /// Attempt to publish a hand-off. Succeeds only if the borrower is
    /// currently `Normal` or `Waiting` (i.e. not already holding another
    /// hand-off). Wakes the borrower if it was `Waiting`.
    #[must_use]
    pub fn try_publish(&self, state: BorrowerState<C>) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *guard {
            BorrowerState::Normal | BorrowerState::Waiting => {
                let was_waiting = matches!(*guard, BorrowerState::Waiting);
                *guard = state;
                drop(guard);
                if was_waiting {
                    self.event.notify(1);
                }
                true
            }
            _ => false,
        }
    }

    /// Give up on ever catching a hand-off: transitions `Normal`/`Waiting`
    /// to `Abandoned`, after which [`Self::try_publish`] always fails for
    /// this slot. Returns `false` if a hand-off had already been published
    /// before the giver-upper could abandon — the caller must [`Self::take`]
    /// it instead of discarding it, since nobody else will ever see it.
    #[must_use]
    pub fn abandon(&self) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *guard {
            BorrowerState::Normal | BorrowerState::Waiting => {
                *guard = BorrowerState::Abandoned;
                true
            }
            _ => false,
        }
    }

    /// Take whatever is currently published, leaving `Normal` behind.
    pub fn take(&self) -> BorrowerState<C> {
        std::mem::replace(
            &mut *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            BorrowerState::Normal,
        )
    }

    /// `true` if a hand-off (connection or error) is currently published.
    #[must_use]
    pub fn has_handoff(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            BorrowerState::Connection(_) | BorrowerState::Error(_)
        )
    }

    /// Listen for the next wake-up (hand-off publish or explicit notify).
    pub fn listen(&self) -> event_listener::EventListener {
        self.event.listen()
    }

    /// Wake anyone suspended on this borrower without publishing anything
    /// (used to deliver cancellation/timeout wakeups).
    pub fn wake(&self) {
        self.event.notify(1);
    }

    /// Remember a caught connection as the fast-path hint for next time.
    pub fn remember(&self, conn: Arc<PooledConnection<C>>) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Some(conn);
    }

    /// Read (and keep) the cached fast-path hint, if any.
    #[must_use]
    pub fn cached_hint(&self) -> Option<Arc<PooledConnection<C>>> {
        self.last_used.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drop the cached fast-path hint (called when it no longer points at a
    /// claimable connection).
    pub fn clear_hint(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

thread_local! {
    /// Per-OS-thread cache of borrowers, held strongly for the life of the
    /// thread so the hand-off slot and its `cached_hint` fast path survive
    /// across calls. Keyed by `(TypeId::of::<C>(), pool identity)` rather
    /// than just `C`, since a single process commonly runs more than one
    /// pool of the same connection type (e.g. a read pool and a write
    /// pool) and a hint must never be reused across pools.
    ///
    /// On a multi-threaded async executor this caches per worker thread
    /// rather than per logical task, trading fast-path hit rate for
    /// avoiding unsafe task-local plumbing.
    static THREAD_BORROWERS: RefCell<
        std::collections::HashMap<(std::any::TypeId, usize), Arc<dyn std::any::Any + Send + Sync>>,
    > = RefCell::new(std::collections::HashMap::new());
}

/// Fetch the calling thread's cached `Borrower<C>` for the pool identified
/// by `pool_key` (callers pass a stable per-pool identity, e.g. an `Arc`'s
/// pointer value), or construct and cache a fresh one.
#[must_use]
pub fn thread_borrower<C: Send + Sync + 'static>(pool_key: usize) -> Arc<Borrower<C>> {
    let key = (std::any::TypeId::of::<C>(), pool_key);
    THREAD_BORROWERS.with(|cell| {
        let mut map = cell.borrow_mut();
        if let Some(existing) = map.get(&key) {
            if let Ok(typed) = Arc::clone(existing).downcast::<Borrower<C>>() {
                return typed;
            }
        }
        let fresh = Arc::new(Borrower::<C>::default());
        map.insert(key, fresh.clone() as Arc<dyn std::any::Any + Send + Sync>);
        fresh
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_wakes_a_waiting_borrower() {
        let b: Borrower<()> = Borrower::default();
        assert!(b.try_begin_waiting());
        assert!(b.try_publish(BorrowerState::Error(BorrowerError::PoolClosed)));
        assert!(b.has_handoff());
    }

    #[test]
    fn publish_fails_over_existing_handoff() {
        let b: Borrower<()> = Borrower::default();
        assert!(b.try_publish(BorrowerState::Error(BorrowerError::PoolClosed)));
        assert!(!b.try_publish(BorrowerState::Error(BorrowerError::PoolClosed)));
    }

    #[test]
    fn reset_clears_handoff() {
        let b: Borrower<()> = Borrower::default();
        b.try_publish(BorrowerState::Error(BorrowerError::PoolClosed));
        b.reset_to_normal();
        assert!(!b.has_handoff());
    }

    #[test]
    fn abandon_refuses_further_publishes() {
        let b: Borrower<()> = Borrower::default();
        assert!(b.try_begin_waiting());
        assert!(b.abandon());
        assert!(!b.try_publish(BorrowerState::Error(BorrowerError::PoolClosed)));
    }

    #[test]
    fn abandon_loses_the_race_to_a_handoff() {
        let b: Borrower<()> = Borrower::default();
        assert!(b.try_begin_waiting());
        assert!(b.try_publish(BorrowerState::Error(BorrowerError::PoolClosed)));
        // A hand-off landed first: abandoning must not silently discard it.
        assert!(!b.abandon());
        assert!(b.has_handoff());
    }

    #[test]
    fn thread_cache_returns_same_instance_within_a_thread() {
        let a = thread_borrower::<u32>(1);
        let b = thread_borrower::<u32>(1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn thread_cache_is_scoped_per_pool_key() {
        let a = thread_borrower::<u32>(1);
        let b = thread_borrower::<u32>(2);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
