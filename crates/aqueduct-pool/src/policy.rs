//! Transfer policy: the hand-off discipline used when a connection returns.

use std::sync::Arc;

use crate::connection::{ConnState, PooledConnection};

/// The contract by which a returning connection is offered to a waiting
/// [`crate::borrower::Borrower`].
///
/// `before_transfer` runs once, before any waiter is considered;
/// `try_catch` is what a waiter calls to attempt to actually take the
/// connection; `on_failed_transfer` runs if no waiter caught it;
/// `check_state_code` is the state a waiter must still observe for its
/// catch to be considered valid.
pub trait TransferPolicy<C>: Send + Sync {
    /// Run once when a connection is returned, before any hand-off attempt.
    fn before_transfer(&self, conn: &PooledConnection<C>);

    /// A waiter's attempt to claim `conn` during hand-off. Returns `true`
    /// if the waiter may keep it.
    fn try_catch(&self, conn: &PooledConnection<C>) -> bool;

    /// Run when no waiter caught the connection during the hand-off walk.
    fn on_failed_transfer(&self, conn: &PooledConnection<C>);

    /// The state a published connection must be in for a catch to be
    /// considered legitimate (used defensively by callers that re-check
    /// state after `try_catch`).
    fn check_state_code(&self) -> ConnState;

    /// Display name, for logging.
    fn name(&self) -> &'static str;
}

/// Free the connection to `Idle` on return; any racer (waiter or a brand
/// new arrival that wins the CAS first) may catch it. Maximizes
/// throughput; no ordering guarantee between waiters.
pub struct Compete;

impl<C> TransferPolicy<C> for Compete {
    fn before_transfer(&self, conn: &PooledConnection<C>) {
        conn.free_to_idle();
    }

    fn try_catch(&self, conn: &PooledConnection<C>) -> bool {
        conn.try_claim()
    }

    fn on_failed_transfer(&self, _conn: &PooledConnection<C>) {
        // Already `Idle`; the next scan (by any caller) will find it.
    }

    fn check_state_code(&self) -> ConnState {
        ConnState::Idle
    }

    fn name(&self) -> &'static str {
        "compete"
    }
}

/// Keep the connection `Using` during hand-off; only the borrower the
/// connection was published to may catch it. Maximizes starvation
/// resistance: admission and hand-off are both effectively FIFO.
pub struct Fair;

impl<C> TransferPolicy<C> for Fair {
    fn before_transfer(&self, _conn: &PooledConnection<C>) {
        // Deliberately left `Using`: the waiter this is published to is
        // the only one entitled to catch it.
    }

    fn try_catch(&self, conn: &PooledConnection<C>) -> bool {
        conn.state() == ConnState::Using
    }

    fn on_failed_transfer(&self, conn: &PooledConnection<C>) {
        // No waiter caught it in time; release it back to the pool.
        conn.free_to_idle();
    }

    fn check_state_code(&self) -> ConnState {
        ConnState::Using
    }

    fn name(&self) -> &'static str {
        "fair"
    }
}

/// Build the configured policy as a trait object.
#[must_use]
pub fn from_mode<C: 'static>(mode: aqueduct_core::TransferMode) -> Arc<dyn TransferPolicy<C>> {
    match mode {
        aqueduct_core::TransferMode::Compete => Arc::new(Compete),
        aqueduct_core::TransferMode::Fair => Arc::new(Fair),
    }
}
