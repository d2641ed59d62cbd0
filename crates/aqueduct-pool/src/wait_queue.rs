//! The lock-free FIFO of pending borrowers.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::borrower::Borrower;

/// A multi-producer multi-consumer FIFO of enlisted [`Borrower`]s.
///
/// Built on [`crossbeam_queue::SegQueue`], a genuinely lock-free MPMC
/// queue. There is no remove-by-identity operation; instead, a walker that
/// pops an entry and finds it ineligible (already handed off, or whose
/// caller gave up) simply discards it rather than re-enlisting it — the
/// "walkers may skip ineligible entries" semantics this spec asks for.
pub struct WaitQueue<C> {
    inner: SegQueue<Arc<Borrower<C>>>,
}

impl<C> Default for WaitQueue<C> {
    fn default() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }
}

impl<C> WaitQueue<C> {
    /// Enlist a borrower at the back of the queue.
    pub fn offer(&self, borrower: Arc<Borrower<C>>) {
        self.inner.push(borrower);
    }

    /// Pop the next candidate, if any. The caller decides eligibility
    /// (e.g. via [`Borrower::try_publish`]); ineligible entries are simply
    /// not re-offered.
    pub fn poll(&self) -> Option<Arc<Borrower<C>>> {
        self.inner.pop()
    }

    /// `true` if the queue currently holds no entries. Racy by nature of a
    /// lock-free queue: only a hint, never relied on for correctness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Approximate length, for stats/logging only.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::borrower::BorrowerState;

    #[test]
    fn fifo_order_is_preserved_for_eligible_entries() {
        let q: WaitQueue<()> = WaitQueue::default();
        let a = Arc::new(Borrower::default());
        let b = Arc::new(Borrower::default());
        q.offer(a.clone());
        q.offer(b.clone());

        let first = q.poll().unwrap();
        assert!(Arc::ptr_eq(&first, &a));
        let second = q.poll().unwrap();
        assert!(Arc::ptr_eq(&second, &b));
        assert!(q.poll().is_none());
    }

    #[test]
    fn ineligible_entries_are_simply_dropped_by_the_walker() {
        let q: WaitQueue<()> = WaitQueue::default();
        let a: Arc<Borrower<()>> = Arc::new(Borrower::default());
        // Already holding a hand-off: not eligible for another.
        a.try_publish(BorrowerState::Error(crate::borrower::BorrowerError::PoolClosed));
        q.offer(a);

        let popped = q.poll().unwrap();
        assert!(popped.has_handoff());
        // A real walker would notice `has_handoff()` and not re-offer it.
        assert!(q.is_empty());
    }
}
