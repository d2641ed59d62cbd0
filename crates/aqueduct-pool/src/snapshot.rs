//! The copy-on-write snapshot array of live connections.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::connection::{ConnState, PooledConnection};

/// A read-mostly, atomically-published set of live connections.
///
/// Readers (the scan step of `acquire`, the idle-scan worker) load the
/// current snapshot with no lock at all; writers (creation, removal)
/// publish a freshly copied `Vec` under a short critical section owned by
/// the caller (see `pool.rs`'s creation mutex) via [`ConnArray::rcu`].
pub struct ConnArray<C> {
    inner: ArcSwap<Vec<Arc<PooledConnection<C>>>>,
}

impl<C> Default for ConnArray<C> {
    fn default() -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(Vec::new())),
        }
    }
}

impl<C> ConnArray<C> {
    /// Load the current snapshot. Cheap: an `Arc` clone, no allocation.
    #[must_use]
    pub fn load(&self) -> Arc<Vec<Arc<PooledConnection<C>>>> {
        self.inner.load_full()
    }

    /// Number of entries in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// `true` if the current snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a new entry, publishing a freshly copied snapshot.
    pub fn push(&self, conn: Arc<PooledConnection<C>>) {
        self.inner.rcu(|current| {
            let mut next = (**current).clone();
            next.push(conn.clone());
            next
        });
    }

    /// Rebuild the snapshot without any entry matching `id`.
    pub fn remove(&self, id: u64) {
        self.inner.rcu(|current| {
            current
                .iter()
                .filter(|c| c.id() != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    /// Rebuild the snapshot dropping every entry whose state is `Closed`.
    /// Called opportunistically by the idle-scan worker and by `clear`.
    pub fn sweep_closed(&self) {
        self.inner.rcu(|current| {
            current
                .iter()
                .filter(|c| c.state() != ConnState::Closed)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_remove_round_trip() {
        let array: ConnArray<()> = ConnArray::default();
        let a = Arc::new(PooledConnection::new_using((), 1));
        let b = Arc::new(PooledConnection::new_using((), 2));
        array.push(a);
        array.push(b);
        assert_eq!(array.len(), 2);

        array.remove(1);
        let snapshot = array.load();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), 2);
    }

    #[test]
    fn sweep_closed_drops_closed_entries_only() {
        let array: ConnArray<()> = ConnArray::default();
        let a = Arc::new(PooledConnection::new_using((), 1));
        a.free_to_idle();
        let b = Arc::new(PooledConnection::new_using((), 2));
        b.mark_closed();
        array.push(a);
        array.push(b);

        array.sweep_closed();
        let snapshot = array.load();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), 1);
    }

    #[test]
    fn readers_see_a_frozen_snapshot_during_concurrent_push() {
        let array: ConnArray<()> = ConnArray::default();
        array.push(Arc::new(PooledConnection::new_using((), 1)));
        let snapshot = array.load();
        array.push(Arc::new(PooledConnection::new_using((), 2)));
        assert_eq!(snapshot.len(), 1, "already-loaded snapshot must not grow");
        assert_eq!(array.len(), 2);
    }
}
