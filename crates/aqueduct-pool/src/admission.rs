//! The admission semaphore: bounds concurrent in-flight borrow attempts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_lock::Semaphore;
use aqueduct_core::PoolError;

/// Bounds the number of callers simultaneously inside the acquire path's
/// scan-or-create / wait-queue section, independent of `max_active` (a
/// pool may admit fewer concurrent attempts than it has connections, to
/// bound contention on the connection array).
pub struct Admission {
    semaphore: Semaphore,
    total_permits: usize,
    held: AtomicUsize,
}

/// An admitted slot. Dropping it returns the permit.
pub struct AdmissionGuard<'a> {
    _inner: async_lock::SemaphoreGuard<'a>,
    held: &'a AtomicUsize,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.held.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Admission {
    /// Build an admission gate with `permits` concurrent slots.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Semaphore::new(permits),
            total_permits: permits,
            held: AtomicUsize::new(0),
        }
    }

    /// Acquire a permit, waiting at most `max_wait`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::RequestTimeout`] if no permit became available
    /// within `max_wait`.
    pub async fn acquire(&self, max_wait: Duration) -> Result<AdmissionGuard<'_>, PoolError> {
        match tokio::time::timeout(max_wait, self.semaphore.acquire()).await {
            Ok(guard) => {
                self.held.fetch_add(1, Ordering::AcqRel);
                Ok(AdmissionGuard {
                    _inner: guard,
                    held: &self.held,
                })
            }
            Err(_) => Err(PoolError::RequestTimeout {
                operation: "admission",
                waited: max_wait,
            }),
        }
    }

    /// Number of permits currently available, for [`aqueduct_core::PoolStats`].
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.total_permits
            .saturating_sub(self.held.load(Ordering::Acquire))
    }

    /// `true` if at least one caller currently holds an admission permit,
    /// i.e. is inside the scan-or-create/wait-queue section right now.
    /// Used to gate idle eviction: churning `Idle` entries out from under
    /// active demand defeats the point of pooling them.
    #[must_use]
    pub fn exist_borrower(&self) -> bool {
        self.total_permits.saturating_sub(self.available_permits()) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_when_a_permit_is_free() {
        let admission = Admission::new(1);
        let guard = admission.acquire(Duration::from_millis(50)).await;
        assert!(guard.is_ok());
    }

    #[tokio::test]
    async fn acquire_times_out_when_saturated() {
        let admission = Admission::new(1);
        let _held = admission.acquire(Duration::from_millis(50)).await.unwrap();
        let second = admission.acquire(Duration::from_millis(10)).await;
        assert!(matches!(second, Err(PoolError::RequestTimeout { .. })));
    }

    #[tokio::test]
    async fn exist_borrower_reflects_held_permits() {
        let admission = Admission::new(2);
        assert!(!admission.exist_borrower());
        let held = admission.acquire(Duration::from_millis(50)).await.unwrap();
        assert!(admission.exist_borrower());
        drop(held);
        assert!(!admission.exist_borrower());
    }
}
