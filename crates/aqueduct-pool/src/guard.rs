//! The caller-facing RAII guard returned by `Pool::acquire`.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::connection::PooledConnection;
use crate::factory::ConnectionFactory;
use crate::pool::Pool;

/// A borrowed connection.
///
/// Derefs to the raw driver connection `F::Connection`. Dropping the guard
/// hands the connection back to the pool: a background task restores its
/// configured defaults (see [`crate::factory::ConnectionFactory::reset`])
/// and then calls `Pool::recycle`, unless [`PooledConnectionGuard::invalidate`]
/// was called first, in which case the entry is instead scheduled for
/// removal.
pub struct PooledConnectionGuard<F: ConnectionFactory> {
    pool: Arc<Pool<F>>,
    conn: Option<Arc<PooledConnection<F::Connection>>>,
    raw: Option<F::Connection>,
    broken: bool,
}

impl<F: ConnectionFactory + 'static> PooledConnectionGuard<F> {
    pub(crate) fn new(pool: Arc<Pool<F>>, conn: Arc<PooledConnection<F::Connection>>) -> Self {
        let raw = conn.take_raw();
        Self {
            pool,
            conn: Some(conn),
            raw,
            broken: false,
        }
    }

    /// Flag the underlying connection as broken. On drop, it will be
    /// removed from the pool (`abandon_on_return`) instead of recycled.
    pub fn invalidate(&mut self) {
        self.broken = true;
    }

    /// The pool-assigned identity of the underlying connection, stable
    /// across recycles.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.conn.as_ref().expect("conn present until drop").id()
    }
}

impl<F: ConnectionFactory> Deref for PooledConnectionGuard<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.raw.as_ref().expect("raw connection present until drop")
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnectionGuard<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.raw.as_mut().expect("raw connection present until drop")
    }
}

impl<F: ConnectionFactory + 'static> Drop for PooledConnectionGuard<F> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let raw = self.raw.take();

        if self.broken {
            if let Some(raw) = raw {
                conn.put_raw(raw);
            }
            self.pool.abandon_on_return(&conn);
            return;
        }

        conn.touch();
        match raw {
            Some(raw) => self.pool.reset_and_recycle(conn, raw),
            None => self.pool.recycle(&conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ConnectionFactory;
    use aqueduct_core::PoolConfig;
    use async_trait::async_trait;
    use std::time::Duration;

    struct OneShotFactory;

    #[derive(Debug, thiserror::Error)]
    #[error("create failed")]
    struct Never;

    #[async_trait]
    impl ConnectionFactory for OneShotFactory {
        type Connection = Vec<u8>;
        type Error = Never;

        async fn create(&self) -> Result<Vec<u8>, Never> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn deref_mut_reaches_the_raw_connection() {
        let pool = Pool::new(
            PoolConfig::new()
                .max_active(1)
                .borrow_semaphore_size(1)
                .max_wait(Duration::from_millis(200)),
            OneShotFactory,
        )
        .unwrap();
        pool.init().await.unwrap();

        let mut guard = pool.acquire().await.unwrap();
        guard.push(1);
        guard.push(2);
        assert_eq!(&*guard, &[1, 2]);
    }

    #[tokio::test]
    async fn invalidate_removes_instead_of_recycling() {
        let pool = Pool::new(
            PoolConfig::new()
                .max_active(1)
                .borrow_semaphore_size(1)
                .max_wait(Duration::from_millis(200)),
            OneShotFactory,
        )
        .unwrap();
        pool.init().await.unwrap();

        let mut guard = pool.acquire().await.unwrap();
        guard.invalidate();
        drop(guard);

        // give the spawned abandon task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = pool.stats();
        assert_eq!(stats.total, 0, "invalidated connection must be removed, not recycled");
    }
}
