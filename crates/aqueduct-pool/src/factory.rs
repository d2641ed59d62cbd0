//! The external connection-factory capability.

use async_trait::async_trait;

use aqueduct_core::ConnectionDefaults;

/// Produces raw driver connections on behalf of the pool.
///
/// This is the one required external collaborator: the pool owns
/// lifecycle, health, and hand-off, but has no idea how to actually dial a
/// database. `Error` must be convertible into the driver's own error type
/// via `std::error::Error + Send + Sync + 'static` so it can be boxed into
/// [`aqueduct_core::PoolError::CreateFailed`].
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// The raw connection type this factory produces.
    type Connection: Send + 'static;
    /// The error type this factory's `create` can fail with.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new raw connection.
    async fn create(&self) -> Result<Self::Connection, Self::Error>;

    /// Restore `defaults` on `conn` before it re-enters the idle set.
    ///
    /// Called once per return, after the borrower is done with the
    /// connection and before it becomes eligible to be claimed again. The
    /// default implementation is a no-op, which is correct for any driver
    /// that doesn't mutate per-connection session state (auto-commit,
    /// read-only, catalog, schema, isolation level). An `Err` here removes
    /// the connection instead of recycling it, the same as a failed
    /// liveness test.
    async fn reset(
        &self,
        _conn: &mut Self::Connection,
        _defaults: &ConnectionDefaults,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}
