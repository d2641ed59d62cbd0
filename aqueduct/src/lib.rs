//! # aqueduct - a high-throughput database connection pool
//!
//! The borrow/return engine is split across two crates:
//!
//! - [`aqueduct_core`] - configuration, statistics, and error types (no
//!   async runtime dependency)
//! - [`aqueduct_pool`] - the pool itself: `PooledConnection`, `Borrower`,
//!   the wait queue, admission, transfer policy, tester, connection array,
//!   and the `Pool` core
//!
//! ## Quick start
//!
//! ```ignore
//! use aqueduct::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PoolError> {
//!     let pool = Pool::new(PoolConfig::new().max_active(10), my_driver::Factory::new())?;
//!     pool.init().await?;
//!
//!     let conn = pool.acquire().await?;
//!     // conn derefs to my_driver's raw connection type
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod prelude;

pub use aqueduct_core::{ConnectionDefaults, IsolationLevel, PoolConfig, PoolError, PoolStats, TransferMode};
pub use aqueduct_pool::{
    AlwaysAlive, Compete, ConnState, ConnectionFactory, ConnectionTester, Fair, NativePing, Pool,
    PoolState, PooledConnection, PooledConnectionGuard, QueryProbe, TransferPolicy,
};
