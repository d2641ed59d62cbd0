//! A lock-free-at-the-hot-path, admission-bounded database connection pool.
//!
//! The engine is split into focused pieces: an atomic-state
//! [`connection::PooledConnection`], a per-caller [`borrower::Borrower`]
//! hand-off slot, a [`wait_queue::WaitQueue`], an [`admission::Admission`]
//! gate, a [`policy::TransferPolicy`], a [`tester::ConnectionTester`], a
//! copy-on-write [`snapshot::ConnArray`], and the [`pool::Pool`] core that
//! wires them together behind `acquire`/the [`guard::PooledConnectionGuard`]
//! return path. Two background tasks, [`servant`] and [`idle_scan`], keep
//! supply ahead of demand and reclaim stale entries.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admission;
pub mod borrower;
pub mod connection;
pub mod factory;
pub mod guard;
pub mod idle_scan;
pub mod policy;
pub mod pool;
pub mod servant;
pub mod snapshot;
pub mod tester;
pub mod wait_queue;

pub use aqueduct_core::{ConnectionDefaults, IsolationLevel, PoolConfig, PoolError, PoolStats, TransferMode};
pub use connection::{ConnState, PooledConnection};
pub use factory::ConnectionFactory;
pub use guard::PooledConnectionGuard;
pub use policy::{Compete, Fair, TransferPolicy};
pub use pool::{Pool, PoolState};
pub use tester::{AlwaysAlive, ConnectionTester, NativePing, QueryProbe};
