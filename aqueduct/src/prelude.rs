//! Prelude module for convenient imports.
//!
//! ```rust
//! use aqueduct::prelude::*;
//!
//! let config = PoolConfig::new().max_active(20);
//! ```

pub use aqueduct_core::{PoolConfig, PoolError, PoolStats, TransferMode};
pub use aqueduct_pool::{ConnectionFactory, ConnectionTester, Pool, PooledConnectionGuard};
