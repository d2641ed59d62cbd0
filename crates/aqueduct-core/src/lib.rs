//! Core error, configuration, and value types for the aqueduct connection pool.
//!
//! This crate has no async runtime dependency: it is pulled in by both the
//! pool engine (`aqueduct-pool`) and the test harness (`aqueduct-testing`)
//! so the two never need to agree on a runtime to share a config or error
//! type.
//!
//! ## Crate organization
//!
//! - [`error`] - [`PoolError`], the single error enum covering every pool failure kind.
//! - [`config`] - [`PoolConfig`] and [`PoolStats`].
//! - [`defaults`] - per-connection default settings restored on return.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod defaults;
pub mod error;

pub use config::{PoolConfig, PoolStats, TransferMode};
pub use defaults::{ConnectionDefaults, IsolationLevel};
pub use error::PoolError;
