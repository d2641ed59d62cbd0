//! Test fixtures and async helpers for exercising `aqueduct-pool`.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod async_helpers;
pub mod mock_factory;

pub use async_helpers::{with_default_timeout, with_timeout, TestBarrier, TestLatch, DEFAULT_TIMEOUT};
pub use mock_factory::{ManualTester, ManualTesterHandle, MockConnection, MockCreateError, MockFactory};
