//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while borrowing from or operating on a pool.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The connection factory failed to produce a raw connection.
    #[error("failed to create connection: {0}")]
    CreateFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The acquire deadline elapsed before a connection became available.
    #[error("{operation} timed out after {waited:?}")]
    RequestTimeout {
        /// The operation that timed out (`"acquire"`, `"handoff"`, ...).
        operation: &'static str,
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// Reserved for callers that layer an explicit, synchronously-observable
    /// cancellation signal on top of `acquire` and want a typed error for
    /// it. A plain `acquire` future dropped while suspended produces no
    /// `Result` at all (ordinary Rust cancellation semantics), so this
    /// variant is never constructed by the pool itself on that path.
    #[error("acquire was interrupted while waiting")]
    RequestInterrupt,

    /// The pool has entered `Closed`, or is mid-`clear`, and accepts no new borrows.
    #[error("pool is closed")]
    PoolClosed,

    /// A configuration value failed validation at construction time.
    #[error("invalid pool configuration: {0}")]
    ConfigInvalid(String),

    /// The caller asked for a guard wrapper but none was configured.
    #[error("no connection guard/proxy wrapper is configured for this pool")]
    GuardUnavailable,

    /// The liveness tester itself errored while probing a connection.
    ///
    /// This variant is constructed but never propagated to callers: a
    /// tester fault is treated as "not alive" and logged, per
    /// [`crate::config::PoolConfig`]'s testing policy.
    #[error("connection tester faulted: {0}")]
    TesterFault(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PoolError {
    /// Build a [`PoolError::CreateFailed`] from any boxable error.
    pub fn create_failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CreateFailed(Box::new(err))
    }

    /// Build a [`PoolError::TesterFault`] from any boxable error.
    pub fn tester_fault<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TesterFault(Box::new(err))
    }

    /// A short, stable machine-readable name for this error's kind, useful
    /// for metrics labels or log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateFailed(_) => "create_failed",
            Self::RequestTimeout { .. } => "request_timeout",
            Self::RequestInterrupt => "request_interrupt",
            Self::PoolClosed => "pool_closed",
            Self::ConfigInvalid(_) => "config_invalid",
            Self::GuardUnavailable => "guard_unavailable",
            Self::TesterFault(_) => "tester_fault",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(PoolError::PoolClosed.kind(), "pool_closed");
        assert_eq!(
            PoolError::RequestTimeout {
                operation: "acquire",
                waited: Duration::from_millis(5),
            }
            .kind(),
            "request_timeout"
        );
    }

    #[test]
    fn display_never_panics() {
        for err in [
            PoolError::PoolClosed,
            PoolError::RequestInterrupt,
            PoolError::ConfigInvalid("max_active must be > 0".into()),
            PoolError::GuardUnavailable,
        ] {
            let _ = err.to_string();
        }
    }
}
