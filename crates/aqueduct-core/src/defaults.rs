//! Per-connection default settings restored whenever a connection is returned.

use serde::{Deserialize, Serialize};

/// Transaction isolation level a connection is reset to on return.
///
/// `None` in [`ConnectionDefaults::isolation`] means "leave whatever the
/// driver handed back at creation time" rather than forcing a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Dirty reads are possible.
    ReadUncommitted,
    /// The default for most OLTP workloads.
    ReadCommitted,
    /// Reads within one transaction always see the same snapshot.
    RepeatableRead,
    /// Transactions behave as if executed serially.
    Serializable,
}

/// Default connection settings, restored by the pool on every return.
///
/// Captured once from the first successfully created connection (the
/// "template" connection, see [`crate::config::PoolConfig`]'s probe-and-configure
/// step) and then applied to every connection handed back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ConnectionDefaults {
    /// Auto-commit mode to restore.
    pub auto_commit: bool,
    /// Read-only flag to restore.
    pub read_only: bool,
    /// Catalog (database) name to restore, if the driver supports switching it.
    pub catalog: Option<String>,
    /// Schema name to restore, if the driver supports switching it.
    pub schema: Option<String>,
    /// Isolation level to restore; `None` means "leave the driver default".
    pub isolation: Option<IsolationLevel>,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            auto_commit: true,
            read_only: false,
            catalog: None,
            schema: None,
            isolation: None,
        }
    }
}

impl From<&crate::config::PoolConfig> for ConnectionDefaults {
    fn from(config: &crate::config::PoolConfig) -> Self {
        Self {
            auto_commit: config.default_auto_commit,
            read_only: config.default_read_only,
            catalog: config.default_catalog.clone(),
            schema: config.default_schema.clone(),
            isolation: config.default_transaction_isolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_auto_commit_read_write() {
        let d = ConnectionDefaults::default();
        assert!(d.auto_commit);
        assert!(!d.read_only);
        assert!(d.isolation.is_none());
    }

    #[test]
    fn roundtrips_through_json() {
        let d = ConnectionDefaults {
            isolation: Some(IsolationLevel::RepeatableRead),
            ..ConnectionDefaults::default()
        };
        let json = serde_json::to_string(&d).unwrap();
        let back: ConnectionDefaults = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn built_from_pool_config_fields() {
        use crate::config::PoolConfig;

        let config = PoolConfig::new()
            .default_auto_commit(false)
            .default_read_only(true)
            .default_transaction_isolation(Some(IsolationLevel::Serializable));
        let defaults = ConnectionDefaults::from(&config);
        assert!(!defaults.auto_commit);
        assert!(defaults.read_only);
        assert_eq!(defaults.isolation, Some(IsolationLevel::Serializable));
    }
}
