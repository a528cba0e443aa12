//! Connection manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::error::{Error, Result};
use crate::pool::PoolConfig;
use crate::transport::DEFAULT_HOST;

// ============================================================================
// Defaults
// ============================================================================

/// Default pool capacity for the manager's workload.
pub const DEFAULT_MANAGER_MAX_CONNECTIONS: usize = 3;

/// Default connect timeout for the manager's pool.
pub const DEFAULT_MANAGER_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default lifetime of a cached result.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Ports tried by the availability probe.
pub const DEFAULT_PROBE_PORTS: [u16; 3] = [9222, 9229, 9333];

/// Default bound on one availability connect.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// ManagerConfig
// ============================================================================

/// Tuning for a [`ConnectionManager`](super::ConnectionManager).
///
/// The embedded pool defaults to 3 connections and a 10s connect timeout.
/// A partial `[manager.pool]` table fills its gaps from [`PoolConfig`]'s
/// own defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Settings of the manager's own pool.
    pub pool: PoolConfig,

    /// Default lifetime of cached results.
    #[serde(rename = "cache_ttl_ms", with = "duration_ms")]
    pub cache_ttl: Duration,

    /// Ports tried by [`test_availability`](super::ConnectionManager::test_availability).
    pub probe_ports: Vec<u16>,

    /// Bound on one availability connect.
    #[serde(rename = "probe_timeout_ms", with = "duration_ms")]
    pub probe_timeout: Duration,

    /// Host the endpoints listen on.
    pub host: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::new()
                .with_max_connections(DEFAULT_MANAGER_MAX_CONNECTIONS)
                .with_connect_timeout(DEFAULT_MANAGER_CONNECT_TIMEOUT),
            cache_ttl: DEFAULT_CACHE_TTL,
            probe_ports: DEFAULT_PROBE_PORTS.to_vec(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pool settings.
    #[inline]
    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Sets the default cache lifetime.
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the availability probe ports.
    #[inline]
    #[must_use]
    pub fn with_probe_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.probe_ports = ports.into_iter().collect();
        self
    }

    /// Sets the availability probe timeout.
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the endpoint host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        if self.cache_ttl.is_zero() {
            return Err(Error::config("manager.cache_ttl_ms must be greater than zero"));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::config("manager.probe_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_smaller_than_generic_pool() {
        let config = ManagerConfig::default();
        assert_eq!(config.pool.max_connections, 3);
        assert_eq!(config.pool.connect_timeout, Duration::from_secs(10));
        assert!(config.pool.max_connections < PoolConfig::default().max_connections);
        assert_eq!(config.probe_ports, vec![9222, 9229, 9333]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let err = ManagerConfig::new()
            .with_cache_ttl(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("cache_ttl_ms"));
    }
}
