//! Connection pool configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use remote_debug_pool::PoolConfig;
//!
//! let config = PoolConfig::new()
//!     .with_max_connections(4)
//!     .with_connect_timeout(Duration::from_secs(5));
//!
//! assert!(config.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default maximum number of live entries.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default bound on one connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default period of the cleanup sweep.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Default period of the health-check sweep.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on one session probe.
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// PoolConfig
// ============================================================================

/// Tuning for a [`ConnectionPool`](super::ConnectionPool).
///
/// Durations are (de)serialized as milliseconds (`connect_timeout_ms`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of entries, placeholders included.
    pub max_connections: usize,

    /// Bound on one connect attempt.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Period of the cleanup sweep. Unhealthy entries idle for twice this
    /// long are removed.
    #[serde(rename = "cleanup_interval_ms", with = "duration_ms")]
    pub cleanup_interval: Duration,

    /// Period of the health-check sweep.
    #[serde(rename = "health_check_interval_ms", with = "duration_ms")]
    pub health_check_interval: Duration,

    /// Bound on one session probe during the health check.
    #[serde(rename = "health_check_timeout_ms", with = "duration_ms")]
    pub health_check_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl PoolConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    #[inline]
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the cleanup interval.
    #[inline]
    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Sets the health-check interval.
    #[inline]
    #[must_use]
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Sets the per-probe timeout of the health check.
    #[inline]
    #[must_use]
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl PoolConfig {
    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::config("pool.max_connections must be at least 1"));
        }

        let durations = [
            ("pool.connect_timeout_ms", self.connect_timeout),
            ("pool.cleanup_interval_ms", self.cleanup_interval),
            ("pool.health_check_interval_ms", self.health_check_interval),
            ("pool.health_check_timeout_ms", self.health_check_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::config(format!("{name} must be greater than zero")));
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
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = PoolConfig::new().with_max_connections(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = PoolConfig::new()
            .with_cleanup_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("cleanup_interval_ms"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PoolConfig =
            toml::from_str("max_connections = 2\nconnect_timeout_ms = 1500").expect("parse");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.cleanup_interval, DEFAULT_CLEANUP_INTERVAL);
    }
}
