//! Health monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::error::{Error, Result};
use crate::transport::DEFAULT_HOST;

// ============================================================================
// Defaults
// ============================================================================

/// Poll period used when neither the caller nor the config sets one.
pub const FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on one liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default consecutive failures before an endpoint is stale.
pub const DEFAULT_MAX_FAILURES: u32 = 1;

/// Default number of history entries kept per endpoint.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

// ============================================================================
// MonitorConfig
// ============================================================================

/// Tuning for a [`HealthMonitor`](super::HealthMonitor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll period. `None` falls back to [`FALLBACK_POLL_INTERVAL`].
    #[serde(
        rename = "poll_interval_ms",
        with = "duration_ms::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval: Option<Duration>,

    /// Bound on one liveness probe.
    #[serde(rename = "probe_timeout_ms", with = "duration_ms")]
    pub probe_timeout: Duration,

    /// Consecutive failures that make an endpoint stale.
    pub max_failures: u32,

    /// History entries kept per endpoint.
    pub history_capacity: usize,

    /// Host the endpoints listen on.
    pub host: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_failures: DEFAULT_MAX_FAILURES,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll period.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the probe timeout.
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the stale threshold.
    #[inline]
    #[must_use]
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Sets the history capacity.
    #[inline]
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets the endpoint host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Resolves the poll period: `requested`, then the configured value,
    /// then [`FALLBACK_POLL_INTERVAL`].
    #[must_use]
    pub fn resolve_poll_interval(&self, requested: Option<Duration>) -> Duration {
        requested
            .filter(|d| !d.is_zero())
            .or(self.poll_interval.filter(|d| !d.is_zero()))
            .unwrap_or(FALLBACK_POLL_INTERVAL)
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("monitor.poll_interval_ms must be greater than zero"));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::config("monitor.probe_timeout_ms must be greater than zero"));
        }
        if self.max_failures == 0 {
            return Err(Error::config("monitor.max_failures must be at least 1"));
        }
        if self.history_capacity == 0 {
            return Err(Error::config("monitor.history_capacity must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
