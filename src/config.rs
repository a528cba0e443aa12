//! Aggregate configuration loaded from TOML.
//!
//! Every section and field is optional; missing values fall back to the
//! component defaults. Durations are written in milliseconds.
//!
//! ```toml
//! [pool]
//! max_connections = 5
//! connect_timeout_ms = 15000
//!
//! [manager]
//! cache_ttl_ms = 60000
//! probe_ports = [9222, 9229]
//!
//! [monitor]
//! poll_interval_ms = 10000
//! max_failures = 2
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::manager::ManagerConfig;
use crate::monitor::MonitorConfig;
use crate::pool::PoolConfig;

// ============================================================================
// Config
// ============================================================================

/// Configuration for all three components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generic pool settings.
    pub pool: PoolConfig,
    /// Connection manager settings, including its own pool.
    pub manager: ManagerConfig,
    /// Health monitor settings.
    pub monitor: MonitorConfig,
}

impl Config {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// - [`Error::Toml`] if the document is malformed
    /// - [`Error::Config`] if a value is out of range
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.manager.validate()?;
        self.monitor.validate()
    }

    /// Serializes back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::config(format!("Cannot serialize config: {e}")))
    }
}

// ============================================================================
// duration_ms
// ============================================================================

/// `serde` adapter storing a [`Duration`](std::time::Duration) as whole
/// milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    /// Same, for optional durations.
    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = assert_ok!(Config::from_toml_str(""));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = assert_ok!(Config::from_toml_str(
            r#"
            [pool]
            max_connections = 5

            [manager]
            cache_ttl_ms = 50
            probe_ports = [9333]

            [monitor]
            poll_interval_ms = 10000
            max_failures = 2
            "#,
        ));

        assert_eq!(config.pool.max_connections, 5);
        assert_eq!(config.manager.cache_ttl, Duration::from_millis(50));
        assert_eq!(config.manager.probe_ports, vec![9333]);
        assert_eq!(config.monitor.poll_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.monitor.max_failures, 2);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let err = assert_err!(Config::from_toml_str("[pool]\nmax_connections = 0"));
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let err = assert_err!(Config::from_toml_str("[pool\nmax_connections ="));
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[monitor]\nmax_failures = 3").expect("write");

        let config = assert_ok!(Config::from_file(file.path()));
        assert_eq!(config.monitor.max_failures, 3);
    }

    #[test]
    fn test_missing_file() {
        let err = assert_err!(Config::from_file("/nonexistent/remote-debug-pool.toml"));
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let text = assert_ok!(config.to_toml_string());
        assert_eq!(assert_ok!(Config::from_toml_str(&text)), config);
    }
}
