//! Endpoint liveness monitoring.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`MonitorConfig`] |
//! | `core` | [`HealthMonitor`] |
//! | `probe` | [`Prober`] seam and [`HttpProber`] |
//! | `record` | [`HealthRecord`] and the stale transition |

pub mod config;
pub mod core;
pub mod probe;
pub mod record;

pub use config::MonitorConfig;
pub use self::core::HealthMonitor;
pub use probe::{HttpProber, ProbeOutcome, Prober};
pub use record::{
    EndpointHealth, EndpointMetrics, HealthEvent, HealthRecord, HealthStatus, History,
    HistoryEntry,
};
