//! Remote-debug pool - pooled DevTools sessions for IDE endpoints.
//!
//! This library keeps live remote-debugging connections to IDE processes
//! (Electron-based editors started with `--remote-debugging-port`), keyed by
//! port, and builds two capabilities on top of them.
//!
//! # Architecture
//!
//! - **ConnectionPool**: bounded map of sessions with single-flight
//!   connect, LRU eviction and periodic health checks
//! - **ConnectionManager**: runs operations over one small pool and caches
//!   detected workspaces with a TTL
//! - **HealthMonitor**: polls endpoints out of band, counts failure streaks
//!   and flags stale endpoints
//!
//! Key design principles:
//!
//! - One connect attempt per endpoint at a time; every concurrent caller
//!   observes its outcome
//! - Background loops are owned handles, cancelled and joined on shutdown
//! - The monitor never consumes pooled sessions
//!
//! # Quick Start
//!
//! ```no_run
//! use remote_debug_pool::{ConnectionManager, Endpoint, HealthMonitor, ManagerConfig, MonitorConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::with_cdp(ManagerConfig::default())?;
//!     manager.initialize().await;
//!
//!     let endpoint = Endpoint::new(9222);
//!     let title = manager
//!         .execute(endpoint, |connection| async move {
//!             connection.evaluate("document.title").await
//!         })
//!         .await?;
//!     println!("Window title: {title}");
//!
//!     let monitor = HealthMonitor::with_http(MonitorConfig::default())?;
//!     monitor.register_endpoint(endpoint, "vscode");
//!     monitor.start_monitoring(None);
//!
//!     monitor.stop_monitoring().await;
//!     manager.destroy().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Aggregate TOML configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | [`ConnectionManager`] and the workspace cache |
//! | [`monitor`] | [`HealthMonitor`] and liveness probes |
//! | [`pool`] | [`ConnectionPool`] |
//! | [`protocol`] | DevTools message types |
//! | [`transport`] | WebSocket, discovery and session seams |

// ============================================================================
// Modules
// ============================================================================

/// Aggregate configuration loaded from TOML.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Workspace-detection façade over one pool.
pub mod manager;

/// Out-of-band endpoint liveness monitoring.
pub mod monitor;

/// Bounded pool of remote-debugging sessions.
pub mod pool;

/// DevTools protocol message types.
pub mod protocol;

/// Transport layer: WebSocket connection, discovery, connector.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::Config;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CdpSessionId, ConnectionId, Endpoint, RequestId, TargetId};

// Pool types
pub use pool::{
    ConnectionHealth, ConnectionPool, EntryStats, PoolConfig, PoolHealth, PoolStats,
    PooledConnection,
};

// Manager types
pub use manager::{ConnectionManager, ExtractionStrategy, ManagerConfig, ManagerHealth, WorkspaceInfo};

// Monitor types
pub use monitor::{
    EndpointHealth, EndpointMetrics, HealthEvent, HealthMonitor, HealthStatus, HttpProber,
    MonitorConfig, ProbeOutcome, Prober,
};

// Transport types
pub use transport::{CdpConnector, CdpSession, Connector, Session, Surface};
