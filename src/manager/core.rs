//! Workspace-detection façade over one connection pool.
//!
//! The manager owns a small pool, a TTL cache of detected workspaces and an
//! availability probe used at startup.
//!
//! # Example
//!
//! ```no_run
//! use remote_debug_pool::{ConnectionManager, Endpoint, ManagerConfig};
//!
//! # async fn example() -> remote_debug_pool::Result<()> {
//! let manager = ConnectionManager::with_cdp(ManagerConfig::default())?;
//! manager.initialize().await;
//!
//! if let Some(workspace) = manager.detect_workspace(Endpoint::new(9222)).await? {
//!     println!("{} at {:?}", workspace.name, workspace.path);
//! }
//!
//! manager.destroy().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::Endpoint;
use crate::pool::{ConnectionPool, PoolHealth, PooledConnection};
use crate::transport::{CdpConnector, Connector};

use super::cache::TtlCache;
use super::config::ManagerConfig;
use super::extract::{WorkspaceInfo, extract_workspace};

// ============================================================================
// ManagerHealth
// ============================================================================

/// Pool health merged with cache diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ManagerHealth {
    pub pool: PoolHealth,
    pub cache_entries: usize,
    pub initialized: bool,
}

// ============================================================================
// ConnectionManager
// ============================================================================

struct ManagerInner {
    config: ManagerConfig,
    connector: Arc<dyn Connector>,
    pool: ConnectionPool,
    cache: TtlCache<WorkspaceInfo>,
    initialized: AtomicBool,
}

/// Runs connection-requiring operations and caches detected workspaces.
///
/// Cheap-clone handle.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Creates a manager over `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: ManagerConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let pool = ConnectionPool::new(config.pool.clone(), Arc::clone(&connector))?;

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                connector,
                pool,
                cache: TtlCache::new(),
                initialized: AtomicBool::new(false),
            }),
        })
    }

    /// Creates a manager with the DevTools connector on `config.host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn with_cdp(config: ManagerConfig) -> Result<Self> {
        let connector = CdpConnector::with_host(config.host.clone())?;
        Self::new(config, Arc::new(connector))
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Returns the underlying pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    /// Returns `true` once [`initialize`](Self::initialize) ran.
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Starts pool maintenance and checks availability once. Idempotent.
    ///
    /// An unreachable transport only logs a warning.
    pub async fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.pool.start();

        if self.test_availability().await {
            info!("ConnectionManager initialized");
        } else {
            warn!(
                ports = ?self.inner.config.probe_ports,
                "No remote-debugging endpoint reachable; continuing without one"
            );
        }
    }

    /// Tries each probe port with a short connect and closes what it opens.
    ///
    /// Returns on the first success. Never fails.
    pub async fn test_availability(&self) -> bool {
        let probe_timeout = self.inner.config.probe_timeout;

        for &port in &self.inner.config.probe_ports {
            let endpoint = Endpoint::new(port);
            match timeout(probe_timeout, self.inner.connector.connect(endpoint)).await {
                Ok(Ok(session)) => {
                    if let Err(e) = session.close().await {
                        debug!(%endpoint, error = %e, "Closing availability session failed");
                    }
                    debug!(%endpoint, "Remote-debugging endpoint available");
                    return true;
                }
                Ok(Err(e)) => debug!(%endpoint, error = %e, "Availability probe failed"),
                Err(_) => debug!(%endpoint, "Availability probe timed out"),
            }
        }

        false
    }

    /// Drops every cached value, then destroys the pool.
    pub async fn destroy(&self) {
        let invalidated = self.invalidate_all();
        self.inner.pool.destroy().await;
        info!(invalidated, "ConnectionManager destroyed");
    }
}

// ============================================================================
// ConnectionManager - Operations
// ============================================================================

impl ConnectionManager {
    /// Returns a pooled connection that has an interaction surface.
    ///
    /// # Errors
    ///
    /// - Pool errors ([`Error::ConnectTimeout`], [`Error::ConnectRefused`], ...)
    /// - [`Error::NoSurfaceAvailable`] if the session has no page; the entry
    ///   is marked failed so the next call reconnects
    pub async fn get_connection(&self, endpoint: Endpoint) -> Result<PooledConnection> {
        let connection = self.inner.pool.get_connection(endpoint).await?;
        if !connection.has_surface() {
            self.inner.pool.mark_failed(endpoint);
            return Err(Error::no_surface(endpoint));
        }
        Ok(connection)
    }

    /// Runs `operation` with a connection and returns its result unchanged.
    ///
    /// Connection errors are converted with `E::from`.
    pub async fn execute<T, E, F, Fut>(&self, endpoint: Endpoint, operation: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(PooledConnection) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let connection = self.get_connection(endpoint).await?;
        let started = Instant::now();
        let result = operation(connection).await;
        debug!(
            %endpoint,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Operation finished"
        );
        result
    }

    /// Reads the workspace from `connection` with the fallback strategies.
    ///
    /// Returns `None` when every strategy fails.
    pub async fn extract_result(&self, connection: &PooledConnection) -> Option<WorkspaceInfo> {
        extract_workspace(connection).await
    }

    /// Cached workspace, else a fresh extraction cached with the default TTL.
    ///
    /// # Errors
    ///
    /// Connection errors from [`get_connection`](Self::get_connection).
    pub async fn detect_workspace(&self, endpoint: Endpoint) -> Result<Option<WorkspaceInfo>> {
        if let Some(cached) = self.get_cached(endpoint) {
            return Ok(Some(cached));
        }

        let found = self
            .execute(endpoint, |connection| async move {
                Ok::<_, Error>(extract_workspace(&connection).await)
            })
            .await?;

        if let Some(info) = &found {
            self.cache_result_default(endpoint, info.clone());
        }
        Ok(found)
    }
}

// ============================================================================
// ConnectionManager - Cache
// ============================================================================

impl ConnectionManager {
    /// Caches `value` for `ttl`, replacing any previous value and timer.
    pub fn cache_result(&self, endpoint: Endpoint, value: WorkspaceInfo, ttl: Duration) {
        debug!(%endpoint, ttl_ms = ttl.as_millis() as u64, "Caching workspace");
        self.inner.cache.insert(endpoint, value, ttl);
    }

    /// Caches `value` with the configured TTL.
    pub fn cache_result_default(&self, endpoint: Endpoint, value: WorkspaceInfo) {
        self.cache_result(endpoint, value, self.inner.config.cache_ttl);
    }

    /// Cached value while fresh.
    #[must_use]
    pub fn get_cached(&self, endpoint: Endpoint) -> Option<WorkspaceInfo> {
        self.inner.cache.get(endpoint)
    }

    /// Drops the cached value and its timer.
    pub fn invalidate(&self, endpoint: Endpoint) -> bool {
        self.inner.cache.remove(endpoint)
    }

    /// Drops every cached value; returns how many were dropped.
    pub fn invalidate_all(&self) -> usize {
        self.inner.cache.clear()
    }

    /// Pool health plus cache size.
    #[must_use]
    pub fn health_status(&self) -> ManagerHealth {
        ManagerHealth {
            pool: self.inner.pool.health(),
            cache_entries: self.inner.cache.len(),
            initialized: self.is_initialized(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
