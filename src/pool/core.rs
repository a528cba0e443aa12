//! Bounded pool of remote-debugging sessions keyed by endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ConnectionPool                │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ 9222 → Healthy     (session)           │  │
//! │  │ 9229 → Connecting  (watch receiver)    │  │
//! │  │ 9333 → Failed      (replaced on reuse) │  │
//! │  └────────────────────────────────────────┘  │
//! │   cleanup loop      health-check loop        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A connect attempt runs in its own task and resolves a per-key
//! single-assignment `watch` channel. Every caller asking for the endpoint
//! meanwhile waits on that channel, so one attempt serves all of them.
//!
//! No lock is held across an `.await`; entry state is re-read after every
//! suspension point.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, Endpoint};
use crate::transport::{Connector, Session};

use super::config::PoolConfig;
use super::entry::{ConnectState, ConnectionEntry, ConnectionHealth, PooledConnection};
use super::stats::{EntryStats, PoolHealth, PoolStats};

// ============================================================================
// Types
// ============================================================================

/// Outcome of reserving a slot for an endpoint.
enum Reservation {
    /// An attempt is already running.
    Wait(watch::Receiver<ConnectState>),
    /// A placeholder was inserted; the caller starts the attempt.
    Start {
        id: ConnectionId,
        sender: watch::Sender<ConnectState>,
        receiver: watch::Receiver<ConnectState>,
        displaced: Vec<ConnectionEntry>,
    },
    /// Every slot is held by an in-flight attempt.
    Exhausted(Vec<ConnectionEntry>),
    /// The pool was destroyed.
    Closed,
}

/// Owns the sender of one attempt.
///
/// Dropped without resolving (the attempt panicked or its task was
/// aborted), it removes its own placeholder and resolves waiters with
/// [`Error::ConnectionClosed`].
struct AttemptGuard {
    inner: Arc<PoolInner>,
    endpoint: Endpoint,
    id: ConnectionId,
    sender: Option<watch::Sender<ConnectState>>,
}

impl AttemptGuard {
    fn resolve(mut self, outcome: Result<PooledConnection>) {
        if let Some(sender) = self.sender.take() {
            sender.send_replace(Some(outcome));
        }
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        {
            let mut entries = self.inner.entries.lock();
            if entries
                .get(&self.endpoint)
                .is_some_and(|e| e.id == self.id && e.is_in_flight())
            {
                entries.remove(&self.endpoint);
            }
        }
        self.inner
            .counters
            .connects_failed
            .fetch_add(1, Ordering::Relaxed);
        warn!(endpoint = %self.endpoint, id = %self.id, "Connection attempt ended without an outcome");
        sender.send_replace(Some(Err(Error::ConnectionClosed)));
    }
}

/// Lookup result of the reuse fast path.
enum Lookup {
    Reuse(PooledConnection),
    InFlight,
    Replace,
    Missing,
}

/// Handles of the two maintenance loops.
#[derive(Default)]
struct Maintenance {
    cleanup: Option<JoinHandle<()>>,
    health_check: Option<JoinHandle<()>>,
}

impl Maintenance {
    fn is_running(&self) -> bool {
        self.cleanup.is_some() || self.health_check.is_some()
    }

    fn take_all(&mut self) -> Vec<JoinHandle<()>> {
        self.cleanup
            .take()
            .into_iter()
            .chain(self.health_check.take())
            .collect()
    }
}

/// Lifetime counters reported in [`PoolStats`].
#[derive(Default)]
struct Counters {
    connects_started: AtomicU64,
    connects_failed: AtomicU64,
    evictions: AtomicU64,
}

/// Internal shared state for the pool.
pub(crate) struct PoolInner {
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    entries: Mutex<FxHashMap<Endpoint, ConnectionEntry>>,
    maintenance: Mutex<Maintenance>,
    counters: Counters,
    closed: AtomicBool,
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Bounded pool of reusable sessions.
///
/// Cheap-clone handle; clones share the same entries.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use remote_debug_pool::{CdpConnector, ConnectionPool, Endpoint, PoolConfig};
///
/// # async fn example() -> remote_debug_pool::Result<()> {
/// let pool = ConnectionPool::new(PoolConfig::default(), Arc::new(CdpConnector::new()?))?;
/// pool.start();
///
/// let connection = pool.get_connection(Endpoint::new(9222)).await?;
/// let title = connection.evaluate("document.title").await?;
///
/// pool.destroy().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

// ============================================================================
// ConnectionPool - Constructor
// ============================================================================

impl ConnectionPool {
    /// Creates an empty pool. Maintenance loops start with [`start`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    ///
    /// [`start`]: ConnectionPool::start
    pub fn new(config: PoolConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;

        debug!(
            max_connections = config.max_connections,
            connect_timeout_ms = config.connect_timeout.as_millis() as u64,
            "ConnectionPool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                connector,
                entries: Mutex::new(FxHashMap::default()),
                maintenance: Mutex::new(Maintenance::default()),
                counters: Counters::default(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Returns the number of entries, placeholders included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns `true` if the pool holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`destroy`](ConnectionPool::destroy) ran.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }
        Ok(())
    }
}

// ============================================================================
// ConnectionPool - Acquire
// ============================================================================

impl ConnectionPool {
    /// Returns a healthy pooled connection, creating one if needed.
    ///
    /// An unhealthy entry is closed and replaced. A running attempt for the
    /// endpoint is joined instead of starting a second one.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectTimeout`] / [`Error::ConnectRefused`] from the attempt
    /// - [`Error::PoolExhausted`] if every slot is connecting
    /// - [`Error::PoolClosed`] after destroy
    pub async fn get_connection(&self, endpoint: Endpoint) -> Result<PooledConnection> {
        self.ensure_open()?;

        let (lookup, stale) = {
            let mut entries = self.inner.entries.lock();
            let lookup = match entries.get_mut(&endpoint) {
                Some(entry) if entry.is_in_flight() => Lookup::InFlight,
                Some(entry) if entry.health == ConnectionHealth::Healthy => match entry.handle() {
                    Some(handle) => {
                        entry.touch();
                        Lookup::Reuse(handle)
                    }
                    None => Lookup::Replace,
                },
                Some(_) => Lookup::Replace,
                None => Lookup::Missing,
            };
            let stale = match lookup {
                Lookup::Replace => entries.remove(&endpoint),
                _ => None,
            };
            (lookup, stale)
        };

        match lookup {
            Lookup::Reuse(handle) => {
                debug!(%endpoint, id = %handle.id(), "Reusing pooled connection");
                Ok(handle)
            }
            Lookup::Replace => {
                if let Some(stale) = stale {
                    debug!(%endpoint, id = %stale.id, health = %stale.health, "Replacing unhealthy connection");
                    close_entry(stale).await;
                }
                self.create_connection(endpoint).await
            }
            Lookup::InFlight | Lookup::Missing => self.create_connection(endpoint).await,
        }
    }

    /// Creates a connection for `endpoint`, or joins the running attempt.
    ///
    /// A settled entry for the endpoint is replaced. When the pool is full
    /// the least-recently-used settled entry is evicted first.
    ///
    /// # Errors
    ///
    /// Same as [`get_connection`](ConnectionPool::get_connection).
    pub async fn create_connection(&self, endpoint: Endpoint) -> Result<PooledConnection> {
        self.ensure_open()?;

        match self.reserve(endpoint) {
            Reservation::Wait(receiver) => {
                debug!(%endpoint, "Connect already in flight, waiting");
                wait_for_outcome(receiver).await
            }
            Reservation::Start {
                id,
                sender,
                receiver,
                displaced,
            } => {
                for entry in displaced {
                    close_entry(entry).await;
                }
                self.spawn_attempt(endpoint, id, sender);
                wait_for_outcome(receiver).await
            }
            Reservation::Exhausted(displaced) => {
                for entry in displaced {
                    close_entry(entry).await;
                }
                warn!(%endpoint, max = self.inner.config.max_connections, "Pool exhausted");
                Err(Error::PoolExhausted {
                    max: self.inner.config.max_connections,
                })
            }
            Reservation::Closed => Err(Error::PoolClosed),
        }
    }

    /// Synchronously claims the endpoint's slot.
    ///
    /// The closed flag is read under the entries lock, so nothing is
    /// inserted once [`destroy`](ConnectionPool::destroy) has drained.
    fn reserve(&self, endpoint: Endpoint) -> Reservation {
        let mut entries = self.inner.entries.lock();

        if self.inner.closed.load(Ordering::SeqCst) {
            return Reservation::Closed;
        }

        if let Some(receiver) = entries
            .get(&endpoint)
            .filter(|e| !e.is_stranded())
            .and_then(|e| e.in_flight.clone())
        {
            return Reservation::Wait(receiver);
        }

        let mut displaced: Vec<ConnectionEntry> = entries.remove(&endpoint).into_iter().collect();

        if entries.len() >= self.inner.config.max_connections {
            match lru_victim(&entries) {
                Some(victim) => {
                    if let Some(entry) = entries.remove(&victim) {
                        self.inner.counters.evictions.fetch_add(1, Ordering::Relaxed);
                        info!(endpoint = %victim, id = %entry.id, "Evicting least recently used connection");
                        displaced.push(entry);
                    }
                }
                None => return Reservation::Exhausted(displaced),
            }
        }

        let (entry, sender) = ConnectionEntry::placeholder(endpoint);
        let id = entry.id;
        let receiver = sender.subscribe();
        entries.insert(endpoint, entry);
        self.inner
            .counters
            .connects_started
            .fetch_add(1, Ordering::Relaxed);

        Reservation::Start {
            id,
            sender,
            receiver,
            displaced,
        }
    }

    /// Runs the connect attempt in its own task.
    ///
    /// The task owns the sender through an [`AttemptGuard`], so neither a
    /// cancelled caller nor a dead attempt can strand the placeholder.
    fn spawn_attempt(&self, endpoint: Endpoint, id: ConnectionId, sender: watch::Sender<ConnectState>) {
        let inner = Arc::clone(&self.inner);
        let guard = AttemptGuard {
            inner: Arc::clone(&self.inner),
            endpoint,
            id,
            sender: Some(sender),
        };
        tokio::spawn(async move {
            let connect_timeout = inner.config.connect_timeout;
            let outcome = match timeout(connect_timeout, inner.connector.connect(endpoint)).await {
                Ok(result) => result,
                Err(_) => Err(Error::connect_timeout(
                    endpoint,
                    connect_timeout.as_millis() as u64,
                )),
            };

            let outcome = inner.settle(endpoint, id, outcome).await;
            guard.resolve(outcome);
        });
    }

    /// Marks an entry failed so the next acquire replaces it.
    ///
    /// Returns `false` if there is no settled entry for the endpoint.
    pub fn mark_failed(&self, endpoint: Endpoint) -> bool {
        let mut entries = self.inner.entries.lock();
        match entries.get_mut(&endpoint) {
            Some(entry) if !entry.is_in_flight() => {
                entry.health = ConnectionHealth::Failed;
                true
            }
            _ => false,
        }
    }
}

impl PoolInner {
    /// Installs or discards the result of an attempt.
    async fn settle(
        &self,
        endpoint: Endpoint,
        id: ConnectionId,
        outcome: Result<Arc<dyn Session>>,
    ) -> Result<PooledConnection> {
        match outcome {
            Ok(session) => {
                let installed = {
                    let mut entries = self.entries.lock();
                    match entries.get_mut(&endpoint) {
                        Some(entry) if entry.id == id => {
                            entry.settle(Arc::clone(&session));
                            entry.handle()
                        }
                        _ => None,
                    }
                };

                match installed {
                    Some(handle) => {
                        info!(%endpoint, %id, "Connection established");
                        Ok(handle)
                    }
                    None => {
                        warn!(%endpoint, %id, "Entry removed while connecting, discarding session");
                        if let Err(e) = session.close().await {
                            debug!(%endpoint, error = %e, "Close of discarded session failed");
                        }
                        Err(Error::ConnectionClosed)
                    }
                }
            }
            Err(err) => {
                {
                    let mut entries = self.entries.lock();
                    if entries.get(&endpoint).is_some_and(|e| e.id == id) {
                        entries.remove(&endpoint);
                    }
                }
                self.counters.connects_failed.fetch_add(1, Ordering::Relaxed);
                warn!(%endpoint, %id, error = %err, "Connection attempt failed");
                Err(err)
            }
        }
    }
}

// ============================================================================
// ConnectionPool - Release
// ============================================================================

impl ConnectionPool {
    /// Closes and removes the endpoint's entry.
    ///
    /// Idempotent and infallible; returns whether an entry was removed.
    /// Removing a placeholder makes its attempt fail with
    /// [`Error::ConnectionClosed`].
    pub async fn close_connection(&self, endpoint: Endpoint) -> bool {
        let removed = self.inner.entries.lock().remove(&endpoint);
        match removed {
            Some(entry) => {
                debug!(%endpoint, id = %entry.id, "Closing connection");
                close_entry(entry).await;
                true
            }
            None => false,
        }
    }

    /// Closes every entry concurrently.
    ///
    /// Individual close failures are logged; returns the number of entries
    /// removed.
    pub async fn close_all_connections(&self) -> usize {
        let drained: Vec<ConnectionEntry> = {
            let mut entries = self.inner.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };

        let count = drained.len();
        join_all(drained.into_iter().map(close_entry)).await;

        if count > 0 {
            info!(count, "Closed all pooled connections");
        }
        count
    }
}

// ============================================================================
// ConnectionPool - Maintenance
// ============================================================================

impl ConnectionPool {
    /// Removes unhealthy entries idle for more than twice the cleanup
    /// interval.
    ///
    /// Healthy entries are never removed here. Returns the number removed.
    pub async fn cleanup(&self) -> usize {
        let max_idle = self.inner.config.cleanup_interval * 2;
        let now = Instant::now();

        let removed: Vec<ConnectionEntry> = {
            let mut entries = self.inner.entries.lock();
            let expired: Vec<Endpoint> = entries
                .values()
                .filter(|e| {
                    !e.is_in_flight()
                        && e.health != ConnectionHealth::Healthy
                        && now.duration_since(e.last_used_at) > max_idle
                })
                .map(|e| e.endpoint)
                .collect();
            expired
                .iter()
                .filter_map(|endpoint| entries.remove(endpoint))
                .collect()
        };

        let count = removed.len();
        join_all(removed.into_iter().map(close_entry)).await;

        if count > 0 {
            info!(count, "Cleanup removed idle unhealthy connections");
        }
        count
    }

    /// Probes every settled entry, then removes the ones marked failed.
    ///
    /// Returns the number removed. Errors never escape.
    pub async fn health_check(&self) -> usize {
        let probe_timeout = self.inner.config.health_check_timeout;

        let targets: Vec<(Endpoint, ConnectionId, Option<Arc<dyn Session>>)> = {
            let entries = self.inner.entries.lock();
            entries
                .values()
                .filter(|e| !e.is_in_flight())
                .map(|e| (e.endpoint, e.id, e.session.clone()))
                .collect()
        };

        let results = join_all(targets.into_iter().map(|(endpoint, id, session)| async move {
            let healthy = match session {
                Some(session) => match timeout(probe_timeout, session.probe()).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        debug!(%endpoint, error = %e, "Session probe failed");
                        false
                    }
                    Err(_) => {
                        debug!(%endpoint, "Session probe timed out");
                        false
                    }
                },
                None => false,
            };
            (endpoint, id, healthy)
        }))
        .await;

        let failed: Vec<ConnectionEntry> = {
            let mut entries = self.inner.entries.lock();
            for (endpoint, id, healthy) in results {
                if let Some(entry) = entries.get_mut(&endpoint)
                    && entry.id == id
                {
                    entry.health = if healthy {
                        ConnectionHealth::Healthy
                    } else {
                        ConnectionHealth::Failed
                    };
                }
            }

            let failed: Vec<Endpoint> = entries
                .values()
                .filter(|e| !e.is_in_flight() && e.health == ConnectionHealth::Failed)
                .map(|e| e.endpoint)
                .collect();
            failed
                .iter()
                .filter_map(|endpoint| entries.remove(endpoint))
                .collect()
        };

        let count = failed.len();
        join_all(failed.into_iter().map(close_entry)).await;

        if count > 0 {
            warn!(count, "Health check removed failed connections");
        }
        count
    }

    /// Starts the cleanup and health-check loops.
    ///
    /// Idempotent. The loops hold only a weak reference and stop when the
    /// last pool handle is dropped.
    pub fn start(&self) {
        if self.is_closed() {
            warn!("ConnectionPool::start called after destroy");
            return;
        }

        let mut maintenance = self.inner.maintenance.lock();
        if maintenance.is_running() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        maintenance.cleanup = Some(spawn_maintenance(
            weak.clone(),
            self.inner.config.cleanup_interval,
            |pool| async move {
                pool.cleanup().await;
            },
        ));
        maintenance.health_check = Some(spawn_maintenance(
            weak,
            self.inner.config.health_check_interval,
            |pool| async move {
                pool.health_check().await;
            },
        ));

        info!(
            cleanup_interval_ms = self.inner.config.cleanup_interval.as_millis() as u64,
            health_check_interval_ms = self.inner.config.health_check_interval.as_millis() as u64,
            "ConnectionPool maintenance started"
        );
    }

    /// Returns `true` while the maintenance loops run.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.maintenance.lock().is_running()
    }

    /// Stops both loops and closes every connection.
    ///
    /// Idempotent. When this returns no loop iteration is running or will
    /// run again.
    pub async fn destroy(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);

        let handles = self.inner.maintenance.lock().take_all();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }

        let closed = self.close_all_connections().await;
        info!(closed, "ConnectionPool destroyed");
    }
}

// ============================================================================
// ConnectionPool - Diagnostics
// ============================================================================

impl ConnectionPool {
    /// Counts by health and utilization. No side effects.
    #[must_use]
    pub fn health(&self) -> PoolHealth {
        let entries = self.inner.entries.lock();
        PoolHealth::from_entries(entries.values(), self.inner.config.max_connections)
    }

    /// Health plus per-entry age and idle time. No side effects.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let now = Instant::now();
        let entries = self.inner.entries.lock();
        let mut per_entry: Vec<EntryStats> = entries
            .values()
            .map(|e| EntryStats {
                endpoint: e.endpoint,
                id: e.id.as_u64(),
                health: e.health,
                in_flight: e.is_in_flight(),
                age: now.duration_since(e.created_at),
                idle: now.duration_since(e.last_used_at),
            })
            .collect();
        per_entry.sort_by_key(|e| e.endpoint);

        PoolStats {
            health: PoolHealth::from_entries(entries.values(), self.inner.config.max_connections),
            entries: per_entry,
            connects_started: self.inner.counters.connects_started.load(Ordering::Relaxed),
            connects_failed: self.inner.counters.connects_failed.load(Ordering::Relaxed),
            evictions: self.inner.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Returns the entry's health, if the endpoint is pooled.
    #[must_use]
    pub fn entry_health(&self, endpoint: Endpoint) -> Option<ConnectionHealth> {
        self.inner.entries.lock().get(&endpoint).map(|e| e.health)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Least-recently-used settled or stranded entry.
fn lru_victim(entries: &FxHashMap<Endpoint, ConnectionEntry>) -> Option<Endpoint> {
    entries
        .values()
        .filter(|e| !e.is_in_flight() || e.is_stranded())
        .min_by_key(|e| e.last_used_at)
        .map(|e| e.endpoint)
}

/// Closes an already-removed entry, logging failures.
async fn close_entry(entry: ConnectionEntry) {
    if let Some(session) = entry.session
        && let Err(e) = session.close().await
    {
        warn!(endpoint = %entry.endpoint, id = %entry.id, error = %e, "Failed to close session");
    }
}

/// Waits for an attempt to resolve.
async fn wait_for_outcome(mut receiver: watch::Receiver<ConnectState>) -> Result<PooledConnection> {
    match receiver.wait_for(Option::is_some).await {
        Ok(state) => (*state).clone().unwrap_or(Err(Error::ConnectionClosed)),
        Err(_) => Err(Error::ConnectionClosed),
    }
}

/// Spawns a periodic loop that skips the immediate first tick.
fn spawn_maintenance<F, Fut>(inner: Weak<PoolInner>, period: Duration, task: F) -> JoinHandle<()>
where
    F: Fn(ConnectionPool) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                debug!("ConnectionPool dropped, maintenance loop exiting");
                break;
            };
            task(ConnectionPool { inner }).await;
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{MockConnector, init_tracing};

    fn pool_with(config: PoolConfig, connector: &Arc<MockConnector>) -> ConnectionPool {
        init_tracing();
        ConnectionPool::new(config, Arc::clone(connector) as Arc<dyn Connector>).expect("pool")
    }

    #[tokio::test(start_paused = true)]
    async fn test_reuses_healthy_connection() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::default(), &connector);

        let first = pool.get_connection(Endpoint::new(9222)).await.expect("first");
        let second = pool.get_connection(Endpoint::new(9222)).await.expect("second");

        assert_eq!(first.id(), second.id());
        assert!(first.same_session(&second));
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_attempt() {
        let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(200)));
        let pool = pool_with(PoolConfig::default(), &connector);
        let endpoint = Endpoint::new(9222);

        let results = join_all((0..8).map(|_| pool.get_connection(endpoint))).await;

        assert_eq!(connector.connect_count(), 1);
        let ids: Vec<ConnectionId> = results
            .into_iter()
            .map(|r| r.expect("connection").id())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_failure() {
        let connector = Arc::new(
            MockConnector::new()
                .with_delay(Duration::from_millis(100))
                .failing(Endpoint::new(9300)),
        );
        let pool = pool_with(PoolConfig::default(), &connector);

        let results = join_all((0..5).map(|_| pool.get_connection(Endpoint::new(9300)))).await;

        assert_eq!(connector.connect_count(), 1);
        for result in results {
            assert!(matches!(result, Err(Error::ConnectRefused { .. })));
        }
        assert!(pool.is_empty());
        assert_eq!(pool.stats().connects_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_removes_placeholder() {
        let connector = Arc::new(MockConnector::new().with_delay(Duration::from_secs(60)));
        let config = PoolConfig::new().with_connect_timeout(Duration::from_millis(500));
        let pool = pool_with(config, &connector);

        let err = pool.get_connection(Endpoint::new(9222)).await.unwrap_err();

        assert!(matches!(err, Error::ConnectTimeout { timeout_ms: 500, .. }));
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_attempt_releases_slot() {
        let connector = Arc::new(MockConnector::new().panicking_once());
        let pool = pool_with(PoolConfig::new().with_max_connections(1), &connector);
        let endpoint = Endpoint::new(9222);

        let err = pool.get_connection(endpoint).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(pool.is_empty());
        assert_eq!(pool.stats().connects_failed, 1);

        pool.get_connection(endpoint).await.expect("after panic");
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(pool.entry_health(endpoint), Some(ConnectionHealth::Healthy));

        // The single slot is usable by another endpoint too.
        pool.get_connection(Endpoint::new(9229)).await.expect("other endpoint");
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stranded_placeholder_is_replaced() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::new().with_max_connections(1), &connector);
        let endpoint = Endpoint::new(9222);

        let (placeholder, sender) = ConnectionEntry::placeholder(endpoint);
        drop(sender);
        pool.inner.entries.lock().insert(endpoint, placeholder);

        pool.get_connection(endpoint).await.expect("replaces stranded entry");
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stranded_placeholder_can_be_evicted() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::new().with_max_connections(1), &connector);

        let (placeholder, sender) = ConnectionEntry::placeholder(Endpoint::new(1));
        drop(sender);
        pool.inner.entries.lock().insert(Endpoint::new(1), placeholder);

        pool.get_connection(Endpoint::new(2)).await.expect("evicts stranded entry");
        assert!(pool.entry_health(Endpoint::new(1)).is_none());
        assert_eq!(pool.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_refuses_after_close() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::default(), &connector);

        // Closed flag set between the open check and the reservation.
        pool.inner.closed.store(true, Ordering::SeqCst);

        assert!(matches!(pool.reserve(Endpoint::new(9222)), Reservation::Closed));
        assert!(pool.is_empty());
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_entry_is_replaced() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::default(), &connector);
        let endpoint = Endpoint::new(9222);

        let first = pool.get_connection(endpoint).await.expect("first");
        assert!(pool.mark_failed(endpoint));
        let second = pool.get_connection(endpoint).await.expect("second");

        assert_ne!(first.id(), second.id());
        assert_eq!(connector.connect_count(), 2);
        assert!(connector.sessions()[0].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_least_recently_used() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::new().with_max_connections(2), &connector);

        pool.get_connection(Endpoint::new(1)).await.expect("1");
        tokio::time::advance(Duration::from_millis(10)).await;
        pool.get_connection(Endpoint::new(2)).await.expect("2");
        tokio::time::advance(Duration::from_millis(10)).await;
        // Touch 1 so 2 becomes the oldest.
        pool.get_connection(Endpoint::new(1)).await.expect("1 again");
        tokio::time::advance(Duration::from_millis(10)).await;

        pool.get_connection(Endpoint::new(3)).await.expect("3");

        assert_eq!(pool.len(), 2);
        assert!(pool.entry_health(Endpoint::new(1)).is_some());
        assert!(pool.entry_health(Endpoint::new(2)).is_none());
        assert!(pool.entry_health(Endpoint::new(3)).is_some());
        assert_eq!(pool.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_capacity() {
        let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(5)));
        let pool = pool_with(PoolConfig::new().with_max_connections(3), &connector);

        for port in 1..=10u16 {
            pool.get_connection(Endpoint::new(port)).await.expect("connection");
            assert!(pool.len() <= 3);
        }
        assert_eq!(pool.health().total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_when_all_slots_in_flight() {
        let connector = Arc::new(MockConnector::new().with_delay(Duration::from_secs(5)));
        let pool = pool_with(PoolConfig::new().with_max_connections(1), &connector);

        let background = pool.clone();
        let pending = tokio::spawn(async move { background.get_connection(Endpoint::new(1)).await });
        tokio::task::yield_now().await;

        let err = pool.get_connection(Endpoint::new(2)).await.unwrap_err();
        assert!(matches!(err, Error::PoolExhausted { max: 1 }));

        pending.await.expect("join").expect("first connection");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_connection_is_idempotent() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::default(), &connector);
        let endpoint = Endpoint::new(9222);

        pool.get_connection(endpoint).await.expect("connection");

        assert!(pool.close_connection(endpoint).await);
        assert!(!pool.close_connection(endpoint).await);
        assert!(connector.sessions()[0].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_failure_still_removes() {
        let connector = Arc::new(MockConnector::new().with_close_failure());
        let pool = pool_with(PoolConfig::default(), &connector);
        let endpoint = Endpoint::new(9222);

        pool.get_connection(endpoint).await.expect("connection");

        assert!(pool.close_connection(endpoint).await);
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_connect_discards_session() {
        let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(100)));
        let pool = pool_with(PoolConfig::default(), &connector);
        let endpoint = Endpoint::new(9222);

        let background = pool.clone();
        let pending = tokio::spawn(async move { background.get_connection(endpoint).await });
        tokio::task::yield_now().await;

        assert!(pool.close_connection(endpoint).await);
        let result = pending.await.expect("join");

        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(pool.is_empty());
        assert!(connector.sessions()[0].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_ignores_individual_failures() {
        let connector = Arc::new(MockConnector::new().with_close_failure());
        let pool = pool_with(PoolConfig::default(), &connector);

        for port in [1u16, 2, 3] {
            pool.get_connection(Endpoint::new(port)).await.expect("connection");
        }

        assert_eq!(pool.close_all_connections().await, 3);
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_only_removes_unhealthy_idle() {
        let connector = Arc::new(MockConnector::new());
        let config = PoolConfig::new().with_cleanup_interval(Duration::from_secs(10));
        let pool = pool_with(config, &connector);

        pool.get_connection(Endpoint::new(1)).await.expect("healthy");
        pool.get_connection(Endpoint::new(2)).await.expect("to fail");
        pool.mark_failed(Endpoint::new(2));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(pool.cleanup().await, 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(pool.cleanup().await, 1);

        assert_eq!(pool.entry_health(Endpoint::new(1)), Some(ConnectionHealth::Healthy));
        assert!(pool.entry_health(Endpoint::new(2)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_removes_failed_probes() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::default(), &connector);

        pool.get_connection(Endpoint::new(1)).await.expect("1");
        pool.get_connection(Endpoint::new(2)).await.expect("2");
        connector.sessions()[1].set_probe_ok(false);

        assert_eq!(pool.health_check().await, 1);
        assert_eq!(pool.entry_health(Endpoint::new(1)), Some(ConnectionHealth::Healthy));
        assert!(pool.entry_health(Endpoint::new(2)).is_none());
        assert!(connector.sessions()[1].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_timeout_marks_failed() {
        let connector = Arc::new(MockConnector::new());
        let config = PoolConfig::new().with_health_check_timeout(Duration::from_millis(100));
        let pool = pool_with(config, &connector);

        pool.get_connection(Endpoint::new(1)).await.expect("1");
        connector.sessions()[0].set_probe_delay(Duration::from_secs(10));

        assert_eq!(pool.health_check().await, 1);
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_and_stats() {
        let connector = Arc::new(MockConnector::new());
        let pool = pool_with(PoolConfig::new().with_max_connections(4), &connector);

        pool.get_connection(Endpoint::new(1)).await.expect("1");
        pool.get_connection(Endpoint::new(2)).await.expect("2");
        pool.mark_failed(Endpoint::new(2));
        tokio::time::advance(Duration::from_secs(3)).await;

        let health = pool.health();
        assert_eq!(health.total, 2);
        assert_eq!(health.healthy, 1);
        assert_eq!(health.failed, 1);
        assert!((health.utilization - 0.5).abs() < f64::EPSILON);

        let stats = pool.stats();
        assert_eq!(stats.entries.len(), 2);
        assert!(stats.entries.iter().all(|e| e.age >= Duration::from_secs(3)));
        assert_eq!(stats.connects_started, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_loop_runs_health_check() {
        let connector = Arc::new(MockConnector::new());
        let config = PoolConfig::new().with_health_check_interval(Duration::from_secs(5));
        let pool = pool_with(config, &connector);
        pool.start();
        pool.start();

        pool.get_connection(Endpoint::new(1)).await.expect("1");
        connector.sessions()[0].set_probe_ok(false);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(pool.is_empty());

        pool.destroy().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_stops_maintenance() {
        let connector = Arc::new(MockConnector::new());
        let config = PoolConfig::new().with_health_check_interval(Duration::from_secs(1));
        let pool = pool_with(config, &connector);

        pool.destroy().await;
        pool.destroy().await;

        pool.start();
        assert!(!pool.is_running());

        let probes_before = connector.probe_count();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.probe_count(), probes_before);

        let err = pool.get_connection(Endpoint::new(1)).await.unwrap_err();
        assert!(matches!(err, Error::PoolClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timer_mutation_after_destroy() {
        let connector = Arc::new(MockConnector::new());
        let config = PoolConfig::new().with_health_check_interval(Duration::from_secs(1));
        let pool = pool_with(config, &connector);
        pool.start();

        pool.get_connection(Endpoint::new(1)).await.expect("1");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let probes = connector.probe_count();
        assert!(probes >= 1);

        pool.destroy().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!pool.is_running());
        assert_eq!(connector.probe_count(), probes);
    }
}
