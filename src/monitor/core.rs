//! Periodic liveness monitor.
//!
//! Polls every registered endpoint with a cheap out-of-band [`Prober`],
//! tracks failure streaks and publishes stale transitions on a broadcast
//! channel.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identifiers::Endpoint;

use super::config::MonitorConfig;
use super::probe::{HttpProber, ProbeOutcome, Prober};
use super::record::{
    EndpointHealth, EndpointMetrics, HealthEvent, HealthRecord, HealthStatus, HistoryEntry,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the monitor.
struct MonitorInner {
    config: MonitorConfig,
    prober: Arc<dyn Prober>,
    records: Mutex<FxHashMap<Endpoint, HealthRecord>>,
    max_failures: AtomicU32,
    next_registration: AtomicU64,
    /// Serializes overlapping sweeps.
    poll_lock: AsyncMutex<()>,
    poller: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<HealthEvent>,
}

/// Result of one probe before it is applied to the record.
struct Observation {
    status: HealthStatus,
    response_time: Duration,
    error: Option<String>,
    browser: Option<String>,
    protocol_version: Option<String>,
    target_count: Option<usize>,
}

// ============================================================================
// HealthMonitor
// ============================================================================

/// Liveness monitor keyed by endpoint.
///
/// Cheap-clone handle. Independent of any pool: it opens no sessions.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

impl HealthMonitor {
    /// Creates a monitor using `prober`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration
    /// is invalid.
    pub fn new(config: MonitorConfig, prober: Arc<dyn Prober>) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let max_failures = config.max_failures;

        Ok(Self {
            inner: Arc::new(MonitorInner {
                config,
                prober,
                records: Mutex::new(FxHashMap::default()),
                max_failures: AtomicU32::new(max_failures),
                next_registration: AtomicU64::new(1),
                poll_lock: AsyncMutex::new(()),
                poller: Mutex::new(None),
                events,
            }),
        })
    }

    /// Creates a monitor probing over HTTP on `config.host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn with_http(config: MonitorConfig) -> Result<Self> {
        let prober = HttpProber::new(config.host.clone())?;
        Self::new(config, Arc::new(prober))
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Subscribes to stale and recovered notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.inner.events.subscribe()
    }
}

// ============================================================================
// HealthMonitor - Registration
// ============================================================================

impl HealthMonitor {
    /// Starts tracking `endpoint`. Re-registering replaces the record.
    pub fn register_endpoint(&self, endpoint: Endpoint, kind: impl Into<String>) {
        let mut record = HealthRecord::new(endpoint, kind, self.inner.config.history_capacity);
        record.registration = self.inner.next_registration.fetch_add(1, Ordering::Relaxed);
        debug!(%endpoint, kind = %record.kind, "Endpoint registered");
        self.inner.records.lock().insert(endpoint, record);
    }

    /// Stops tracking `endpoint` and drops its history.
    pub fn unregister_endpoint(&self, endpoint: Endpoint) -> bool {
        let removed = self.inner.records.lock().remove(&endpoint).is_some();
        if removed {
            debug!(%endpoint, "Endpoint unregistered");
        }
        removed
    }

    /// Registered endpoints, sorted.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self.inner.records.lock().keys().copied().collect();
        endpoints.sort_unstable();
        endpoints
    }
}

// ============================================================================
// HealthMonitor - Polling
// ============================================================================

impl HealthMonitor {
    /// Starts periodic polling. Idempotent.
    ///
    /// The period is `interval`, else the configured poll interval, else
    /// 30 seconds. The first sweep runs one period after the call.
    pub fn start_monitoring(&self, interval: Option<Duration>) {
        let mut poller = self.inner.poller.lock();
        if poller.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let period = self.inner.config.resolve_poll_interval(interval);
        let weak = Arc::downgrade(&self.inner);
        *poller = Some(tokio::spawn(poll_loop(weak, period)));

        info!(interval_ms = period.as_millis() as u64, "Health monitoring started");
    }

    /// Stops polling. Idempotent.
    ///
    /// Once this returns no sweep is running or will run again.
    pub async fn stop_monitoring(&self) {
        let handle = self.inner.poller.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            info!("Health monitoring stopped");
        }
    }

    /// Returns `true` while the poll loop runs.
    #[inline]
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.inner
            .poller
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Checks every registered endpoint concurrently.
    ///
    /// Overlapping sweeps run one after another. Returns the number of
    /// endpoints checked. Probe failures never escape.
    pub async fn poll_all(&self) -> usize {
        let _guard = self.inner.poll_lock.lock().await;

        let endpoints = self.endpoints();
        let checked = join_all(endpoints.into_iter().map(|endpoint| self.check_one(endpoint)))
            .await
            .into_iter()
            .flatten()
            .count();

        debug!(checked, "Health sweep finished");
        checked
    }

    /// Probes one endpoint and applies the result.
    ///
    /// Returns `None` if the endpoint is not registered, including when it
    /// was unregistered or re-registered while the probe ran.
    pub async fn check_one(&self, endpoint: Endpoint) -> Option<HealthStatus> {
        let registration = self.inner.records.lock().get(&endpoint)?.registration;

        let observation = self.observe(endpoint).await;
        let max_failures = self.inner.max_failures.load(Ordering::Relaxed);
        let now = Instant::now();

        let event = {
            let mut records = self.inner.records.lock();
            let record = records
                .get_mut(&endpoint)
                .filter(|r| r.registration == registration)?;

            let event = record.apply(
                observation.status,
                Some(observation.response_time),
                now,
                max_failures,
            );
            if observation.status == HealthStatus::Healthy {
                record.metrics = Some(EndpointMetrics {
                    browser: observation.browser,
                    protocol_version: observation.protocol_version,
                    target_count: observation.target_count,
                    uptime: record.healthy_since.map(|since| now.duration_since(since)),
                });
            } else {
                record.last_error = observation.error;
            }
            event
        };

        if let Some(event) = event {
            match &event {
                HealthEvent::Stale {
                    consecutive_failures,
                    ..
                } => warn!(%endpoint, consecutive_failures, "Endpoint is stale"),
                HealthEvent::Recovered { stale_for, .. } => {
                    info!(%endpoint, stale_for_ms = stale_for.as_millis() as u64, "Endpoint recovered");
                }
            }
            // No subscribers is fine.
            let _ = self.inner.events.send(event);
        }

        Some(observation.status)
    }

    /// Runs the probe and, on success, the advisory metrics.
    async fn observe(&self, endpoint: Endpoint) -> Observation {
        let probe_timeout = self.inner.config.probe_timeout;
        let started = Instant::now();
        let result = timeout(probe_timeout, self.inner.prober.probe(endpoint, probe_timeout)).await;
        let response_time = started.elapsed();

        let mut observation = Observation {
            status: HealthStatus::Error,
            response_time,
            error: None,
            browser: None,
            protocol_version: None,
            target_count: None,
        };

        match result {
            Ok(Ok(ProbeOutcome::Healthy {
                browser,
                protocol_version,
            })) => {
                observation.status = HealthStatus::Healthy;
                observation.browser = browser;
                observation.protocol_version = protocol_version;
                observation.target_count =
                    match timeout(probe_timeout, self.inner.prober.target_count(endpoint, probe_timeout)).await {
                        Ok(Ok(count)) => Some(count),
                        Ok(Err(e)) => {
                            debug!(%endpoint, error = %e, "Metrics unavailable");
                            None
                        }
                        Err(_) => {
                            debug!(%endpoint, "Metrics timed out");
                            None
                        }
                    };
            }
            Ok(Ok(ProbeOutcome::Unhealthy { reason })) => {
                debug!(%endpoint, %reason, "Endpoint unhealthy");
                observation.status = HealthStatus::Unhealthy;
                observation.error = Some(reason);
            }
            Ok(Err(e)) => {
                debug!(%endpoint, error = %e, "Liveness probe failed");
                observation.error = Some(e.to_string());
            }
            Err(_) => {
                debug!(%endpoint, timeout_ms = probe_timeout.as_millis() as u64, "Liveness probe timed out");
                observation.error = Some(format!("timed out after {}ms", probe_timeout.as_millis()));
            }
        }

        observation
    }
}

// ============================================================================
// HealthMonitor - Accessors
// ============================================================================

impl HealthMonitor {
    /// Endpoints currently flagged stale, sorted.
    #[must_use]
    pub fn stale_endpoints(&self) -> Vec<Endpoint> {
        let mut stale: Vec<Endpoint> = self
            .inner
            .records
            .lock()
            .values()
            .filter(|r| r.stale)
            .map(|r| r.endpoint)
            .collect();
        stale.sort_unstable();
        stale
    }

    /// Returns `true` if the endpoint is registered and stale.
    #[must_use]
    pub fn is_stale(&self, endpoint: Endpoint) -> bool {
        self.inner
            .records
            .lock()
            .get(&endpoint)
            .is_some_and(|r| r.stale)
    }

    /// Consecutive failures, 0 for unknown endpoints.
    #[must_use]
    pub fn failure_count(&self, endpoint: Endpoint) -> u32 {
        self.inner
            .records
            .lock()
            .get(&endpoint)
            .map_or(0, |r| r.consecutive_failures)
    }

    /// Latest status, if registered.
    #[must_use]
    pub fn status(&self, endpoint: Endpoint) -> Option<HealthStatus> {
        self.inner.records.lock().get(&endpoint).map(|r| r.status)
    }

    /// Zeroes the failure counter. The stale flag is left alone.
    pub fn reset_failure_count(&self, endpoint: Endpoint) -> bool {
        match self.inner.records.lock().get_mut(&endpoint) {
            Some(record) => {
                record.consecutive_failures = 0;
                true
            }
            None => false,
        }
    }

    /// Sets the stale threshold for future transitions, clamped to 1.
    pub fn set_stale_threshold(&self, max_failures: u32) {
        let max_failures = max_failures.max(1);
        self.inner.max_failures.store(max_failures, Ordering::Relaxed);
        debug!(max_failures, "Stale threshold updated");
    }

    /// Current stale threshold.
    #[inline]
    #[must_use]
    pub fn stale_threshold(&self) -> u32 {
        self.inner.max_failures.load(Ordering::Relaxed)
    }

    /// View of every record, sorted by endpoint.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EndpointHealth> {
        let now = Instant::now();
        let mut snapshot: Vec<EndpointHealth> = self
            .inner
            .records
            .lock()
            .values()
            .map(|r| r.snapshot(now))
            .collect();
        snapshot.sort_by_key(|h| h.endpoint);
        snapshot
    }

    /// The last `limit` probes of `endpoint`, oldest first.
    #[must_use]
    pub fn history(&self, endpoint: Endpoint, limit: usize) -> Vec<HistoryEntry> {
        self.inner
            .records
            .lock()
            .get(&endpoint)
            .map(|r| r.history.last(limit))
            .unwrap_or_default()
    }
}

// ============================================================================
// Poll Loop
// ============================================================================

async fn poll_loop(inner: Weak<MonitorInner>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            debug!("HealthMonitor dropped, poll loop exiting");
            break;
        };
        HealthMonitor { inner }.poll_all().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
