//! Per-endpoint health records and the stale transition.
//!
//! # State Transitions
//!
//! ```text
//! Unknown ─► Healthy | Unhealthy | Error
//!
//! Unhealthy | Error: failures += 1; failures >= max_failures → stale
//! Healthy:           failures = 0;  stale → recovered
//! ```
//!
//! `stale` is a sticky flag layered on the status, not a fourth status.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::identifiers::Endpoint;

// ============================================================================
// HealthStatus
// ============================================================================

/// Result of the latest liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Not probed yet.
    Unknown,
    /// Probe answered successfully.
    Healthy,
    /// Probe answered, but not successfully.
    Unhealthy,
    /// Probe failed in transport or timed out.
    Error,
}

impl HealthStatus {
    /// Returns `true` for statuses that count toward staleness.
    #[inline]
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Unhealthy | Self::Error)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Error => "error",
        })
    }
}

// ============================================================================
// HealthEvent
// ============================================================================

/// Notification of a stale transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// The endpoint just became stale.
    Stale {
        endpoint: Endpoint,
        kind: String,
        consecutive_failures: u32,
    },
    /// A stale endpoint answered successfully again.
    Recovered {
        endpoint: Endpoint,
        kind: String,
        /// How long the endpoint was stale.
        stale_for: Duration,
    },
}

impl HealthEvent {
    /// Endpoint the event is about.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Stale { endpoint, .. } | Self::Recovered { endpoint, .. } => *endpoint,
        }
    }
}

// ============================================================================
// EndpointMetrics
// ============================================================================

/// Advisory extras gathered after a successful probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointMetrics {
    /// Product string from `/json/version`.
    pub browser: Option<String>,
    pub protocol_version: Option<String>,
    /// Number of debuggable targets.
    pub target_count: Option<usize>,
    /// Time since the endpoint last became healthy.
    pub uptime: Option<Duration>,
}

// ============================================================================
// History
// ============================================================================

/// One recorded probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub status: HealthStatus,
    pub at: Instant,
    pub response_time: Option<Duration>,
}

/// Fixed-capacity ring buffer, oldest evicted first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    /// Creates an empty buffer. A zero capacity is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends, evicting the oldest entry when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// The last `limit` entries, oldest first.
    #[must_use]
    pub fn last(&self, limit: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).copied().collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// HealthRecord
// ============================================================================

/// Liveness state of one registered endpoint.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub endpoint: Endpoint,
    /// Opaque IDE tag supplied at registration.
    pub kind: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub stale: bool,
    pub stale_since: Option<Instant>,
    pub healthy_since: Option<Instant>,
    pub last_checked: Option<Instant>,
    pub response_time: Option<Duration>,
    pub last_error: Option<String>,
    pub metrics: Option<EndpointMetrics>,
    pub history: History,
    /// Distinguishes successive registrations of the same endpoint.
    pub(crate) registration: u64,
}

impl HealthRecord {
    /// Fresh record: `Unknown`, no failures, empty history.
    #[must_use]
    pub fn new(endpoint: Endpoint, kind: impl Into<String>, history_capacity: usize) -> Self {
        Self {
            endpoint,
            kind: kind.into(),
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            stale: false,
            stale_since: None,
            healthy_since: None,
            last_checked: None,
            response_time: None,
            last_error: None,
            metrics: None,
            history: History::new(history_capacity),
            registration: 0,
        }
    }

    /// Applies one probe result and returns the transition event, if any.
    ///
    /// Emits [`HealthEvent::Stale`] only on the transition into staleness
    /// and [`HealthEvent::Recovered`] only on the transition out of it.
    pub fn apply(
        &mut self,
        status: HealthStatus,
        response_time: Option<Duration>,
        now: Instant,
        max_failures: u32,
    ) -> Option<HealthEvent> {
        let max_failures = max_failures.max(1);
        self.status = status;
        self.last_checked = Some(now);
        self.response_time = response_time;
        self.history.push(HistoryEntry {
            status,
            at: now,
            response_time,
        });

        match status {
            HealthStatus::Healthy => {
                self.consecutive_failures = 0;
                self.last_error = None;
                if self.healthy_since.is_none() {
                    self.healthy_since = Some(now);
                }
                if self.stale {
                    let stale_for = self
                        .stale_since
                        .map(|since| now.duration_since(since))
                        .unwrap_or_default();
                    self.stale = false;
                    self.stale_since = None;
                    return Some(HealthEvent::Recovered {
                        endpoint: self.endpoint,
                        kind: self.kind.clone(),
                        stale_for,
                    });
                }
                None
            }
            HealthStatus::Unhealthy | HealthStatus::Error => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.healthy_since = None;
                self.metrics = None;
                if !self.stale && self.consecutive_failures >= max_failures {
                    self.stale = true;
                    self.stale_since = Some(now);
                    return Some(HealthEvent::Stale {
                        endpoint: self.endpoint,
                        kind: self.kind.clone(),
                        consecutive_failures: self.consecutive_failures,
                    });
                }
                None
            }
            HealthStatus::Unknown => None,
        }
    }

    /// Read-only view relative to `now`.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> EndpointHealth {
        EndpointHealth {
            endpoint: self.endpoint,
            kind: self.kind.clone(),
            status: self.status,
            consecutive_failures: self.consecutive_failures,
            stale: self.stale,
            stale_for: self.stale_since.map(|since| now.duration_since(since)),
            since_last_check: self.last_checked.map(|at| now.duration_since(at)),
            response_time: self.response_time,
            last_error: self.last_error.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Serializable view of a [`HealthRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointHealth {
    pub endpoint: Endpoint,
    pub kind: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub stale: bool,
    pub stale_for: Option<Duration>,
    pub since_last_check: Option<Duration>,
    pub response_time: Option<Duration>,
    pub last_error: Option<String>,
    pub metrics: Option<EndpointMetrics>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn record() -> HealthRecord {
        HealthRecord::new(Endpoint::new(9222), "vscode", 50)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fires_once_at_threshold() {
        let mut record = record();
        let now = Instant::now();

        assert_eq!(record.apply(HealthStatus::Unhealthy, None, now, 2), None);
        assert!(!record.stale);

        let event = record.apply(HealthStatus::Error, None, now, 2);
        assert!(matches!(
            event,
            Some(HealthEvent::Stale {
                consecutive_failures: 2,
                ..
            })
        ));
        assert!(record.stale);
        assert_eq!(record.stale_since, Some(now));

        assert_eq!(record.apply(HealthStatus::Error, None, now, 2), None);
        assert_eq!(record.consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_reports_stale_duration() {
        let mut record = record();
        let start = Instant::now();
        record.apply(HealthStatus::Error, None, start, 1);

        tokio::time::advance(Duration::from_secs(4)).await;
        let event = record.apply(HealthStatus::Healthy, None, Instant::now(), 1);

        assert_eq!(
            event,
            Some(HealthEvent::Recovered {
                endpoint: Endpoint::new(9222),
                kind: "vscode".to_string(),
                stale_for: Duration::from_secs(4),
            })
        );
        assert!(!record.stale);
        assert_eq!(record.stale_since, None);
        assert_eq!(record.consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_without_stale_emits_nothing() {
        let mut record = record();
        let now = Instant::now();
        assert_eq!(record.apply(HealthStatus::Healthy, None, now, 1), None);
        assert_eq!(record.healthy_since, Some(now));
    }

    #[test]
    fn test_history_keeps_last_entries() {
        let now = Instant::now();
        let mut history = History::new(3);
        for status in [
            HealthStatus::Healthy,
            HealthStatus::Error,
            HealthStatus::Unhealthy,
            HealthStatus::Healthy,
        ] {
            history.push(HistoryEntry {
                status,
                at: now,
                response_time: None,
            });
        }

        let statuses: Vec<HealthStatus> = history.last(10).iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![HealthStatus::Error, HealthStatus::Unhealthy, HealthStatus::Healthy]
        );
        assert_eq!(history.last(1)[0].status, HealthStatus::Healthy);
    }

    fn status_strategy() -> impl Strategy<Value = HealthStatus> {
        prop_oneof![
            Just(HealthStatus::Healthy),
            Just(HealthStatus::Unhealthy),
            Just(HealthStatus::Error),
        ]
    }

    proptest! {
        #[test]
        fn prop_history_bounded(capacity in 1usize..16, pushes in 0usize..64) {
            let now = Instant::now();
            let mut history = History::new(capacity);
            for _ in 0..pushes {
                history.push(HistoryEntry { status: HealthStatus::Healthy, at: now, response_time: None });
            }
            prop_assert_eq!(history.len(), pushes.min(capacity));
        }

        #[test]
        fn prop_stale_matches_failure_streak(
            statuses in proptest::collection::vec(status_strategy(), 0..40),
            max_failures in 1u32..5,
        ) {
            let now = Instant::now();
            let mut record = record();
            let mut stale_events = 0;
            let mut recovered_events = 0;
            let mut transitions_in = 0;
            let mut was_stale = false;

            for status in statuses {
                match record.apply(status, None, now, max_failures) {
                    Some(HealthEvent::Stale { .. }) => stale_events += 1,
                    Some(HealthEvent::Recovered { .. }) => recovered_events += 1,
                    None => {}
                }
                if record.stale && !was_stale {
                    transitions_in += 1;
                }
                was_stale = record.stale;

                prop_assert_eq!(record.stale, record.consecutive_failures >= max_failures);
            }

            prop_assert_eq!(stale_events, transitions_in);
            prop_assert!(recovered_events <= stale_events);
        }
    }
}
