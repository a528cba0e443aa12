//! Read-only pool diagnostics.

use std::time::Duration;

use serde::Serialize;

use crate::identifiers::Endpoint;

use super::entry::{ConnectionEntry, ConnectionHealth};

// ============================================================================
// PoolHealth
// ============================================================================

/// Entry counts by health.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoolHealth {
    /// Entries, placeholders included.
    pub total: usize,
    pub healthy: usize,
    pub connecting: usize,
    pub failed: usize,
    pub max_connections: usize,
    /// `total / max_connections`, in `0.0..=1.0`.
    pub utilization: f64,
}

impl PoolHealth {
    pub(crate) fn from_entries<'a>(
        entries: impl Iterator<Item = &'a ConnectionEntry>,
        max_connections: usize,
    ) -> Self {
        let mut health = Self {
            total: 0,
            healthy: 0,
            connecting: 0,
            failed: 0,
            max_connections,
            utilization: 0.0,
        };

        for entry in entries {
            health.total += 1;
            match entry.health {
                ConnectionHealth::Healthy => health.healthy += 1,
                ConnectionHealth::Connecting => health.connecting += 1,
                ConnectionHealth::Failed => health.failed += 1,
            }
        }

        if max_connections > 0 {
            health.utilization = health.total as f64 / max_connections as f64;
        }
        health
    }

    /// Returns `true` if no new endpoint fits without eviction.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.total >= self.max_connections
    }
}

// ============================================================================
// PoolStats
// ============================================================================

/// Per-entry snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct EntryStats {
    pub endpoint: Endpoint,
    pub id: u64,
    pub health: ConnectionHealth,
    pub in_flight: bool,
    /// Time since creation.
    pub age: Duration,
    /// Time since last reuse.
    pub idle: Duration,
}

/// Health counts, per-entry detail and lifetime counters.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub health: PoolHealth,
    /// Sorted by endpoint.
    pub entries: Vec<EntryStats>,
    pub connects_started: u64,
    pub connects_failed: u64,
    pub evictions: u64,
}

// ============================================================================
// Tests
// ============================================================================
