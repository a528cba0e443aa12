//! Pool entries and the handle handed to callers.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::Result;
use crate::identifiers::{ConnectionId, Endpoint};
use crate::transport::{Session, Surface};

// ============================================================================
// ConnectionHealth
// ============================================================================

/// Health of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    /// Connect attempt in flight.
    Connecting,
    /// Session established and last probe succeeded.
    Healthy,
    /// Probe failed or session missing; will be replaced.
    Failed,
}

impl fmt::Display for ConnectionHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Healthy => "healthy",
            Self::Failed => "failed",
        })
    }
}

// ============================================================================
// ConnectState
// ============================================================================

/// Value of the per-key single-assignment channel.
///
/// `None` while the attempt runs; set exactly once.
pub(crate) type ConnectState = Option<Result<PooledConnection>>;

// ============================================================================
// ConnectionEntry
// ============================================================================

/// One pooled endpoint.
pub struct ConnectionEntry {
    pub(crate) id: ConnectionId,
    pub(crate) endpoint: Endpoint,
    pub(crate) session: Option<Arc<dyn Session>>,
    pub(crate) created_at: Instant,
    pub(crate) last_used_at: Instant,
    pub(crate) health: ConnectionHealth,
    /// `Some` exactly while the connect attempt is in flight.
    pub(crate) in_flight: Option<watch::Receiver<ConnectState>>,
}

impl ConnectionEntry {
    /// Creates a placeholder and the sender its attempt will resolve.
    pub(crate) fn placeholder(endpoint: Endpoint) -> (Self, watch::Sender<ConnectState>) {
        let (tx, rx) = watch::channel(None);
        let now = Instant::now();
        let entry = Self {
            id: ConnectionId::next(),
            endpoint,
            session: None,
            created_at: now,
            last_used_at: now,
            health: ConnectionHealth::Connecting,
            in_flight: Some(rx),
        };
        (entry, tx)
    }

    /// Returns the entry id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Returns the current health.
    #[inline]
    #[must_use]
    pub fn health(&self) -> ConnectionHealth {
        self.health
    }

    /// Returns `true` while the connect attempt is running.
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns `true` for a placeholder whose attempt is gone without
    /// resolving it.
    #[must_use]
    pub(crate) fn is_stranded(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|rx| rx.has_changed().is_err() && rx.borrow().is_none())
    }

    /// Creation time.
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time of the last reuse.
    #[inline]
    #[must_use]
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// Marks the entry as just used.
    #[inline]
    pub(crate) fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    /// Installs an established session.
    pub(crate) fn settle(&mut self, session: Arc<dyn Session>) {
        self.session = Some(session);
        self.health = ConnectionHealth::Healthy;
        self.in_flight = None;
        self.touch();
    }

    /// Builds a caller handle if a session is installed.
    pub(crate) fn handle(&self) -> Option<PooledConnection> {
        self.session.as_ref().map(|session| PooledConnection {
            id: self.id,
            endpoint: self.endpoint,
            session: Arc::clone(session),
            created_at: self.created_at,
        })
    }
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("health", &self.health)
            .field("in_flight", &self.is_in_flight())
            .field("has_session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PooledConnection
// ============================================================================

/// Caller-side handle to a pooled session.
///
/// Cheap to clone. The pool keeps ownership of the session: closing,
/// replacing and evicting happen only through the pool.
#[derive(Clone)]
pub struct PooledConnection {
    id: ConnectionId,
    endpoint: Endpoint,
    session: Arc<dyn Session>,
    created_at: Instant,
}

impl PooledConnection {
    /// Id of the pool entry this handle came from.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Endpoint of the session.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// When the underlying entry was created.
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Primary page of the session.
    #[inline]
    #[must_use]
    pub fn surface(&self) -> Option<Surface> {
        self.session.surface()
    }

    /// Returns `true` if a page is attached.
    #[inline]
    #[must_use]
    pub fn has_surface(&self) -> bool {
        self.session.has_surface()
    }

    /// Evaluates a JavaScript expression in the primary page.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.session.evaluate(expression).await
    }

    /// Returns `true` if both handles point at the same session.
    #[inline]
    #[must_use]
    pub fn same_session(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("session", &self.session)
            .finish()
    }
}
