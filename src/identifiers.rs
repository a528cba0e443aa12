//! Type-safe identifiers for endpoints, pooled entries and CDP messages.
//!
//! Newtype wrappers keep a port from being mixed up with an entry id or a
//! request id at compile time.
//!
//! | Type | Wraps | Source |
//! |------|-------|--------|
//! | [`Endpoint`] | `u16` | Remote-debugging port of an IDE process |
//! | [`ConnectionId`] | `u64` | Generated per pool entry |
//! | [`RequestId`] | `u64` | Generated per CDP command |
//! | [`TargetId`] | `String` | Assigned by the remote browser |
//! | [`CdpSessionId`] | `String` | Assigned by `Target.attachToTarget` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// Counters
// ============================================================================

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Endpoint
// ============================================================================

/// A remote-debugging endpoint, identified by its TCP port.
///
/// The endpoint is the key of the connection pool, the workspace cache and
/// the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(u16);

impl Endpoint {
    /// Creates an endpoint for the given port.
    #[inline]
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    /// Returns the port number.
    #[inline]
    #[must_use]
    pub const fn port(self) -> u16 {
        self.0
    }
}

impl From<u16> for Endpoint {
    #[inline]
    fn from(port: u16) -> Self {
        Self(port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier of a single pool entry.
///
/// A replacement entry for the same endpoint always gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates the next process-unique id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// CDP command id used for request/response correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Generates the next request id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TargetId
// ============================================================================

/// Browser-assigned id of a debuggable target (page, worker, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Wraps a target id string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// CdpSessionId
// ============================================================================

/// Flattened CDP session id returned by `Target.attachToTarget`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CdpSessionId(String);

impl CdpSessionId {
    /// Wraps a session id string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CdpSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_roundtrip() {
        let endpoint = Endpoint::from(9222);
        assert_eq!(endpoint.port(), 9222);
        assert_eq!(endpoint.to_string(), "9222");
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_request_id_serializes_as_number() {
        let id = RequestId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, id.as_u64().to_string());
    }

    #[test]
    fn test_target_id_display() {
        let id = TargetId::new("ABCD");
        assert_eq!(id.to_string(), "ABCD");
        assert_eq!(id.as_str(), "ABCD");
    }
}
