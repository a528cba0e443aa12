//! Event message types.
//!
//! Events are notifications pushed by the remote end without a matching
//! request: target lifecycle, detach notices, console output, ...
//!
//! Only the lifecycle events that affect a pooled session are interpreted
//! by this crate.
//!
//! | Method | Meaning |
//! |--------|---------|
//! | `Target.detachedFromTarget` | An attached page session went away |
//! | `Target.targetDestroyed` | A target was closed |
//! | `Inspector.detached` | The debugger was detached from the target |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::CdpSessionId;

use super::Response;

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Target.detachedFromTarget",
///   "params": { "sessionId": "8F1C..." }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session the event was raised in (absent for browser-level events).
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<CdpSessionId>,
}

impl Event {
    /// Returns the domain part of the method.
    ///
    /// `"Target.detachedFromTarget"` → `"Target"`.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the session this event reports as detached, if any.
    #[must_use]
    pub fn detached_session(&self) -> Option<CdpSessionId> {
        match self.method.as_str() {
            "Target.detachedFromTarget" => self
                .params
                .get("sessionId")
                .and_then(Value::as_str)
                .map(CdpSessionId::new),
            "Inspector.detached" => self.session_id.clone(),
            _ => None,
        }
    }
}

// ============================================================================
// Incoming
// ============================================================================

/// Any frame received from the remote end.
///
/// Frames with an `id` are responses, frames with only a `method` are
/// events.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    /// Reply to a command.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
}

// ============================================================================
// Tests
// ============================================================================
