//! Session and connector seams.
//!
//! The pool only ever talks to these two traits. [`CdpConnector`] is the
//! production implementation; tests plug in scripted ones.
//!
//! [`CdpConnector`]: super::CdpConnector

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::{Endpoint, TargetId};

// ============================================================================
// Surface
// ============================================================================

/// Description of the primary page a session is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    /// Target id of the page.
    pub target_id: TargetId,
    /// Title at attach time.
    pub title: String,
    /// URL at attach time.
    pub url: String,
}

// ============================================================================
// Session
// ============================================================================

/// An established remote-debugging session.
///
/// Holds the browser-level handle plus, when one exists, the attached
/// primary page (the interaction surface).
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    /// Endpoint this session is connected to.
    fn endpoint(&self) -> Endpoint;

    /// Returns the attached page, if any.
    fn surface(&self) -> Option<Surface>;

    /// Returns `true` if an interaction surface is attached.
    fn has_surface(&self) -> bool {
        self.surface().is_some()
    }

    /// Evaluates a JavaScript expression in the primary page and returns
    /// its value.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSurfaceAvailable`] if no page is attached
    /// - [`Error::Script`] if the expression threw
    ///
    /// [`Error::NoSurfaceAvailable`]: crate::Error::NoSurfaceAvailable
    /// [`Error::Script`]: crate::Error::Script
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Cheap liveness check over the existing session.
    async fn probe(&self) -> Result<()>;

    /// Closes the session. Never closes the remote application itself.
    async fn close(&self) -> Result<()>;
}

// ============================================================================
// Connector
// ============================================================================

/// Establishes sessions to endpoints.
///
/// Implementations do not apply their own overall timeout; the pool bounds
/// every call with its `connect_timeout`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `endpoint`.
    async fn connect(&self, endpoint: Endpoint) -> Result<Arc<dyn Session>>;
}
