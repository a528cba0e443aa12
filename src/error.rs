//! Error types for remote-debug-pool.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use remote_debug_pool::{Endpoint, Result};
//!
//! async fn example(manager: &ConnectionManager) -> Result<()> {
//!     let connection = manager.get_connection(Endpoint::new(9222)).await?;
//!     connection.evaluate("document.title").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connect | [`Error::ConnectTimeout`], [`Error::ConnectRefused`] |
//! | Surface | [`Error::NoSurfaceAvailable`] |
//! | Operation | [`Error::Operation`], [`Error::Script`] |
//! | Probe | [`Error::ProbeFailure`] |
//! | Pool | [`Error::PoolExhausted`], [`Error::PoolClosed`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::Cdp`], [`Error::RequestTimeout`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Toml`] |
//!
//! Errors are `Clone`: one failed connect attempt is delivered to every
//! caller waiting on it, so external errors are held behind an [`Arc`].

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{Endpoint, RequestId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Connect Errors
    // ========================================================================
    /// Connection attempt did not finish in time.
    ///
    /// Returned when discovery, the WebSocket handshake or target attach
    /// exceeds the configured connect timeout.
    #[error("Connection to endpoint {endpoint} timed out after {timeout_ms}ms")]
    ConnectTimeout {
        /// Endpoint being connected to.
        endpoint: Endpoint,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Endpoint refused or could not be reached.
    #[error("Connection to endpoint {endpoint} failed: {message}")]
    ConnectRefused {
        /// Endpoint being connected to.
        endpoint: Endpoint,
        /// Description of the failure.
        message: String,
    },

    /// Session is up but exposes no usable page.
    #[error("No interaction surface available on endpoint {endpoint}")]
    NoSurfaceAvailable {
        /// Endpoint whose session has no page.
        endpoint: Endpoint,
    },

    // ========================================================================
    // Operation Errors
    // ========================================================================
    /// Caller-supplied operation failed.
    #[error("Operation failed: {message}")]
    Operation {
        /// Description supplied by the operation.
        message: String,
    },

    /// JavaScript evaluation threw in the remote page.
    #[error("Script error: {message}")]
    Script {
        /// Exception text reported by the page.
        message: String,
    },

    // ========================================================================
    // Probe Errors
    // ========================================================================
    /// Liveness probe failed or timed out.
    #[error("Probe of endpoint {endpoint} failed: {message}")]
    ProbeFailure {
        /// Probed endpoint.
        endpoint: Endpoint,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Pool Errors
    // ========================================================================
    /// Every pool slot is held by an in-flight connect attempt.
    #[error("Connection pool exhausted: {max} connections in flight")]
    PoolExhausted {
        /// Configured maximum.
        max: usize,
    },

    /// Pool was destroyed.
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Connection closed, or was closed while it was being established.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Error object returned by the remote end for a command.
    #[error("CDP error {code}: {message}")]
    Cdp {
        /// CDP error code.
        code: i64,
        /// CDP error message.
        message: String,
    },

    /// Command request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[source] Arc<IoError>),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Arc<WsError>),

    /// HTTP error from discovery or the liveness probe.
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[source] Arc<toml::de::Error>),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<WsError> for Error {
    fn from(err: WsError) -> Self {
        Self::WebSocket(Arc::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(Arc::new(err))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connect timeout error.
    #[inline]
    pub fn connect_timeout(endpoint: Endpoint, timeout_ms: u64) -> Self {
        Self::ConnectTimeout {
            endpoint,
            timeout_ms,
        }
    }

    /// Creates a connect refused error.
    #[inline]
    pub fn connect_refused(endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self::ConnectRefused {
            endpoint,
            message: message.into(),
        }
    }

    /// Creates a no-surface error.
    #[inline]
    pub fn no_surface(endpoint: Endpoint) -> Self {
        Self::NoSurfaceAvailable { endpoint }
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Creates a probe failure.
    #[inline]
    pub fn probe_failure(endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self::ProbeFailure {
            endpoint,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a CDP error.
    #[inline]
    pub fn cdp(code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            code,
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this error comes from establishing or holding a
    /// connection.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::ConnectRefused { .. }
                | Self::NoSurfaceAvailable { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry. The pool itself never
    /// retries; this is a hint for callers.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::ConnectRefused { .. }
                | Self::RequestTimeout { .. }
                | Self::ConnectionClosed
                | Self::PoolExhausted { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
