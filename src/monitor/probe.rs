//! Out-of-band liveness probes.
//!
//! The monitor never touches pooled sessions; it asks a [`Prober`] instead.
//! [`HttpProber`] issues `GET /json/version` and, for metrics,
//! `GET /json/list`.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::error::Result;
use crate::identifiers::Endpoint;
use crate::protocol::BrowserVersion;
use crate::transport::Discovery;
use crate::transport::discovery::VERSION_PATH;

// ============================================================================
// ProbeOutcome
// ============================================================================

/// A probe that got an answer.
///
/// Transport failures and timeouts are reported as `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Success response.
    Healthy {
        browser: Option<String>,
        protocol_version: Option<String>,
    },
    /// Answered, but not successfully.
    Unhealthy { reason: String },
}

// ============================================================================
// Prober
// ============================================================================

/// Cheap liveness check, independent of the pool.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes `endpoint`, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or timeout.
    async fn probe(&self, endpoint: Endpoint, timeout: Duration) -> Result<ProbeOutcome>;

    /// Number of debuggable targets. Advisory.
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be fetched.
    async fn target_count(&self, endpoint: Endpoint, timeout: Duration) -> Result<usize>;
}

// ============================================================================
// HttpProber
// ============================================================================

/// [`Prober`] over the HTTP discovery endpoints.
#[derive(Debug, Clone)]
pub struct HttpProber {
    discovery: Discovery,
}

impl HttpProber {
    /// Creates a prober for endpoints on `host`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`](crate::Error::Http) if the HTTP client cannot
    /// be built.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        Ok(Self {
            discovery: Discovery::new(host)?,
        })
    }

    /// Wraps an existing discovery client.
    #[inline]
    #[must_use]
    pub fn from_discovery(discovery: Discovery) -> Self {
        Self { discovery }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, endpoint: Endpoint, timeout: Duration) -> Result<ProbeOutcome> {
        let response = self.discovery.get(endpoint, VERSION_PATH, timeout).await?;
        let status = response.status();
        trace!(%endpoint, %status, "Liveness probe answered");

        if !status.is_success() {
            return Ok(ProbeOutcome::Unhealthy {
                reason: format!("{VERSION_PATH} returned {status}"),
            });
        }

        match response.json::<BrowserVersion>().await {
            Ok(version) => Ok(ProbeOutcome::Healthy {
                browser: Some(version.browser).filter(|s| !s.is_empty()),
                protocol_version: Some(version.protocol_version).filter(|s| !s.is_empty()),
            }),
            Err(e) => Ok(ProbeOutcome::Unhealthy {
                reason: format!("invalid version document: {e}"),
            }),
        }
    }

    async fn target_count(&self, endpoint: Endpoint, timeout: Duration) -> Result<usize> {
        Ok(self.discovery.list(endpoint, timeout).await?.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
