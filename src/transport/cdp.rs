//! Chrome DevTools Protocol connector.
//!
//! # Connection Flow
//!
//! 1. `GET /json/version` to learn the browser WebSocket URL
//! 2. Open the WebSocket, start the event loop
//! 3. `Target.getTargets`, pick the first page as the canonical surface
//! 4. `Target.attachToTarget { flatten: true }` to get a page session id
//! 5. Page commands carry that `sessionId`

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CdpSessionId, Endpoint};
use crate::protocol::{BrowserVersion, Request, TargetInfo, evaluation_value};

use super::connection::Connection;
use super::discovery::{DEFAULT_HOST, Discovery};
use super::session::{Connector, Session, Surface};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a single CDP command.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the detach sent while closing.
const DETACH_TIMEOUT: Duration = Duration::from_secs(2);

/// Expression evaluated by the session probe.
const PROBE_EXPRESSION: &str = "1";

// ============================================================================
// CdpConnector
// ============================================================================

/// Connects to DevTools endpoints over WebSocket.
#[derive(Debug, Clone)]
pub struct CdpConnector {
    /// Discovery client for `/json/version`.
    discovery: Discovery,
    /// Timeout applied to each command and discovery request.
    command_timeout: Duration,
}

impl CdpConnector {
    /// Creates a connector for endpoints on localhost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_host(DEFAULT_HOST)
    }

    /// Creates a connector for endpoints on `host`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn with_host(host: impl Into<String>) -> Result<Self> {
        Ok(Self {
            discovery: Discovery::new(host)?,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    /// Sets the per-command timeout.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    /// Attaches to the primary page, if the browser has one.
    async fn attach_primary_page(
        &self,
        endpoint: Endpoint,
        connection: &Connection,
    ) -> Result<Option<Page>> {
        let targets = connection
            .send_with_timeout(
                Request::new("Target.getTargets", Value::Null),
                self.command_timeout,
            )
            .await?
            .into_result()?;
        let targets = TargetInfo::list_from_result(targets)?;

        let Some(target) = TargetInfo::primary_page(&targets).cloned() else {
            warn!(%endpoint, count = targets.len(), "No page target found");
            return Ok(None);
        };

        let attached = connection
            .send_with_timeout(
                Request::new(
                    "Target.attachToTarget",
                    json!({ "targetId": target.target_id, "flatten": true }),
                ),
                self.command_timeout,
            )
            .await?;
        let session_id = attached.get_string("sessionId");
        if session_id.is_empty() {
            return Err(Error::protocol("Target.attachToTarget returned no sessionId"));
        }

        debug!(%endpoint, target_id = %target.target_id, title = %target.title, "Attached to page");

        Ok(Some(Page {
            target,
            session_id: CdpSessionId::new(session_id),
        }))
    }
}

#[async_trait]
impl Connector for CdpConnector {
    async fn connect(&self, endpoint: Endpoint) -> Result<Arc<dyn Session>> {
        let version = self
            .discovery
            .version(endpoint, self.command_timeout)
            .await
            .map_err(|e| match e {
                Error::ProbeFailure { message, .. } => Error::connect_refused(endpoint, message),
                other => Error::connect_refused(endpoint, other.to_string()),
            })?;

        let ws_url = version
            .web_socket_debugger_url
            .clone()
            .ok_or_else(|| Error::connect_refused(endpoint, "no webSocketDebuggerUrl advertised"))?;

        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| Error::connect_refused(endpoint, format!("WebSocket handshake failed: {e}")))?;

        let connection = Connection::new(ws_stream);

        let page = match self.attach_primary_page(endpoint, &connection).await {
            Ok(page) => page,
            Err(e) => {
                connection.shutdown();
                return Err(e);
            }
        };

        let detached = Arc::new(AtomicBool::new(false));
        if let Some(page) = &page {
            let watched = page.session_id.clone();
            let flag = Arc::clone(&detached);
            connection.set_event_handler(Box::new(move |event| {
                if event.detached_session().as_ref() == Some(&watched) {
                    flag.store(true, Ordering::SeqCst);
                }
            }));
        }

        info!(%endpoint, browser = %version.browser, has_page = page.is_some(), "CDP session established");

        Ok(Arc::new(CdpSession {
            endpoint,
            version,
            connection,
            page,
            detached,
            command_timeout: self.command_timeout,
        }))
    }
}

// ============================================================================
// CdpSession
// ============================================================================

/// Attached page handle.
#[derive(Debug, Clone)]
struct Page {
    /// Target description at attach time.
    target: TargetInfo,
    /// Flattened session id.
    session_id: CdpSessionId,
}

/// A browser-level CDP connection plus its attached primary page.
pub struct CdpSession {
    endpoint: Endpoint,
    version: BrowserVersion,
    connection: Connection,
    page: Option<Page>,
    /// Set when the remote end reports the page session detached.
    detached: Arc<AtomicBool>,
    command_timeout: Duration,
}

impl fmt::Debug for CdpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpSession")
            .field("endpoint", &self.endpoint)
            .field("browser", &self.version.browser)
            .field("page", &self.page.as_ref().map(|p| &p.target.target_id))
            .field("closed", &self.connection.is_closed())
            .finish_non_exhaustive()
    }
}

impl CdpSession {
    /// Returns the version document the session was opened from.
    #[inline]
    #[must_use]
    pub fn version(&self) -> &BrowserVersion {
        &self.version
    }

    /// Returns the attached page if it is still attached.
    fn live_page(&self) -> Result<&Page> {
        if self.connection.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        match &self.page {
            Some(page) if !self.detached.load(Ordering::SeqCst) => Ok(page),
            _ => Err(Error::no_surface(self.endpoint)),
        }
    }
}

#[async_trait]
impl Session for CdpSession {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn surface(&self) -> Option<Surface> {
        if self.detached.load(Ordering::SeqCst) {
            return None;
        }
        self.page.as_ref().map(|page| Surface {
            target_id: page.target.target_id.clone(),
            title: page.target.title.clone(),
            url: page.target.url.clone(),
        })
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let page = self.live_page()?;
        let request = Request::evaluate(expression).with_session(page.session_id.clone());
        let result = self
            .connection
            .send_with_timeout(request, self.command_timeout)
            .await?
            .into_result()?;
        evaluation_value(result)
    }

    async fn probe(&self) -> Result<()> {
        if self.page.is_some() {
            self.evaluate(PROBE_EXPRESSION).await.map(|_| ())
        } else {
            self.connection
                .send_with_timeout(
                    Request::new("Browser.getVersion", Value::Null),
                    self.command_timeout,
                )
                .await?
                .into_result()
                .map(|_| ())
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(page) = &self.page
            && !self.detached.load(Ordering::SeqCst)
            && !self.connection.is_closed()
        {
            let detach = Request::new(
                "Target.detachFromTarget",
                json!({ "sessionId": page.session_id }),
            );
            if let Err(e) = self.connection.send_with_timeout(detach, DETACH_TIMEOUT).await {
                debug!(endpoint = %self.endpoint, error = %e, "Detach failed during close");
            }
        }

        self.connection.clear_event_handler();
        self.connection.shutdown();
        debug!(endpoint = %self.endpoint, "CDP session closed");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
