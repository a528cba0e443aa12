//! HTTP discovery endpoints of a remote-debugging port.
//!
//! Every DevTools-capable process serves a small JSON API next to its
//! WebSocket:
//!
//! | Path | Payload |
//! |------|---------|
//! | `/json/version` | [`BrowserVersion`] with the browser WebSocket URL |
//! | `/json/list` | [`ListedTarget`] array |
//!
//! The same requests double as the cheap liveness probe used by the
//! health monitor.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::Endpoint;
use crate::protocol::{BrowserVersion, ListedTarget};

// ============================================================================
// Constants
// ============================================================================

/// Default host remote-debugging ports are bound to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Path of the version document.
pub const VERSION_PATH: &str = "/json/version";

/// Path of the target list.
pub const LIST_PATH: &str = "/json/list";

// ============================================================================
// Discovery
// ============================================================================

/// HTTP client for the `/json/*` discovery API.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Shared HTTP client.
    client: Client,
    /// Host serving the endpoints.
    host: String,
}

impl Discovery {
    /// Creates a discovery client for `host`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let client = Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    /// Returns the configured host.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Builds `http://{host}:{port}{path}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host does not form a valid URL.
    pub fn url(&self, endpoint: Endpoint, path: &str) -> Result<Url> {
        let base = format!("http://{}:{}", self.host, endpoint.port());
        Url::parse(&base)
            .and_then(|base| base.join(path))
            .map_err(|e| Error::config(format!("Invalid endpoint URL {base}{path}: {e}")))
    }

    /// Sends `GET` and returns the raw response.
    ///
    /// Transport failures become [`Error::ProbeFailure`]; the status code is
    /// not checked.
    pub async fn get(
        &self,
        endpoint: Endpoint,
        path: &str,
        request_timeout: Duration,
    ) -> Result<reqwest::Response> {
        let url = self.url(endpoint, path)?;
        trace!(%url, "Discovery request");

        self.client
            .get(url)
            .timeout(request_timeout)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("timed out after {}ms", request_timeout.as_millis())
                } else {
                    e.to_string()
                };
                Error::probe_failure(endpoint, message)
            })
    }

    /// Fetches `/json/version`.
    ///
    /// # Errors
    ///
    /// - [`Error::ProbeFailure`] on transport failure or non-success status
    /// - [`Error::Http`] if the body is not a version document
    pub async fn version(
        &self,
        endpoint: Endpoint,
        request_timeout: Duration,
    ) -> Result<BrowserVersion> {
        let response = self.get(endpoint, VERSION_PATH, request_timeout).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::probe_failure(
                endpoint,
                format!("{VERSION_PATH} returned {status}"),
            ));
        }
        Ok(response.json::<BrowserVersion>().await?)
    }

    /// Fetches `/json/list`.
    ///
    /// # Errors
    ///
    /// Same as [`Discovery::version`].
    pub async fn list(
        &self,
        endpoint: Endpoint,
        request_timeout: Duration,
    ) -> Result<Vec<ListedTarget>> {
        let response = self.get(endpoint, LIST_PATH, request_timeout).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::probe_failure(
                endpoint,
                format!("{LIST_PATH} returned {status}"),
            ));
        }
        Ok(response.json::<Vec<ListedTarget>>().await?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response per accepted connection.
    async fn spawn_http(body: &'static str, status: &'static str) -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
            }
        });

        Endpoint::new(port)
    }

    #[test]
    fn test_url_building() {
        let discovery = Discovery::new(DEFAULT_HOST).expect("client");
        let url = discovery.url(Endpoint::new(9222), VERSION_PATH).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9222/json/version");
    }

    #[tokio::test]
    async fn test_version_success() {
        let endpoint = spawn_http(
            r#"{"Browser":"Chrome/126","Protocol-Version":"1.3","User-Agent":"ua","webSocketDebuggerUrl":"ws://127.0.0.1:1/devtools/browser/x"}"#,
            "200 OK",
        )
        .await;
        let discovery = Discovery::new(DEFAULT_HOST).expect("client");

        let version = discovery
            .version(endpoint, Duration::from_secs(2))
            .await
            .expect("version");
        assert_eq!(version.browser, "Chrome/126");
    }

    #[tokio::test]
    async fn test_version_non_success_status() {
        let endpoint = spawn_http("{}", "503 Service Unavailable").await;
        let discovery = Discovery::new(DEFAULT_HOST).expect("client");

        let err = discovery
            .version(endpoint, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProbeFailure { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let endpoint = Endpoint::new(listener.local_addr().expect("addr").port());
        drop(listener);

        let discovery = Discovery::new(DEFAULT_HOST).expect("client");
        let err = discovery
            .version(endpoint, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProbeFailure { .. }));
    }
}
