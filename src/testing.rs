//! Scripted connectors, sessions and probers for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::identifiers::{Endpoint, TargetId};
use crate::monitor::{ProbeOutcome, Prober};
use crate::transport::{Connector, Session, Surface};

/// Installs a test subscriber once; honors `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Evaluator = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

// ============================================================================
// MockSession
// ============================================================================

pub(crate) struct MockSession {
    endpoint: Endpoint,
    surface: Option<Surface>,
    evaluator: Option<Evaluator>,
    probe_ok: AtomicBool,
    probe_delay: Mutex<Duration>,
    close_fails: bool,
    closed: AtomicBool,
    probes: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl MockSession {
    pub(crate) fn set_probe_ok(&self, ok: bool) {
        self.probe_ok.store(ok, Ordering::SeqCst);
    }

    pub(crate) fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock() = delay;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MockSession {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn surface(&self) -> Option<Surface> {
        self.surface.clone()
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if self.surface.is_none() {
            return Err(Error::no_surface(self.endpoint));
        }
        match &self.evaluator {
            Some(evaluator) => evaluator(expression),
            None => Ok(Value::Null),
        }
    }

    async fn probe(&self) -> Result<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.probe_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.probe_ok.load(Ordering::SeqCst) && !self.is_closed() {
            Ok(())
        } else {
            Err(Error::probe_failure(self.endpoint, "mock probe failed"))
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.close_fails {
            return Err(Error::operation("mock close failed"));
        }
        Ok(())
    }
}

// ============================================================================
// MockConnector
// ============================================================================

pub(crate) struct MockConnector {
    connects: AtomicUsize,
    delay: Duration,
    failing: FxHashSet<Endpoint>,
    close_fails: bool,
    surface: bool,
    evaluator: Option<Evaluator>,
    panic_once: AtomicBool,
    sessions: Mutex<Vec<Arc<MockSession>>>,
    probes: Arc<AtomicUsize>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            delay: Duration::ZERO,
            failing: FxHashSet::default(),
            close_fails: false,
            surface: true,
            evaluator: None,
            panic_once: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Connects to `endpoint` are refused.
    pub(crate) fn failing(mut self, endpoint: Endpoint) -> Self {
        self.failing.insert(endpoint);
        self
    }

    /// The first connect panics; later ones behave normally.
    pub(crate) fn panicking_once(self) -> Self {
        self.panic_once.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_close_failure(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub(crate) fn without_surface(mut self) -> Self {
        self.surface = false;
        self
    }

    pub(crate) fn with_evaluator(
        mut self,
        evaluator: impl Fn(&str) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Sessions in creation order.
    pub(crate) fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: Endpoint) -> Result<Arc<dyn Session>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic_once.swap(false, Ordering::SeqCst) {
            panic!("mock connector panicked");
        }
        if self.failing.contains(&endpoint) {
            return Err(Error::connect_refused(endpoint, "mock refused"));
        }

        let surface = self.surface.then(|| Surface {
            target_id: TargetId::new(format!("page-{}", endpoint.port())),
            title: "main.rs — project — Visual Studio Code".to_string(),
            url: "vscode-file://vscode-app/workbench.html".to_string(),
        });
        let session = Arc::new(MockSession {
            endpoint,
            surface,
            evaluator: self.evaluator.clone(),
            probe_ok: AtomicBool::new(true),
            probe_delay: Mutex::new(Duration::ZERO),
            close_fails: self.close_fails,
            closed: AtomicBool::new(false),
            probes: Arc::clone(&self.probes),
        });
        self.sessions.lock().push(Arc::clone(&session));
        Ok(session)
    }
}

// ============================================================================
// MockProber
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockProbe {
    Healthy,
    Unhealthy,
    Error,
    /// Never answers.
    Hang,
}

pub(crate) struct MockProber {
    default: Mutex<MockProbe>,
    calls: Mutex<FxHashMap<Endpoint, usize>>,
    delay: Duration,
    target_count: usize,
    target_count_fails: AtomicBool,
}

impl MockProber {
    pub(crate) fn new() -> Self {
        Self {
            default: Mutex::new(MockProbe::Healthy),
            calls: Mutex::new(FxHashMap::default()),
            delay: Duration::ZERO,
            target_count: 1,
            target_count_fails: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_target_count(mut self, count: usize) -> Self {
        self.target_count = count;
        self
    }

    pub(crate) fn set_default(&self, probe: MockProbe) {
        *self.default.lock() = probe;
    }

    pub(crate) fn fail_target_count(&self) {
        self.target_count_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls.lock().get(&endpoint).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(&self, endpoint: Endpoint, _timeout: Duration) -> Result<ProbeOutcome> {
        *self.calls.lock().entry(endpoint).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let probe = *self.default.lock();
        match probe {
            MockProbe::Healthy => Ok(ProbeOutcome::Healthy {
                browser: Some("MockBrowser/1.0".to_string()),
                protocol_version: Some("1.3".to_string()),
            }),
            MockProbe::Unhealthy => Ok(ProbeOutcome::Unhealthy {
                reason: "/json/version returned 500".to_string(),
            }),
            MockProbe::Error => Err(Error::probe_failure(endpoint, "connection refused")),
            MockProbe::Hang => {
                std::future::pending::<()>().await;
                Err(Error::probe_failure(endpoint, "unreachable"))
            }
        }
    }

    async fn target_count(&self, endpoint: Endpoint, _timeout: Duration) -> Result<usize> {
        if self.target_count_fails.load(Ordering::SeqCst) {
            return Err(Error::probe_failure(endpoint, "list unavailable"));
        }
        Ok(self.target_count)
    }
}
