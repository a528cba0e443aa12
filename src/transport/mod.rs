//! Remote-debugging transport layer.
//!
//! This module handles communication between the local end (Rust) and a
//! DevTools endpoint exposed by an IDE process.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐      HTTP /json/version      ┌─────────────────┐
//! │  CdpConnector   │─────────────────────────────►│  IDE process    │
//! │                 │                              │  (Electron)     │
//! │  CdpSession     │◄────────────────────────────►│                 │
//! │  → Connection   │   WebSocket host:PORT        │  DevTools       │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cdp` | Production connector and session |
//! | `connection` | WebSocket connection and event loop |
//! | `discovery` | `/json/*` HTTP endpoints |
//! | `session` | [`Session`] and [`Connector`] traits |

// ============================================================================
// Submodules
// ============================================================================

/// Chrome DevTools Protocol connector.
pub mod cdp;

/// WebSocket connection and event loop.
pub mod connection;

/// HTTP discovery endpoints.
pub mod discovery;

/// Session and connector traits.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use cdp::{CdpConnector, CdpSession};
pub use connection::{Connection, EventHandler};
pub use discovery::{DEFAULT_HOST, Discovery};
pub use session::{Connector, Session, Surface};
