//! Chrome DevTools Protocol message types.
//!
//! This module defines the frames exchanged with a remote-debugging
//! endpoint and the discovery documents served over HTTP.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Command response |
//! | `Event` | Remote → Local | Notification |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Event and incoming-frame types |
//! | `request` | Request and Response types |
//! | `target` | `/json/version`, `/json/list` and `Target.getTargets` payloads |

// ============================================================================
// Submodules
// ============================================================================

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

/// Discovery documents and target descriptions.
pub mod target;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{Event, Incoming};
pub use request::{CdpError, Request, Response, evaluation_value};
pub use target::{BrowserVersion, ListedTarget, PAGE_TARGET_TYPE, TargetInfo};
