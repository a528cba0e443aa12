//! Workspace-detection connection manager.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cache` | [`TtlCache`] with per-key expiry timers |
//! | `config` | [`ManagerConfig`] |
//! | `core` | [`ConnectionManager`] |
//! | `extract` | [`ExtractionStrategy`] and [`WorkspaceInfo`] |

pub mod cache;
pub mod config;
pub mod core;
pub mod extract;

pub use cache::{CacheEntry, TtlCache};
pub use config::ManagerConfig;
pub use self::core::{ConnectionManager, ManagerHealth};
pub use extract::{ExtractionStrategy, WorkspaceInfo, extract_workspace};
