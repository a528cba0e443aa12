//! Connection pooling.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`PoolConfig`] and defaults |
//! | `core` | [`ConnectionPool`] |
//! | `entry` | Pool entries and [`PooledConnection`] |
//! | `stats` | [`PoolHealth`] and [`PoolStats`] |

// ============================================================================
// Submodules
// ============================================================================

pub mod config;
pub mod core;
pub mod entry;
pub mod stats;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::PoolConfig;
pub use self::core::ConnectionPool;
pub use entry::{ConnectionEntry, ConnectionHealth, PooledConnection};
pub use stats::{EntryStats, PoolHealth, PoolStats};
