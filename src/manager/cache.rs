//! Per-endpoint TTL cache with owned expiry timers.
//!
//! Each entry carries the handle of its expiry task. Replacing or removing
//! an entry drops it, and dropping aborts the timer, so a key never has more
//! than one live timer. The timer also compares generations before removing
//! anything.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::identifiers::Endpoint;

// ============================================================================
// CacheEntry
// ============================================================================

/// One cached value.
pub struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    generation: u64,
    /// `None` when stored outside a Tokio runtime; expiry is then lazy only.
    expiry: Option<JoinHandle<()>>,
}

impl<V> CacheEntry<V> {
    /// Returns `true` while `now - stored_at < ttl`.
    #[inline]
    #[must_use]
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }

    #[inline]
    #[must_use]
    pub fn stored_at(&self) -> Instant {
        self.stored_at
    }

    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn has_live_timer(&self) -> bool {
        self.expiry.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<V> Drop for CacheEntry<V> {
    fn drop(&mut self) {
        if let Some(expiry) = self.expiry.take() {
            expiry.abort();
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for CacheEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("value", &self.value)
            .field("ttl", &self.ttl)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TtlCache
// ============================================================================

struct CacheState<V> {
    entries: FxHashMap<Endpoint, CacheEntry<V>>,
    next_generation: u64,
}

/// Cheap-clone cache keyed by endpoint.
pub struct TtlCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: FxHashMap::default(),
                next_generation: 0,
            })),
        }
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` for `ttl`, replacing and un-scheduling any previous
    /// entry for the key.
    pub fn insert(&self, key: Endpoint, value: V, ttl: Duration) {
        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        let expiry = Handle::try_current()
            .ok()
            .map(|runtime| runtime.spawn(expire(Arc::downgrade(&self.state), key, generation, ttl)));

        let previous = state.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
                generation,
                expiry,
            },
        );
        drop(state);

        if previous.is_some() {
            trace!(endpoint = %key, generation, "Replaced cached value");
        }
    }

    /// Returns the value while fresh. An expired entry is removed.
    #[must_use]
    pub fn get(&self, key: Endpoint) -> Option<V> {
        let mut state = self.state.lock();
        let now = Instant::now();
        match state.entries.get(&key).map(|entry| entry.is_fresh(now)) {
            Some(true) => state.entries.get(&key).map(|entry| entry.value.clone()),
            Some(false) => {
                state.entries.remove(&key);
                debug!(endpoint = %key, "Cached value expired on read");
                None
            }
            None => None,
        }
    }

    /// Removes the key and its timer.
    pub fn remove(&self, key: Endpoint) -> bool {
        self.state.lock().entries.remove(&key).is_some()
    }

    /// Removes every key and timer; returns how many were removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<CacheEntry<V>> = {
            let mut state = self.state.lock();
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        drained.len()
    }

    /// Number of stored entries, expired-but-unread ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scheduled expiry timers still pending.
    #[must_use]
    pub fn live_timers(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|e| e.has_live_timer())
            .count()
    }
}

/// Expiry task for one generation of one key.
async fn expire<V>(state: Weak<Mutex<CacheState<V>>>, key: Endpoint, generation: u64, ttl: Duration) {
    tokio::time::sleep(ttl).await;
    let Some(state) = state.upgrade() else {
        return;
    };

    let removed = {
        let mut state = state.lock();
        let current = state
            .entries
            .get(&key)
            .is_some_and(|entry| entry.generation == generation);
        if current {
            state.entries.remove(&key).map(|mut entry| {
                // Finishing on our own; nothing left to abort.
                entry.expiry = None;
                entry
            })
        } else {
            None
        }
    };

    if removed.is_some() {
        debug!(endpoint = %key, generation, "Cached value expired");
    }
}

// ============================================================================
// Tests
// ============================================================================
