//! Decision cache keyed by content-addressed request fingerprints.
//!
//! The fingerprint is a SHA-256 over the *sorted* flattened context, so two
//! requests that differ only in attribute order share one entry. The cache
//! is purely a performance aid: a zero-size cache yields identical
//! decisions.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::model::{AbacResponse, FlattenedContext};

/// Maximum number of entries kept before an expired-entry sweep runs.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default time-to-live for cached decisions.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    response: AbacResponse,
    inserted_at: Instant,
}

/// Bounded TTL cache for authorization decisions.
///
/// A plain mutex is enough here: the map is small and accesses are short.
pub struct DecisionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl DecisionCache {
    /// Creates a cache with the given TTL and the default capacity.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    /// Creates a cache with explicit TTL and capacity.
    #[must_use]
    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    /// The configured time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently cached (including not-yet-swept expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Returns `true` when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a cached response; expired entries are dropped on access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<AbacResponse> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.response.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a response, sweeping expired entries when the cache grows past
    /// its capacity.
    pub fn insert(&self, key: String, response: AbacResponse) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );

        if entries.len() > self.capacity {
            let before = entries.len();
            entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
            tracing::debug!(expired_entries = before - entries.len(), "Cache cleaned");
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
        tracing::info!("Authorization decision cache cleared");
    }
}

/// Computes the content-addressed fingerprint of a flattened context.
///
/// The `BTreeMap` iteration order is already sorted, giving a canonical
/// byte stream independent of the attribute order in the input request.
#[must_use]
pub fn fingerprint(ctx: &FlattenedContext) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in ctx {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}
