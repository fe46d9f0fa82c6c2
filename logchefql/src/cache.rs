//! Memoization of compiled queries.
//!
//! Queries are recompiled on every keystroke, so compiled results are cached by query
//! text and schema version. Entries expire after a sliding TTL (every hit refreshes
//! the entry) and the least recently accessed entry is evicted when the cache is full.
//!
//! The cache is safe to share between threads: all state sits behind one mutex and
//! `get` reads and touches an entry in a single critical section.

use crate::ast::{Literal, Query};
use crate::config::CacheConfig;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Schema version used when the caller does not supply one.
pub const DEFAULT_SCHEMA_VERSION: &str = "default";

/// A compiled query as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedQuery {
    /// The parsed query.
    pub ast: Query,
    /// The generated SQL condition.
    pub sql: String,
    /// Bound parameters for the SQL condition.
    pub params: Vec<Literal>,
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of live entries.
    pub size: usize,
    /// Number of `get` calls since creation or the last `clear`.
    pub total_requests: u64,
    /// Number of those calls that returned an entry.
    pub total_hits: u64,
    /// `total_hits / total_requests`, or 0 when there were no requests.
    pub hit_rate: f64,
}

#[derive(Debug)]
struct CacheEntry {
    query: String,
    value: CachedQuery,
    created_at: DateTime<Utc>,
    last_access_at: DateTime<Utc>,
    schema_version: String,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    total_requests: u64,
    total_hits: u64,
}

/// LRU + TTL cache of compiled queries keyed by query text and schema version.
///
/// # Example
///
/// ```
/// use logchefql::ast::Query;
/// use logchefql::cache::{CachedQuery, QueryCache};
/// use std::time::Duration;
///
/// let cache = QueryCache::new(10, Duration::from_secs(60));
/// let compiled = CachedQuery { ast: Query::new(), sql: String::new(), params: vec![] };
/// cache.set("level = error", compiled.clone(), Some("v1"));
///
/// assert_eq!(cache.get("level = error", Some("v1")), Some(compiled));
/// assert_eq!(cache.get("level = error", Some("v2")), None);
/// ```
#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    ttl: TimeDelta,
    state: Mutex<CacheState>,
}

impl QueryCache {
    /// Creates a cache holding at most `capacity` entries, each living for `ttl` after
    /// its last access.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Creates a cache from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up a compiled query, refreshing its TTL on a hit.
    #[must_use]
    pub fn get(&self, query: &str, schema_version: Option<&str>) -> Option<CachedQuery> {
        self.get_at(query, schema_version, Utc::now())
    }

    /// Like [`get`](Self::get), evaluated at time `now`.
    #[must_use]
    pub fn get_at(
        &self,
        query: &str,
        schema_version: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<CachedQuery> {
        let key = cache_key(query, schema_version);
        let mut guard = self.lock();
        let state = &mut *guard;
        state.total_requests += 1;

        let expired = match state.entries.get_mut(&key) {
            None => return None,
            Some(entry) if entry.query != query => return None,
            Some(entry) if now.signed_duration_since(entry.last_access_at) > self.ttl => true,
            Some(entry) => {
                entry.last_access_at = now;
                let value = entry.value.clone();
                state.total_hits += 1;
                return Some(value);
            }
        };

        if expired {
            if let Some(entry) = state.entries.remove(&key) {
                tracing::debug!(
                    query = %entry.query,
                    age_ms = now.signed_duration_since(entry.created_at).num_milliseconds(),
                    "Cache entry expired"
                );
            }
        }
        None
    }

    /// Stores a compiled query, evicting the least recently accessed entry if full.
    pub fn set(&self, query: &str, value: CachedQuery, schema_version: Option<&str>) {
        self.set_at(query, value, schema_version, Utc::now());
    }

    /// Like [`set`](Self::set), evaluated at time `now`.
    pub fn set_at(
        &self,
        query: &str,
        value: CachedQuery,
        schema_version: Option<&str>,
        now: DateTime<Utc>,
    ) {
        if self.capacity == 0 {
            return;
        }

        let key = cache_key(query, schema_version);
        let mut state = self.lock();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                if let Some(evicted) = state.entries.remove(&oldest) {
                    tracing::debug!(query = %evicted.query, "Evicted least recently used cache entry");
                }
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                query: query.to_string(),
                value,
                created_at: now,
                last_access_at: now,
                schema_version: schema_version
                    .unwrap_or(DEFAULT_SCHEMA_VERSION)
                    .to_string(),
            },
        );
    }

    /// Removes every entry whose schema version differs from `keep_version`.
    ///
    /// Returns the number of removed entries.
    pub fn invalidate_by_schema_version(&self, keep_version: &str) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.schema_version == keep_version);
        let removed = before - state.entries.len();

        if removed > 0 {
            tracing::debug!(removed, keep_version, "Invalidated cache entries for old schema");
        }
        removed
    }

    /// Returns the current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        // Precision loss only matters beyond 2^53 requests.
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if state.total_requests == 0 {
            0.0
        } else {
            state.total_hits as f64 / state.total_requests as f64
        };

        CacheStats {
            size: state.entries.len(),
            total_requests: state.total_requests,
            total_hits: state.total_hits,
            hit_rate,
        }
    }

    /// Removes every entry and resets all counters.
    pub fn clear(&self) {
        *self.lock() = CacheState::default();
    }

    /// Returns the number of stored entries, including ones that have expired but
    /// have not been looked up since.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Builds the cache key `hash(query):schema_version`.
fn cache_key(query: &str, schema_version: Option<&str>) -> String {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    format!(
        "{:016x}:{}",
        hasher.finish(),
        schema_version.unwrap_or(DEFAULT_SCHEMA_VERSION)
    )
}
