//! Scope ledger caching using Moka.
//!
//! Computed [`ScopeLedger`]s are cached under `(scope, revision)`. The history
//! bumps the revision on every mutation, so a hit is always for unchanged data
//! and nothing ever needs explicit invalidation for correctness.

use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

use splitledger_shared::config::CacheConfig;

use super::matrix::ScopeLedger;
use crate::ledger::types::Scope;

/// Default cache capacity (number of entries).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default time-to-live for cache entries (5 minutes).
const DEFAULT_TTL_SECS: u64 = 300;

/// Cache for computed scope ledgers.
///
/// Thread-safe and cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct BalanceCache {
    cache: Cache<(Scope, u64), Arc<ScopeLedger>>,
}

impl BalanceCache {
    /// Creates a new balance cache with default settings.
    ///
    /// Default: 1000 entries max, 5 minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a new balance cache with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `max_capacity` - Maximum number of entries to cache
    /// * `ttl_secs` - Time-to-live in seconds for each entry
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { cache }
    }

    /// Builds a cache from application config, or `None` if caching is disabled.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::with_config(config.capacity, config.ttl_secs))
    }

    /// Returns the cached ledger for `scope` at `revision`, if any.
    #[must_use]
    pub fn get(&self, scope: Scope, revision: u64) -> Option<Arc<ScopeLedger>> {
        self.cache.get(&(scope, revision))
    }

    /// Stores a computed ledger.
    pub fn insert(&self, revision: u64, ledger: Arc<ScopeLedger>) {
        self.cache.insert((ledger.scope(), revision), ledger);
    }

    /// Invalidates all cached entries.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Returns the number of entries currently in the cache.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs cache maintenance tasks.
    ///
    /// Moka does this lazily; calling it makes `entry_count` exact.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl Default for BalanceCache {
    fn default() -> Self {
        Self::new()
    }
}
