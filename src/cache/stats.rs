//! Cache Statistics Module
//!
//! Tracks per-store counters for lookups, writes and removals.

use serde::Serialize;

// == Cache Stats ==
/// Counters for one cache store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a fresh entry
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries removed to respect `max_entries`
    pub evictions: u64,
    /// Entries removed for exceeding `max_age_seconds`
    pub expirations: u64,
    /// Successful writes
    pub writes: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Counts a lookup served from the store.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Counts a lookup that found nothing usable.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Counts an entry dropped for capacity.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Expiration ==
    /// Counts an entry dropped for age.
    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Record Write ==
    /// Counts a successful put.
    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    // == Update Entry Count ==
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }

    // == Combined ==
    /// Sums the counters of several stores.
    pub fn combined<'a>(all: impl IntoIterator<Item = &'a CacheStats>) -> Self {
        all.into_iter().fold(Self::default(), |mut sum, stats| {
            sum.hits += stats.hits;
            sum.misses += stats.misses;
            sum.evictions += stats.evictions;
            sum.expirations += stats.expirations;
            sum.writes += stats.writes;
            sum.total_entries += stats.total_entries;
            sum
        })
    }
}
