//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::{CacheStats, EvictionPolicy};

/// Statistics of one store (part of GET /__cache/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub writes: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// `null` limits mean the store is unbounded on that axis
    pub max_entries: Option<usize>,
    pub max_age_seconds: Option<u64>,
}

impl StoreStatsResponse {
    pub fn new(stats: &CacheStats, policy: EvictionPolicy) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            writes: stats.writes,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            max_entries: policy.max_entries,
            max_age_seconds: policy.max_age_seconds,
        }
    }
}

/// Response body for GET /__cache/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Per-store statistics keyed by store name
    pub stores: BTreeMap<String, StoreStatsResponse>,
    /// Entries across every store
    pub total_entries: usize,
    /// Hit rate across every store
    pub hit_rate: f64,
    /// Background writes and revalidations still running
    pub pending_background: usize,
}

/// Response body for DELETE /__cache/stores[/:name]
#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    pub message: String,
    /// Purged store, absent when every store was purged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Number of entries removed
    pub removed: usize,
}

impl PurgeResponse {
    pub fn store(name: impl Into<String>, removed: usize) -> Self {
        let name = name.into();
        Self {
            message: format!("Store '{}' purged", name),
            store: Some(name),
            removed,
        }
    }

    pub fn all(removed: usize) -> Self {
        Self {
            message: "All stores purged".to_string(),
            store: None,
            removed,
        }
    }
}

/// Response body for GET /__cache/health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Number of configured stores
    pub stores: usize,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(stores: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            stores,
        }
    }
}
