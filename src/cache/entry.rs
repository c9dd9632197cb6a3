//! Cache Entry Module
//!
//! Defines the structure for individual cached responses with their
//! insertion timestamp.

use serde::{Deserialize, Serialize};

use crate::network::Response;

// == Cache Entry ==
/// A cached response plus the metadata eviction needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key (see `RequestIdentity::cache_key`)
    pub key: String,
    /// The stored response
    pub response: Response,
    /// Insertion timestamp (Unix milliseconds)
    pub inserted_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(key: impl Into<String>, response: Response) -> Self {
        Self::inserted_at(key, response, current_timestamp_ms())
    }

    /// Creates an entry with an explicit insertion time.
    pub fn inserted_at(key: impl Into<String>, response: Response, inserted_at: u64) -> Self {
        Self {
            key: key.into(),
            response,
            inserted_at,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
