//! Cache Module
//!
//! Named response stores over a pluggable storage backend, with age and
//! capacity eviction.

mod backend;
mod entry;
mod eviction;
mod order;
mod stats;
mod store;


// Re-export public types
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::{EvictionPlan, EvictionPolicy};
pub use order::InsertionOrder;
pub use stats::CacheStats;
pub use store::CacheStore;
