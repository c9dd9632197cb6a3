//! API Module
//!
//! HTTP surface of the caching proxy.
//!
//! # Endpoints
//! - `GET /__cache/health` - Health check endpoint
//! - `GET /__cache/stats` - Per-store cache statistics
//! - `DELETE /__cache/stores/:name` - Purge one store
//! - `DELETE /__cache/stores` - Purge every store
//! - anything else - GET/HEAD proxied upstream through the cache manager

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
