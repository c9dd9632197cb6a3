//! Response models for the admin API
//!
//! DTOs serialized into the JSON bodies of the `/__cache` endpoints.

pub mod responses;

pub use responses::{HealthResponse, PurgeResponse, StatsResponse, StoreStatsResponse};
