//! Runtime Cache - rule-driven response caching
//!
//! Routes requests through ordered rules to NetworkFirst, CacheFirst or
//! StaleWhileRevalidate strategies backed by named, persistent, size- and
//! age-bounded stores.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod network;
pub mod routing;
pub mod strategy;
pub mod tasks;

pub use api::AppState;
pub use config::{CacheSettings, Config, RouteRule, StrategyKind};
pub use error::{CacheError, FetchError, Result};
pub use manager::{CacheManager, Handled};
pub use network::{Fetcher, HttpFetcher, RequestIdentity, Response};
pub use strategy::{ResponseSource, StrategyResponse};
pub use tasks::spawn_sweep_task;
