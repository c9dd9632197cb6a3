//! Network Module
//!
//! The fetch primitive the strategies call out to, plus the request and
//! response types shared with the cache.

mod http;
mod types;

use async_trait::async_trait;

use crate::error::FetchError;

pub use http::HttpFetcher;
pub use types::{RequestIdentity, Response, OPAQUE_STATUS};

// == Fetcher Trait ==
/// Externally supplied network fetch.
///
/// Implementations must only return complete responses. Dropping the returned
/// future cancels the fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &RequestIdentity) -> Result<Response, FetchError>;
}
