//! HTTP Fetcher
//!
//! Network primitive backed by a reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Fetcher, RequestIdentity, Response};
use crate::error::FetchError;

/// Headers describing a single hop; never stored or replayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

/// Fetches request identities over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a connect timeout. The per-request deadline is
    /// left to the strategy's own timer.
    pub fn new(connect_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestIdentity) -> Result<Response, FetchError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::Network(format!("invalid method: {}", e)))?;

        let upstream = self
            .client
            .request(method, &request.url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = upstream.status().as_u16();
        let mut response = Response::new(status, Vec::new());
        for (name, value) in upstream.headers() {
            let name = name.as_str();
            if HOP_BY_HOP.contains(&name) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                response.append_header(name, value);
            }
        }

        // A body error discards the whole response.
        let body = upstream
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        response.body = body.to_vec();

        debug!(
            "Fetched {} -> {} ({} bytes)",
            request,
            status,
            response.body.len()
        );
        Ok(response)
    }
}
