//! API Handlers
//!
//! The read-through proxy fallback and the `/__cache` admin endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response as HttpResponse},
    Json,
};
use tracing::debug;

use crate::cache::CacheStats;
use crate::error::{CacheError, Result};
use crate::manager::{CacheManager, Handled};
use crate::models::{HealthResponse, PurgeResponse, StatsResponse, StoreStatsResponse};
use crate::network::{Fetcher, RequestIdentity, Response};

/// Header telling clients where a proxied response came from.
pub const X_CACHE: &str = "x-cache";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CacheManager>,
    pub fetcher: Arc<dyn Fetcher>,
    /// Base URL prepended to every proxied path, without trailing slash
    pub upstream_url: String,
}

impl AppState {
    pub fn new(
        manager: Arc<CacheManager>,
        fetcher: Arc<dyn Fetcher>,
        upstream_url: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            fetcher,
            upstream_url: upstream_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Absolute upstream URL for an inbound request URI.
    pub fn upstream_for(&self, uri: &Uri) -> String {
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        format!("{}{}", self.upstream_url, path)
    }
}

// == Proxy ==
/// Fallback handler: forwards GET and HEAD through the cache manager.
///
/// Requests no rule intercepts are fetched directly and never cached.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<HttpResponse> {
    if method != Method::GET && method != Method::HEAD {
        return Err(CacheError::MethodNotAllowed(method.to_string()));
    }

    let request = RequestIdentity::new(method.as_str(), state.upstream_for(&uri));
    match state.manager.handle(&request, state.fetcher.clone()).await? {
        Handled::Intercepted(served) => Ok(to_http(served.response, served.source.as_str())),
        Handled::NotIntercepted => {
            debug!("Bypassing cache for {}", request);
            let response = state
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| CacheError::Upstream(e.to_string()))?;
            Ok(to_http(response, "bypass"))
        }
    }
}

/// Builds the HTTP response for a cached or fetched payload.
///
/// Opaque responses carry no usable status and are replayed as 200.
fn to_http(response: Response, source: &'static str) -> HttpResponse {
    let status = if response.is_opaque() {
        StatusCode::OK
    } else {
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY)
    };

    let mut http = (status, response.body).into_response();
    let headers = http.headers_mut();
    // Stored headers replace the body defaults; repeats are appended.
    let mut replaced: Vec<HeaderName> = Vec::new();
    for (name, value) in &response.headers {
        if name == "content-length" {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            if replaced.contains(&name) {
                headers.append(name, value);
            } else {
                replaced.push(name.clone());
                headers.insert(name, value);
            }
        }
    }
    headers.insert(X_CACHE, HeaderValue::from_static(source));
    http
}

// == Admin ==
/// Handler for GET /__cache/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.manager.store_names().len()))
}

/// Handler for GET /__cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let all = state.manager.stats().await;
    let totals = CacheStats::combined(all.values());

    let mut stores = BTreeMap::new();
    for (name, stats) in &all {
        if let Some(store) = state.manager.store(name) {
            stores.insert(name.clone(), StoreStatsResponse::new(stats, store.policy()));
        }
    }

    Json(StatsResponse {
        stores,
        total_entries: totals.total_entries,
        hit_rate: totals.hit_rate(),
        pending_background: state.manager.pending_background(),
    })
}

/// Handler for DELETE /__cache/stores/:name
pub async fn purge_store_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PurgeResponse>> {
    let removed = state.manager.purge(&name).await?;
    Ok(Json(PurgeResponse::store(name, removed)))
}

/// Handler for DELETE /__cache/stores
pub async fn purge_all_handler(State(state): State<AppState>) -> Result<Json<PurgeResponse>> {
    let removed = state.manager.purge_all().await?;
    Ok(Json(PurgeResponse::all(removed)))
}
