//! API Routes
//!
//! Configures the Axum router: admin endpoints under `/__cache`, everything
//! else falls through to the caching proxy.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    health_handler, proxy_handler, purge_all_handler, purge_store_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/__cache/health", get(health_handler))
        .route("/__cache/stats", get(stats_handler))
        .route("/__cache/stores", delete(purge_all_handler))
        .route("/__cache/stores/:name", delete(purge_store_handler))
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
