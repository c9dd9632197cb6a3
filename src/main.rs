//! Runtime Cache - caching reverse proxy
//!
//! Serves GET/HEAD requests for an upstream through the rule-driven cache
//! manager.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runtime_cache::api::{create_router, AppState};
use runtime_cache::cache::{FileBackend, MemoryBackend, StorageBackend};
use runtime_cache::{spawn_sweep_task, CacheManager, Config, HttpFetcher};

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the storage backend and initialize the cache manager
/// 4. Start the background expiry sweep
/// 5. Serve until SIGINT/SIGTERM, then let pending cache writes land
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runtime_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting runtime cache proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: upstream={}, port={}, sweep_interval={}s",
        config.upstream_url, config.server_port, config.sweep_interval
    );

    let settings = config
        .cache_settings()
        .context("failed to load cache settings")?;
    let backend = open_backend(config.storage_dir.as_deref()).await?;
    let manager = Arc::new(
        CacheManager::initialize(settings, backend)
            .await
            .context("failed to initialize cache manager")?,
    );

    let fetcher = HttpFetcher::new(Duration::from_millis(config.connect_timeout_ms))
        .context("failed to build HTTP client")?;

    let sweep_handle = if config.sweep_interval > 0 {
        Some(spawn_sweep_task(manager.clone(), config.sweep_interval))
    } else {
        info!("Expiry sweep disabled");
        None
    };

    let state = AppState::new(manager.clone(), Arc::new(fetcher), config.upstream_url.clone());
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await
        .context("server error")?;

    manager.settle().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn open_backend(storage_dir: Option<&Path>) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match storage_dir {
        Some(dir) => {
            let backend = FileBackend::open(dir)
                .await
                .with_context(|| format!("failed to open storage dir {}", dir.display()))?;
            info!("Persisting cache entries under {}", dir.display());
            Ok(Arc::new(backend))
        }
        None => {
            info!("Using in-memory cache storage");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweep task.
async fn shutdown_signal(sweep_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = sweep_handle {
        handle.abort();
        warn!("Expiry sweep task aborted");
    }
}
