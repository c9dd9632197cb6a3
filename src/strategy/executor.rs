//! Strategy Executor
//!
//! Runs NetworkFirst, CacheFirst and StaleWhileRevalidate against one store.
//!
//! Network fetches run in detached tasks. A caller that gives up (timeout,
//! disconnect) only drops its receiving end; the fetch still completes and,
//! when cacheable, still writes the store. Only complete responses are ever
//! written.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::BackgroundTasks;
use crate::cache::{CacheEntry, CacheStore};
use crate::config::StrategyKind;
use crate::error::{CacheError, FetchError, Result};
use crate::network::{Fetcher, RequestIdentity, Response};

// == Response Source ==
/// Where a returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
        }
    }
}

/// A response produced by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyResponse {
    pub response: Response,
    pub source: ResponseSource,
}

impl StrategyResponse {
    fn network(response: Response) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
        }
    }

    fn cache(entry: CacheEntry) -> Self {
        Self {
            response: entry.response,
            source: ResponseSource::Cache,
        }
    }
}

/// Whether the caller hears about a cacheable response before or after it
/// is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOrder {
    ReplyThenStore,
    StoreThenReply,
}

type FetchReceiver = oneshot::Receiver<std::result::Result<Response, FetchError>>;

// == Strategy Executor ==
/// Executes one rule's strategy over that rule's store.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    kind: StrategyKind,
    store: Arc<CacheStore>,
    timeout: Option<Duration>,
    cacheable_statuses: Arc<BTreeSet<u16>>,
    background: BackgroundTasks,
}

impl StrategyExecutor {
    pub fn new(
        kind: StrategyKind,
        store: Arc<CacheStore>,
        timeout: Option<Duration>,
        cacheable_statuses: BTreeSet<u16>,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            kind,
            store,
            timeout,
            cacheable_statuses: Arc::new(cacheable_statuses),
            background,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Whether a response with this status may be persisted.
    pub fn is_cacheable(&self, response: &Response) -> bool {
        self.cacheable_statuses.contains(&response.status)
    }

    // == Execute ==
    pub async fn execute(
        &self,
        request: &RequestIdentity,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<StrategyResponse> {
        match self.kind {
            StrategyKind::NetworkFirst => self.network_first(request, fetcher).await,
            StrategyKind::CacheFirst => self.cache_first(request, fetcher).await,
            StrategyKind::StaleWhileRevalidate => {
                self.stale_while_revalidate(request, fetcher).await
            }
        }
    }

    async fn network_first(
        &self,
        request: &RequestIdentity,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<StrategyResponse> {
        let key = request.cache_key();
        let reply = self.spawn_fetch(request, fetcher, WriteOrder::ReplyThenStore);

        let outcome = match self.timeout {
            Some(timeout) => {
                tokio::select! {
                    received = reply => flatten(received),
                    _ = tokio::time::sleep(timeout) => {
                        Err(format!("no network response within {}ms", timeout.as_millis()))
                    }
                }
            }
            None => flatten(reply.await),
        };

        let reason = match outcome {
            Ok(response) => return Ok(StrategyResponse::network(response)),
            Err(reason) => reason,
        };

        debug!("NetworkFirst {}: falling back to cache ({})", key, reason);
        match self.lookup(&key).await {
            Some(entry) => Ok(StrategyResponse::cache(entry)),
            None => Err(CacheError::CacheMissAfterNetworkFailure { key, reason }),
        }
    }

    async fn cache_first(
        &self,
        request: &RequestIdentity,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<StrategyResponse> {
        let key = request.cache_key();
        if let Some(entry) = self.lookup(&key).await {
            return Ok(StrategyResponse::cache(entry));
        }

        let reply = self.spawn_fetch(request, fetcher, WriteOrder::StoreThenReply);
        match flatten(reply.await) {
            Ok(response) => Ok(StrategyResponse::network(response)),
            Err(reason) => Err(CacheError::NoCacheNoNetwork { key, reason }),
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: &RequestIdentity,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<StrategyResponse> {
        let key = request.cache_key();
        if let Some(entry) = self.lookup(&key).await {
            // Nobody waits on the revalidation reply.
            drop(self.spawn_fetch(request, fetcher, WriteOrder::ReplyThenStore));
            return Ok(StrategyResponse::cache(entry));
        }

        let reply = self.spawn_fetch(request, fetcher, WriteOrder::ReplyThenStore);
        match flatten(reply.await) {
            Ok(response) => Ok(StrategyResponse::network(response)),
            Err(reason) => Err(CacheError::CacheMissAfterNetworkFailure { key, reason }),
        }
    }

    /// Store read that treats backend failures as misses.
    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Store '{}': read of '{}' failed: {}", self.store.name(), key, e);
                None
            }
        }
    }

    /// Fetches in a detached task that also writes cacheable responses to
    /// the store. The returned receiver may be dropped at any time.
    fn spawn_fetch(
        &self,
        request: &RequestIdentity,
        fetcher: Arc<dyn Fetcher>,
        order: WriteOrder,
    ) -> FetchReceiver {
        let (tx, rx) = oneshot::channel();
        let request = request.clone();
        let store = self.store.clone();
        let statuses = self.cacheable_statuses.clone();

        self.background.spawn(async move {
            let response = match fetcher.fetch(&request).await {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            if !statuses.contains(&response.status) {
                debug!(
                    "{}: status {} not cacheable, not stored",
                    request, response.status
                );
                let _ = tx.send(Ok(response));
                return;
            }

            let key = request.cache_key();
            match order {
                WriteOrder::ReplyThenStore => {
                    let _ = tx.send(Ok(response.clone()));
                    write_quietly(&store, &key, response).await;
                }
                WriteOrder::StoreThenReply => {
                    write_quietly(&store, &key, response.clone()).await;
                    let _ = tx.send(Ok(response));
                }
            }
        });

        rx
    }
}

async fn write_quietly(store: &CacheStore, key: &str, response: Response) {
    if let Err(e) = store.insert(key, response).await {
        warn!("Store '{}': write of '{}' failed: {}", store.name(), key, e);
    }
}

fn flatten(
    received: std::result::Result<std::result::Result<Response, FetchError>, oneshot::error::RecvError>,
) -> std::result::Result<Response, String> {
    match received {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(FetchError::Cancelled.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EvictionPolicy, MemoryBackend};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted fetcher: pops one outcome per call, repeating the last.
    struct ScriptedFetcher {
        script: Mutex<Vec<(u64, std::result::Result<Response, FetchError>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<(u64, std::result::Result<Response, FetchError>)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            _request: &RequestIdentity,
        ) -> std::result::Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, outcome) = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.remove(0)
                } else {
                    script[0].clone()
                }
            };
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            outcome
        }
    }

    fn ok(body: &str) -> std::result::Result<Response, FetchError> {
        Ok(Response::new(200, body))
    }

    fn down() -> std::result::Result<Response, FetchError> {
        Err(FetchError::Network("connection refused".to_string()))
    }

    async fn executor(kind: StrategyKind, timeout_ms: Option<u64>) -> StrategyExecutor {
        let store = CacheStore::open(
            "test",
            "rt-test-v1",
            EvictionPolicy::unbounded(),
            Arc::new(MemoryBackend::new()),
        )
        .await
        .unwrap();
        StrategyExecutor::new(
            kind,
            Arc::new(store),
            timeout_ms.map(Duration::from_millis),
            [0u16, 200].into_iter().collect(),
            BackgroundTasks::new(),
        )
    }

    fn request() -> RequestIdentity {
        RequestIdentity::get("https://bible.example/api/verses/1")
    }

    #[tokio::test]
    async fn test_network_first_caches_and_returns() {
        let exec = executor(StrategyKind::NetworkFirst, Some(1_000)).await;
        let fetcher = ScriptedFetcher::new(vec![(0, ok("fresh"))]);

        let result = exec.execute(&request(), fetcher.clone()).await.unwrap();
        exec.background.settle().await;

        assert_eq!(result.source, ResponseSource::Network);
        assert_eq!(result.response.body, b"fresh");
        let cached = exec.store.get(&request().cache_key()).await.unwrap().unwrap();
        assert_eq!(cached.response, result.response);
    }

    #[tokio::test]
    async fn test_network_first_falls_back_on_failure() {
        let exec = executor(StrategyKind::NetworkFirst, Some(1_000)).await;
        let fetcher = ScriptedFetcher::new(vec![(0, ok("fresh")), (0, down())]);

        exec.execute(&request(), fetcher.clone()).await.unwrap();
        exec.background.settle().await;
        let result = exec.execute(&request(), fetcher.clone()).await.unwrap();

        assert_eq!(result.source, ResponseSource::Cache);
        assert_eq!(result.response.body, b"fresh");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_network_first_miss_after_failure() {
        let exec = executor(StrategyKind::NetworkFirst, Some(1_000)).await;
        let fetcher = ScriptedFetcher::new(vec![(0, down())]);

        let result = exec.execute(&request(), fetcher).await;
        assert!(matches!(
            result,
            Err(CacheError::CacheMissAfterNetworkFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_network_first_timeout_serves_cache_and_late_response_updates_it() {
        let exec = executor(StrategyKind::NetworkFirst, Some(50)).await;
        exec.store
            .insert(&request().cache_key(), Response::new(200, "old"))
            .await
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![(300, ok("late"))]);

        let result = exec.execute(&request(), fetcher).await.unwrap();
        assert_eq!(result.source, ResponseSource::Cache);
        assert_eq!(result.response.body, b"old");

        exec.background.settle().await;
        let cached = exec.store.get(&request().cache_key()).await.unwrap().unwrap();
        assert_eq!(cached.response.body, b"late");
    }

    #[tokio::test]
    async fn test_network_first_timeout_without_cache_fails() {
        let exec = executor(StrategyKind::NetworkFirst, Some(20)).await;
        let fetcher = ScriptedFetcher::new(vec![(200, ok("late"))]);

        let result = exec.execute(&request(), fetcher).await;
        assert!(matches!(
            result,
            Err(CacheError::CacheMissAfterNetworkFailure { reason, .. }) if reason.contains("20ms")
        ));
    }

    #[tokio::test]
    async fn test_uncacheable_status_returned_not_stored() {
        let exec = executor(StrategyKind::NetworkFirst, None).await;
        let fetcher = ScriptedFetcher::new(vec![(0, Ok(Response::new(404, "missing")))]);

        let result = exec.execute(&request(), fetcher).await.unwrap();
        exec.background.settle().await;

        assert_eq!(result.response.status, 404);
        assert_eq!(exec.store.size().await, 0);
    }

    #[tokio::test]
    async fn test_opaque_status_is_cacheable_by_default() {
        let exec = executor(StrategyKind::NetworkFirst, None).await;
        let fetcher = ScriptedFetcher::new(vec![(0, Ok(Response::new(0, "")))]);

        exec.execute(&request(), fetcher).await.unwrap();
        exec.background.settle().await;

        assert_eq!(exec.store.size().await, 1);
    }

    #[tokio::test]
    async fn test_cache_first_fetches_once() {
        let exec = executor(StrategyKind::CacheFirst, None).await;
        let fetcher = ScriptedFetcher::new(vec![(0, ok("body"))]);

        let first = exec.execute(&request(), fetcher.clone()).await.unwrap();
        let second = exec.execute(&request(), fetcher.clone()).await.unwrap();

        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(first.response, second.response);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_no_cache_no_network() {
        let exec = executor(StrategyKind::CacheFirst, None).await;
        let fetcher = ScriptedFetcher::new(vec![(0, down())]);

        let result = exec.execute(&request(), fetcher).await;
        assert!(matches!(result, Err(CacheError::NoCacheNoNetwork { .. })));
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_serves_cache_then_refreshes() {
        let exec = executor(StrategyKind::StaleWhileRevalidate, None).await;
        exec.store
            .insert(&request().cache_key(), Response::new(200, "stale"))
            .await
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![(100, ok("revalidated"))]);

        let result = exec.execute(&request(), fetcher.clone()).await.unwrap();
        assert_eq!(result.source, ResponseSource::Cache);
        assert_eq!(result.response.body, b"stale");

        exec.background.settle().await;
        assert_eq!(fetcher.calls(), 1);
        let cached = exec.store.get(&request().cache_key()).await.unwrap().unwrap();
        assert_eq!(cached.response.body, b"revalidated");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_miss_uses_network() {
        let exec = executor(StrategyKind::StaleWhileRevalidate, None).await;
        let fetcher = ScriptedFetcher::new(vec![(0, ok("fresh")), (0, down())]);

        let first = exec.execute(&request(), fetcher.clone()).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        exec.background.settle().await;

        // The failing revalidation leaves the cached entry untouched.
        let second = exec.execute(&request(), fetcher.clone()).await.unwrap();
        exec.background.settle().await;
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.body, b"fresh");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_miss_and_failure() {
        let exec = executor(StrategyKind::StaleWhileRevalidate, None).await;
        let fetcher = ScriptedFetcher::new(vec![(0, down())]);

        let result = exec.execute(&request(), fetcher).await;
        assert!(matches!(
            result,
            Err(CacheError::CacheMissAfterNetworkFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_caller_still_caches_complete_response() {
        let exec = executor(StrategyKind::NetworkFirst, None).await;
        let fetcher = ScriptedFetcher::new(vec![(100, ok("complete"))]);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            exec.execute(&request(), fetcher),
        )
        .await;
        assert!(abandoned.is_err());

        exec.background.settle().await;
        let cached = exec.store.get(&request().cache_key()).await.unwrap().unwrap();
        assert_eq!(cached.response.body, b"complete");
    }
}
