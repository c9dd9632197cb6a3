//! Cache Manager
//!
//! Owns every named store and the ordered rule list, and routes each request
//! to the strategy of the first matching rule.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{CacheStats, CacheStore, StorageBackend};
use crate::config::CacheSettings;
use crate::error::{CacheError, Result};
use crate::network::{Fetcher, RequestIdentity};
use crate::routing::Matcher;
use crate::strategy::{BackgroundTasks, StrategyExecutor, StrategyResponse};

/// Outcome of [`CacheManager::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// A rule matched and its strategy produced this response
    Intercepted(StrategyResponse),
    /// No rule matched; the caller proceeds without the cache
    NotIntercepted,
}

// == Cache Manager ==
/// Process-wide cache state, immutable after [`CacheManager::initialize`]
/// apart from the contents of its stores.
#[derive(Debug)]
pub struct CacheManager {
    settings: CacheSettings,
    matcher: Matcher,
    /// One executor per rule, in rule order
    executors: Vec<StrategyExecutor>,
    stores: BTreeMap<String, Arc<CacheStore>>,
    background: BackgroundTasks,
}

impl CacheManager {
    // == Initialize ==
    /// Validates `settings`, compiles the rules, removes stores left behind by
    /// other versions and opens one store per distinct store name.
    pub async fn initialize(
        settings: CacheSettings,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self> {
        settings.validate()?;
        let matcher = Matcher::new(&settings.rules)?;

        let current: BTreeSet<String> = settings
            .rules
            .iter()
            .map(|rule| settings.namespace_for(&rule.store_name))
            .collect();
        let removed = remove_outdated(&settings.prefix, &current, backend.as_ref()).await?;
        if removed > 0 {
            info!("Removed {} outdated cache namespaces", removed);
        }

        let background = BackgroundTasks::new();
        let mut stores: BTreeMap<String, Arc<CacheStore>> = BTreeMap::new();
        let mut executors = Vec::with_capacity(settings.rules.len());

        for rule in &settings.rules {
            let store = match stores.get(&rule.store_name) {
                Some(store) => store.clone(),
                None => {
                    let policy = rule.policy();
                    if policy.is_unbounded() {
                        info!(
                            "Store '{}' has no maxEntries or maxAgeSeconds and grows until purged",
                            rule.store_name
                        );
                    }
                    let store = Arc::new(
                        CacheStore::open(
                            rule.store_name.clone(),
                            settings.namespace_for(&rule.store_name),
                            policy,
                            backend.clone(),
                        )
                        .await?,
                    );
                    stores.insert(rule.store_name.clone(), store.clone());
                    store
                }
            };

            executors.push(StrategyExecutor::new(
                rule.strategy,
                store,
                rule.timeout_ms.map(Duration::from_millis),
                settings.cacheable_statuses_for(rule),
                background.clone(),
            ));
        }

        info!(
            "Cache manager initialized: {} rules, {} stores, {} backend",
            executors.len(),
            stores.len(),
            backend.name()
        );

        Ok(Self {
            settings,
            matcher,
            executors,
            stores,
            background,
        })
    }

    // == Handle ==
    /// Runs the strategy of the first rule matching `request`.
    pub async fn handle(
        &self,
        request: &RequestIdentity,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Handled> {
        let index = match self.matcher.position(request) {
            Some(index) => index,
            None => {
                debug!("{}: no matching rule", request);
                return Ok(Handled::NotIntercepted);
            }
        };

        let executor = self.executors.get(index).ok_or_else(|| {
            CacheError::Internal(format!("no executor for rule #{}", index))
        })?;
        executor
            .execute(request, fetcher)
            .await
            .map(Handled::Intercepted)
    }

    // == Purge ==
    /// Clears one named store. Returns the number of entries removed.
    pub async fn purge(&self, store_name: &str) -> Result<usize> {
        let store = self
            .stores
            .get(store_name)
            .ok_or_else(|| CacheError::UnknownStore(store_name.to_string()))?;
        let removed = store.clear().await?;
        info!("Purged store '{}' ({} entries)", store_name, removed);
        Ok(removed)
    }

    /// Clears every store.
    pub async fn purge_all(&self) -> Result<usize> {
        let mut removed = 0;
        for store in self.stores.values() {
            removed += store.clear().await?;
        }
        info!("Purged all {} stores ({} entries)", self.stores.len(), removed);
        Ok(removed)
    }

    // == Housekeeping ==
    /// Applies age-based eviction to every store.
    pub async fn sweep_expired(&self) -> usize {
        let mut removed = 0;
        for store in self.stores.values() {
            removed += store.sweep_expired().await;
        }
        removed
    }

    /// Statistics of every store, by name.
    pub async fn stats(&self) -> BTreeMap<String, CacheStats> {
        let mut stats = BTreeMap::new();
        for (name, store) in &self.stores {
            stats.insert(name.clone(), store.stats().await);
        }
        stats
    }

    /// Waits for background cache writes and revalidations to finish.
    pub async fn settle(&self) {
        self.background.settle().await
    }

    pub fn pending_background(&self) -> usize {
        self.background.pending()
    }

    pub fn store(&self, name: &str) -> Option<&Arc<CacheStore>> {
        self.stores.get(name)
    }

    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }
}

/// Whether `namespace` has the `{prefix}-{store}-{version}` shape.
///
/// Prefixes never contain `-`, so another prefix that merely starts with
/// this one (`runtime-x` vs `runtime`) cannot be mistaken for it.
fn is_owned_namespace(prefix: &str, namespace: &str) -> bool {
    namespace
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.rsplit_once('-'))
        .map(|(store, version)| !store.is_empty() && !version.is_empty())
        .unwrap_or(false)
}

/// Deletes namespaces under `prefix` that no current store uses.
async fn remove_outdated(
    prefix: &str,
    current: &BTreeSet<String>,
    backend: &dyn StorageBackend,
) -> Result<usize> {
    let mut removed = 0;
    for namespace in backend.namespaces().await? {
        if is_owned_namespace(prefix, &namespace) && !current.contains(&namespace) {
            debug!("Removing outdated namespace '{}'", namespace);
            backend.clear(&namespace).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
