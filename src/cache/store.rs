//! Cache Store Module
//!
//! One named store: an insertion-ordered index over entries persisted in a
//! storage backend, with its eviction policy applied on every write.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{
    current_timestamp_ms, CacheEntry, CacheStats, EvictionPolicy, InsertionOrder,
    StorageBackend,
};
use crate::error::Result;
use crate::network::Response;

/// Index and counters guarded by the store lock.
#[derive(Debug, Default)]
struct StoreState {
    order: InsertionOrder,
    inserted_at: HashMap<String, u64>,
    stats: CacheStats,
}

impl StoreState {
    fn forget(&mut self, key: &str) {
        self.order.remove(key);
        self.inserted_at.remove(key);
    }

    fn sync_total(&mut self) {
        let total = self.inserted_at.len();
        self.stats.set_total_entries(total);
    }
}

// == Cache Store ==
/// A named, persistent collection of cached responses.
///
/// Every operation holds the store lock for its whole duration, backend I/O
/// included, so concurrent writes to the same key never interleave.
pub struct CacheStore {
    name: String,
    namespace: String,
    policy: EvictionPolicy,
    backend: Arc<dyn StorageBackend>,
    state: Mutex<StoreState>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("policy", &self.policy)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl CacheStore {
    // == Open ==
    /// Opens a store over `namespace`, rebuilding the insertion order from
    /// entries already persisted there.
    ///
    /// Entries that fail to decode are dropped from the backend. A backend may
    /// also skip records it cannot frame while listing keys.
    pub async fn open(
        name: impl Into<String>,
        namespace: impl Into<String>,
        policy: EvictionPolicy,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self> {
        let name = name.into();
        let namespace = namespace.into();

        let mut persisted: Vec<(String, u64)> = Vec::new();
        for key in backend.keys(&namespace).await? {
            let decoded = match backend.get(&namespace, &key).await? {
                Some(bytes) => serde_json::from_slice::<CacheEntry>(&bytes).ok(),
                None => continue,
            };
            match decoded {
                Some(entry) => persisted.push((key, entry.inserted_at)),
                None => {
                    warn!("Store '{}': dropping unreadable entry '{}'", name, key);
                    backend.delete(&namespace, &key).await?;
                }
            }
        }
        persisted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut state = StoreState::default();
        for (key, inserted_at) in persisted {
            state.order.touch(&key);
            state.inserted_at.insert(key, inserted_at);
        }
        state.sync_total();

        if !state.inserted_at.is_empty() {
            debug!(
                "Store '{}' rehydrated {} entries from {} backend",
                name,
                state.inserted_at.len(),
                backend.name()
            );
        }

        Ok(Self {
            name,
            namespace,
            policy,
            backend,
            state: Mutex::new(state),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    // == Get ==
    /// Returns the entry for `key` if present and not past its maximum age.
    ///
    /// An expired entry is removed on the spot and counts as a miss.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut state = self.state.lock().await;

        let inserted_at = match state.inserted_at.get(key).copied() {
            Some(ts) => ts,
            None => {
                state.stats.record_miss();
                return Ok(None);
            }
        };

        if self.policy.is_expired(inserted_at, current_timestamp_ms()) {
            self.remove_quietly(key).await;
            state.forget(key);
            state.stats.record_expiration();
            state.stats.record_miss();
            state.sync_total();
            return Ok(None);
        }

        let bytes = match self.backend.get(&self.namespace, key).await? {
            Some(bytes) => bytes,
            None => {
                // Index and backend disagree; the backend wins.
                state.forget(key);
                state.stats.record_miss();
                state.sync_total();
                return Ok(None);
            }
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes)?;
        state.stats.record_hit();
        Ok(Some(entry))
    }

    // == Put ==
    /// Stores an entry, overwriting any previous one for the same key and
    /// moving it to the newest position, then applies the eviction policy.
    ///
    /// Returns the number of entries evicted by this write.
    pub async fn put(&self, entry: CacheEntry) -> Result<usize> {
        let bytes = serde_json::to_vec(&entry)?;

        let mut state = self.state.lock().await;
        self.backend.put(&self.namespace, &entry.key, &bytes).await?;
        state.order.touch(&entry.key);
        state.inserted_at.insert(entry.key.clone(), entry.inserted_at);
        state.stats.record_write();

        let evicted = self.enforce(&mut state, current_timestamp_ms()).await;
        state.sync_total();
        Ok(evicted)
    }

    /// Stores `response` under `key`, stamped with the current time.
    pub async fn insert(&self, key: &str, response: Response) -> Result<usize> {
        self.put(CacheEntry::new(key, response)).await
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let removed = self.backend.delete(&self.namespace, key).await?;
        let tracked = state.inserted_at.contains_key(key);
        state.forget(key);
        state.sync_total();
        Ok(removed || tracked)
    }

    // == Size ==
    pub async fn size(&self) -> usize {
        self.state.lock().await.inserted_at.len()
    }

    // == Keys Oldest First ==
    pub async fn keys_oldest_first(&self) -> Vec<String> {
        self.state.lock().await.order.oldest_first()
    }

    // == Clear ==
    /// Removes every entry and the backing namespace.
    pub async fn clear(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let count = state.inserted_at.len();
        self.backend.clear(&self.namespace).await?;
        state.order.clear();
        state.inserted_at.clear();
        state.sync_total();
        Ok(count)
    }

    // == Sweep Expired ==
    /// Removes every entry past the maximum age, without waiting for a write.
    pub async fn sweep_expired(&self) -> usize {
        if self.policy.max_age_seconds.is_none() {
            return 0;
        }
        let mut state = self.state.lock().await;
        let now = current_timestamp_ms();
        let expired: Vec<String> = state
            .order
            .oldest_first()
            .into_iter()
            .filter(|key| {
                state
                    .inserted_at
                    .get(key)
                    .map(|ts| self.policy.is_expired(*ts, now))
                    .unwrap_or(false)
            })
            .collect();

        for key in &expired {
            self.remove_quietly(key).await;
            state.forget(key);
            state.stats.record_expiration();
        }
        state.sync_total();
        expired.len()
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.inserted_at.len());
        stats
    }

    /// Applies the eviction policy. Backend failures are logged and the
    /// entry is dropped from the index anyway.
    async fn enforce(&self, state: &mut StoreState, now_ms: u64) -> usize {
        if self.policy.is_unbounded() {
            return 0;
        }

        let entries: Vec<(String, u64)> = state
            .order
            .oldest_first()
            .into_iter()
            .filter_map(|key| state.inserted_at.get(&key).map(|ts| (key.clone(), *ts)))
            .collect();
        let plan = self.policy.plan(&entries, now_ms);

        for key in &plan.expired {
            self.remove_quietly(key).await;
            state.forget(key);
            state.stats.record_expiration();
        }
        for key in &plan.over_capacity {
            self.remove_quietly(key).await;
            state.forget(key);
            state.stats.record_eviction();
        }

        if !plan.is_empty() {
            debug!(
                "Store '{}': evicted {} expired, {} over capacity",
                self.name,
                plan.expired.len(),
                plan.over_capacity.len()
            );
        }
        plan.len()
    }

    async fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.backend.delete(&self.namespace, key).await {
            warn!("Store '{}': failed to delete '{}': {}", self.name, key, e);
        }
    }
}
