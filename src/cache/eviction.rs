//! Eviction Policy Module
//!
//! Decides which entries of a store must go after a write: first every
//! entry older than the maximum age, then the oldest survivors until the
//! store fits its maximum entry count.

use serde::Serialize;

// == Eviction Policy ==
/// Per-store limits. Both are optional; with neither set the store is
/// unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvictionPolicy {
    pub max_entries: Option<usize>,
    pub max_age_seconds: Option<u64>,
}

/// Keys selected for removal, split by trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Entries past `max_age_seconds`
    pub expired: Vec<String>,
    /// Oldest entries beyond `max_entries`, oldest first
    pub over_capacity: Vec<String>,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.over_capacity.is_empty()
    }

    pub fn len(&self) -> usize {
        self.expired.len() + self.over_capacity.len()
    }
}

impl EvictionPolicy {
    pub fn new(max_entries: Option<usize>, max_age_seconds: Option<u64>) -> Self {
        Self {
            max_entries,
            max_age_seconds,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.max_age_seconds.is_none()
    }

    /// Whether an entry inserted at `inserted_at` is past the maximum age.
    pub fn is_expired(&self, inserted_at: u64, now_ms: u64) -> bool {
        match self.max_age_seconds {
            Some(max_age) => now_ms.saturating_sub(inserted_at) > max_age.saturating_mul(1000),
            None => false,
        }
    }

    // == Plan ==
    /// Computes the removals for a store.
    ///
    /// # Arguments
    /// * `entries` - `(key, inserted_at)` pairs ordered oldest first
    /// * `now_ms` - Current time in Unix milliseconds
    pub fn plan(&self, entries: &[(String, u64)], now_ms: u64) -> EvictionPlan {
        let mut plan = EvictionPlan::default();
        let mut survivors: Vec<&String> = Vec::with_capacity(entries.len());

        for (key, inserted_at) in entries {
            if self.is_expired(*inserted_at, now_ms) {
                plan.expired.push(key.clone());
            } else {
                survivors.push(key);
            }
        }

        if let Some(max_entries) = self.max_entries {
            if survivors.len() > max_entries {
                let excess = survivors.len() - max_entries;
                plan.over_capacity = survivors
                    .into_iter()
                    .take(excess)
                    .cloned()
                    .collect();
            }
        }

        plan
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
        pairs.iter().map(|(k, t)| (k.to_string(), *t)).collect()
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let policy = EvictionPolicy::unbounded();
        let list = entries(&[("a", 0), ("b", 1), ("c", 2)]);

        assert!(policy.is_unbounded());
        assert!(policy.plan(&list, u64::MAX).is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let policy = EvictionPolicy::new(Some(2), None);
        let list = entries(&[("a", 0), ("b", 1), ("c", 2), ("d", 3)]);

        let plan = policy.plan(&list, 10);
        assert!(plan.expired.is_empty());
        assert_eq!(plan.over_capacity, vec!["a", "b"]);
    }

    #[test]
    fn test_at_capacity_is_untouched() {
        let policy = EvictionPolicy::new(Some(3), None);
        let list = entries(&[("a", 0), ("b", 1), ("c", 2)]);
        assert!(policy.plan(&list, 10).is_empty());
    }

    #[test]
    fn test_age_applies_regardless_of_count() {
        let policy = EvictionPolicy::new(Some(10), Some(1));
        let list = entries(&[("old", 0), ("new", 5_000)]);

        let plan = policy.plan(&list, 5_500);
        assert_eq!(plan.expired, vec!["old"]);
        assert!(plan.over_capacity.is_empty());
    }

    #[test]
    fn test_age_runs_before_capacity() {
        // Removing the expired entry already brings the store within bounds.
        let policy = EvictionPolicy::new(Some(2), Some(1));
        let list = entries(&[("old", 0), ("b", 9_000), ("c", 9_500)]);

        let plan = policy.plan(&list, 10_000);
        assert_eq!(plan.expired, vec!["old"]);
        assert!(plan.over_capacity.is_empty());
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_age_boundary_is_strict() {
        let policy = EvictionPolicy::new(None, Some(10));
        assert!(!policy.is_expired(0, 10_000));
        assert!(policy.is_expired(0, 10_001));
    }

    #[test]
    fn test_no_max_age_never_expires() {
        assert!(!EvictionPolicy::new(Some(1), None).is_expired(0, u64::MAX));
    }

    #[test]
    fn test_future_insertion_is_not_expired() {
        let policy = EvictionPolicy::new(None, Some(0));
        assert!(!policy.is_expired(5_000, 1_000));
    }
}
