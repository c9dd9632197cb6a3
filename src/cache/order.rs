//! Insertion Order Module
//!
//! Tracks write order of keys in a store for capacity eviction.

use std::collections::{BTreeMap, HashMap};

// == Insertion Order ==
/// Write order of the keys in one store.
///
/// Every write stamps the key with the next sequence number; iterating the
/// sequence map yields keys oldest first. Reads never reorder keys.
#[derive(Debug, Default, Clone)]
pub struct InsertionOrder {
    by_seq: BTreeMap<u64, String>,
    seq_of: HashMap<String, u64>,
    next_seq: u64,
}

impl InsertionOrder {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks `key` as the newest write, moving it if already tracked.
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, key.to_string());
        self.seq_of.insert(key.to_string(), seq);
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(seq) = self.seq_of.remove(key) {
            self.by_seq.remove(&seq);
        }
    }

    /// Keys ordered from oldest to newest write.
    pub fn oldest_first(&self) -> Vec<String> {
        self.by_seq.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.by_seq.clear();
        self.seq_of.clear();
    }

    pub fn len(&self) -> usize {
        self.seq_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq_of.is_empty()
    }
}
