//! In-process (L1) cache tier.
//!
//! Bounded map with a single store-wide TTL. Inserting past capacity evicts
//! the least-recently-inserted entry; expired entries are dropped lazily on
//! access. Operations never block on the network and never fail on a miss.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Clone)]
struct L1Entry {
    value: Value,
    inserted_at: Instant,
}

impl L1Entry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// Bounded, TTL-governed in-memory store.
pub struct L1Store {
    entries: DashMap<String, L1Entry>,
    // Insertion order for capacity eviction. May contain keys already
    // removed from `entries`; eviction pops until the size bound holds.
    insertion_order: Mutex<VecDeque<String>>,
    max_size: usize,
    ttl: Duration,
}

impl L1Store {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::with_capacity(max_size),
            insertion_order: Mutex::new(VecDeque::with_capacity(max_size)),
            max_size,
            ttl,
        }
    }

    /// Get a live value, dropping the entry if it has expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(self.ttl) {
                return Some(entry.value.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    /// Insert a value, evicting the oldest entries past capacity.
    ///
    /// Re-inserting an existing key refreshes its TTL and moves it to the
    /// back of the eviction order.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let mut order = self.insertion_order.lock();

        order.retain(|queued| queued != &key);
        order.push_back(key.clone());
        self.entries.insert(
            key,
            L1Entry {
                value,
                inserted_at: Instant::now(),
            },
        );

        while self.entries.len() > self.max_size {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                tracing::debug!(key = %oldest, "evicted least-recently-inserted L1 entry");
            }
        }
    }

    /// Remove an entry, reporting whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keys of all live entries; expired ones are dropped on the way.
    pub fn keys(&self) -> Vec<String> {
        let mut live = Vec::new();
        let mut expired = Vec::new();
        for entry in self.entries.iter() {
            if entry.value().is_expired(self.ttl) {
                expired.push(entry.key().clone());
            } else {
                live.push(entry.key().clone());
            }
        }
        for key in expired {
            self.entries.remove(&key);
        }
        live
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn utilization_percent(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        (self.len() as f64 / self.max_size as f64 * 10000.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let store = L1Store::new(10, Duration::from_secs(60));
        store.insert("default:k", json!({"a": 1}));
        assert_eq!(store.get("default:k"), Some(json!({"a": 1})));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_miss_returns_none() {
        let store = L1Store::new(10, Duration::from_secs(60));
        assert!(store.get("absent").is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let store = L1Store::new(10, Duration::from_millis(50));
        store.insert("k", json!("v"));
        assert!(store.get("k").is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest_insertion() {
        let store = L1Store::new(2, Duration::from_secs(60));
        store.insert("first", json!(1));
        store.insert("second", json!(2));
        store.insert("third", json!(3));

        assert!(store.get("first").is_none(), "oldest entry should be evicted");
        assert!(store.get("second").is_some());
        assert!(store.get("third").is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_reinsert_moves_to_back_of_eviction_order() {
        let store = L1Store::new(2, Duration::from_secs(60));
        store.insert("a", json!(1));
        store.insert("b", json!(2));
        store.insert("a", json!(10));
        store.insert("c", json!(3));

        // "b" became the oldest insertion after "a" was refreshed.
        assert!(store.get("b").is_none());
        assert_eq!(store.get("a"), Some(json!(10)));
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_remove() {
        let store = L1Store::new(10, Duration::from_secs(60));
        store.insert("k", json!("v"));
        assert!(store.remove("k"));
        assert!(!store.remove("k"));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_keys_lists_live_entries() {
        let store = L1Store::new(10, Duration::from_secs(60));
        store.insert("one", json!(1));
        store.insert("two", json!(2));

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_utilization() {
        let store = L1Store::new(4, Duration::from_secs(60));
        store.insert("a", json!(1));
        assert_eq!(store.utilization_percent(), 25.0);
    }
}
