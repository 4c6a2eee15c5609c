// src/core/security/keyed.rs
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Map of independently lockable entries. The outer lock is only held long
/// enough to find or create an entry; updates happen under the entry's own
/// mutex, so different keys never contend.
///
/// Never acquire the map lock while holding an entry lock.
pub struct KeyedState<K, V> {
    entries: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Default for KeyedState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyedState<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.entries.read().get(key).cloned()
    }

    pub fn get_or_insert_with(&self, key: K, init: impl FnOnce() -> V) -> Arc<Mutex<V>> {
        if let Some(entry) = self.get(&key) {
            return entry;
        }
        self.entries
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    /// Inserts `value` unless the key is already present.
    pub fn insert_new(&self, key: K, value: V) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, Arc::new(Mutex::new(value)));
        true
    }

    pub fn remove(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drops entries for which `keep` returns false. Entries still held by a
    /// caller outside the map are always kept, so an update in flight never
    /// lands in an evicted entry.
    pub fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool) {
        self.entries
            .write()
            .retain(|key, entry| Arc::strong_count(entry) > 1 || keep(key, &entry.lock()));
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
