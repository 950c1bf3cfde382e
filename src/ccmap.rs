//! Sharded concurrent map.
//!
//! Keys are spread over independent shards, each an ordinary `HashMap`
//! behind its own `RwLock`, so writers on different shards never contend.
//!
//! Single-key operations are atomic. Whole-map operations (`get_all`,
//! `keys`, `count`, `clear`, `retain`) lock one shard at a time and are
//! therefore not a snapshot: concurrent writers may be observed on some
//! shards and not on others.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 32;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a hash.
pub fn fnv1a_32(key: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Concurrent map partitioned into independently locked shards.
#[derive(Debug)]
pub struct CcMap<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
}

impl<V: Clone> CcMap<V> {
    /// Create a map with [`DEFAULT_SHARDS`] shards.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a map with the given number of shards (at least one).
    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, key: &str) -> usize {
        fnv1a_32(key) as usize % self.shards.len()
    }

    // A writer can't leave a shard half-updated (every mutation is a single
    // HashMap call), so a poisoned lock still guards consistent data.
    fn read(&self, idx: usize) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.shards[idx].read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, idx: usize) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.shards[idx].write().unwrap_or_else(|e| e.into_inner())
    }

    /// Get a clone of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.read(self.shard_index(key)).get(key).cloned()
    }

    /// Check whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.read(self.shard_index(key)).contains_key(key)
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let idx = self.shard_index(&key);
        self.write(idx).insert(key, value);
    }

    /// Insert or overwrite `key`, returning the previous value.
    pub fn replace(&self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let idx = self.shard_index(&key);
        self.write(idx).insert(key, value)
    }

    /// Overwrite `key` only if it is already present.
    ///
    /// Returns `true` if the value was updated.
    pub fn update(&self, key: &str, value: V) -> bool {
        let mut shard = self.write(self.shard_index(key));
        match shard.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Remove `key`, returning its value.
    pub fn delete(&self, key: &str) -> Option<V> {
        self.write(self.shard_index(key)).remove(key)
    }

    /// Get and remove `key` in one step.
    pub fn get_once(&self, key: &str) -> Option<V> {
        self.delete(key)
    }

    /// Remove `key` if its value matches `pred`, under a single shard lock.
    ///
    /// Returns the removed value.
    pub fn remove_if<F>(&self, key: &str, pred: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        let mut shard = self.write(self.shard_index(key));
        if shard.get(key).is_some_and(pred) {
            shard.remove(key)
        } else {
            None
        }
    }

    /// Get several keys at once. Missing keys map to `None`.
    pub fn mget<'a, I>(&self, keys: I) -> HashMap<String, Option<V>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .map(|key| (key.to_string(), self.get(key)))
            .collect()
    }

    /// Insert several entries.
    pub fn mset<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, V)>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Copy of every entry, gathered shard by shard.
    pub fn get_all(&self) -> HashMap<String, V> {
        let mut all = HashMap::new();
        for idx in 0..self.shards.len() {
            let shard = self.read(idx);
            all.extend(shard.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        all
    }

    /// Every key, gathered shard by shard.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for idx in 0..self.shards.len() {
            keys.extend(self.read(idx).keys().cloned());
        }
        keys
    }

    /// Number of entries, summed shard by shard.
    pub fn count(&self) -> usize {
        (0..self.shards.len()).map(|idx| self.read(idx).len()).sum()
    }

    /// Check whether every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Remove every entry.
    pub fn clear(&self) {
        for idx in 0..self.shards.len() {
            *self.write(idx) = HashMap::new();
        }
    }

    /// Keep only the entries for which `keep` returns `true`.
    ///
    /// Returns the number of removed entries.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&str, &V) -> bool,
    {
        let mut removed = 0;
        for idx in 0..self.shards.len() {
            let mut shard = self.write(idx);
            let before = shard.len();
            shard.retain(|k, v| keep(k, v));
            removed += before - shard.len();
        }
        removed
    }
}

impl<V: Clone> Default for CcMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a_32(""), 0x811c_9dc5);
        assert_eq!(fnv1a_32("a"), 0xe40c_292c);
        assert_eq!(fnv1a_32("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_set_get_delete() {
        let map = CcMap::new();
        map.set("a", 1);
        assert_eq!(map.get("a"), Some(1));
        assert!(map.contains("a"));

        assert_eq!(map.delete("a"), Some(1));
        assert_eq!(map.get("a"), None);
        assert!(!map.contains("a"));
    }

    #[test]
    fn test_replace_returns_previous() {
        let map = CcMap::new();
        assert_eq!(map.replace("k", "v1"), None);
        assert_eq!(map.replace("k", "v2"), Some("v1"));
        assert_eq!(map.get("k"), Some("v2"));
    }

    #[test]
    fn test_update_only_existing() {
        let map = CcMap::new();
        assert!(!map.update("missing", 1));
        assert!(!map.contains("missing"));

        map.set("present", 1);
        assert!(map.update("present", 2));
        assert_eq!(map.get("present"), Some(2));
    }

    #[test]
    fn test_get_once_removes() {
        let map = CcMap::new();
        map.set("flash", "hello".to_string());
        assert_eq!(map.get_once("flash"), Some("hello".to_string()));
        assert_eq!(map.get_once("flash"), None);
    }

    #[test]
    fn test_remove_if() {
        let map = CcMap::new();
        map.set("a", 1);
        map.set("b", 2);

        assert_eq!(map.remove_if("a", |v| *v > 1), None);
        assert_eq!(map.get("a"), Some(1));
        assert_eq!(map.remove_if("b", |v| *v > 1), Some(2));
        assert!(!map.contains("b"));
        assert_eq!(map.remove_if("missing", |_| true), None);
    }

    #[test]
    fn test_mget_mset() {
        let map = CcMap::new();
        map.mset(vec![("a".to_string(), 1), ("b".to_string(), 2)]);

        let got = map.mget(["a", "b", "c"]);
        assert_eq!(got.len(), 3);
        assert_eq!(got["a"], Some(1));
        assert_eq!(got["b"], Some(2));
        assert_eq!(got["c"], None);
    }

    #[test]
    fn test_whole_map_operations() {
        let map = CcMap::with_shards(4);
        for i in 0..100 {
            map.set(format!("key-{i}"), i);
        }
        assert_eq!(map.count(), 100);
        assert_eq!(map.keys().len(), 100);
        assert_eq!(map.get_all().get("key-42"), Some(&42));

        let removed = map.retain(|_, v| v % 2 == 0);
        assert_eq!(removed, 50);
        assert_eq!(map.count(), 50);

        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_zero_shards_clamped() {
        let map = CcMap::with_shards(0);
        assert_eq!(map.shard_count(), 1);
        map.set("x", 1);
        assert_eq!(map.get("x"), Some(1));
    }

    #[test]
    fn test_concurrent_disjoint_set_delete() {
        let map = Arc::new(CcMap::new());
        let mut handles = vec![];

        // Each thread inserts 200 keys of its own and deletes the odd ones.
        for t in 0..16 {
            let map = Arc::clone(&map);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    map.set(format!("t{t}-{i}"), (t, i));
                }
                for i in (1..200).step_by(2) {
                    map.delete(&format!("t{t}-{i}"));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.count(), 16 * 100);
        for t in 0..16 {
            assert_eq!(map.get(&format!("t{t}-0")), Some((t, 0)));
            assert_eq!(map.get(&format!("t{t}-1")), None);
        }
    }

    #[test]
    fn test_no_torn_writes() {
        let map = Arc::new(CcMap::new());
        map.set("shared", vec![0u8; 64]);

        let writers: Vec<_> = (0..8u8)
            .map(|n| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for _ in 0..500 {
                        map.set("shared", vec![n; 64]);
                    }
                })
            })
            .collect();

        for _ in 0..2000 {
            let value = map.get("shared").unwrap();
            assert!(value.iter().all(|b| *b == value[0]), "torn write observed");
        }

        for writer in writers {
            writer.join().unwrap();
        }
    }
}
