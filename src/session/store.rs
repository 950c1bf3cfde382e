//! Per-session record and its reuse pool.

use std::sync::{Mutex, RwLock};

use super::config::Expiration;
use crate::value::{Dict, Value};

/// Maps that grew beyond this many slots are dropped on reset instead of
/// being kept around by the pool.
const MAX_RETAINED_CAPACITY: usize = 64;

/// Mutable state of one session for the duration of a request.
///
/// A store is owned by exactly one in-flight request. The manager hands it
/// out from [`super::SessionManager::get`] and takes it back in
/// [`super::SessionManager::save`].
#[derive(Debug, Default)]
pub struct Store {
    session_id: RwLock<Vec<u8>>,
    data: Dict,
    default_expiration: Expiration,
    expiration: Option<Expiration>,
    expiration_changed: bool,
}

impl Store {
    /// Create an empty store with no id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Remove `key`, returning its value.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Remove every value, keeping the id and expiration.
    pub fn flush(&mut self) {
        self.data.clear();
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Snapshot copy of every value.
    pub fn get_all(&self) -> Dict {
        self.data.clone()
    }

    /// Borrow the values without copying.
    pub fn data(&self) -> &Dict {
        &self.data
    }

    /// Copy of the session id.
    pub fn session_id(&self) -> Vec<u8> {
        self.session_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_session_id(&self, id: impl Into<Vec<u8>>) {
        *self.session_id.write().unwrap_or_else(|e| e.into_inner()) = id.into();
    }

    /// Expiration in effect: the override if one was set, else the default.
    pub fn expiration(&self) -> Expiration {
        self.expiration.unwrap_or(self.default_expiration)
    }

    /// Override the expiration of this session.
    ///
    /// The override is persisted with the session and the cookie is
    /// reissued on the next save.
    pub fn set_expiration(&mut self, expiration: Expiration) {
        self.expiration = Some(expiration);
        self.expiration_changed = true;
    }

    pub fn has_expiration_changed(&self) -> bool {
        self.expiration_changed
    }

    /// Clear identity, values and expiration state.
    pub fn reset(&mut self) {
        self.session_id
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        if self.data.capacity() > MAX_RETAINED_CAPACITY {
            self.data = Dict::new();
        } else {
            self.data.clear();
        }
        self.default_expiration = Expiration::default();
        self.expiration = None;
        self.expiration_changed = false;
    }

    pub(crate) fn set_default_expiration(&mut self, expiration: Expiration) {
        self.default_expiration = expiration;
    }

    /// Override restored from storage; does not count as a change.
    pub(crate) fn restore_expiration(&mut self, expiration: Expiration) {
        self.expiration = Some(expiration);
    }

    pub(crate) fn expiration_override(&self) -> Option<Expiration> {
        self.expiration
    }

    pub(crate) fn load(&mut self, data: Dict) {
        self.data = data;
    }

    pub(crate) fn data_mut(&mut self) -> &mut Dict {
        &mut self.data
    }
}

/// Free list of idle stores.
///
/// Stores are reset when they come back and again before they go out, so
/// nothing from a previous session can leak into the next one.
#[derive(Debug)]
pub struct StorePool {
    free: Mutex<Vec<Store>>,
    max_idle: usize,
}

impl StorePool {
    /// Create a pool keeping at most `max_idle` stores.
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Take a clean store, reusing an idle one when available.
    pub fn acquire(&self) -> Store {
        let reused = self.free.lock().unwrap_or_else(|e| e.into_inner()).pop();
        match reused {
            Some(mut store) => {
                store.reset();
                store
            }
            None => Store::new(),
        }
    }

    /// Return a store for reuse.
    pub fn release(&self, mut store: Store) {
        store.reset();
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < self.max_idle {
            free.push(store);
        }
    }

    /// Number of idle stores.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|f| f.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_set_get_delete() {
        let mut store = Store::new();
        store.set("foo", "bar");

        assert!(store.has("foo"));
        assert_eq!(store.get("foo"), Some(&Value::from("bar")));

        assert_eq!(store.delete("foo"), Some(Value::from("bar")));
        assert_eq!(store.get("foo"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_last_value() {
        let mut store = Store::new();
        store.set("x", 1);
        store.set("x", 2);

        assert_eq!(store.get("x"), Some(&Value::Int(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let store = Store::new();
        assert!(store.get("missing").is_none());
        assert!(!store.has("missing"));
    }

    #[test]
    fn test_flush_keeps_identity() {
        let mut store = Store::new();
        store.set_session_id(b"abc".to_vec());
        store.set("a", 1);
        store.set("b", true);

        store.flush();
        assert!(store.is_empty());
        assert_eq!(store.session_id(), b"abc".to_vec());
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let mut store = Store::new();
        store.set("a", 1);

        let mut snapshot = store.get_all();
        snapshot.insert("b".into(), Value::Int(2));
        assert!(!store.has("b"));

        let mut keys: Vec<_> = store.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["a"]);
    }

    #[test]
    fn test_expiration_override() {
        let mut store = Store::new();
        store.set_default_expiration(Expiration::Never);
        assert_eq!(store.expiration(), Expiration::Never);
        assert!(!store.has_expiration_changed());

        let short = Expiration::After(Duration::from_secs(5));
        store.set_expiration(short);
        assert_eq!(store.expiration(), short);
        assert!(store.has_expiration_changed());
    }

    #[test]
    fn test_restored_expiration_is_not_a_change() {
        let mut store = Store::new();
        store.restore_expiration(Expiration::Browser);
        assert_eq!(store.expiration(), Expiration::Browser);
        assert!(!store.has_expiration_changed());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = Store::new();
        store.set_session_id(b"abc".to_vec());
        store.set("a", 1);
        store.set_expiration(Expiration::Never);

        store.reset();
        assert!(store.session_id().is_empty());
        assert!(store.is_empty());
        assert_eq!(store.expiration(), Expiration::default());
        assert!(!store.has_expiration_changed());
    }

    #[test]
    fn test_reset_drops_oversized_map() {
        let mut store = Store::new();
        for i in 0..1000 {
            store.set(format!("k{i}"), i);
        }
        store.reset();
        assert!(store.data().capacity() <= MAX_RETAINED_CAPACITY);
    }

    #[test]
    fn test_pool_reuses_clean_stores() {
        let pool = StorePool::new(4);
        let mut store = pool.acquire();
        store.set_session_id(b"secret".to_vec());
        store.set("token", "t0p");
        pool.release(store);
        assert_eq!(pool.idle(), 1);

        let store = pool.acquire();
        assert_eq!(pool.idle(), 0);
        assert!(store.is_empty());
        assert!(store.session_id().is_empty());
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = StorePool::new(2);
        for _ in 0..5 {
            pool.release(Store::new());
        }
        assert_eq!(pool.idle(), 2);

        let empty = StorePool::new(0);
        empty.release(Store::new());
        assert_eq!(empty.idle(), 0);
    }
}
