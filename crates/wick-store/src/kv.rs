//! Versioned key-value document store with automatic serialization.

use crate::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    bytes: Vec<u8>,
}

/// In-process JSON document store.
///
/// Every key carries a version that starts at 1 on first write and grows by
/// one on each write. Version 0 means "absent" in conditional writes.
/// Multi-key changes go through [`KvStore::transact`], which applies all
/// staged writes or none.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    /// Run `f` against a consistent view of the store. Writes staged by `f`
    /// are applied only if it returns `Ok`.
    pub fn transact<R>(
        &self,
        f: impl FnOnce(&mut Txn<'_>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut entries = self.lock()?;
        let mut txn = Txn {
            entries: &*entries,
            staged: HashMap::new(),
        };
        let result = f(&mut txn)?;
        let staged = txn.staged;
        for (key, entry) in staged {
            match entry {
                Some(entry) => {
                    entries.insert(key, entry);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        Ok(result)
    }

    /// Get a value. Returns `None` if the key doesn't exist.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.transact(|txn| txn.get(key))
    }

    /// Set a value unconditionally. Returns the new version.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<u64, StoreError> {
        self.transact(|txn| txn.put(key, value))
    }

    /// Set a value only if the stored version equals `expected`.
    pub fn compare_and_set<T: Serialize>(
        &self,
        key: &str,
        expected: u64,
        value: &T,
    ) -> Result<u64, StoreError> {
        self.transact(|txn| txn.put_if_version(key, expected, value))
    }

    /// Delete a key. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.transact(|txn| Ok(txn.delete(key)))
    }

    pub fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.contains_key(key))
    }

    /// All keys starting with `prefix`, in key order.
    pub fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.transact(|txn| Ok(txn.keys(prefix)))
    }
}

/// A set of staged reads and writes over a locked store.
pub struct Txn<'a> {
    entries: &'a BTreeMap<String, Entry>,
    staged: HashMap<String, Option<Entry>>,
}

impl Txn<'_> {
    fn entry(&self, key: &str) -> Option<&Entry> {
        match self.staged.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.entries.get(key),
        }
    }

    /// Current version of `key`, 0 when absent.
    pub fn version(&self, key: &str) -> u64 {
        self.entry(key).map(|e| e.version).unwrap_or(0)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.entry(key)
            .map(|e| serde_json::from_slice(&e.bytes))
            .transpose()
            .map_err(StoreError::from)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    /// Stage a write. Returns the version the key will have.
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<u64, StoreError> {
        let version = self.version(key) + 1;
        let bytes = serde_json::to_vec(value)?;
        self.staged
            .insert(key.to_string(), Some(Entry { version, bytes }));
        Ok(version)
    }

    /// Stage a write if the key is still at `expected`.
    pub fn put_if_version<T: Serialize>(
        &mut self,
        key: &str,
        expected: u64,
        value: &T,
    ) -> Result<u64, StoreError> {
        let actual = self.version(key);
        if actual != expected {
            return Err(StoreError::ConcurrentModification {
                key: key.to_string(),
                expected,
                actual,
            });
        }
        self.put(key, value)
    }

    /// Stage a delete. Returns whether the key existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.exists(key);
        self.staged.insert(key.to_string(), None);
        existed
    }

    /// Keys starting with `prefix`, including staged ones.
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .filter(|k| !matches!(self.staged.get(k), Some(None)))
            .collect();
        for (key, entry) in &self.staged {
            if entry.is_some() && key.starts_with(prefix) && !self.entries.contains_key(key) {
                keys.push(key.clone());
            }
        }
        keys.sort();
        keys
    }
}

/// Helper to build store keys with namespacing.
///
/// # Example
///
/// ```rust
/// use wick_store::store_key;
/// let key = store_key!("cart", "c-123");
/// assert_eq!(key, "cart:c-123");
/// ```
#[macro_export]
macro_rules! store_key {
    ($prefix:expr, $($part:expr),+) => {{
        let mut key = String::from($prefix);
        $(
            key.push(':');
            key.push_str(&$part.to_string());
        )+
        key
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_bumps_version() {
        let kv = KvStore::new();
        assert_eq!(kv.set("a", &1u32).unwrap(), 1);
        assert_eq!(kv.set("a", &2u32).unwrap(), 2);
        assert_eq!(kv.get::<u32>("a").unwrap(), Some(2));
        assert_eq!(kv.get::<u32>("missing").unwrap(), None);
    }

    #[test]
    fn test_compare_and_set() {
        let kv = KvStore::new();
        assert_eq!(kv.compare_and_set("a", 0, &"first").unwrap(), 1);
        assert!(matches!(
            kv.compare_and_set("a", 0, &"again"),
            Err(StoreError::ConcurrentModification { actual: 1, .. })
        ));
        assert_eq!(kv.compare_and_set("a", 1, &"second").unwrap(), 2);
        assert_eq!(kv.get::<String>("a").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_failed_transaction_applies_nothing() {
        let kv = KvStore::new();
        kv.set("a", &1u32).unwrap();
        let result: Result<(), StoreError> = kv.transact(|txn| {
            txn.put("b", &2u32)?;
            txn.delete("a");
            Err(StoreError::Backend("abort".into()))
        });
        assert!(result.is_err());
        assert!(kv.exists("a").unwrap());
        assert!(!kv.exists("b").unwrap());
    }

    #[test]
    fn test_keys_by_prefix_see_staged_writes() {
        let kv = KvStore::new();
        kv.set("cart:1", &1u32).unwrap();
        kv.set("cart:2", &2u32).unwrap();
        kv.set("order:1", &3u32).unwrap();

        let keys = kv
            .transact(|txn| {
                txn.delete("cart:1");
                txn.put("cart:3", &4u32)?;
                Ok(txn.keys("cart:"))
            })
            .unwrap();
        assert_eq!(keys, vec!["cart:2".to_string(), "cart:3".to_string()]);
        assert_eq!(kv.keys("cart:").unwrap().len(), 2);
    }

    #[test]
    fn test_store_key_macro() {
        assert_eq!(store_key!("order-user", "u1", 42), "order-user:u1:42");
    }
}
