//! Durable key-value storage boundary

#[cfg(test)]
use std::collections::BTreeMap;
#[cfg(test)]
use std::sync::Mutex;

use crate::error::StorageError;

type Result<T> = std::result::Result<T, StorageError>;

/// Trait for durable per-origin key-value storage.
///
/// Values are opaque strings; slots store JSON in them.
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the entry under `key`, returning whether one existed
    fn remove(&self, key: &str) -> Result<bool>;

    /// List keys starting with `prefix`, sorted
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Storage that is never available (disabled or private-mode storage).
/// Slots bound over it behave as plain in-memory state.
pub struct NoopStore;

impl DurableStore for NoopStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(StorageError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(StorageError::Unavailable)
    }

    fn remove(&self, _key: &str) -> Result<bool> {
        Err(StorageError::Unavailable)
    }

    fn keys(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(StorageError::Unavailable)
    }
}

/// In-process store with an optional byte quota.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total bytes of keys plus values
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Pre-seed a raw value, bypassing serialization and quota
    pub fn seed(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StorageError::Backend(format!("Lock poisoned: {}", e)))
    }
}

#[cfg(test)]
impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;

        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_set_get() {
        let store = MemoryStore::new();
        store.set("dashlib:favorites", "[\"tmpl-1\"]").unwrap();

        assert_eq!(
            store.get("dashlib:favorites").unwrap(),
            Some("[\"tmpl-1\"]".to_string())
        );
        assert_eq!(store.get("dashlib:missing").unwrap(), None);
    }

    #[test]
    fn test_memory_last_write_wins() {
        let store = MemoryStore::new();
        store.set("k", "1").unwrap();
        store.set("k", "2").unwrap();

        assert_eq!(store.get("k").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_memory_quota_rejects_oversized_write() {
        let store = MemoryStore::new().with_quota(10);
        store.set("a", "1234").unwrap();

        let err = store.set("b", "123456789").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 10, .. }));
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn test_memory_quota_counts_replacement_once() {
        let store = MemoryStore::new().with_quota(6);
        store.set("k", "12345").unwrap();

        // Replacing the value must not count the old one
        store.set("k", "54321").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("54321".to_string()));
    }

    #[test]
    fn test_memory_keys_by_prefix() {
        let store = MemoryStore::new();
        store.set("dashlib:b", "1").unwrap();
        store.set("dashlib:a", "1").unwrap();
        store.set("other:c", "1").unwrap();

        assert_eq!(
            store.keys("dashlib:").unwrap(),
            vec!["dashlib:a".to_string(), "dashlib:b".to_string()]
        );
    }

    #[test]
    fn test_memory_remove() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();

        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
    }

    #[test]
    fn test_noop_is_unavailable() {
        let store = NoopStore;
        assert_eq!(store.get("k"), Err(StorageError::Unavailable));
        assert_eq!(store.set("k", "v"), Err(StorageError::Unavailable));
    }
}
