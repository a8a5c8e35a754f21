//! Persistent slots: in-memory state mirrored into a durable store
//!
//! A slot loads once when bound (falling back to its default on any read or
//! parse problem) and writes through on every update. Write failures leave the
//! in-memory value authoritative and are reported as a `PersistOutcome`.

use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

use super::sqlite::SqliteStore;
use super::store::{DurableStore, NoopStore};
use crate::config::StateConfig;
use crate::error::StorageError;

/// Where a slot's initial value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOrigin {
    /// Parsed from the durable store
    Durable,
    /// No stored value, or storage unavailable
    Default,
    /// A stored value existed but could not be parsed as the slot's type
    Recovered,
}

/// Result of writing a slot through to durable storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    Failed(StorageError),
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistOutcome::Persisted)
    }
}

/// Binds named slots to a durable store under an application prefix.
#[derive(Clone)]
pub struct StateSync {
    store: Arc<dyn DurableStore>,
    prefix: String,
}

impl StateSync {
    pub fn new(store: Arc<dyn DurableStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Open the configured SQLite store, degrading to in-memory state if it
    /// cannot be opened.
    pub fn open(config: &StateConfig) -> Self {
        let store: Arc<dyn DurableStore> = match config
            .resolve_path()
            .map_err(|e| StorageError::Backend(e.to_string()))
            .and_then(|path| SqliteStore::open_at(&path, config.quota_bytes))
        {
            Ok(store) => Arc::new(store),
            Err(e) => {
                log::warn!("Durable state unavailable, changes will not persist: {}", e);
                Arc::new(NoopStore)
            }
        };
        Self::new(store, config.prefix.clone())
    }

    /// Full storage key for a slot
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Bind a slot, reading through to the store with `default` as fallback
    pub fn bind<T>(&self, key: &str, default: T) -> PersistentSlot<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let storage_key = self.storage_key(key);

        let (value, origin) = match self.store.get(&storage_key) {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => (value, LoadOrigin::Durable),
                Err(e) => {
                    log::debug!("Ignoring unreadable value for {}: {}", storage_key, e);
                    (default, LoadOrigin::Recovered)
                }
            },
            Ok(None) => (default, LoadOrigin::Default),
            Err(e) => {
                log::debug!("Could not read {}: {}", storage_key, e);
                (default, LoadOrigin::Default)
            }
        };

        PersistentSlot {
            key: storage_key,
            value,
            origin,
            store: Arc::clone(&self.store),
        }
    }

    /// Slot keys (without prefix) currently in the store
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}:", self.prefix);
        Ok(self
            .store
            .keys(&prefix)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect())
    }

    /// Raw stored text for a slot, for inspection
    pub fn raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(&self.storage_key(key))
    }

    /// Drop a slot's durable entry
    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.store.remove(&self.storage_key(key))
    }
}

/// A value of type `T` kept in step with one durable storage key.
///
/// Two slots bound to the same key do not observe each other's writes until
/// rebound.
pub struct PersistentSlot<T> {
    key: String,
    value: T,
    origin: LoadOrigin,
    store: Arc<dyn DurableStore>,
}

impl<T> PersistentSlot<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Current in-memory value
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Consume the slot, keeping its value
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn origin(&self) -> LoadOrigin {
        self.origin
    }

    /// Replace the value and write it through
    pub fn set(&mut self, next: T) -> PersistOutcome {
        self.value = next;
        self.persist()
    }

    /// Derive the next value from the current one and write it through
    pub fn update<F>(&mut self, f: F) -> PersistOutcome
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value);
        self.set(next)
    }

    fn persist(&self) -> PersistOutcome {
        let result = serde_json::to_string(&self.value)
            .map_err(|e| StorageError::Serialize {
                key: self.key.clone(),
                message: e.to_string(),
            })
            .and_then(|json| self.store.set(&self.key, &json));

        match result {
            Ok(()) => PersistOutcome::Persisted,
            Err(StorageError::Unavailable) => {
                log::debug!("Storage unavailable, {} kept in memory only", self.key);
                PersistOutcome::Failed(StorageError::Unavailable)
            }
            Err(e) => {
                log::warn!("Failed to persist {}: {}", self.key, e);
                PersistOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::store::MemoryStore;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct BrandConfig {
        primary_color: String,
        border_radius: String,
        density: String,
    }

    fn default_brand() -> BrandConfig {
        BrandConfig {
            primary_color: "indigo".to_string(),
            border_radius: "rounded-2xl".to_string(),
            density: "comfortable".to_string(),
        }
    }

    fn sync_over(store: Arc<MemoryStore>) -> StateSync {
        StateSync::new(store, "dashlib")
    }

    #[test]
    fn test_favorites_survive_restart() {
        let store = Arc::new(MemoryStore::new());

        let mut favorites = sync_over(Arc::clone(&store)).bind("favorites", Vec::<String>::new());
        assert_eq!(favorites.origin(), LoadOrigin::Default);
        assert!(favorites.set(vec!["tmpl-1".to_string()]).is_persisted());

        // Fresh binder over the same store stands in for a restart
        let reloaded = sync_over(store).bind("favorites", Vec::<String>::new());
        assert_eq!(reloaded.get(), &vec!["tmpl-1".to_string()]);
        assert_eq!(reloaded.origin(), LoadOrigin::Durable);
    }

    #[test]
    fn test_corrupt_brand_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        store.seed("dashlib:brand", "{not json");

        let brand = sync_over(store).bind("brand", default_brand());
        assert_eq!(brand.get(), &default_brand());
        assert_eq!(brand.origin(), LoadOrigin::Recovered);
    }

    #[test]
    fn test_schema_mismatch_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        store.seed("dashlib:brand", "[1, 2, 3]");

        let brand = sync_over(store).bind("brand", default_brand());
        assert_eq!(brand.get(), &default_brand());
        assert_eq!(brand.origin(), LoadOrigin::Recovered);
    }

    #[test]
    fn test_corrupt_entry_overwritten_on_next_write() {
        let store = Arc::new(MemoryStore::new());
        store.seed("dashlib:brand", "{not json");

        let mut brand = sync_over(Arc::clone(&store)).bind("brand", default_brand());
        let mut compact = default_brand();
        compact.density = "compact".to_string();
        assert!(brand.set(compact.clone()).is_persisted());

        let reloaded = sync_over(store).bind("brand", default_brand());
        assert_eq!(reloaded.get(), &compact);
    }

    #[test]
    fn test_setting_same_value_twice_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let sync = sync_over(Arc::clone(&store));

        let mut slot = sync.bind("filter", "All".to_string());
        slot.set("AI/LLM Operations".to_string());
        let once = store.get("dashlib:filter").unwrap();
        slot.set("AI/LLM Operations".to_string());
        let twice = store.get("dashlib:filter").unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.keys("dashlib:").unwrap().len(), 1);
    }

    #[test]
    fn test_update_uses_previous_value() {
        let store = Arc::new(MemoryStore::new());
        let mut favorites = sync_over(Arc::clone(&store)).bind("favorites", vec!["a".to_string()]);

        favorites.update(|prev| {
            let mut next = prev.clone();
            next.push("b".to_string());
            next
        });

        assert_eq!(favorites.get(), &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            store.get("dashlib:favorites").unwrap(),
            Some("[\"a\",\"b\"]".to_string())
        );
    }

    #[test]
    fn test_last_write_matches_memory() {
        let store = Arc::new(MemoryStore::new());
        let mut count = sync_over(Arc::clone(&store)).bind("count", 0u32);

        for _ in 0..25 {
            count.update(|n| n + 1);
        }

        assert_eq!(*count.get(), 25);
        assert_eq!(store.get("dashlib:count").unwrap(), Some("25".to_string()));
    }

    #[test]
    fn test_unavailable_storage_degrades_to_memory() {
        let sync = StateSync::new(Arc::new(NoopStore), "dashlib");

        let mut slot = sync.bind("favorites", Vec::<String>::new());
        assert_eq!(slot.origin(), LoadOrigin::Default);

        let outcome = slot.set(vec!["tmpl-9".to_string()]);
        assert_eq!(outcome, PersistOutcome::Failed(StorageError::Unavailable));
        assert_eq!(slot.get(), &vec!["tmpl-9".to_string()]);
    }

    #[test]
    fn test_quota_failure_keeps_memory_value() {
        let store = Arc::new(MemoryStore::new().with_quota(32));
        let mut draft = sync_over(Arc::clone(&store)).bind("draft", String::new());

        let outcome = draft.set("x".repeat(200));
        assert!(matches!(
            outcome,
            PersistOutcome::Failed(StorageError::QuotaExceeded { .. })
        ));
        assert_eq!(draft.get().len(), 200);
        assert_eq!(store.get("dashlib:draft").unwrap(), None);
    }

    #[test]
    fn test_non_string_map_keys_fail_serialization() {
        let store = Arc::new(MemoryStore::new());
        let mut slot = sync_over(store).bind("weird", HashMap::<(u8, u8), u8>::new());

        let mut next = HashMap::new();
        next.insert((1, 2), 3);
        let outcome = slot.set(next);

        assert!(matches!(
            outcome,
            PersistOutcome::Failed(StorageError::Serialize { .. })
        ));
        assert_eq!(slot.get().len(), 1);
    }

    #[test]
    fn test_independent_slots_do_not_observe_each_other() {
        let store = Arc::new(MemoryStore::new());
        let sync = sync_over(store);

        let mut first = sync.bind("filter", "All".to_string());
        let second = sync.bind("filter", "All".to_string());
        first.set("Team & Operations".to_string());

        assert_eq!(second.get(), "All");
        assert_eq!(sync.bind("filter", "All".to_string()).get(), "Team & Operations");
    }

    #[test]
    fn test_keys_are_namespaced() {
        let store = Arc::new(MemoryStore::new());
        store.seed("elsewhere:favorites", "[]");
        let sync = sync_over(Arc::clone(&store));

        let mut slot = sync.bind("favorites", Vec::<String>::new());
        slot.set(vec![]);

        assert_eq!(slot.key(), "dashlib:favorites");
        assert_eq!(sync.keys().unwrap(), vec!["favorites".to_string()]);
        assert!(sync.remove("favorites").unwrap());
        assert!(sync.keys().unwrap().is_empty());
    }
}
