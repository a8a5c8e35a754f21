//! Cache boundary: named generations of request/response entries

use chrono::{DateTime, Utc};
#[cfg(test)]
use std::collections::{BTreeMap, HashMap};
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};

use super::request::{RequestKey, Response, ResponseType};
use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Summary of one stored entry
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub key: RequestKey,
    pub status: u16,
    pub response_type: ResponseType,
    pub size_bytes: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub generations_removed: usize,
    pub entries_removed: usize,
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    pub generations: usize,
    pub total_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Storage of versioned cache generations.
///
/// Per-entry operations are atomic; `put_all` is atomic as a whole.
pub trait CacheStorage: Send + Sync {
    /// Look up `key` in `generation`
    fn match_entry(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>>;

    /// Store or supersede one entry, creating the generation if needed
    fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()>;

    /// Store every entry or none of them
    fn put_all(&self, generation: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

    /// Names of all existing generations, sorted
    fn generations(&self) -> Result<Vec<String>>;

    /// Remove a generation and its entries, returning whether it existed
    fn delete_generation(&self, generation: &str) -> Result<bool>;

    /// Entries of one generation, sorted by URL
    fn entries(&self, generation: &str) -> Result<Vec<CachedEntry>>;

    /// Generation that last completed activation, if it still exists
    fn active_generation(&self) -> Result<Option<String>>;

    /// Record `generation` as the one serving clients
    fn set_active(&self, generation: &str) -> Result<()>;

    /// Remove every generation
    fn clear_all(&self) -> Result<ClearStats> {
        let mut stats = ClearStats {
            generations_removed: 0,
            entries_removed: 0,
        };
        for name in self.generations()? {
            stats.entries_removed += self.entries(&name)?.len();
            if self.delete_generation(&name)? {
                stats.generations_removed += 1;
            }
        }
        Ok(stats)
    }

    /// Aggregate statistics across generations
    fn stats(&self) -> Result<CacheStats> {
        let names = self.generations()?;
        let mut stats = CacheStats {
            generations: names.len(),
            total_entries: 0,
            total_size_bytes: 0,
            oldest_entry: None,
            newest_entry: None,
        };
        for name in &names {
            for entry in self.entries(name)? {
                stats.total_entries += 1;
                stats.total_size_bytes += entry.size_bytes;
                stats.oldest_entry = Some(match stats.oldest_entry {
                    Some(t) => t.min(entry.fetched_at),
                    None => entry.fetched_at,
                });
                stats.newest_entry = Some(match stats.newest_entry {
                    Some(t) => t.max(entry.fetched_at),
                    None => entry.fetched_at,
                });
            }
        }
        Ok(stats)
    }
}

/// In-process cache storage
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCacheStorage {
    generations: Mutex<BTreeMap<String, HashMap<RequestKey, Response>>>,
    active: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, HashMap<RequestKey, Response>>>> {
        self.generations
            .lock()
            .map_err(|e| CacheError::Database(format!("Lock poisoned: {}", e)))
    }

    fn lock_active(&self) -> Result<MutexGuard<'_, Option<String>>> {
        self.active
            .lock()
            .map_err(|e| CacheError::Database(format!("Lock poisoned: {}", e)))
    }
}

#[cfg(test)]
impl CacheStorage for MemoryCacheStorage {
    fn match_entry(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>> {
        Ok(self
            .lock()?
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()> {
        self.lock()?
            .entry(generation.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    fn put_all(&self, generation: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
        let mut generations = self.lock()?;
        let target = generations.entry(generation.to_string()).or_default();
        for (key, response) in entries {
            target.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    fn generations(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn delete_generation(&self, generation: &str) -> Result<bool> {
        let removed = self.lock()?.remove(generation).is_some();
        let mut active = self.lock_active()?;
        if active.as_deref() == Some(generation) {
            *active = None;
        }
        Ok(removed)
    }

    fn entries(&self, generation: &str) -> Result<Vec<CachedEntry>> {
        let generations = self.lock()?;
        let mut entries: Vec<CachedEntry> = generations
            .get(generation)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, response)| CachedEntry {
                        key: key.clone(),
                        status: response.status,
                        response_type: response.response_type,
                        size_bytes: response.body.len(),
                        fetched_at: response.fetched_at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn active_generation(&self) -> Result<Option<String>> {
        Ok(self.lock_active()?.clone())
    }

    fn set_active(&self, generation: &str) -> Result<()> {
        self.lock()?.entry(generation.to_string()).or_default();
        *self.lock_active()? = Some(generation.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::request::Request;
    use url::Url;

    fn entry(path: &str, body: &str) -> (RequestKey, Response) {
        let url = Url::parse("http://localhost:3000").unwrap().join(path).unwrap();
        let key = Request::get(url.clone()).key();
        (key, Response::new(&url, 200, body, ResponseType::Basic))
    }

    #[test]
    fn test_put_and_match() {
        let storage = MemoryCacheStorage::new();
        let (key, response) = entry("/a.js", "a");
        storage.put("v1", &key, &response).unwrap();

        assert_eq!(storage.match_entry("v1", &key).unwrap(), Some(response));
        assert_eq!(storage.match_entry("v2", &key).unwrap(), None);
    }

    #[test]
    fn test_put_supersedes() {
        let storage = MemoryCacheStorage::new();
        let (key, old) = entry("/a.js", "old");
        let (_, new) = entry("/a.js", "new");
        storage.put("v1", &key, &old).unwrap();
        storage.put("v1", &key, &new).unwrap();

        let found = storage.match_entry("v1", &key).unwrap().unwrap();
        assert_eq!(found.body, b"new".to_vec());
        assert_eq!(storage.entries("v1").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_generation() {
        let storage = MemoryCacheStorage::new();
        let (key, response) = entry("/a.js", "a");
        storage.put("v1", &key, &response).unwrap();
        storage.put("v2", &key, &response).unwrap();

        assert!(storage.delete_generation("v1").unwrap());
        assert!(!storage.delete_generation("v1").unwrap());
        assert_eq!(storage.generations().unwrap(), vec!["v2".to_string()]);
    }

    #[test]
    fn test_stats_and_clear() {
        let storage = MemoryCacheStorage::new();
        let (a, ra) = entry("/a.js", "aaaa");
        let (b, rb) = entry("/b.js", "bb");
        storage.put_all("v1", &[(a.clone(), ra), (b, rb)]).unwrap();
        storage.put("v0", &a, &entry("/a.js", "x").1).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.generations, 2);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.total_size_bytes, 7);
        assert!(stats.oldest_entry.is_some());

        let cleared = storage.clear_all().unwrap();
        assert_eq!(cleared.generations_removed, 2);
        assert_eq!(cleared.entries_removed, 3);
        assert!(storage.generations().unwrap().is_empty());
    }

    #[test]
    fn test_empty_put_all_creates_generation() {
        let storage = MemoryCacheStorage::new();
        storage.put_all("v1", &[]).unwrap();

        assert_eq!(storage.generations().unwrap(), vec!["v1".to_string()]);
        assert!(storage.entries("v1").unwrap().is_empty());
    }

    #[test]
    fn test_active_marker_follows_generation() {
        let storage = MemoryCacheStorage::new();
        let (key, response) = entry("/a.js", "a");
        storage.put("v1", &key, &response).unwrap();
        assert_eq!(storage.active_generation().unwrap(), None);

        storage.set_active("v1").unwrap();
        assert_eq!(storage.active_generation().unwrap(), Some("v1".to_string()));

        storage.delete_generation("v1").unwrap();
        assert_eq!(storage.active_generation().unwrap(), None);
    }
}
