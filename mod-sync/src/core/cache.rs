//! Keyed caches validated against filesystem state
//!
//! Entries carry the archive mtime they were computed for. There is no TTL: an entry
//! is usable exactly while the archive still has that mtime.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::ApiResult;

/// Validity predicate for a cached value
pub trait CacheValidity {
    /// `current_last_modified` is the archive mtime observed now, in whole seconds
    fn is_valid_for(&self, current_last_modified: i64) -> bool;
}

/// Bulk get / upsert store keyed by `K`
#[async_trait]
pub trait KeyedCache<K, V>: Send + Sync
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: CacheValidity + Clone + Send + Sync + 'static,
{
    /// Fetch all entries present for `keys` in one round trip
    async fn get_many(&self, keys: &[K]) -> ApiResult<HashMap<K, V>>;

    /// Insert or replace entries by key
    async fn upsert_many(&self, entries: Vec<(K, V)>) -> ApiResult<()>;

    async fn get(&self, key: &K) -> ApiResult<Option<V>> {
        let mut found = self.get_many(std::slice::from_ref(key)).await?;
        Ok(found.remove(key))
    }

    async fn upsert(&self, key: K, value: V) -> ApiResult<()> {
        self.upsert_many(vec![(key, value)]).await
    }
}

/// Process-local cache, used when no database is attached and in tests
pub struct MemoryCache<K, V> {
    entries: DashMap<K, V>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> KeyedCache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: CacheValidity + Clone + Send + Sync + 'static,
{
    async fn get_many(&self, keys: &[K]) -> ApiResult<HashMap<K, V>> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .map(|entry| (key.clone(), entry.value().clone()))
            })
            .collect())
    }

    async fn upsert_many(&self, entries: Vec<(K, V)>) -> ApiResult<()> {
        for (key, value) in entries {
            self.entries.insert(key, value);
        }
        Ok(())
    }
}

/// Split entries into those usable for the current mtimes and keys needing work
pub fn partition_by_validity<K, V>(
    current: &[(K, i64)],
    cached: &HashMap<K, V>,
) -> (HashMap<K, V>, Vec<K>)
where
    K: Eq + Hash + Clone,
    V: CacheValidity + Clone,
{
    let mut valid = HashMap::new();
    let mut stale = Vec::new();
    for (key, last_modified) in current {
        match cached.get(key) {
            Some(entry) if entry.is_valid_for(*last_modified) => {
                valid.insert(key.clone(), entry.clone());
            }
            _ => stale.push(key.clone()),
        }
    }
    (valid, stale)
}
