//! DataLoader utilities for batch loading
//!
//! Single-record lookups (`document(id: ...)`) skip pagination entirely and go
//! through a [`DataLoader`], which caches what it has seen for the lifetime of
//! one request. Only [`DataLoader::load_many`] batches; concurrent `load` calls
//! are not coalesced and each uncached key costs its own round trip.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{RecordStore, StoreError};
use crate::value::Document;

/// Batch loader trait for loading multiple items at once
#[async_trait]
pub trait BatchLoader<K, V>: Send + Sync
where
    K: Send + Sync + Clone + Eq + Hash,
    V: Send + Sync + Clone,
{
    /// Load every key in one round trip. Missing keys are simply absent.
    async fn load_batch(&self, keys: &[K]) -> Result<HashMap<K, V>, StoreError>;
}

/// DataLoader with caching and batching
pub struct DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
    L: BatchLoader<K, V> + 'static,
{
    loader: Arc<L>,
    cache: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V, L> DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
    L: BatchLoader<K, V> + 'static,
{
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Load a single item by key, one batch of one on a cache miss
    pub async fn load(&self, key: K) -> Result<Option<V>, StoreError> {
        let mut found = self.load_many(vec![key.clone()]).await?;
        Ok(found.remove(&key))
    }

    /// Load several items, fetching only the keys not already cached
    pub async fn load_many(&self, keys: Vec<K>) -> Result<HashMap<K, V>, StoreError> {
        let mut result = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();

        {
            let cache = self.cache.lock().await;
            for key in keys {
                match cache.get(&key) {
                    Some(value) => {
                        result.insert(key, value.clone());
                    }
                    None if !missing.contains(&key) => missing.push(key),
                    None => {}
                }
            }
        }

        if missing.is_empty() {
            return Ok(result);
        }

        let loaded = self.loader.load_batch(&missing).await?;
        let mut cache = self.cache.lock().await;
        for (key, value) in loaded {
            cache.insert(key.clone(), value.clone());
            result.insert(key, value);
        }
        Ok(result)
    }

    /// Drop a cached entry so the next load refetches it
    pub async fn forget(&self, key: &K) {
        self.cache.lock().await.remove(key);
    }

    /// Seed the cache with a value already in hand
    pub async fn prime(&self, key: K, value: V) {
        self.cache.lock().await.insert(key, value);
    }
}

impl<K, V, L> Clone for DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
    L: BatchLoader<K, V> + 'static,
{
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// Loads live records from a collection by id
#[derive(Clone)]
pub struct RecordLoader {
    store: Arc<dyn RecordStore>,
}

impl RecordLoader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchLoader<Uuid, Document> for RecordLoader {
    async fn load_batch(&self, keys: &[Uuid]) -> Result<HashMap<Uuid, Document>, StoreError> {
        tracing::debug!(collection = self.store.name(), keys = keys.len(), "batch loading records");
        self.store.find_many_by_ids(keys).await
    }
}

/// Per-request loader over one collection
pub type RecordDataLoader = DataLoader<Uuid, Document, RecordLoader>;
