//! Caching layer for fetched records to reduce API calls

use crate::model::{FetchRequest, Record, SourceKind};
use cached::{Cached, TimedCache};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key: one source answering one request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: SourceKind,
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub limit: Option<usize>,
}

impl CacheKey {
    pub fn new(source: SourceKind, request: &FetchRequest) -> Self {
        Self {
            source,
            symbol: request.symbol.to_string(),
            start: request.range.start,
            end: request.range.end,
            limit: request.limit,
        }
    }
}

/// Thread-safe TTL cache of fetched records
#[derive(Clone)]
pub struct RecordCache {
    cache: Arc<RwLock<TimedCache<CacheKey, Vec<Record>>>>,
}

impl RecordCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<Record>> {
        // TimedCache evicts expired entries on read, so reads need the write lock
        let mut cache = self.cache.write().await;
        let hit = cache.cache_get(key).cloned();
        if hit.is_some() {
            tracing::debug!(source = %key.source, symbol = %key.symbol, "cache hit");
        } else {
            tracing::debug!(source = %key.source, symbol = %key.symbol, "cache miss");
        }
        hit
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, records: Vec<Record>) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, records);
    }

    /// Get or fetch a value using the provided fetcher function
    ///
    /// Only successful fetches are cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<Vec<Record>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<Record>, E>>,
    {
        if let Some(records) = self.get(&key).await {
            return Ok(records);
        }

        let records = fetcher().await?;
        self.insert(key, records.clone()).await;
        Ok(records)
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
