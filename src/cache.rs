//! Side cache of serialized `/register` responses.
//!
//! Entries are never authoritative: a hit is served verbatim, a failed lookup
//! counts as a miss, and eviction is the only freshness policy.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn lookup(&self, cache_key: &str) -> Result<Option<CachedResponse>, CacheError>;

    async fn put(&self, cache_key: String, response: CachedResponse) -> Result<(), CacheError>;

    async fn delete(&self, cache_key: &str) -> Result<(), CacheError>;
}

/// Canonical signature of a register request. Built from the values as they
/// appear, without normalization.
pub fn cache_key(origin: &str, key: &str, token: &str) -> String {
    format!("{}/register?key={}&devicetoken={}", origin, key, token)
}

#[derive(Clone)]
pub struct MokaResponseCache {
    cache: Cache<String, CachedResponse>,
}

impl MokaResponseCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl ResponseCache for MokaResponseCache {
    async fn lookup(&self, cache_key: &str) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self.cache.get(cache_key).await)
    }

    async fn put(&self, cache_key: String, response: CachedResponse) -> Result<(), CacheError> {
        self.cache.insert(cache_key, response).await;
        Ok(())
    }

    async fn delete(&self, cache_key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(cache_key).await;
        Ok(())
    }
}
