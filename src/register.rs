use std::sync::Arc;

use log::{debug, warn};

use crate::{
    cache::{cache_key, CachedResponse, ResponseCache},
    keygen::KeyGenerator,
    resolver::{resolve, Resolution},
    scheme::{ApiResponse, RegisterData},
    store::{RegistrationStore, StoreError},
    validate::{validate, ValidationError},
    writer::CacheWriter,
};

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Collaborators of the registration flow.
pub struct RegisterContext {
    pub store: Arc<dyn RegistrationStore>,
    pub cache: Arc<dyn ResponseCache>,
    pub keys: Arc<dyn KeyGenerator>,
    pub writer: CacheWriter,
}

impl RegisterContext {
    /// Must be called inside a tokio runtime; spawns the cache writer.
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        cache: Arc<dyn ResponseCache>,
        keys: Arc<dyn KeyGenerator>,
    ) -> Self {
        let writer = CacheWriter::spawn(cache.clone());
        Self {
            store,
            cache,
            keys,
            writer,
        }
    }
}

#[derive(Debug)]
pub struct RegisterOutcome {
    pub response: CachedResponse,
    /// `None` when the response came from the cache.
    pub resolution: Option<Resolution>,
}

pub async fn register(
    ctx: &RegisterContext,
    origin: &str,
    key: Option<&str>,
    token: Option<&str>,
) -> Result<RegisterOutcome, RegisterError> {
    let request = validate(key, token)?;

    let lookup = cache_key(origin, request.key, request.token.as_str());
    match ctx.cache.lookup(&lookup).await {
        Ok(Some(response)) => {
            debug!("Cache HIT {}", lookup);
            return Ok(RegisterOutcome {
                response,
                resolution: None,
            });
        }
        Ok(None) => debug!("Cache MISS {}", lookup),
        Err(e) => warn!("Cache lookup failed for {}, treating as miss: {}", lookup, e),
    }

    let resolution = resolve(ctx, origin, request).await?;

    let body = serde_json::to_string(&ApiResponse::success(RegisterData {
        key: &resolution.key,
        device_key: &resolution.key,
        device_token: &resolution.token,
    }))?;
    let response = CachedResponse { body };

    if !resolution.is_deletion() {
        ctx.writer.submit(
            cache_key(origin, &resolution.key, &resolution.token),
            response.clone(),
        );
    }

    Ok(RegisterOutcome {
        response,
        resolution: Some(resolution),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        cache::{CacheError, MokaResponseCache},
        keygen::SequenceKeyGenerator,
        resolver::Outcome,
        store::MemoryStore,
    };

    const ORIGIN: &str = "http://localhost";

    fn context(cache: Arc<dyn ResponseCache>) -> (RegisterContext, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ctx = RegisterContext::new(
            store.clone(),
            cache,
            Arc::new(SequenceKeyGenerator::new()),
        );
        (ctx, store)
    }

    fn moka() -> Arc<MokaResponseCache> {
        Arc::new(MokaResponseCache::new(100, Duration::from_secs(60)))
    }

    struct BrokenCache;

    #[async_trait::async_trait]
    impl ResponseCache for BrokenCache {
        async fn lookup(&self, _: &str) -> Result<Option<CachedResponse>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn put(&self, _: String, _: CachedResponse) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn delete(&self, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn invalid_token_touches_nothing() {
        let (ctx, store) = context(moka());

        let err = register(&ctx, ORIGIN, Some(""), Some("nope")).await.unwrap_err();

        assert!(matches!(
            err,
            RegisterError::Validation(ValidationError::MalformedToken)
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn response_is_cached_under_resolved_key() {
        let cache = moka();
        let (ctx, _) = context(cache.clone());
        let token = "a".repeat(64);

        let first = register(&ctx, ORIGIN, Some(""), Some(token.as_str()))
            .await
            .unwrap();
        ctx.writer.flush().await;

        let key = first.resolution.unwrap().key;
        let cached = cache
            .lookup(&cache_key(ORIGIN, &key, &token))
            .await
            .unwrap();
        assert_eq!(cached, Some(first.response.clone()));

        let second = register(&ctx, ORIGIN, Some(key.as_str()), Some(token.as_str()))
            .await
            .unwrap();
        assert!(second.resolution.is_none());
        assert_eq!(second.response, first.response);
    }

    #[tokio::test]
    async fn broken_cache_fails_open() {
        let (ctx, store) = context(Arc::new(BrokenCache));
        let token = "f".repeat(64);

        let first = register(&ctx, ORIGIN, Some(""), Some(token.as_str()))
            .await
            .unwrap();
        ctx.writer.flush().await;
        let key = first.resolution.unwrap().key;

        let again = register(&ctx, ORIGIN, Some(key.as_str()), Some(token.as_str()))
            .await
            .unwrap();
        assert_eq!(again.resolution.unwrap().outcome, Outcome::Unchanged);

        let gone = register(&ctx, ORIGIN, Some(key.as_str()), Some("deleted"))
            .await
            .unwrap();
        assert_eq!(gone.resolution.unwrap().outcome, Outcome::Deleted);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deletion_is_not_cached_and_invalidates() {
        let cache = moka();
        let (ctx, _) = context(cache.clone());
        let token = "0".repeat(64);

        let created = register(&ctx, ORIGIN, Some(""), Some(token.as_str()))
            .await
            .unwrap();
        ctx.writer.flush().await;
        let key = created.resolution.unwrap().key;

        register(&ctx, ORIGIN, Some(key.as_str()), Some("deleted"))
            .await
            .unwrap();
        ctx.writer.flush().await;

        assert_eq!(cache.lookup(&cache_key(ORIGIN, &key, &token)).await.unwrap(), None);
        assert_eq!(
            cache.lookup(&cache_key(ORIGIN, &key, "deleted")).await.unwrap(),
            None
        );

        let again = register(&ctx, ORIGIN, Some(key.as_str()), Some(token.as_str()))
            .await
            .unwrap();
        assert!(again.resolution.is_some(), "expected a cache miss");
    }
}
