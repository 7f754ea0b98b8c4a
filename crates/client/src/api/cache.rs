//! Deduplicating, tag-invalidated query cache.
//!
//! Query results are cached as raw JSON keyed by resource tag, endpoint and
//! serialized arguments. Concurrent loads of one key share a single
//! in-flight request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Resource type a cached query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Products,
    Categories,
    Cart,
    Orders,
    User,
}

/// Content-addressed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Invalidation group.
    pub tag: Tag,
    /// Logical endpoint name (e.g., `"products"`).
    pub endpoint: &'static str,
    /// Serialized query arguments.
    pub args: String,
}

impl QueryKey {
    /// Build a key from any serializable argument value.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if the arguments cannot be serialized.
    pub fn new(tag: Tag, endpoint: &'static str, args: &impl Serialize) -> Result<Self, ApiError> {
        Ok(Self {
            tag,
            endpoint,
            args: serde_json::to_string(args)?,
        })
    }
}

/// Query result cache shared by every clone of the API client.
#[derive(Clone)]
pub struct QueryCache {
    entries: Cache<QueryKey, Arc<Value>>,
}

impl QueryCache {
    /// Create a cache with the given capacity and time-to-live.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        Self { entries }
    }

    /// Return the cached value for `key`, or run `load` to fill it.
    ///
    /// Callers racing on the same key await one shared `load`. A failed load
    /// is not cached; every waiter receives the same error.
    ///
    /// # Errors
    ///
    /// Returns the load error, or `ApiError::Parse` if the cached JSON does
    /// not match `T`.
    pub async fn get_or_load<T, Fut>(&self, key: QueryKey, load: Fut) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Fut: Future<Output = Result<Value, ApiError>>,
    {
        let endpoint = key.endpoint;
        let value = self
            .entries
            .try_get_with(key, async move {
                debug!(endpoint, "Cache miss");
                load.await.map(Arc::new)
            })
            .await?;
        Ok(T::deserialize(value.as_ref())?)
    }

    /// Drop every entry of one resource type.
    pub fn invalidate(&self, tag: Tag) {
        debug!(?tag, "Invalidating cached queries");
        if let Err(e) = self.entries.invalidate_entries_if(move |key, _| key.tag == tag) {
            warn!(error = %e, ?tag, "Tag invalidation failed, clearing cache");
            self.entries.invalidate_all();
        }
    }

    /// Drop every entry of several resource types.
    pub fn invalidate_many(&self, tags: &[Tag]) {
        for tag in tags {
            self.invalidate(*tag);
        }
    }

    /// Drop everything.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn cache() -> QueryCache {
        QueryCache::new(100, Duration::from_secs(60))
    }

    fn key(tag: Tag, args: &str) -> QueryKey {
        QueryKey::new(tag, "test", &args).unwrap()
    }

    #[tokio::test]
    async fn test_identical_keys_share_one_load() {
        let cache = cache();
        let loads = Arc::new(AtomicUsize::new(0));

        let load = |loads: Arc<AtomicUsize>| async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, ApiError>(json!({"n": 1}))
        };

        let (a, b) = tokio::join!(
            cache.get_or_load::<Value, _>(key(Tag::Products, "page=1"), load(Arc::clone(&loads))),
            cache.get_or_load::<Value, _>(key(Tag::Products, "page=1"), load(Arc::clone(&loads))),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_tag_only_drops_that_tag() {
        let cache = cache();
        let loads = Arc::new(AtomicUsize::new(0));
        let load = |loads: Arc<AtomicUsize>| async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(json!(true))
        };

        let _: bool = cache
            .get_or_load(key(Tag::Cart, "cart"), load(Arc::clone(&loads)))
            .await
            .unwrap();
        let _: bool = cache
            .get_or_load(key(Tag::Orders, "orders"), load(Arc::clone(&loads)))
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        cache.invalidate(Tag::Cart);

        let _: bool = cache
            .get_or_load(key(Tag::Cart, "cart"), load(Arc::clone(&loads)))
            .await
            .unwrap();
        let _: bool = cache
            .get_or_load(key(Tag::Orders, "orders"), load(Arc::clone(&loads)))
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = cache();
        let first: Result<Value, _> = cache
            .get_or_load(key(Tag::User, "me"), async {
                Err(ApiError::NotFound("me".to_string()))
            })
            .await;
        assert!(matches!(first, Err(ApiError::Shared(_))));

        let second: Value = cache
            .get_or_load(key(Tag::User, "me"), async { Ok(json!("ok")) })
            .await
            .unwrap();
        assert_eq!(second, json!("ok"));
    }
}
