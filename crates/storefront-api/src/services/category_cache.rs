//! Cache-aside layer for category reads.
//!
//! Reads try the cache first and fall through to the store on any miss,
//! error or timeout. Writes populate the cache after a store read. Mutations
//! invalidate by key prefix: every variant of each affected category plus
//! every list and search aggregate.
//!
//! ## Key schema
//!
//! ```text
//! {p}category:{id}:{all|active}:{locale}
//! {p}categories:all:{variant}:{locale}
//! {p}categories:roots:{variant}:{locale}
//! {p}categories:children:all:{variant}:{locale}
//! {p}categories:children:{parent_id}:{variant}:{locale}
//! {p}categories:search:{scope}:{hash16}:{locale}
//! ```
//!
//! The cache is advisory. A failed invalidation leaves entries that expire
//! with their TTL; it never fails the mutation that triggered it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use storefront_core::{ActiveFilter, CacheBackend, CategoryQuery, Locale};

use crate::config::CacheConfig;

/// Listing families cached under the aggregate namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    All,
    Roots,
    AllChildren,
    ChildrenOf(Uuid),
}

impl ListKind {
    fn segment(&self) -> String {
        match self {
            ListKind::All => "all".to_string(),
            ListKind::Roots => "roots".to_string(),
            ListKind::AllChildren => "children:all".to_string(),
            ListKind::ChildrenOf(pid) => format!("children:{}", pid),
        }
    }
}

/// Cache-aside helper shared by the hierarchy engine and the category service.
#[derive(Clone)]
pub struct CategoryCache {
    inner: Arc<CategoryCacheInner>,
}

struct CategoryCacheInner {
    /// None when caching is switched off entirely.
    backend: Option<Arc<dyn CacheBackend>>,
    config: CacheConfig,
}

impl CategoryCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CategoryCacheInner {
                backend: Some(backend),
                config,
            }),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(CategoryCacheInner {
                backend: None,
                config: CacheConfig {
                    enabled: false,
                    ..CacheConfig::default()
                },
            }),
        }
    }

    pub fn entity_ttl(&self) -> Duration {
        self.inner.config.entity_ttl
    }

    pub fn list_ttl(&self) -> Duration {
        self.inner.config.list_ttl
    }

    fn prefix(&self) -> &str {
        &self.inner.config.prefix
    }

    // ─── Keys ──────────────────────────────────────────────────────────────

    /// Key for a single-category lookup.
    pub fn entity_key(&self, id: Uuid, include_inactive: bool, locale: Locale) -> String {
        format!(
            "{}category:{}:{}:{}",
            self.prefix(),
            id,
            ActiveFilter::from_include_inactive(include_inactive).cache_tag(),
            locale
        )
    }

    /// Key for an unpaginated listing.
    pub fn list_key(&self, kind: ListKind, include_inactive: bool, locale: Locale) -> String {
        format!(
            "{}categories:{}:{}:{}",
            self.prefix(),
            kind.segment(),
            ActiveFilter::from_include_inactive(include_inactive).cache_tag(),
            locale
        )
    }

    /// Key for a search page.
    pub fn search_key(&self, query: &CategoryQuery, locale: Locale) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.signature().as_bytes());
        let hash = hex::encode(hasher.finalize());
        format!(
            "{}categories:search:{}:{}:{}",
            self.prefix(),
            query.scope.cache_tag(),
            &hash[..16], // first 16 hex chars
            locale
        )
    }

    /// Prefix covering every variant of one category.
    pub fn entity_prefix(&self, id: Uuid) -> String {
        format!("{}category:{}:", self.prefix(), id)
    }

    /// Prefix covering every list and search aggregate.
    pub fn aggregate_prefix(&self) -> String {
        format!("{}categories:", self.prefix())
    }

    // ─── Operations ────────────────────────────────────────────────────────

    /// Whether a backend is configured and currently reachable.
    pub async fn is_available(&self) -> bool {
        match self.inner.backend.as_ref() {
            Some(backend) => backend.is_available().await,
            None => false,
        }
    }

    /// Fetch and decode a cached value. Any failure is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.inner.backend.as_ref()?;

        match tokio::time::timeout(self.inner.config.op_timeout, backend.get(key)).await {
            Ok(Ok(Some(data))) => match serde_json::from_str(&data) {
                Ok(value) => {
                    debug!(subsystem = "cache", cache_key = %key, "Cache HIT");
                    Some(value)
                }
                Err(e) => {
                    warn!(
                        subsystem = "cache",
                        cache_key = %key,
                        error = %e,
                        "Cache entry undecodable, treating as miss"
                    );
                    None
                }
            },
            Ok(Ok(None)) => {
                debug!(subsystem = "cache", cache_key = %key, "Cache MISS");
                None
            }
            Ok(Err(e)) => {
                warn!(
                    subsystem = "cache",
                    cache_key = %key,
                    error_kind = e.kind(),
                    error = %e,
                    "Cache read failed, falling back to store"
                );
                None
            }
            Err(_) => {
                warn!(
                    subsystem = "cache",
                    cache_key = %key,
                    "Cache read timed out, falling back to store"
                );
                None
            }
        }
    }

    /// Store a value. Failures are logged and skipped.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = self.inner.backend.as_ref() else {
            return;
        };

        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(subsystem = "cache", cache_key = %key, error = %e, "Cache serialization failed");
                return;
            }
        };

        match tokio::time::timeout(
            self.inner.config.op_timeout,
            backend.set(key, serialized, ttl),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(
                    subsystem = "cache",
                    cache_key = %key,
                    ttl_secs = ttl.as_secs(),
                    "Cache SET"
                );
            }
            Ok(Err(e)) => {
                warn!(subsystem = "cache", cache_key = %key, error = %e, "Cache write skipped");
            }
            Err(_) => {
                warn!(subsystem = "cache", cache_key = %key, "Cache write timed out");
            }
        }
    }

    /// Invalidate every entry of the given categories and all aggregates.
    ///
    /// Returns the number of keys removed. Failures are logged and swallowed.
    pub async fn invalidate_categories(&self, ids: &[Uuid]) -> u64 {
        let Some(backend) = self.inner.backend.as_ref() else {
            return 0;
        };

        let start = Instant::now();
        let mut prefixes: Vec<String> = ids.iter().map(|id| self.entity_prefix(*id)).collect();
        prefixes.sort();
        prefixes.dedup();
        prefixes.push(self.aggregate_prefix());

        let timeout = self.inner.config.op_timeout;
        let results = join_all(prefixes.iter().map(|prefix| async move {
            (
                prefix,
                tokio::time::timeout(timeout, backend.delete_by_prefix(prefix)).await,
            )
        }))
        .await;

        let mut removed = 0;
        for (prefix, result) in results {
            match result {
                Ok(Ok(n)) => removed += n,
                Ok(Err(e)) => warn!(
                    subsystem = "cache",
                    component = "category_cache",
                    op = "invalidate",
                    cache_key = %prefix,
                    error = %e,
                    "Cache invalidation failed"
                ),
                Err(_) => warn!(
                    subsystem = "cache",
                    component = "category_cache",
                    op = "invalidate",
                    cache_key = %prefix,
                    "Cache invalidation timed out"
                ),
            }
        }

        info!(
            subsystem = "cache",
            component = "category_cache",
            op = "invalidate",
            categories = ids.len(),
            keys_removed = removed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Category cache invalidated"
        );
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::mock::MemoryCache;
    use storefront_core::SearchScope;

    fn cache_with(memory: &MemoryCache) -> CategoryCache {
        CategoryCache::new(Arc::new(memory.clone()), CacheConfig::default())
    }

    #[test]
    fn test_key_schema() {
        let cache = CategoryCache::disabled();
        let id = Uuid::nil();
        assert_eq!(
            cache.entity_key(id, true, Locale::Vi),
            format!("sf:category:{}:all:vi", id)
        );
        assert_eq!(
            cache.entity_key(id, false, Locale::En),
            format!("sf:category:{}:active:en", id)
        );
        assert_eq!(
            cache.list_key(ListKind::Roots, true, Locale::Vi),
            "sf:categories:roots:all:vi"
        );
        assert_eq!(
            cache.list_key(ListKind::ChildrenOf(id), false, Locale::Vi),
            format!("sf:categories:children:{}:active:vi", id)
        );
    }

    #[test]
    fn test_search_key_hashes_signature() {
        let cache = CategoryCache::disabled();
        let base = CategoryQuery::default();
        let key = cache.search_key(&base, Locale::Vi);
        assert!(key.starts_with("sf:categories:search:all:"));
        assert!(key.ends_with(":vi"));
        let hash = key.split(':').nth(4).unwrap();
        assert_eq!(hash.len(), 16);

        let page2 = CategoryQuery {
            page: 2,
            ..CategoryQuery::default()
        };
        assert_ne!(key, cache.search_key(&page2, Locale::Vi));
        assert_eq!(key, cache.search_key(&CategoryQuery::default(), Locale::Vi));

        let roots = CategoryQuery {
            scope: SearchScope::RootsOnly,
            ..CategoryQuery::default()
        };
        assert!(cache
            .search_key(&roots, Locale::Vi)
            .starts_with("sf:categories:search:roots:"));
    }

    #[test]
    fn test_entity_prefix_does_not_cover_aggregates() {
        let cache = CategoryCache::disabled();
        let id = Uuid::new_v4();
        assert!(!cache.aggregate_prefix().starts_with(&cache.entity_prefix(id)));
        assert!(!cache
            .entity_key(id, true, Locale::Vi)
            .starts_with(&cache.aggregate_prefix()));
    }

    #[tokio::test]
    async fn test_round_trip_and_invalidate() {
        let memory = MemoryCache::new();
        let cache = cache_with(&memory);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let key_a = cache.entity_key(a, true, Locale::Vi);
        let key_b = cache.entity_key(b, true, Locale::Vi);
        let list = cache.list_key(ListKind::All, true, Locale::Vi);
        cache.put(&key_a, &"a", cache.entity_ttl()).await;
        cache.put(&key_b, &"b", cache.entity_ttl()).await;
        cache.put(&list, &vec!["a", "b"], cache.list_ttl()).await;

        assert_eq!(cache.get::<String>(&key_a).await.as_deref(), Some("a"));

        let removed = cache.invalidate_categories(&[a]).await;
        assert_eq!(removed, 2);
        assert!(!memory.contains(&key_a));
        assert!(!memory.contains(&list));
        assert!(memory.contains(&key_b));
    }

    #[tokio::test]
    async fn test_outage_is_a_miss_and_never_panics() {
        let memory = MemoryCache::new();
        let cache = cache_with(&memory);
        assert!(cache.is_available().await);
        memory.set_available(false);
        assert!(!cache.is_available().await);
        assert!(!CategoryCache::disabled().is_available().await);

        cache.put("sf:k", &1u32, cache.entity_ttl()).await;
        assert_eq!(cache.get::<u32>("sf:k").await, None);
        assert_eq!(cache.invalidate_categories(&[Uuid::new_v4()]).await, 0);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let memory = MemoryCache::new();
        memory.insert_raw("sf:k", "1", Duration::from_secs(60));
        memory.set_latency(Duration::from_millis(500));
        let cache = CategoryCache::new(
            Arc::new(memory.clone()),
            CacheConfig {
                op_timeout: Duration::from_millis(20),
                ..CacheConfig::default()
            },
        );
        assert_eq!(cache.get::<u32>("sf:k").await, None);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let memory = MemoryCache::new();
        memory.insert_raw("sf:k", "{not json", Duration::from_secs(60));
        let cache = cache_with(&memory);
        assert_eq!(cache.get::<u32>("sf:k").await, None);
    }
}
