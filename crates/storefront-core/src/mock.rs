//! In-memory repositories and cache backend for deterministic testing.
//!
//! `MemoryCatalog` implements the category, relation and product traits over
//! one shared state so that cross-table behavior (scope filters, cascade
//! purges, foreign keys) matches the PostgreSQL implementation. Storage
//! constraints are emulated: live-name uniqueness, one live parent per child,
//! pair uniqueness and the no-self-loop check.
//!
//! ## Usage
//!
//! ```rust
//! use storefront_core::mock::{MemoryCache, MemoryCatalog};
//!
//! let catalog = MemoryCatalog::new();
//! let cache = MemoryCache::new();
//! cache.set_available(false); // simulate an outage
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::search::{ActiveFilter, CategoryQuery, SearchScope, SortField, SortOrder};
use crate::traits::*;
use crate::uuid_utils::new_v7;

// =============================================================================
// CATALOG
// =============================================================================

struct CategoryRow {
    category: Category,
    deleted_at: Option<DateTime<Utc>>,
}

struct RelationRow {
    relation: CategoryRelation,
    deleted_at: Option<DateTime<Utc>>,
}

struct ProductRow {
    product: ProductRef,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct CatalogState {
    categories: HashMap<Uuid, CategoryRow>,
    relations: Vec<RelationRow>,
    products: HashMap<Uuid, ProductRow>,
}

impl CatalogState {
    fn live(&self, id: Uuid) -> Option<&Category> {
        self.categories
            .get(&id)
            .filter(|r| r.deleted_at.is_none())
            .map(|r| &r.category)
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        let needle = name.to_lowercase();
        self.categories.values().any(|r| {
            r.deleted_at.is_none()
                && Some(r.category.id) != except
                && r.category.name.to_lowercase() == needle
        })
    }

    fn live_relations(&self) -> impl Iterator<Item = &CategoryRelation> {
        self.relations
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .map(|r| &r.relation)
    }

    fn parent_of(&self, child_id: Uuid) -> Option<Uuid> {
        self.live_relations()
            .find(|r| r.child_id == child_id)
            .map(|r| r.parent_id)
    }

    fn in_scope(&self, id: Uuid, scope: SearchScope) -> bool {
        match scope {
            SearchScope::All => true,
            SearchScope::RootsOnly => self.parent_of(id).is_none(),
            SearchScope::ChildrenOnly { parent_id: None } => self.parent_of(id).is_some(),
            SearchScope::ChildrenOnly {
                parent_id: Some(pid),
            } => self.parent_of(id) == Some(pid),
        }
    }

    fn select(
        &self,
        name: Option<&str>,
        active: ActiveFilter,
        scope: SearchScope,
        sort_by: SortField,
        sort_order: SortOrder,
    ) -> Vec<Category> {
        let mut rows: Vec<Category> = self
            .categories
            .values()
            .filter(|r| r.deleted_at.is_none())
            .map(|r| &r.category)
            .filter(|c| active.matches(c.is_active))
            .filter(|c| match name {
                Some(term) => {
                    c.name.to_lowercase().contains(term)
                        || c.name_en
                            .as_deref()
                            .map(|n| n.to_lowercase().contains(term))
                            .unwrap_or(false)
                }
                None => true,
            })
            .filter(|c| self.in_scope(c.id, scope))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ord = match sort_by {
                SortField::Id => a.id.cmp(&b.id),
                SortField::Name => a.name.cmp(&b.name),
                SortField::CreatedAt => a.created_at_utc.cmp(&b.created_at_utc),
                SortField::UpdatedAt => a.updated_at_utc.cmp(&b.updated_at_utc),
            }
            .then_with(|| a.id.cmp(&b.id));
            match sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        rows
    }
}

/// In-memory catalog store implementing every repository trait.
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether any row exists for the id, tombstoned or not.
    pub fn category_row_exists(&self, id: Uuid) -> bool {
        self.lock().categories.contains_key(&id)
    }

    /// Category rows of any state.
    pub fn category_row_count(&self) -> usize {
        self.lock().categories.len()
    }

    /// Relation rows (live or soft-deleted) that reference the id.
    pub fn relation_rows_touching(&self, id: Uuid) -> usize {
        self.lock()
            .relations
            .iter()
            .filter(|r| r.relation.parent_id == id || r.relation.child_id == id)
            .count()
    }

    /// Number of live parent relations for a child.
    pub fn live_parent_count(&self, child_id: Uuid) -> usize {
        self.lock()
            .live_relations()
            .filter(|r| r.child_id == child_id)
            .count()
    }
}

#[async_trait]
impl CategoryRepository for MemoryCatalog {
    async fn insert(&self, new: &NewCategory) -> Result<Category> {
        let mut state = self.lock();
        if state.name_taken(&new.name, None) {
            return Err(Error::DuplicateName(new.name.clone()));
        }
        let now = Utc::now();
        let category = Category {
            id: new_v7(),
            name: new.name.clone(),
            name_en: new.name_en.clone(),
            description: new.description.clone(),
            description_en: new.description_en.clone(),
            image: new.image.clone(),
            is_active: new.is_active,
            created_at_utc: now,
            updated_at_utc: now,
        };
        state.categories.insert(
            category.id,
            CategoryRow {
                category: category.clone(),
                deleted_at: None,
            },
        );
        Ok(category)
    }

    async fn find_live(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.lock().live(id).cloned())
    }

    async fn find_live_many(&self, ids: &[Uuid]) -> Result<Vec<Category>> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.live(*id).cloned()).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let needle = name.trim().to_lowercase();
        Ok(self
            .lock()
            .categories
            .values()
            .filter(|r| r.deleted_at.is_none())
            .map(|r| &r.category)
            .find(|c| c.name.to_lowercase() == needle)
            .cloned())
    }

    async fn save(&self, category: &Category) -> Result<Category> {
        let mut state = self.lock();
        if state.live(category.id).is_none() {
            return Err(Error::category_not_found(category.id));
        }
        if state.name_taken(&category.name, Some(category.id)) {
            return Err(Error::DuplicateName(category.name.clone()));
        }
        let mut saved = category.clone();
        saved.updated_at_utc = Utc::now();
        if let Some(row) = state.categories.get_mut(&category.id) {
            saved.created_at_utc = row.category.created_at_utc;
            row.category = saved.clone();
        }
        Ok(saved)
    }

    async fn search(&self, query: &CategoryQuery) -> Result<(Vec<Category>, i64)> {
        let all = self.lock().select(
            query.name.as_deref(),
            query.active,
            query.scope,
            query.sort_by,
            query.sort_order,
        );
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(query.offset().max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list(
        &self,
        active: ActiveFilter,
        scope: SearchScope,
        sort_by: SortField,
        sort_order: SortOrder,
    ) -> Result<Vec<Category>> {
        Ok(self
            .lock()
            .select(None, active, scope, sort_by, sort_order))
    }

    async fn delete_permanently(&self, id: Uuid) -> Result<bool> {
        let mut state = self.lock();
        state
            .relations
            .retain(|r| r.relation.parent_id != id && r.relation.child_id != id);
        Ok(state.categories.remove(&id).is_some())
    }

    async fn hard_delete(&self, id: Uuid) -> Result<Vec<CategoryRelation>> {
        let mut state = self.lock();
        if state.live(id).is_none() {
            return Err(Error::category_not_found(id));
        }
        let (purged, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.relations)
            .into_iter()
            .partition(|r| r.relation.parent_id == id || r.relation.child_id == id);
        state.relations = kept;
        if let Some(row) = state.categories.get_mut(&id) {
            row.deleted_at = Some(Utc::now());
        }
        Ok(purged
            .into_iter()
            .filter(|r| r.deleted_at.is_none())
            .map(|r| r.relation)
            .collect())
    }
}

#[async_trait]
impl RelationRepository for MemoryCatalog {
    async fn find_by_child(&self, child_id: Uuid) -> Result<Option<CategoryRelation>> {
        Ok(self
            .lock()
            .live_relations()
            .find(|r| r.child_id == child_id)
            .cloned())
    }

    async fn find_by_parent(&self, parent_id: Uuid) -> Result<Vec<CategoryRelation>> {
        Ok(self
            .lock()
            .live_relations()
            .filter(|r| r.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn find_pair(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
    ) -> Result<Option<CategoryRelation>> {
        Ok(self
            .lock()
            .live_relations()
            .find(|r| r.parent_id == parent_id && r.child_id == child_id)
            .cloned())
    }

    async fn insert(&self, parent_id: Uuid, child_id: Uuid) -> Result<CategoryRelation> {
        let mut state = self.lock();
        if parent_id == child_id {
            return Err(Error::SelfReference(child_id));
        }
        for id in [parent_id, child_id] {
            if !state.categories.contains_key(&id) {
                return Err(Error::category_not_found(id));
            }
        }
        if state.parent_of(child_id).is_some() {
            return Err(Error::AlreadyHasParent { child_id });
        }
        let now = Utc::now();
        let relation = CategoryRelation {
            id: new_v7(),
            parent_id,
            child_id,
            created_at_utc: now,
            updated_at_utc: now,
        };
        state.relations.push(RelationRow {
            relation: relation.clone(),
            deleted_at: None,
        });
        Ok(relation)
    }

    async fn soft_delete(&self, relation_id: Uuid) -> Result<bool> {
        let mut state = self.lock();
        let now = Utc::now();
        match state
            .relations
            .iter_mut()
            .find(|r| r.relation.id == relation_id && r.deleted_at.is_none())
        {
            Some(row) => {
                row.deleted_at = Some(now);
                row.relation.updated_at_utc = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn parents_of(&self, child_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
        let state = self.lock();
        Ok(child_ids
            .iter()
            .filter_map(|id| state.parent_of(*id).map(|pid| (*id, pid)))
            .collect())
    }

    async fn children_of(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        let state = self.lock();
        let mut out: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for pid in parent_ids {
            let mut children: Vec<&Category> = state
                .live_relations()
                .filter(|r| r.parent_id == *pid)
                .filter_map(|r| state.live(r.child_id))
                .collect();
            if children.is_empty() {
                continue;
            }
            children.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            out.insert(*pid, children.into_iter().map(|c| c.id).collect());
        }
        Ok(out)
    }
}

#[async_trait]
impl ProductRepository for MemoryCatalog {
    async fn count_live_for_category(&self, category_id: Uuid) -> Result<i64> {
        Ok(self
            .lock()
            .products
            .values()
            .filter(|p| p.deleted_at.is_none() && p.product.category_id == category_id)
            .count() as i64)
    }

    async fn insert(&self, name: &str, category_id: Uuid) -> Result<ProductRef> {
        let mut state = self.lock();
        if !state.categories.contains_key(&category_id) {
            return Err(Error::category_not_found(category_id));
        }
        let product = ProductRef {
            id: new_v7(),
            name: name.to_string(),
            category_id,
            created_at_utc: Utc::now(),
        };
        state.products.insert(
            product.id,
            ProductRow {
                product: product.clone(),
                deleted_at: None,
            },
        );
        Ok(product)
    }

    async fn soft_delete(&self, product_id: Uuid) -> Result<bool> {
        let mut state = self.lock();
        match state
            .products
            .get_mut(&product_id)
            .filter(|p| p.deleted_at.is_none())
        {
            Some(row) => {
                row.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// CACHE
// =============================================================================

/// Counters recorded by [`MemoryCache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
}

struct MemoryCacheInner {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

/// In-memory cache backend with TTL expiry and an outage switch.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<MemoryCacheInner>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Create an empty, available cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryCacheInner {
                entries: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
                latency_ms: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                sets: AtomicU64::new(0),
                deletes: AtomicU64::new(0),
            }),
        }
    }

    /// Toggle availability. While unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Add artificial latency to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Store a raw value, bypassing availability.
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.entries()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }

    /// Whether an unexpired entry exists for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.entries()
            .get(key)
            .map(|(_, exp)| *exp > Instant::now())
            .unwrap_or(false)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> MemoryCacheStats {
        MemoryCacheStats {
            hits: self.inner.hits.load(Ordering::SeqCst),
            misses: self.inner.misses.load(Ordering::SeqCst),
            sets: self.inner.sets.load(Ordering::SeqCst),
            deletes: self.inner.deletes.load(Ordering::SeqCst),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<()> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::CacheUnavailable("memory cache switched off".to_string()))
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.enter().await?;
        let mut entries = self.entries();
        let value = match entries.get(key) {
            Some((v, exp)) if *exp > Instant::now() => Some(v.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        let counter = if value.is_some() {
            &self.inner.hits
        } else {
            &self.inner.misses
        };
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.enter().await?;
        self.entries()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        self.inner.sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        self.enter().await?;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        let removed = (before - entries.len()) as u64;
        self.inner.deletes.fetch_add(removed, Ordering::SeqCst);
        Ok(removed)
    }

    async fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_live_name_uniqueness_is_case_insensitive() {
        let catalog = MemoryCatalog::new();
        CategoryRepository::insert(&catalog, &new_category("Laptop"))
            .await
            .unwrap();
        let dup = CategoryRepository::insert(&catalog, &new_category("LAPTOP")).await;
        assert!(matches!(dup, Err(Error::DuplicateName(_))));
    }

    #[tokio::test]
    async fn test_name_is_freed_after_hard_delete() {
        let catalog = MemoryCatalog::new();
        let c = CategoryRepository::insert(&catalog, &new_category("Tablet"))
            .await
            .unwrap();
        catalog.hard_delete(c.id).await.unwrap();
        assert!(catalog.find_live(c.id).await.unwrap().is_none());
        assert!(catalog.category_row_exists(c.id));
        CategoryRepository::insert(&catalog, &new_category("Tablet"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_relation_constraints() {
        let catalog = MemoryCatalog::new();
        let a = CategoryRepository::insert(&catalog, &new_category("A"))
            .await
            .unwrap();
        let b = CategoryRepository::insert(&catalog, &new_category("B"))
            .await
            .unwrap();
        let c = CategoryRepository::insert(&catalog, &new_category("C"))
            .await
            .unwrap();

        assert!(matches!(
            RelationRepository::insert(&catalog, a.id, a.id).await,
            Err(Error::SelfReference(_))
        ));
        RelationRepository::insert(&catalog, a.id, b.id)
            .await
            .unwrap();
        assert!(matches!(
            RelationRepository::insert(&catalog, c.id, b.id).await,
            Err(Error::AlreadyHasParent { .. })
        ));
        assert!(matches!(
            RelationRepository::insert(&catalog, a.id, Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(catalog.live_parent_count(b.id), 1);
    }

    #[tokio::test]
    async fn test_soft_deleted_relation_frees_the_child() {
        let catalog = MemoryCatalog::new();
        let a = CategoryRepository::insert(&catalog, &new_category("A"))
            .await
            .unwrap();
        let b = CategoryRepository::insert(&catalog, &new_category("B"))
            .await
            .unwrap();
        let rel = RelationRepository::insert(&catalog, a.id, b.id)
            .await
            .unwrap();
        assert!(RelationRepository::soft_delete(&catalog, rel.id)
            .await
            .unwrap());
        assert!(!RelationRepository::soft_delete(&catalog, rel.id)
            .await
            .unwrap());
        assert!(catalog.find_by_child(b.id).await.unwrap().is_none());
        RelationRepository::insert(&catalog, a.id, b.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cache_expiry_and_outage() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.insert_raw("old", "x", Duration::from_millis(0));
        assert!(cache.get("old").await.unwrap().is_none());

        cache.set_available(false);
        assert!(matches!(
            cache.get("k").await,
            Err(Error::CacheUnavailable(_))
        ));
        assert!(!cache.is_available().await);
    }

    #[tokio::test]
    async fn test_cache_delete_by_prefix() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.insert_raw("sf:category:1:all:vi", "a", ttl);
        cache.insert_raw("sf:category:1:all:en", "b", ttl);
        cache.insert_raw("sf:category:2:all:vi", "c", ttl);
        let removed = cache.delete_by_prefix("sf:category:1:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["sf:category:2:all:vi".to_string()]);
    }
}
