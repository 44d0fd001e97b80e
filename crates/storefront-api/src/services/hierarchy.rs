//! Category hierarchy engine.
//!
//! Owns the parent/child invariants:
//!
//! - a child has at most one live parent
//! - a category is never its own parent
//! - adding `parent -> child` is rejected when `child` is already an ancestor
//!   of `parent`
//!
//! The checks here are read-then-write and can race. The partial unique
//! indexes on `category_children` reject the losing write, and the storage
//! layer translates that rejection into the same typed error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use storefront_core::{
    defaults, Category, CategoryRelation, CategoryRepository, Error, RelationRepository, Result,
};

use super::category_cache::CategoryCache;

#[derive(Clone)]
pub struct HierarchyEngine {
    categories: Arc<dyn CategoryRepository>,
    relations: Arc<dyn RelationRepository>,
    cache: CategoryCache,
}

impl HierarchyEngine {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        relations: Arc<dyn RelationRepository>,
        cache: CategoryCache,
    ) -> Self {
        Self {
            categories,
            relations,
            cache,
        }
    }

    async fn require_live(&self, id: Uuid) -> Result<Category> {
        self.categories
            .find_live(id)
            .await?
            .ok_or_else(|| Error::category_not_found(id))
    }

    /// Make `child_id` a direct child of `parent_id`.
    pub async fn add_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<CategoryRelation> {
        self.require_live(parent_id).await?;
        self.require_live(child_id).await?;

        if parent_id == child_id {
            return Err(Error::SelfReference(child_id));
        }

        if let Some(existing) = self.relations.find_by_child(child_id).await? {
            debug!(
                subsystem = "catalog",
                component = "hierarchy",
                op = "add_child",
                child_id = %child_id,
                parent_id = %existing.parent_id,
                "Child already has a parent"
            );
            return Err(Error::AlreadyHasParent { child_id });
        }

        if self.is_ancestor_of(child_id, parent_id).await? {
            return Err(Error::CycleDetected {
                parent_id,
                child_id,
            });
        }

        let relation = self.relations.insert(parent_id, child_id).await?;
        self.cache.invalidate_categories(&[parent_id, child_id]).await;

        info!(
            subsystem = "catalog",
            component = "hierarchy",
            op = "add_child",
            parent_id = %parent_id,
            child_id = %child_id,
            "Child added"
        );
        Ok(relation)
    }

    /// Detach `child_id` from `parent_id`.
    pub async fn remove_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<()> {
        let not_found = || Error::RelationNotFound {
            parent_id,
            child_id,
        };

        let relation = self
            .relations
            .find_pair(parent_id, child_id)
            .await?
            .ok_or_else(not_found)?;

        // A concurrent removal may have won between the lookup and here.
        if !self.relations.soft_delete(relation.id).await? {
            return Err(not_found());
        }

        self.cache.invalidate_categories(&[parent_id, child_id]).await;

        info!(
            subsystem = "catalog",
            component = "hierarchy",
            op = "remove_child",
            parent_id = %parent_id,
            child_id = %child_id,
            "Child removed"
        );
        Ok(())
    }

    /// Live children of `parent_id`, in the store's name order (the same
    /// order as a projected `children_ids`).
    pub async fn get_children(&self, parent_id: Uuid) -> Result<Vec<Category>> {
        self.require_live(parent_id).await?;

        let child_ids = self
            .relations
            .children_of(&[parent_id])
            .await?
            .remove(&parent_id)
            .unwrap_or_default();

        let mut by_id: HashMap<Uuid, Category> = self
            .categories
            .find_live_many(&child_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        Ok(child_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Parent of `child_id`, or None for a root.
    pub async fn get_parent(&self, child_id: Uuid) -> Result<Option<Category>> {
        self.require_live(child_id).await?;

        match self.relations.find_by_child(child_id).await? {
            Some(relation) => self.categories.find_live(relation.parent_id).await,
            None => Ok(None),
        }
    }

    /// Whether `candidate` appears on the parent chain above `descendant`.
    ///
    /// A category is never its own ancestor. The walk stops at a root, on a
    /// revisited node, or after `MAX_ANCESTOR_WALK` steps.
    pub async fn is_ancestor_of(&self, candidate: Uuid, descendant: Uuid) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut current = descendant;

        for _ in 0..defaults::MAX_ANCESTOR_WALK {
            if !visited.insert(current) {
                warn!(
                    subsystem = "catalog",
                    component = "hierarchy",
                    op = "is_ancestor_of",
                    category_id = %current,
                    "Cycle found in stored relations"
                );
                return Ok(false);
            }

            let parent = match self.relations.find_by_child(current).await? {
                Some(relation) => relation.parent_id,
                None => return Ok(false),
            };

            if parent == candidate {
                return Ok(true);
            }
            current = parent;
        }

        Err(Error::Internal(format!(
            "Ancestor chain of {} exceeds {} levels",
            descendant,
            defaults::MAX_ANCESTOR_WALK
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use storefront_core::mock::{MemoryCache, MemoryCatalog};
    use storefront_core::{CategoryRepository, NewCategory};

    struct Fixture {
        catalog: MemoryCatalog,
        memory: MemoryCache,
        engine: HierarchyEngine,
    }

    fn fixture() -> Fixture {
        let catalog = MemoryCatalog::new();
        let memory = MemoryCache::new();
        let cache = CategoryCache::new(Arc::new(memory.clone()), CacheConfig::default());
        let engine = HierarchyEngine::new(
            Arc::new(catalog.clone()),
            Arc::new(catalog.clone()),
            cache,
        );
        Fixture {
            catalog,
            memory,
            engine,
        }
    }

    async fn category(catalog: &MemoryCatalog, name: &str) -> Category {
        CategoryRepository::insert(
            catalog,
            &NewCategory {
                name: name.to_string(),
                is_active: true,
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_child_and_projections() {
        let f = fixture();
        let phones = category(&f.catalog, "Điện thoại").await;
        let iphone = category(&f.catalog, "iPhone").await;

        f.engine.add_child(phones.id, iphone.id).await.unwrap();

        let parent = f.engine.get_parent(iphone.id).await.unwrap().unwrap();
        assert_eq!(parent.id, phones.id);
        let children = f.engine.get_children(phones.id).await.unwrap();
        assert_eq!(
            children.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["iPhone"]
        );
        assert!(f.engine.get_parent(phones.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reverse_edge_is_a_cycle() {
        let f = fixture();
        let phones = category(&f.catalog, "Điện thoại").await;
        let iphone = category(&f.catalog, "iPhone").await;
        f.engine.add_child(phones.id, iphone.id).await.unwrap();

        // phones has no parent, so the single-parent check passes and the
        // ancestor walk has to catch it
        let err = f.engine.add_child(iphone.id, phones.id).await.unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[tokio::test]
    async fn test_deep_cycle_detected() {
        let f = fixture();
        let a = category(&f.catalog, "A").await;
        let b = category(&f.catalog, "B").await;
        let c = category(&f.catalog, "C").await;
        f.engine.add_child(a.id, b.id).await.unwrap();
        f.engine.add_child(b.id, c.id).await.unwrap();

        assert!(f.engine.is_ancestor_of(a.id, c.id).await.unwrap());
        assert!(!f.engine.is_ancestor_of(c.id, a.id).await.unwrap());

        let err = f.engine.add_child(c.id, a.id).await.unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[tokio::test]
    async fn test_never_own_ancestor() {
        let f = fixture();
        let a = category(&f.catalog, "A").await;
        let b = category(&f.catalog, "B").await;
        assert!(!f.engine.is_ancestor_of(a.id, a.id).await.unwrap());
        f.engine.add_child(a.id, b.id).await.unwrap();
        assert!(!f.engine.is_ancestor_of(a.id, a.id).await.unwrap());
        assert!(!f.engine.is_ancestor_of(b.id, b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_child_rejections() {
        let f = fixture();
        let a = category(&f.catalog, "A").await;
        let b = category(&f.catalog, "B").await;
        let c = category(&f.catalog, "C").await;

        let missing = Uuid::new_v4();
        assert!(matches!(
            f.engine.add_child(missing, a.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            f.engine.add_child(a.id, missing).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            f.engine.add_child(a.id, a.id).await,
            Err(Error::SelfReference(_))
        ));

        f.engine.add_child(a.id, b.id).await.unwrap();
        // Same pair again
        assert!(matches!(
            f.engine.add_child(a.id, b.id).await,
            Err(Error::AlreadyHasParent { .. })
        ));
        // Different parent
        assert!(matches!(
            f.engine.add_child(c.id, b.id).await,
            Err(Error::AlreadyHasParent { .. })
        ));
        assert_eq!(f.catalog.live_parent_count(b.id), 1);
    }

    #[tokio::test]
    async fn test_remove_child() {
        let f = fixture();
        let a = category(&f.catalog, "A").await;
        let b = category(&f.catalog, "B").await;
        let c = category(&f.catalog, "C").await;

        assert!(matches!(
            f.engine.remove_child(a.id, b.id).await,
            Err(Error::RelationNotFound { .. })
        ));

        f.engine.add_child(a.id, b.id).await.unwrap();
        f.engine.remove_child(a.id, b.id).await.unwrap();
        assert!(f.engine.get_children(a.id).await.unwrap().is_empty());

        // Reparenting is remove + add
        f.engine.add_child(c.id, b.id).await.unwrap();
        assert_eq!(
            f.engine.get_parent(b.id).await.unwrap().map(|p| p.id),
            Some(c.id)
        );

        assert!(matches!(
            f.engine.remove_child(a.id, b.id).await,
            Err(Error::RelationNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_parent_holds_over_random_sequence() {
        let f = fixture();
        let mut ids = Vec::new();
        for name in ["A", "B", "C", "D", "E"] {
            ids.push(category(&f.catalog, name).await.id);
        }

        // Deterministic pseudo-random walk over add/remove calls
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let p = ids[(seed % 5) as usize];
            let c = ids[((seed >> 8) % 5) as usize];
            if seed & 1 == 0 {
                let _ = f.engine.add_child(p, c).await;
            } else {
                let _ = f.engine.remove_child(p, c).await;
            }

            for id in &ids {
                assert!(f.catalog.live_parent_count(*id) <= 1);
                assert!(!f.engine.is_ancestor_of(*id, *id).await.unwrap());
            }
        }
    }

    #[tokio::test]
    async fn test_children_ordered_by_name() {
        let f = fixture();
        let root = category(&f.catalog, "Root").await;
        let z = category(&f.catalog, "Zeta").await;
        let a = category(&f.catalog, "Alpha").await;
        f.engine.add_child(root.id, z.id).await.unwrap();
        f.engine.add_child(root.id, a.id).await.unwrap();

        let names: Vec<String> = f
            .engine
            .get_children(root.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn test_mutations_invalidate_both_endpoints() {
        let f = fixture();
        let a = category(&f.catalog, "A").await;
        let b = category(&f.catalog, "B").await;
        let ttl = std::time::Duration::from_secs(60);
        let cache = CategoryCache::new(Arc::new(f.memory.clone()), CacheConfig::default());

        let keys = [
            cache.entity_key(a.id, true, storefront_core::Locale::Vi),
            cache.entity_key(b.id, false, storefront_core::Locale::En),
            "sf:categories:all:all:vi".to_string(),
        ];
        for key in &keys {
            f.memory.insert_raw(key, "stale", ttl);
        }

        f.engine.add_child(a.id, b.id).await.unwrap();
        for key in &keys {
            assert!(!f.memory.contains(key), "{} survived add_child", key);
        }

        for key in &keys {
            f.memory.insert_raw(key, "stale", ttl);
        }
        f.engine.remove_child(a.id, b.id).await.unwrap();
        for key in &keys {
            assert!(!f.memory.contains(key), "{} survived remove_child", key);
        }
    }

    #[tokio::test]
    async fn test_works_with_cache_down() {
        let f = fixture();
        f.memory.set_available(false);
        let a = category(&f.catalog, "A").await;
        let b = category(&f.catalog, "B").await;
        f.engine.add_child(a.id, b.id).await.unwrap();
        f.engine.remove_child(a.id, b.id).await.unwrap();
    }

    /// Relation store whose child lookup always misses, as if a concurrent
    /// writer inserted between the check and the insert.
    struct StaleChildLookup(MemoryCatalog);

    #[async_trait]
    impl RelationRepository for StaleChildLookup {
        async fn find_by_child(&self, _child_id: Uuid) -> Result<Option<CategoryRelation>> {
            Ok(None)
        }
        async fn find_by_parent(&self, parent_id: Uuid) -> Result<Vec<CategoryRelation>> {
            self.0.find_by_parent(parent_id).await
        }
        async fn find_pair(&self, p: Uuid, c: Uuid) -> Result<Option<CategoryRelation>> {
            self.0.find_pair(p, c).await
        }
        async fn insert(&self, p: Uuid, c: Uuid) -> Result<CategoryRelation> {
            RelationRepository::insert(&self.0, p, c).await
        }
        async fn soft_delete(&self, id: Uuid) -> Result<bool> {
            RelationRepository::soft_delete(&self.0, id).await
        }
        async fn parents_of(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
            self.0.parents_of(ids).await
        }
        async fn children_of(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
            self.0.children_of(ids).await
        }
    }

    /// Relation store whose collation sorts names in reverse.
    struct ReverseCollation(MemoryCatalog);

    #[async_trait]
    impl RelationRepository for ReverseCollation {
        async fn find_by_child(&self, child_id: Uuid) -> Result<Option<CategoryRelation>> {
            self.0.find_by_child(child_id).await
        }
        async fn find_by_parent(&self, parent_id: Uuid) -> Result<Vec<CategoryRelation>> {
            self.0.find_by_parent(parent_id).await
        }
        async fn find_pair(&self, p: Uuid, c: Uuid) -> Result<Option<CategoryRelation>> {
            self.0.find_pair(p, c).await
        }
        async fn insert(&self, p: Uuid, c: Uuid) -> Result<CategoryRelation> {
            RelationRepository::insert(&self.0, p, c).await
        }
        async fn soft_delete(&self, id: Uuid) -> Result<bool> {
            RelationRepository::soft_delete(&self.0, id).await
        }
        async fn parents_of(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
            self.0.parents_of(ids).await
        }
        async fn children_of(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
            let mut out = self.0.children_of(ids).await?;
            for children in out.values_mut() {
                children.reverse();
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn test_children_follow_store_order() {
        let catalog = MemoryCatalog::new();
        let relations = Arc::new(ReverseCollation(catalog.clone()));
        let engine = HierarchyEngine::new(
            Arc::new(catalog.clone()),
            relations.clone(),
            CategoryCache::disabled(),
        );
        let root = category(&catalog, "Root").await;
        let a = category(&catalog, "Alpha").await;
        let m = category(&catalog, "Mu").await;
        let z = category(&catalog, "Zeta").await;
        for child in [&a, &m, &z] {
            engine.add_child(root.id, child.id).await.unwrap();
        }

        let ids: Vec<Uuid> = engine
            .get_children(root.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![z.id, m.id, a.id]);

        let projected = relations.children_of(&[root.id]).await.unwrap();
        assert_eq!(projected.get(&root.id), Some(&ids));
    }

    #[tokio::test]
    async fn test_lost_race_surfaces_already_has_parent() {
        let catalog = MemoryCatalog::new();
        let engine = HierarchyEngine::new(
            Arc::new(catalog.clone()),
            Arc::new(StaleChildLookup(catalog.clone())),
            CategoryCache::disabled(),
        );
        let a = category(&catalog, "A").await;
        let b = category(&catalog, "B").await;
        let c = category(&catalog, "C").await;

        engine.add_child(a.id, c.id).await.unwrap();
        let err = engine.add_child(b.id, c.id).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyHasParent { child_id } if child_id == c.id));
        assert_eq!(catalog.live_parent_count(c.id), 1);
    }
}
