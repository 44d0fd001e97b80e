//! Category service façade.
//!
//! Orchestrates the repositories, the hierarchy engine and the cache-aside
//! layer. Reads go through the cache; every mutation invalidates the affected
//! categories and all aggregates after the store write succeeds.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use storefront_core::{
    ActiveFilter, Category, CategoryQuery, CategoryRelation, CategoryRepository, CategoryView,
    CreateCategoryRequest, Error, Locale, NewCategory, Page, ProductRepository,
    RelationRepository, ReplaceCategoryRequest, Result, SearchCategoryRequest, SearchScope,
    SortField, SortOrder, UpdateCategoryRequest,
};
use storefront_db::Database;

use super::category_cache::{CategoryCache, ListKind};
use super::hierarchy::HierarchyEngine;

#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
    relations: Arc<dyn RelationRepository>,
    products: Arc<dyn ProductRepository>,
    hierarchy: HierarchyEngine,
    cache: CategoryCache,
}

impl CategoryService {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        relations: Arc<dyn RelationRepository>,
        products: Arc<dyn ProductRepository>,
        cache: CategoryCache,
    ) -> Self {
        let hierarchy = HierarchyEngine::new(categories.clone(), relations.clone(), cache.clone());
        Self {
            categories,
            relations,
            products,
            hierarchy,
            cache,
        }
    }

    /// Build over the PostgreSQL repositories.
    pub fn from_database(db: &Database, cache: CategoryCache) -> Self {
        Self::new(
            Arc::new(db.categories.clone()),
            Arc::new(db.relations.clone()),
            Arc::new(db.products.clone()),
            cache,
        )
    }

    pub fn hierarchy(&self) -> &HierarchyEngine {
        &self.hierarchy
    }

    /// Whether the category cache is reachable right now.
    pub async fn cache_available(&self) -> bool {
        self.cache.is_available().await
    }

    // =========================================================================
    // PROJECTION
    // =========================================================================

    /// Attach parent and children ids to each category and apply the locale.
    async fn assemble(&self, categories: Vec<Category>, locale: Locale) -> Result<Vec<CategoryView>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
        let (parents, mut children) = futures::try_join!(
            self.relations.parents_of(&ids),
            self.relations.children_of(&ids)
        )?;

        Ok(categories
            .into_iter()
            .map(|c| {
                let id = c.id;
                CategoryView::assemble(
                    c,
                    locale,
                    parents.get(&id).copied(),
                    children.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn view(&self, category: Category, locale: Locale) -> Result<CategoryView> {
        let mut views = self.assemble(vec![category], locale).await?;
        views
            .pop()
            .ok_or_else(|| Error::Internal("Projection returned no rows".to_string()))
    }

    async fn require_live(&self, id: Uuid) -> Result<Category> {
        self.categories
            .find_live(id)
            .await?
            .ok_or_else(|| Error::category_not_found(id))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Single category with its hierarchy inlined.
    ///
    /// With `include_inactive = false` an inactive category is `NotFound`.
    pub async fn find_one(
        &self,
        id: Uuid,
        include_inactive: bool,
        locale: Locale,
    ) -> Result<CategoryView> {
        let key = self.cache.entity_key(id, include_inactive, locale);
        if let Some(view) = self.cache.get::<CategoryView>(&key).await {
            return Ok(view);
        }

        let category = self.require_live(id).await?;
        if !include_inactive && !category.is_active {
            return Err(Error::category_not_found(id));
        }

        let view = self.view(category, locale).await?;
        self.cache.put(&key, &view, self.cache.entity_ttl()).await;
        Ok(view)
    }

    async fn cached_list(
        &self,
        kind: ListKind,
        include_inactive: bool,
        locale: Locale,
        scope: SearchScope,
        sort_by: SortField,
        sort_order: SortOrder,
    ) -> Result<Vec<CategoryView>> {
        let key = self.cache.list_key(kind, include_inactive, locale);
        if let Some(views) = self.cache.get::<Vec<CategoryView>>(&key).await {
            return Ok(views);
        }

        let rows = self
            .categories
            .list(
                ActiveFilter::from_include_inactive(include_inactive),
                scope,
                sort_by,
                sort_order,
            )
            .await?;
        let views = self.assemble(rows, locale).await?;
        self.cache.put(&key, &views, self.cache.list_ttl()).await;
        Ok(views)
    }

    /// Every category, newest first.
    pub async fn find_all(&self, include_inactive: bool, locale: Locale) -> Result<Vec<CategoryView>> {
        self.cached_list(
            ListKind::All,
            include_inactive,
            locale,
            SearchScope::All,
            SortField::CreatedAt,
            SortOrder::Desc,
        )
        .await
    }

    /// Categories without a parent, by name.
    pub async fn list_root_categories(
        &self,
        include_inactive: bool,
        locale: Locale,
    ) -> Result<Vec<CategoryView>> {
        self.cached_list(
            ListKind::Roots,
            include_inactive,
            locale,
            SearchScope::RootsOnly,
            SortField::Name,
            SortOrder::Asc,
        )
        .await
    }

    /// Categories with a parent, by name.
    pub async fn list_all_children(
        &self,
        include_inactive: bool,
        locale: Locale,
    ) -> Result<Vec<CategoryView>> {
        self.cached_list(
            ListKind::AllChildren,
            include_inactive,
            locale,
            SearchScope::ChildrenOnly { parent_id: None },
            SortField::Name,
            SortOrder::Asc,
        )
        .await
    }

    /// Direct children of `parent_id`, by name.
    pub async fn get_children(
        &self,
        parent_id: Uuid,
        include_inactive: bool,
        locale: Locale,
    ) -> Result<Vec<CategoryView>> {
        let key = self
            .cache
            .list_key(ListKind::ChildrenOf(parent_id), include_inactive, locale);
        if let Some(views) = self.cache.get::<Vec<CategoryView>>(&key).await {
            return Ok(views);
        }

        let children: Vec<Category> = self
            .hierarchy
            .get_children(parent_id)
            .await?
            .into_iter()
            .filter(|c| include_inactive || c.is_active)
            .collect();
        let views = self.assemble(children, locale).await?;
        self.cache.put(&key, &views, self.cache.list_ttl()).await;
        Ok(views)
    }

    /// Parent of `child_id`, or None for a root.
    pub async fn get_parent(&self, child_id: Uuid, locale: Locale) -> Result<Option<CategoryView>> {
        match self.hierarchy.get_parent(child_id).await? {
            Some(parent) => Ok(Some(self.view(parent, locale).await?)),
            None => Ok(None),
        }
    }

    pub async fn is_ancestor_of(&self, candidate: Uuid, descendant: Uuid) -> Result<bool> {
        self.require_live(candidate).await?;
        self.require_live(descendant).await?;
        self.hierarchy.is_ancestor_of(candidate, descendant).await
    }

    /// Paginated search across all categories.
    pub async fn search(
        &self,
        req: SearchCategoryRequest,
        locale: Locale,
    ) -> Result<Page<CategoryView>> {
        let query = req.into_query(SearchScope::All)?;
        self.search_query(&query, locale).await
    }

    /// Paginated search restricted to categories without a parent.
    pub async fn search_roots(
        &self,
        req: SearchCategoryRequest,
        locale: Locale,
    ) -> Result<Page<CategoryView>> {
        let query = req.into_query(SearchScope::RootsOnly)?;
        self.search_query(&query, locale).await
    }

    /// Paginated search restricted to categories that have a parent,
    /// optionally one specific parent.
    pub async fn search_children(
        &self,
        req: SearchCategoryRequest,
        locale: Locale,
    ) -> Result<Page<CategoryView>> {
        let parent_id = req.parent_id;
        let query = req.into_query(SearchScope::ChildrenOnly { parent_id })?;
        self.search_query(&query, locale).await
    }

    /// Execute a normalized query through the cache.
    pub async fn search_query(
        &self,
        query: &CategoryQuery,
        locale: Locale,
    ) -> Result<Page<CategoryView>> {
        let key = self.cache.search_key(query, locale);
        if let Some(page) = self.cache.get::<Page<CategoryView>>(&key).await {
            return Ok(page);
        }

        let (rows, total) = self.categories.search(query).await?;
        let views = self.assemble(rows, locale).await?;
        debug!(
            subsystem = "catalog",
            component = "category_service",
            op = "search",
            result_count = views.len(),
            total = total,
            "Search executed"
        );

        let page = Page::new(views, total, query.page, query.limit);
        self.cache.put(&key, &page, self.cache.list_ttl()).await;
        Ok(page)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Create a category, optionally directly under a parent.
    ///
    /// When the parent link is rejected the new row is deleted again, so the
    /// caller never sees a half-created category.
    pub async fn create(&self, req: CreateCategoryRequest) -> Result<CategoryView> {
        let new = req.to_new_category()?;

        if self.categories.find_by_name(&new.name).await?.is_some() {
            return Err(Error::DuplicateName(new.name));
        }

        let category = match req.parent_id {
            None => {
                let category = self.categories.insert(&new).await?;
                self.cache.invalidate_categories(&[category.id]).await;
                category
            }
            Some(parent_id) => {
                self.require_live(parent_id).await?;
                // Run detached so a dropped request cannot stop between the
                // insert and the link or its rollback.
                let this = self.clone();
                tokio::spawn(async move { this.insert_under_parent(new, parent_id).await })
                    .await
                    .map_err(|e| Error::Internal(format!("Create task failed: {}", e)))??
            }
        };

        info!(
            subsystem = "catalog",
            component = "category_service",
            op = "create",
            category_id = %category.id,
            parent_id = ?req.parent_id,
            "Category created"
        );
        self.view(category, Locale::default()).await
    }

    async fn insert_under_parent(&self, new: NewCategory, parent_id: Uuid) -> Result<Category> {
        let category = self.categories.insert(&new).await?;

        if let Err(e) = self.hierarchy.add_child(parent_id, category.id).await {
            warn!(
                subsystem = "catalog",
                component = "category_service",
                op = "create",
                category_id = %category.id,
                parent_id = %parent_id,
                error_kind = e.kind(),
                "Parent link rejected, rolling back created category"
            );
            match self.categories.delete_permanently(category.id).await {
                Ok(_) => self.cache.invalidate_categories(&[category.id]).await,
                Err(rollback) => {
                    error!(
                        subsystem = "catalog",
                        component = "category_service",
                        op = "create",
                        category_id = %category.id,
                        error = %rollback,
                        "Compensating delete failed"
                    );
                    0
                }
            };
            return Err(e);
        }

        Ok(category)
    }

    /// Partial update. Absent fields are left unchanged.
    pub async fn update(&self, id: Uuid, req: UpdateCategoryRequest) -> Result<CategoryView> {
        let current = self.require_live(id).await?;
        let merged = req.apply_to(current.clone())?;

        if merged.name != current.name {
            if let Some(other) = self.categories.find_by_name(&merged.name).await? {
                if other.id != id {
                    return Err(Error::DuplicateName(merged.name));
                }
            }
        }

        if current.is_active && !merged.is_active {
            self.guard_deactivation(id).await?;
        }

        let affected = self.with_parent(id).await?;
        let saved = self.categories.save(&merged).await?;
        self.cache.invalidate_categories(&affected).await;

        info!(
            subsystem = "catalog",
            component = "category_service",
            op = "update",
            category_id = %id,
            "Category updated"
        );
        self.view(saved, Locale::default()).await
    }

    /// PUT form of update: the name is required, other fields are optional.
    pub async fn replace(&self, id: Uuid, req: ReplaceCategoryRequest) -> Result<CategoryView> {
        self.update(id, req.into()).await
    }

    /// Soft delete: deactivate the category.
    pub async fn remove(&self, id: Uuid) -> Result<CategoryView> {
        let mut category = self.require_live(id).await?;
        if !category.is_active {
            return Err(Error::AlreadyInactive(id));
        }
        self.guard_deactivation(id).await?;

        category.is_active = false;
        let affected = self.with_parent(id).await?;
        let saved = self.categories.save(&category).await?;
        self.cache.invalidate_categories(&affected).await;

        info!(
            subsystem = "catalog",
            component = "category_service",
            op = "remove",
            category_id = %id,
            "Category deactivated"
        );
        self.view(saved, Locale::default()).await
    }

    /// `id` plus its current parent, whose projected `children_ids` order
    /// and membership depend on the child's row.
    async fn with_parent(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let mut ids = vec![id];
        if let Some(relation) = self.relations.find_by_child(id).await? {
            ids.push(relation.parent_id);
        }
        Ok(ids)
    }

    /// Administrative purge. Blocked only by live products; relation rows on
    /// either side are removed with the category.
    pub async fn hard_delete(&self, id: Uuid) -> Result<()> {
        self.require_live(id).await?;

        let products = self.products.count_live_for_category(id).await?;
        if products > 0 {
            return Err(Error::HasLiveProducts { id, count: products });
        }

        let purged = self.categories.hard_delete(id).await?;

        let mut affected = vec![id];
        for relation in &purged {
            affected.push(relation.parent_id);
            affected.push(relation.child_id);
        }
        self.cache.invalidate_categories(&affected).await;

        info!(
            subsystem = "catalog",
            component = "category_service",
            op = "hard_delete",
            category_id = %id,
            relations_purged = purged.len(),
            "Category hard-deleted"
        );
        Ok(())
    }

    pub async fn add_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<CategoryRelation> {
        self.hierarchy.add_child(parent_id, child_id).await
    }

    pub async fn remove_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<()> {
        self.hierarchy.remove_child(parent_id, child_id).await
    }

    /// Deactivation is blocked by live products and by active children.
    async fn guard_deactivation(&self, id: Uuid) -> Result<()> {
        let products = self.products.count_live_for_category(id).await?;
        if products > 0 {
            return Err(Error::HasLiveProducts { id, count: products });
        }

        let child_ids: Vec<Uuid> = self
            .relations
            .find_by_parent(id)
            .await?
            .into_iter()
            .map(|r| r.child_id)
            .collect();
        let active = self
            .categories
            .find_live_many(&child_ids)
            .await?
            .iter()
            .filter(|c| c.is_active)
            .count();
        if active > 0 {
            return Err(Error::HasActiveChildren { id, count: active });
        }
        Ok(())
    }
}
