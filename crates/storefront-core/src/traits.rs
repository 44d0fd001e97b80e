//! Core traits for catalog storage and caching.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::search::{ActiveFilter, CategoryQuery, SearchScope, SortField, SortOrder};

// =============================================================================
// CATEGORY REPOSITORY
// =============================================================================

/// Durable storage for category rows.
///
/// Every lookup ignores soft-deleted rows. Writes that collide with the live
/// name uniqueness constraint fail with `Error::DuplicateName`.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Insert a new category.
    async fn insert(&self, new: &NewCategory) -> Result<Category>;

    /// Get a live category by ID.
    async fn find_live(&self, id: Uuid) -> Result<Option<Category>>;

    /// Get live categories by ID, in no particular order. Unknown ids are skipped.
    async fn find_live_many(&self, ids: &[Uuid]) -> Result<Vec<Category>>;

    /// Find a live category whose name matches case-insensitively.
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// Persist every field of `category` and bump its update timestamp.
    async fn save(&self, category: &Category) -> Result<Category>;

    /// Paginated search. Returns the page and the total match count.
    async fn search(&self, query: &CategoryQuery) -> Result<(Vec<Category>, i64)>;

    /// Unpaginated listing.
    async fn list(
        &self,
        active: ActiveFilter,
        scope: SearchScope,
        sort_by: SortField,
        sort_order: SortOrder,
    ) -> Result<Vec<Category>>;

    /// Physically remove a row, leaving no trace. Used to undo a create.
    async fn delete_permanently(&self, id: Uuid) -> Result<bool>;

    /// Tombstone a category and purge every relation row where it is parent
    /// or child, atomically. Returns the purged relations.
    async fn hard_delete(&self, id: Uuid) -> Result<Vec<CategoryRelation>>;
}

// =============================================================================
// RELATION STORE
// =============================================================================

/// Durable storage for parent/child relation rows.
///
/// Storage enforces at most one live row per child and per (parent, child)
/// pair; a colliding insert fails with `Error::AlreadyHasParent`.
#[async_trait]
pub trait RelationRepository: Send + Sync {
    /// Live relation where `child_id` is the child, if any.
    async fn find_by_child(&self, child_id: Uuid) -> Result<Option<CategoryRelation>>;

    /// Live relations where `parent_id` is the parent.
    async fn find_by_parent(&self, parent_id: Uuid) -> Result<Vec<CategoryRelation>>;

    /// Live relation for an exact pair.
    async fn find_pair(&self, parent_id: Uuid, child_id: Uuid)
        -> Result<Option<CategoryRelation>>;

    /// Insert a live relation.
    async fn insert(&self, parent_id: Uuid, child_id: Uuid) -> Result<CategoryRelation>;

    /// Mark a relation deleted. Returns false if it was not live.
    async fn soft_delete(&self, relation_id: Uuid) -> Result<bool>;

    /// Parent of each given child (children without a parent are absent).
    async fn parents_of(&self, child_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>>;

    /// Live children of each given parent, ordered by child name.
    async fn children_of(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>>;
}

// =============================================================================
// PRODUCT REFERENCES
// =============================================================================

/// The slice of product storage that category guards depend on.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Number of live products referencing the category.
    async fn count_live_for_category(&self, category_id: Uuid) -> Result<i64>;

    /// Insert a product under a category.
    async fn insert(&self, name: &str, category_id: Uuid) -> Result<ProductRef>;

    /// Soft-delete a product. Returns false if it was not live.
    async fn soft_delete(&self, product_id: Uuid) -> Result<bool>;
}

// =============================================================================
// CACHE BACKEND
// =============================================================================

/// Key/value cache used by the cache-aside layer.
///
/// Implementations report failures as `Error::CacheUnavailable`; callers
/// treat every failure as a miss.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with a TTL.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64>;

    /// Whether the backend is configured and reachable.
    async fn is_available(&self) -> bool;
}
