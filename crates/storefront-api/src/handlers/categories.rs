//! Category HTTP handlers.
//!
//! Thin adapters over [`CategoryService`](crate::services::CategoryService):
//! extract, delegate, map the result. Reads accept `include_inactive` and
//! `locale` (alias `lang`) query parameters.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use storefront_core::{
    CategoryRelation, CategoryView, ChildRequest, CreateCategoryRequest, Locale, Page,
    ReplaceCategoryRequest, SearchCategoryRequest, UpdateCategoryRequest,
};

use crate::{ApiError, AppState};

/// Query parameters shared by read endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReadQuery {
    /// Include inactive categories (default false)
    pub include_inactive: Option<bool>,
    /// `vi` (default) or `en`
    #[serde(alias = "lang")]
    pub locale: Option<String>,
}

impl ReadQuery {
    fn include_inactive(&self) -> bool {
        self.include_inactive.unwrap_or(false)
    }

    fn locale(&self) -> Locale {
        Locale::parse_or_default(self.locale.as_deref())
    }
}

/// Create a category, optionally under a parent.
///
/// # Returns
/// - 201 Created with the category
/// - 400 Bad Request if the name is blank
/// - 404 Not Found if `parent_id` does not name a live category
/// - 409 Conflict if the name is taken
#[utoipa::path(post, path = "/api/v1/categories", tag = "Categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = CategoryView),
        (status = 404, description = "Parent not found"),
        (status = 409, description = "Duplicate name")))]
pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryView>), ApiError> {
    let view = state.service.create(req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// List every category, newest first.
#[utoipa::path(get, path = "/api/v1/categories", tag = "Categories",
    params(ReadQuery),
    responses((status = 200, description = "All categories", body = [CategoryView])))]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(q): Query<ReadQuery>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    let views = state
        .service
        .find_all(q.include_inactive(), q.locale())
        .await?;
    Ok(Json(views))
}

/// Paginated search.
///
/// # Returns
/// - 200 OK with `{ data, total, page, limit, total_pages }`
/// - 400 Bad Request on an unknown sort field or order
#[utoipa::path(post, path = "/api/v1/categories/search", tag = "Categories",
    params(ReadQuery),
    request_body = SearchCategoryRequest,
    responses(
        (status = 200, description = "One page of results"),
        (status = 400, description = "Invalid sort")))]
pub async fn search_categories(
    State(state): State<AppState>,
    Query(q): Query<ReadQuery>,
    Json(req): Json<SearchCategoryRequest>,
) -> Result<Json<Page<CategoryView>>, ApiError> {
    let page = state.service.search(req, q.locale()).await?;
    Ok(Json(page))
}

/// Paginated search over root categories only.
#[utoipa::path(post, path = "/api/v1/categories/roots/search", tag = "Categories",
    params(ReadQuery),
    request_body = SearchCategoryRequest,
    responses(
        (status = 200, description = "One page of root categories"),
        (status = 400, description = "Invalid sort or page")))]
pub async fn search_root_categories(
    State(state): State<AppState>,
    Query(q): Query<ReadQuery>,
    Json(req): Json<SearchCategoryRequest>,
) -> Result<Json<Page<CategoryView>>, ApiError> {
    let page = state.service.search_roots(req, q.locale()).await?;
    Ok(Json(page))
}

/// Paginated search over categories that have a parent. `parent_id` in the
/// body narrows it to one parent.
#[utoipa::path(post, path = "/api/v1/categories/children/search", tag = "Categories",
    params(ReadQuery),
    request_body = SearchCategoryRequest,
    responses((status = 200, description = "One page of results")))]
pub async fn search_child_categories(
    State(state): State<AppState>,
    Query(q): Query<ReadQuery>,
    Json(req): Json<SearchCategoryRequest>,
) -> Result<Json<Page<CategoryView>>, ApiError> {
    let page = state.service.search_children(req, q.locale()).await?;
    Ok(Json(page))
}

/// Categories without a parent.
#[utoipa::path(get, path = "/api/v1/categories/roots", tag = "Categories",
    params(ReadQuery),
    responses((status = 200, description = "Root categories", body = [CategoryView])))]
pub async fn list_root_categories(
    State(state): State<AppState>,
    Query(q): Query<ReadQuery>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    let views = state
        .service
        .list_root_categories(q.include_inactive(), q.locale())
        .await?;
    Ok(Json(views))
}

/// Categories that have a parent.
#[utoipa::path(get, path = "/api/v1/categories/children", tag = "Categories",
    params(ReadQuery),
    responses((status = 200, description = "Child categories", body = [CategoryView])))]
pub async fn list_all_children(
    State(state): State<AppState>,
    Query(q): Query<ReadQuery>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    let views = state
        .service
        .list_all_children(q.include_inactive(), q.locale())
        .await?;
    Ok(Json(views))
}

/// Get one category.
///
/// # Returns
/// - 200 OK with the category, its parent id and children ids
/// - 404 Not Found if missing, hard-deleted, or inactive without `include_inactive`
#[utoipa::path(get, path = "/api/v1/categories/{id}", tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id"), ReadQuery),
    responses(
        (status = 200, description = "Category", body = CategoryView),
        (status = 404, description = "Not found")))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<ReadQuery>,
) -> Result<Json<CategoryView>, ApiError> {
    let view = state
        .service
        .find_one(id, q.include_inactive(), q.locale())
        .await?;
    Ok(Json(view))
}

/// Partially update a category.
///
/// # Returns
/// - 200 OK with the updated category
/// - 404 Not Found
/// - 409 Conflict on a duplicate name, or when deactivating a category that
///   still has live products or active children
#[utoipa::path(patch, path = "/api/v1/categories/{id}", tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = CategoryView),
        (status = 404, description = "Not found"),
        (status = 409, description = "Conflict")))]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<CategoryView>, ApiError> {
    Ok(Json(state.service.update(id, req).await?))
}

/// Update with a required name. Omitted optional fields are kept.
#[utoipa::path(put, path = "/api/v1/categories/{id}", tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = ReplaceCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = CategoryView),
        (status = 404, description = "Not found"),
        (status = 409, description = "Conflict")))]
pub async fn replace_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplaceCategoryRequest>,
) -> Result<Json<CategoryView>, ApiError> {
    Ok(Json(state.service.replace(id, req).await?))
}

/// Deactivate a category.
///
/// # Returns
/// - 200 OK with the deactivated category
/// - 404 Not Found
/// - 409 Conflict if already inactive, or blocked by products or active children
#[utoipa::path(delete, path = "/api/v1/categories/{id}", tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Deactivated", body = CategoryView),
        (status = 404, description = "Not found"),
        (status = 409, description = "Blocked")))]
pub async fn remove_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryView>, ApiError> {
    Ok(Json(state.service.remove(id).await?))
}

/// Purge a category and its hierarchy links.
///
/// # Returns
/// - 204 No Content
/// - 404 Not Found
/// - 409 Conflict if live products reference it
#[utoipa::path(delete, path = "/api/v1/categories/{id}/hard", tag = "Categories",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Has live products")))]
pub async fn hard_delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.hard_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Direct children of a category, by name.
#[utoipa::path(get, path = "/api/v1/categories/{id}/children", tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "Parent id"), ReadQuery),
    responses(
        (status = 200, description = "Children", body = [CategoryView]),
        (status = 404, description = "Parent not found")))]
pub async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<ReadQuery>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    let views = state
        .service
        .get_children(id, q.include_inactive(), q.locale())
        .await?;
    Ok(Json(views))
}

/// Attach a child to a parent.
///
/// # Returns
/// - 201 Created with the relation
/// - 400 Bad Request if parent and child are the same
/// - 404 Not Found if either side is missing
/// - 409 Conflict if the child already has a parent or a cycle would form
#[utoipa::path(post, path = "/api/v1/categories/{id}/children", tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "Parent id")),
    request_body = ChildRequest,
    responses(
        (status = 201, description = "Linked", body = CategoryRelation),
        (status = 400, description = "Self reference"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already has parent, or cycle")))]
pub async fn add_child(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChildRequest>,
) -> Result<(StatusCode, Json<CategoryRelation>), ApiError> {
    let relation = state.service.add_child(id, req.child_id).await?;
    Ok((StatusCode::CREATED, Json(relation)))
}

/// Detach a child from its parent.
#[utoipa::path(delete, path = "/api/v1/categories/{id}/children/{child_id}", tag = "Hierarchy",
    params(
        ("id" = Uuid, Path, description = "Parent id"),
        ("child_id" = Uuid, Path, description = "Child id")),
    responses(
        (status = 204, description = "Unlinked"),
        (status = 404, description = "No such relation")))]
pub async fn remove_child(
    State(state): State<AppState>,
    Path((id, child_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state.service.remove_child(id, child_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Parent of a category; `null` for a root.
#[utoipa::path(get, path = "/api/v1/categories/{id}/parent", tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "Child id"), ReadQuery),
    responses(
        (status = 200, description = "Parent or null", body = Option<CategoryView>),
        (status = 404, description = "Not found")))]
pub async fn get_parent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<ReadQuery>,
) -> Result<Json<Option<CategoryView>>, ApiError> {
    Ok(Json(state.service.get_parent(id, q.locale()).await?))
}

/// Whether `id` is a strict ancestor of `descendant_id`.
#[utoipa::path(get, path = "/api/v1/categories/{id}/ancestor-of/{descendant_id}", tag = "Hierarchy",
    params(
        ("id" = Uuid, Path, description = "Candidate ancestor"),
        ("descendant_id" = Uuid, Path, description = "Candidate descendant")),
    responses(
        (status = 200, description = "`{ \"is_ancestor\": bool }`"),
        (status = 404, description = "Not found")))]
pub async fn is_ancestor(
    State(state): State<AppState>,
    Path((id, descendant_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_ancestor = state.service.is_ancestor_of(id, descendant_id).await?;
    Ok(Json(serde_json::json!({ "is_ancestor": is_ancestor })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_query_defaults() {
        let q = ReadQuery::default();
        assert!(!q.include_inactive());
        assert_eq!(q.locale(), Locale::Vi);
    }

    #[test]
    fn test_read_query_lang_alias() {
        let q: ReadQuery = serde_json::from_value(serde_json::json!({
            "include_inactive": true,
            "lang": "en"
        }))
        .unwrap();
        assert!(q.include_inactive());
        assert_eq!(q.locale(), Locale::En);
    }
}
