//! # storefront-api
//!
//! HTTP surface for the storefront category catalog. The binary in
//! `main.rs` wires configuration, PostgreSQL and Redis into [`app`].

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;

pub use error::ApiError;
pub use services::CategoryService;

use handlers::{categories, system};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CategoryService>,
}

impl AppState {
    pub fn new(service: CategoryService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Catalog API",
        description = "Hierarchical product categories with cache-aside reads"
    ),
    paths(
        system::health_check,
        categories::create_category,
        categories::list_categories,
        categories::search_categories,
        categories::search_root_categories,
        categories::search_child_categories,
        categories::list_root_categories,
        categories::list_all_children,
        categories::get_category,
        categories::update_category,
        categories::replace_category,
        categories::remove_category,
        categories::hard_delete_category,
        categories::get_children,
        categories::add_child,
        categories::remove_child,
        categories::get_parent,
        categories::is_ancestor,
    ),
    components(schemas(
        storefront_core::CategoryView,
        storefront_core::CategoryRelation,
        storefront_core::CreateCategoryRequest,
        storefront_core::UpdateCategoryRequest,
        storefront_core::ReplaceCategoryRequest,
        storefront_core::SearchCategoryRequest,
        storefront_core::IsActiveInput,
        storefront_core::ChildRequest,
        storefront_core::Locale,
    )),
    tags(
        (name = "Categories", description = "Category CRUD and search"),
        (name = "Hierarchy", description = "Parent/child links"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

/// Build the router with every route and the Swagger UI at `/docs`.
///
/// Middleware (tracing, request ids, CORS) is layered on by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .route("/health", get(system::health_check))
        .route(
            "/api/v1/categories",
            post(categories::create_category).get(categories::list_categories),
        )
        .route(
            "/api/v1/categories/search",
            post(categories::search_categories),
        )
        .route(
            "/api/v1/categories/roots/search",
            post(categories::search_root_categories),
        )
        .route(
            "/api/v1/categories/children/search",
            post(categories::search_child_categories),
        )
        .route(
            "/api/v1/categories/roots",
            get(categories::list_root_categories),
        )
        .route(
            "/api/v1/categories/children",
            get(categories::list_all_children),
        )
        .route(
            "/api/v1/categories/:id",
            get(categories::get_category)
                .patch(categories::update_category)
                .put(categories::replace_category)
                .delete(categories::remove_category),
        )
        .route(
            "/api/v1/categories/:id/hard",
            delete(categories::hard_delete_category),
        )
        .route(
            "/api/v1/categories/:id/children",
            get(categories::get_children).post(categories::add_child),
        )
        .route(
            "/api/v1/categories/:id/children/:child_id",
            delete(categories::remove_child),
        )
        .route(
            "/api/v1/categories/:id/parent",
            get(categories::get_parent),
        )
        .route(
            "/api/v1/categories/:id/ancestor-of/:descendant_id",
            get(categories::is_ancestor),
        )
        .with_state(state)
}
