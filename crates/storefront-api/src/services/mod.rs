//! Service layer for storefront-api.

pub mod category_cache;
pub mod category_service;
pub mod hierarchy;
pub mod redis_cache;

pub use category_cache::{CategoryCache, ListKind};
pub use category_service::CategoryService;
pub use hierarchy::HierarchyEngine;
pub use redis_cache::RedisCacheBackend;
