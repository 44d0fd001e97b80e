//! HTTP handlers for storefront-api.

pub mod categories;
pub mod system;
