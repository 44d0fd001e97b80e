//! Error types for the storefront catalog.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using the catalog's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for catalog operations.
///
/// Business-rule rejections each have their own variant so the HTTP façade
/// can map them to a status code without parsing messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Id does not resolve to a live row
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another live category already uses this name
    #[error("A category named '{0}' already exists")]
    DuplicateName(String),

    /// A category cannot be its own parent
    #[error("Category {0} cannot be a child of itself")]
    SelfReference(Uuid),

    /// The child already has a live parent relation
    #[error("Category {child_id} already has a parent category")]
    AlreadyHasParent { child_id: Uuid },

    /// The child is already an ancestor of the prospective parent
    #[error("Adding {child_id} under {parent_id} would create a cycle")]
    CycleDetected { parent_id: Uuid, child_id: Uuid },

    /// No live relation between the two categories
    #[error("Category {child_id} is not a child of {parent_id}")]
    RelationNotFound { parent_id: Uuid, child_id: Uuid },

    /// Deactivation blocked by active children
    #[error(
        "Category {id} has {count} active child categories; deactivate them before their parent"
    )]
    HasActiveChildren { id: Uuid, count: usize },

    /// Deactivation or deletion blocked by product references
    #[error(
        "Category {id} is referenced by {count} products; delete or move them to another category first"
    )]
    HasLiveProducts { id: Uuid, count: i64 },

    /// Category was already deactivated
    #[error("Category {0} is already inactive")]
    AlreadyInactive(Uuid),

    /// Cache backend unreachable or timed out. Never returned to callers.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind, used in API bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::NotFound(_) => "not_found",
            Self::DuplicateName(_) => "duplicate_name",
            Self::SelfReference(_) => "self_reference",
            Self::AlreadyHasParent { .. } => "already_has_parent",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::RelationNotFound { .. } => "relation_not_found",
            Self::HasActiveChildren { .. } => "has_active_children",
            Self::HasLiveProducts { .. } => "has_live_products",
            Self::AlreadyInactive(_) => "already_inactive",
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// Shorthand for a missing category.
    pub fn category_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("Category {} not found", id))
    }

    /// True for rejections caused by business rules rather than infrastructure.
    pub fn is_business_rule(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::CacheUnavailable(_)
                | Self::Serialization(_)
                | Self::Config(_)
                | Self::Internal(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
