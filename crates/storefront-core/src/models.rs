//! Data models for the storefront catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// LOCALE
// =============================================================================

/// Response locale. Categories store a primary (Vietnamese) name and an
/// optional English one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Vi,
    En,
}

impl Locale {
    /// Parse a locale, falling back to the primary locale for anything unknown.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vi => write!(f, "vi"),
            Self::En => write!(f, "en"),
        }
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vi" => Ok(Self::Vi),
            "en" => Ok(Self::En),
            _ => Err(format!("Invalid locale: {}", s)),
        }
    }
}

// =============================================================================
// CATEGORY
// =============================================================================

/// A live catalog category.
///
/// Soft-deleted rows never surface as `Category`; repositories filter them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Category {
    pub id: Uuid,
    /// Primary-locale display name.
    pub name: String,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    /// Image reference in the external blob store.
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl Category {
    /// Apply the locale transform: English substitutes the secondary-locale
    /// fields when they are present and non-empty.
    pub fn localized(mut self, locale: Locale) -> Self {
        if locale == Locale::En {
            if let Some(name_en) = self.name_en.as_deref().filter(|s| !s.is_empty()) {
                self.name = name_en.to_string();
            }
            if let Some(desc_en) = self.description_en.as_deref().filter(|s| !s.is_empty()) {
                self.description = Some(desc_en.to_string());
            }
        }
        self
    }
}

/// Fields for inserting a new category row.
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
}

/// A live "child_id is a direct child of parent_id" row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CategoryRelation {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub child_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Category with its hierarchy inlined, as returned to callers and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CategoryView {
    pub id: Uuid,
    pub name: String,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    /// Parent category ID (None = root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Direct children, ordered by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_ids: Vec<Uuid>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl CategoryView {
    /// Build a view from a category row and its relation projection.
    pub fn assemble(
        category: Category,
        locale: Locale,
        parent_id: Option<Uuid>,
        children_ids: Vec<Uuid>,
    ) -> Self {
        let c = category.localized(locale);
        Self {
            id: c.id,
            name: c.name,
            name_en: c.name_en,
            description: c.description,
            description_en: c.description_en,
            image: c.image,
            is_active: c.is_active,
            parent_id,
            children_ids,
            created_at_utc: c.created_at_utc,
            updated_at_utc: c.updated_at_utc,
        }
    }
}

/// Product row, kept only as far as category deletion guards need it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProductRef {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Request for creating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub image: Option<String>,
    /// Defaults to true
    pub is_active: Option<bool>,
    /// When set, the new category is created directly under this parent.
    pub parent_id: Option<Uuid>,
}

impl CreateCategoryRequest {
    /// Validate and convert into insertable fields.
    pub fn to_new_category(&self) -> Result<NewCategory> {
        Ok(NewCategory {
            name: validate_name(&self.name)?,
            name_en: self.name_en.clone(),
            description: self.description.clone(),
            description_en: self.description_en.clone(),
            image: self.image.clone(),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Partial update. `None` leaves a field unchanged.
///
/// The parent relation cannot be changed here; use the children endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateCategoryRequest {
    /// Apply present fields to `category`, returning the merged row.
    pub fn apply_to(&self, mut category: Category) -> Result<Category> {
        if let Some(name) = &self.name {
            category.name = validate_name(name)?;
        }
        if let Some(v) = &self.name_en {
            category.name_en = Some(v.clone());
        }
        if let Some(v) = &self.description {
            category.description = Some(v.clone());
        }
        if let Some(v) = &self.description_en {
            category.description_en = Some(v.clone());
        }
        if let Some(v) = &self.image {
            category.image = Some(v.clone());
        }
        if let Some(v) = self.is_active {
            category.is_active = v;
        }
        Ok(category)
    }
}

/// Full replacement (PUT). The name is mandatory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReplaceCategoryRequest {
    pub name: String,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

impl From<ReplaceCategoryRequest> for UpdateCategoryRequest {
    fn from(r: ReplaceCategoryRequest) -> Self {
        Self {
            name: Some(r.name),
            name_en: r.name_en,
            description: r.description,
            description_en: r.description_en,
            image: r.image,
            is_active: r.is_active,
        }
    }
}

/// Body of add-child / remove-child requests.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChildRequest {
    pub child_id: Uuid,
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "Category name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
