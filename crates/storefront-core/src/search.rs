//! Search, filter and pagination types for category listings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// ACTIVITY FILTER
// =============================================================================

/// Activity-state filter, resolved once at the request boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveFilter {
    /// Active and inactive categories
    #[default]
    Unfiltered,
    OnlyTrue,
    OnlyFalse,
}

impl ActiveFilter {
    /// Collapse a set of requested states. Both states (or none) mean no filter.
    pub fn from_flags(flags: &[bool]) -> Self {
        let wants_true = flags.iter().any(|f| *f);
        let wants_false = flags.iter().any(|f| !*f);
        match (wants_true, wants_false) {
            (true, false) => Self::OnlyTrue,
            (false, true) => Self::OnlyFalse,
            _ => Self::Unfiltered,
        }
    }

    /// Filter for the `includeInactive` flag used by single lookups and listings.
    pub fn from_include_inactive(include_inactive: bool) -> Self {
        if include_inactive {
            Self::Unfiltered
        } else {
            Self::OnlyTrue
        }
    }

    /// Whether a category with the given state passes the filter.
    pub fn matches(&self, is_active: bool) -> bool {
        match self {
            Self::Unfiltered => true,
            Self::OnlyTrue => is_active,
            Self::OnlyFalse => !is_active,
        }
    }

    /// The `is_active` value to bind in SQL, or None for no predicate.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Unfiltered => None,
            Self::OnlyTrue => Some(true),
            Self::OnlyFalse => Some(false),
        }
    }

    /// Short tag used in cache keys.
    pub fn cache_tag(&self) -> &'static str {
        match self {
            Self::Unfiltered => "all",
            Self::OnlyTrue => "active",
            Self::OnlyFalse => "inactive",
        }
    }
}

/// Wire shape of the `is_active` search field: a single boolean or a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum IsActiveInput {
    Single(bool),
    Many(Vec<bool>),
}

impl From<Option<IsActiveInput>> for ActiveFilter {
    fn from(input: Option<IsActiveInput>) -> Self {
        match input {
            None => Self::Unfiltered,
            Some(IsActiveInput::Single(b)) => Self::from_flags(&[b]),
            Some(IsActiveInput::Many(v)) => Self::from_flags(&v),
        }
    }
}

// =============================================================================
// SORTING
// =============================================================================

/// Allow-listed sort columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    Id,
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Database column for ORDER BY.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::CreatedAt => "created_at_utc",
            Self::UpdatedAt => "updated_at_utc",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "createdAt" | "created_at" | "created_at_utc" => Ok(Self::CreatedAt),
            "updatedAt" | "updated_at" | "updated_at_utc" => Ok(Self::UpdatedAt),
            _ => Err(Error::InvalidInput(format!(
                "sort_by must be one of id, name, createdAt, updatedAt (got '{}')",
                s
            ))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(Error::InvalidInput(format!(
                "sort_order must be ASC or DESC (got '{}')",
                s
            ))),
        }
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// Which part of the hierarchy a search covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    All,
    /// Only categories without a live parent relation.
    RootsOnly,
    /// Only categories with a live parent, optionally under one parent.
    ChildrenOnly { parent_id: Option<Uuid> },
}

impl SearchScope {
    /// Short tag used in cache keys.
    pub fn cache_tag(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::RootsOnly => "roots".to_string(),
            Self::ChildrenOnly { parent_id: None } => "children".to_string(),
            Self::ChildrenOnly {
                parent_id: Some(pid),
            } => format!("children-{}", pid),
        }
    }
}

/// Normalized category query, executed by repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryQuery {
    /// Lowercased, trimmed name fragment.
    pub name: Option<String>,
    pub active: ActiveFilter,
    pub scope: SearchScope,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    /// 1-based page number.
    pub page: i64,
    pub limit: i64,
}

impl Default for CategoryQuery {
    fn default() -> Self {
        Self {
            name: None,
            active: ActiveFilter::Unfiltered,
            scope: SearchScope::All,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            page: 1,
            limit: defaults::PAGE_LIMIT,
        }
    }
}

impl CategoryQuery {
    /// Row offset for the current page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Deterministic signature of every field that affects the result set.
    pub fn signature(&self) -> String {
        format!(
            "name={}|active={}|scope={}|sort={}:{}|page={}|limit={}",
            self.name.as_deref().unwrap_or(""),
            self.active.cache_tag(),
            self.scope.cache_tag(),
            self.sort_by.column(),
            self.sort_order.sql(),
            self.page,
            self.limit
        )
    }
}

/// Normalize a name fragment for matching.
pub fn normalize_search_term(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Search request as it arrives on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SearchCategoryRequest {
    /// Partial, case-insensitive match on either locale's name
    pub name: Option<String>,
    /// `true`, `false`, `[true]`, `[false]` or `[true, false]`
    pub is_active: Option<IsActiveInput>,
    /// id | name | createdAt | updatedAt
    pub sort_by: Option<String>,
    /// ASC | DESC
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Only honoured by child searches
    pub parent_id: Option<Uuid>,
}

impl SearchCategoryRequest {
    /// Validate and normalize into a repository query.
    pub fn into_query(self, scope: SearchScope) -> Result<CategoryQuery> {
        let sort_by = match self.sort_by.as_deref() {
            Some(s) => s.parse()?,
            None => SortField::default(),
        };
        let sort_order = match self.sort_order.as_deref() {
            Some(s) => s.parse()?,
            None => SortOrder::default(),
        };
        let name = self
            .name
            .as_deref()
            .map(normalize_search_term)
            .filter(|s| !s.is_empty());
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(defaults::PAGE_LIMIT)
            .clamp(1, defaults::PAGE_LIMIT_MAX);
        if page.checked_sub(1).and_then(|p| p.checked_mul(limit)).is_none() {
            return Err(Error::InvalidInput(format!(
                "page {page} is out of range for limit {limit}"
            )));
        }

        Ok(CategoryQuery {
            name,
            active: self.is_active.into(),
            scope,
            sort_by,
            sort_order,
            page,
            limit,
        })
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_filter_from_flags() {
        assert_eq!(ActiveFilter::from_flags(&[true]), ActiveFilter::OnlyTrue);
        assert_eq!(ActiveFilter::from_flags(&[false]), ActiveFilter::OnlyFalse);
        assert_eq!(
            ActiveFilter::from_flags(&[true, false]),
            ActiveFilter::Unfiltered
        );
        assert_eq!(
            ActiveFilter::from_flags(&[true, true]),
            ActiveFilter::OnlyTrue
        );
        assert_eq!(ActiveFilter::from_flags(&[]), ActiveFilter::Unfiltered);
    }

    #[test]
    fn test_is_active_wire_shapes() {
        let single: SearchCategoryRequest =
            serde_json::from_str(r#"{"is_active": false}"#).unwrap();
        assert_eq!(ActiveFilter::from(single.is_active), ActiveFilter::OnlyFalse);

        let both: SearchCategoryRequest =
            serde_json::from_str(r#"{"is_active": [true, false]}"#).unwrap();
        assert_eq!(ActiveFilter::from(both.is_active), ActiveFilter::Unfiltered);

        let absent: SearchCategoryRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(ActiveFilter::from(absent.is_active), ActiveFilter::Unfiltered);
    }

    #[test]
    fn test_active_filter_matches() {
        assert!(ActiveFilter::Unfiltered.matches(false));
        assert!(ActiveFilter::OnlyTrue.matches(true));
        assert!(!ActiveFilter::OnlyTrue.matches(false));
        assert!(ActiveFilter::OnlyFalse.matches(false));
    }

    #[test]
    fn test_sort_field_allow_list() {
        assert_eq!("createdAt".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert_eq!("name".parse::<SortField>().unwrap().column(), "name");
        assert!("password; DROP TABLE category".parse::<SortField>().is_err());
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_into_query_defaults_and_clamping() {
        let q = SearchCategoryRequest {
            name: Some("  IPhone ".to_string()),
            page: Some(0),
            limit: Some(5000),
            ..Default::default()
        }
        .into_query(SearchScope::All)
        .unwrap();

        assert_eq!(q.name.as_deref(), Some("iphone"));
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, defaults::PAGE_LIMIT_MAX);
        assert_eq!(q.sort_by, SortField::CreatedAt);
        assert_eq!(q.sort_order, SortOrder::Desc);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn test_page_past_offset_range_rejected() {
        let err = SearchCategoryRequest {
            page: Some(i64::MAX),
            limit: Some(10),
            ..Default::default()
        }
        .into_query(SearchScope::All)
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let q = SearchCategoryRequest {
            page: Some(i64::MAX),
            limit: Some(1),
            ..Default::default()
        }
        .into_query(SearchScope::All)
        .unwrap();
        assert_eq!(q.offset(), i64::MAX - 1);

        let huge = CategoryQuery {
            page: i64::MAX,
            limit: 50,
            ..CategoryQuery::default()
        };
        assert_eq!(huge.offset(), i64::MAX);
    }

    #[test]
    fn test_blank_name_means_no_name_filter() {
        let q = SearchCategoryRequest {
            name: Some("   ".to_string()),
            ..Default::default()
        }
        .into_query(SearchScope::RootsOnly)
        .unwrap();
        assert!(q.name.is_none());
    }

    #[test]
    fn test_signature_distinguishes_scope_and_page() {
        let base = CategoryQuery::default();
        let roots = CategoryQuery {
            scope: SearchScope::RootsOnly,
            ..CategoryQuery::default()
        };
        let page2 = CategoryQuery {
            page: 2,
            ..CategoryQuery::default()
        };
        assert_ne!(base.signature(), roots.signature());
        assert_ne!(base.signature(), page2.signature());
        assert_eq!(base.signature(), CategoryQuery::default().signature());
    }

    #[test]
    fn test_page_total_pages() {
        let page: Page<u8> = Page::new(vec![], 101, 1, 50);
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, 1, 50);
        assert_eq!(empty.total_pages, 0);
    }
}
