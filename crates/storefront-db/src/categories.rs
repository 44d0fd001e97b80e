//! Category repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use storefront_core::{
    new_v7, ActiveFilter, Category, CategoryQuery, CategoryRelation, CategoryRepository, Error,
    NewCategory, Result, SearchScope, SortField, SortOrder,
};

use crate::constraint::{translate, WriteContext};
use crate::escape_like;

const CATEGORY_COLUMNS: &str = "c.id, c.name, c.name_en, c.description, c.description_en, \
     c.image, c.is_active, c.created_at_utc, c.updated_at_utc";

/// Bound value for a dynamically built filter.
#[derive(Debug, Clone, PartialEq)]
enum FilterParam {
    Bool(bool),
    Text(String),
    Uuid(Uuid),
}

/// WHERE clause and parameters for a category listing.
#[derive(Debug, Clone)]
struct CategoryFilterSql {
    where_clause: String,
    params: Vec<FilterParam>,
}

impl CategoryFilterSql {
    fn build(name: Option<&str>, active: ActiveFilter, scope: SearchScope) -> Self {
        let mut clauses = vec!["c.deleted_at IS NULL".to_string()];
        let mut params = Vec::new();

        if let Some(is_active) = active.as_bool() {
            params.push(FilterParam::Bool(is_active));
            clauses.push(format!("c.is_active = ${}", params.len()));
        }

        if let Some(term) = name {
            params.push(FilterParam::Text(format!("%{}%", escape_like(term))));
            let idx = params.len();
            clauses.push(format!(
                "(lower(trim(c.name)) LIKE ${idx} OR lower(trim(COALESCE(c.name_en, ''))) LIKE ${idx})"
            ));
        }

        match scope {
            SearchScope::All => {}
            SearchScope::RootsOnly => clauses.push(
                "NOT EXISTS (SELECT 1 FROM category_children r \
                 WHERE r.child_id = c.id AND r.deleted_at IS NULL)"
                    .to_string(),
            ),
            SearchScope::ChildrenOnly { parent_id: None } => clauses.push(
                "EXISTS (SELECT 1 FROM category_children r \
                 WHERE r.child_id = c.id AND r.deleted_at IS NULL)"
                    .to_string(),
            ),
            SearchScope::ChildrenOnly {
                parent_id: Some(pid),
            } => {
                params.push(FilterParam::Uuid(pid));
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM category_children r \
                     WHERE r.child_id = c.id AND r.parent_id = ${} AND r.deleted_at IS NULL)",
                    params.len()
                ));
            }
        }

        Self {
            where_clause: clauses.join(" AND "),
            params,
        }
    }
}

fn order_clause(sort_by: SortField, sort_order: SortOrder) -> String {
    // Columns come from an allow-list; id breaks ties for stable paging.
    format!(
        "c.{} {}, c.id {}",
        sort_by.column(),
        sort_order.sql(),
        sort_order.sql()
    )
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    params: &'q [FilterParam],
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        q = match param {
            FilterParam::Bool(b) => q.bind(*b),
            FilterParam::Text(s) => q.bind(s.as_str()),
            FilterParam::Uuid(u) => q.bind(*u),
        };
    }
    q
}

fn map_category(r: &PgRow) -> Category {
    Category {
        id: r.get("id"),
        name: r.get("name"),
        name_en: r.get("name_en"),
        description: r.get("description"),
        description_en: r.get("description_en"),
        image: r.get("image"),
        is_active: r.get("is_active"),
        created_at_utc: r.get("created_at_utc"),
        updated_at_utc: r.get("updated_at_utc"),
    }
}

fn map_relation(r: &PgRow) -> CategoryRelation {
    CategoryRelation {
        id: r.get("id"),
        parent_id: r.get("parent_id"),
        child_id: r.get("child_id"),
        created_at_utc: r.get("created_at_utc"),
        updated_at_utc: r.get("updated_at_utc"),
    }
}

/// PostgreSQL implementation of CategoryRepository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    /// Create a new PgCategoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn insert(&self, new: &NewCategory) -> Result<Category> {
        let id = new_v7();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO category AS c (id, name, name_en, description, description_en, image,
                                   is_active, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(&new.name)
        .bind(&new.name_en)
        .bind(&new.description)
        .bind(&new.description_en)
        .bind(&new.image)
        .bind(new.is_active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| translate(e, WriteContext::Category { name: &new.name }))?;

        Ok(map_category(&row))
    }

    async fn find_live(&self, id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM category c WHERE c.id = $1 AND c.deleted_at IS NULL",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(map_category))
    }

    async fn find_live_many(&self, ids: &[Uuid]) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM category c WHERE c.id = ANY($1) AND c.deleted_at IS NULL",
            CATEGORY_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(map_category).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM category c
             WHERE lower(c.name) = lower($1) AND c.deleted_at IS NULL",
            CATEGORY_COLUMNS
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(map_category))
    }

    async fn save(&self, category: &Category) -> Result<Category> {
        let row = sqlx::query(&format!(
            "UPDATE category AS c
             SET name = $2, name_en = $3, description = $4, description_en = $5,
                 image = $6, is_active = $7, updated_at_utc = $8
             WHERE c.id = $1 AND c.deleted_at IS NULL
             RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.name_en)
        .bind(&category.description)
        .bind(&category.description_en)
        .bind(&category.image)
        .bind(category.is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            translate(
                e,
                WriteContext::Category {
                    name: &category.name,
                },
            )
        })?;

        row.as_ref()
            .map(map_category)
            .ok_or_else(|| Error::category_not_found(category.id))
    }

    async fn search(&self, query: &CategoryQuery) -> Result<(Vec<Category>, i64)> {
        let filter = CategoryFilterSql::build(query.name.as_deref(), query.active, query.scope);

        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM category c WHERE {}",
            filter.where_clause
        );
        let total: i64 = bind_params(sqlx::query(&count_sql), &filter.params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .get("count");

        let limit_idx = filter.params.len() + 1;
        let select_sql = format!(
            "SELECT {} FROM category c WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            CATEGORY_COLUMNS,
            filter.where_clause,
            order_clause(query.sort_by, query.sort_order),
            limit_idx,
            limit_idx + 1
        );
        let rows = bind_params(sqlx::query(&select_sql), &filter.params)
            .bind(query.limit)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "categories",
            op = "search",
            result_count = rows.len(),
            total = total,
            "Category search executed"
        );

        Ok((rows.iter().map(map_category).collect(), total))
    }

    async fn list(
        &self,
        active: ActiveFilter,
        scope: SearchScope,
        sort_by: SortField,
        sort_order: SortOrder,
    ) -> Result<Vec<Category>> {
        let filter = CategoryFilterSql::build(None, active, scope);
        let sql = format!(
            "SELECT {} FROM category c WHERE {} ORDER BY {}",
            CATEGORY_COLUMNS,
            filter.where_clause,
            order_clause(sort_by, sort_order)
        );
        let rows = bind_params(sqlx::query(&sql), &filter.params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(map_category).collect())
    }

    async fn delete_permanently(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM category_children WHERE parent_id = $1 OR child_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let result = sqlx::query("DELETE FROM category WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn hard_delete(&self, id: Uuid) -> Result<Vec<CategoryRelation>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let tombstoned = sqlx::query(
            "UPDATE category SET deleted_at = $2, updated_at_utc = $2
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if tombstoned.rows_affected() == 0 {
            tx.rollback().await.map_err(Error::Database)?;
            return Err(Error::category_not_found(id));
        }

        // Every row goes, live or not, so nothing references the tombstone.
        let rows = sqlx::query(
            "DELETE FROM category_children
             WHERE parent_id = $1 OR child_id = $1
             RETURNING id, parent_id, child_id, created_at_utc, updated_at_utc, deleted_at",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        let purged: Vec<CategoryRelation> = rows
            .iter()
            .filter(|r| {
                r.get::<Option<chrono::DateTime<Utc>>, _>("deleted_at")
                    .is_none()
            })
            .map(map_relation)
            .collect();

        info!(
            subsystem = "database",
            component = "categories",
            op = "hard_delete",
            category_id = %id,
            relations_purged = rows.len(),
            "Category tombstoned and relations purged"
        );

        Ok(purged)
    }
}
