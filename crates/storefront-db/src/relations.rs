//! Parent/child relation repository implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use storefront_core::{new_v7, CategoryRelation, Error, RelationRepository, Result};

use crate::constraint::{translate, WriteContext};

const RELATION_COLUMNS: &str = "id, parent_id, child_id, created_at_utc, updated_at_utc";

fn map_relation(r: &PgRow) -> CategoryRelation {
    CategoryRelation {
        id: r.get("id"),
        parent_id: r.get("parent_id"),
        child_id: r.get("child_id"),
        created_at_utc: r.get("created_at_utc"),
        updated_at_utc: r.get("updated_at_utc"),
    }
}

/// PostgreSQL implementation of RelationRepository.
#[derive(Clone)]
pub struct PgRelationRepository {
    pool: Pool<Postgres>,
}

impl PgRelationRepository {
    /// Create a new PgRelationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationRepository for PgRelationRepository {
    async fn find_by_child(&self, child_id: Uuid) -> Result<Option<CategoryRelation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM category_children WHERE child_id = $1 AND deleted_at IS NULL",
            RELATION_COLUMNS
        ))
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(map_relation))
    }

    async fn find_by_parent(&self, parent_id: Uuid) -> Result<Vec<CategoryRelation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM category_children
             WHERE parent_id = $1 AND deleted_at IS NULL
             ORDER BY created_at_utc",
            RELATION_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(map_relation).collect())
    }

    async fn find_pair(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
    ) -> Result<Option<CategoryRelation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM category_children
             WHERE parent_id = $1 AND child_id = $2 AND deleted_at IS NULL",
            RELATION_COLUMNS
        ))
        .bind(parent_id)
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(map_relation))
    }

    async fn insert(&self, parent_id: Uuid, child_id: Uuid) -> Result<CategoryRelation> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO category_children (id, parent_id, child_id, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {}",
            RELATION_COLUMNS
        ))
        .bind(new_v7())
        .bind(parent_id)
        .bind(child_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            translate(
                e,
                WriteContext::Relation {
                    parent_id,
                    child_id,
                },
            )
        })?;

        Ok(map_relation(&row))
    }

    async fn soft_delete(&self, relation_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE category_children SET deleted_at = $2, updated_at_utc = $2
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(relation_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn parents_of(&self, child_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
        if child_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT child_id, parent_id FROM category_children
             WHERE child_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(child_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|r| (r.get("child_id"), r.get("parent_id")))
            .collect())
    }

    async fn children_of(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT r.parent_id, r.child_id
             FROM category_children r
             JOIN category c ON c.id = r.child_id AND c.deleted_at IS NULL
             WHERE r.parent_id = ANY($1) AND r.deleted_at IS NULL
             ORDER BY c.name, c.id",
        )
        .bind(parent_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut out: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for r in &rows {
            out.entry(r.get("parent_id"))
                .or_default()
                .push(r.get("child_id"));
        }
        Ok(out)
    }
}
