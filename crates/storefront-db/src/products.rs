//! Product reference repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use storefront_core::{new_v7, Error, ProductRef, ProductRepository, Result};

use crate::constraint::{translate, WriteContext};

/// PostgreSQL implementation of ProductRepository.
#[derive(Clone)]
pub struct PgProductRepository {
    pool: Pool<Postgres>,
}

impl PgProductRepository {
    /// Create a new PgProductRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn count_live_for_category(&self, category_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM product WHERE category_id = $1 AND deleted_at IS NULL",
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.get("count"))
    }

    async fn insert(&self, name: &str, category_id: Uuid) -> Result<ProductRef> {
        let product = ProductRef {
            id: new_v7(),
            name: name.to_string(),
            category_id,
            created_at_utc: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO product (id, name, category_id, created_at_utc) VALUES ($1, $2, $3, $4)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.category_id)
        .bind(product.created_at_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| translate(e, WriteContext::Product { category_id }))?;

        Ok(product)
    }

    async fn soft_delete(&self, product_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE product SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
