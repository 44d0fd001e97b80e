//! # storefront-db
//!
//! PostgreSQL storage layer for the storefront catalog.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for categories, relations and products
//! - Translation of constraint violations into typed catalog errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use storefront_db::{Database, CategoryRepository, NewCategory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/storefront").await?;
//!     db.migrate().await?;
//!
//!     let phones = db.categories.insert(&NewCategory {
//!         name: "Điện thoại".to_string(),
//!         is_active: true,
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Created category: {}", phones.id);
//!     Ok(())
//! }
//! ```
pub mod categories;
pub mod constraint;
pub mod pool;
pub mod products;
pub mod relations;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use storefront_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use categories::PgCategoryRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use products::PgProductRepository;
pub use relations::PgRelationRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Category rows.
    pub categories: PgCategoryRepository,
    /// Parent/child relation rows.
    pub relations: PgRelationRepository,
    /// Product rows referenced by deletion guards.
    pub products: PgProductRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            categories: PgCategoryRepository::new(pool.clone()),
            relations: PgRelationRepository::new(pool.clone()),
            products: PgProductRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
