//! # Catalog Repository
//!
//! Read access to product prices for server-side re-pricing. Catalog
//! maintenance is handled elsewhere; `insert` and `set_active` exist for
//! provisioning and tests.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use kiosk_core::CatalogProduct;

/// Repository for catalog products.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price_cents: i64,
    is_active: bool,
}

impl From<ProductRow> for CatalogProduct {
    fn from(row: ProductRow) -> Self {
        CatalogProduct {
            id: row.id,
            name: row.name,
            price_cents: row.price_cents,
            is_active: row.is_active,
        }
    }
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a product by id, active or not.
    ///
    /// ## Returns
    /// * `Ok(Some(CatalogProduct))` - Product found (check `is_active`)
    /// * `Ok(None)` - Product not found
    pub async fn get_product(&self, id: &str) -> DbResult<Option<CatalogProduct>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, price_cents, is_active
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CatalogProduct::from))
    }

    /// Inserts a product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - id already exists
    pub async fn insert(&self, product: &CatalogProduct) -> DbResult<()> {
        debug!(id = %product.id, "Inserting catalog product");

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Activates or deactivates a product.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let product = CatalogProduct {
            id: "p1".to_string(),
            name: "Burger".to_string(),
            price_cents: 1250,
            is_active: true,
        };
        catalog.insert(&product).await.unwrap();

        assert_eq!(catalog.get_product("p1").await.unwrap(), Some(product));
        assert_eq!(catalog.get_product("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_active() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        catalog
            .insert(&CatalogProduct {
                id: "p1".to_string(),
                name: "Fries".to_string(),
                price_cents: 500,
                is_active: true,
            })
            .await
            .unwrap();

        catalog.set_active("p1", false).await.unwrap();
        assert!(!catalog.get_product("p1").await.unwrap().unwrap().is_active);

        assert!(matches!(
            catalog.set_active("nope", false).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
