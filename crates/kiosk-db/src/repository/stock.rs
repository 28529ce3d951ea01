//! # Inventory Ledger
//!
//! Current stock per product plus an append-only movement log.
//!
//! ## Decrement Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Conditional Decrement                                │
//! │                                                                         │
//! │  ❌ WRONG: read, compute, write absolute value                         │
//! │     UPDATE product_stock SET quantity = 3 WHERE product_id = ?         │
//! │     (a concurrent writer's decrement is lost)                          │
//! │                                                                         │
//! │  ✅ CORRECT: relative update guarded by the available quantity         │
//! │     UPDATE product_stock SET quantity = quantity - ?                   │
//! │      WHERE product_id = ? AND quantity >= ?                            │
//! │                                                                         │
//! │  rows_affected == 1 → applied, movement row appended                   │
//! │  rows_affected == 0 → not enough stock (or no record), nothing written │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite keeps whatever type was written into `quantity`, and a TEXT value
//! passes `CHECK (quantity >= 0)`. Reads report such rows as
//! [`StockLevel::Invalid`] and decrements leave them alone.
//!
//! The same statements run inside a settlement transaction (see
//! [`crate::repository::order::Settlement`]) so an order's decrements and
//! its `stock_processed` flag commit together.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kiosk_core::stock::StockLevel;
use kiosk_core::StockMovement;

/// Repository for stock records and movements.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: String,
    product_id: String,
    quantity: i64,
    reason: String,
    created_at: chrono::DateTime<Utc>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

/// Reads a product's stock record on an open connection or transaction.
pub(crate) async fn read_stock_level(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<StockLevel> {
    let row: Option<(String, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT typeof(quantity),
               CASE WHEN typeof(quantity) = 'integer' THEN quantity END
        FROM product_stock
        WHERE product_id = ?1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(match row {
        None => StockLevel::Missing,
        Some((_, Some(quantity))) => StockLevel::Available(quantity),
        Some((stored_type, None)) => StockLevel::Invalid { stored_type },
    })
}

/// Conditionally decrements and appends a movement on an open connection.
///
/// Returns `false` (and writes nothing) when the stock record is missing or
/// holds fewer than `quantity` units.
pub(crate) async fn decrement_with_movement(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    reason: &str,
) -> DbResult<bool> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE product_stock
        SET quantity = quantity - ?2,
            updated_at = ?3
        WHERE product_id = ?1
          AND typeof(quantity) = 'integer'
          AND quantity >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, product_id, quantity, reason, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(quantity)
    .bind(reason)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(product_id = %product_id, quantity, "Stock decremented");
    Ok(true)
}

// =============================================================================
// Pool-Level Repository
// =============================================================================

impl InventoryLedger {
    /// Creates a new InventoryLedger.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// Reads a product's stock record.
    pub async fn stock_level(&self, product_id: &str) -> DbResult<StockLevel> {
        let mut conn = self.pool.acquire().await?;
        read_stock_level(&mut conn, product_id).await
    }

    /// Reads the current quantity of a product.
    ///
    /// ## Returns
    /// * `Ok(Some(qty))` - Stock record holds an integer quantity
    /// * `Ok(None)` - No stock record, or a non-integer quantity
    pub async fn current_quantity(&self, product_id: &str) -> DbResult<Option<i64>> {
        Ok(self.stock_level(product_id).await?.quantity())
    }

    /// Sets the absolute quantity of a product (provisioning / restock).
    ///
    /// Creates the stock record if it doesn't exist. Not used by order
    /// settlement, which only ever decrements.
    pub async fn set_quantity(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_stock (product_id, quantity, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(product_id) DO UPDATE SET
                quantity = excluded.quantity,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically decrements stock and appends a movement.
    ///
    /// ## Returns
    /// * `Ok(true)` - Decrement applied, movement recorded
    /// * `Ok(false)` - Not enough stock, nothing written
    pub async fn commit_decrement(
        &self,
        product_id: &str,
        quantity: i64,
        reason: &str,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;
        let applied = decrement_with_movement(&mut tx, product_id, quantity, reason).await?;
        tx.commit().await?;
        Ok(applied)
    }

    /// Lists movements for a product, oldest first.
    pub async fn movements_for(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, product_id, quantity, reason, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use kiosk_core::CatalogProduct;

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .insert(&CatalogProduct {
                id: "p1".to_string(),
                name: "Soda".to_string(),
                price_cents: 300,
                is_active: true,
            })
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_set_and_read_quantity() {
        let db = setup().await;
        let ledger = db.stock();

        assert_eq!(ledger.current_quantity("p1").await.unwrap(), None);
        ledger.set_quantity("p1", 10).await.unwrap();
        assert_eq!(ledger.current_quantity("p1").await.unwrap(), Some(10));
        ledger.set_quantity("p1", 4).await.unwrap();
        assert_eq!(ledger.current_quantity("p1").await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_commit_decrement_appends_movement() {
        let db = setup().await;
        let ledger = db.stock();
        ledger.set_quantity("p1", 5).await.unwrap();

        assert!(ledger.commit_decrement("p1", 2, "Sale - order mp-1").await.unwrap());
        assert_eq!(ledger.current_quantity("p1").await.unwrap(), Some(3));

        let movements = ledger.movements_for("p1").await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity, 2);
        assert_eq!(movements[0].reason, "Sale - order mp-1");
    }

    #[tokio::test]
    async fn test_decrement_refuses_to_go_negative() {
        let db = setup().await;
        let ledger = db.stock();
        ledger.set_quantity("p1", 1).await.unwrap();

        assert!(!ledger.commit_decrement("p1", 2, "Sale - order mp-2").await.unwrap());
        assert_eq!(ledger.current_quantity("p1").await.unwrap(), Some(1));
        assert!(ledger.movements_for("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_without_record_is_not_applied() {
        let db = setup().await;
        assert!(!db.stock().commit_decrement("p1", 1, "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_integer_quantity_reads_invalid_and_is_not_decremented() {
        let db = setup().await;
        let ledger = db.stock();
        ledger.set_quantity("p1", 5).await.unwrap();
        sqlx::query("UPDATE product_stock SET quantity = 'abc' WHERE product_id = 'p1'")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(
            ledger.stock_level("p1").await.unwrap(),
            StockLevel::Invalid {
                stored_type: "text".to_string()
            }
        );
        assert_eq!(ledger.current_quantity("p1").await.unwrap(), None);
        assert!(!ledger.commit_decrement("p1", 1, "Sale - order mp-3").await.unwrap());
        assert!(ledger.movements_for("p1").await.unwrap().is_empty());
        assert_eq!(ledger.stock_level("missing").await.unwrap(), StockLevel::Missing);
    }
}
