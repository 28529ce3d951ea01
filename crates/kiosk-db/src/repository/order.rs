//! # Order Repository
//!
//! Persists kiosk orders keyed by internal id and by gateway order id.
//!
//! ## Settlement Gate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │               "processed" webhook → begin_settlement()                  │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   │                                                                     │
//! │   ▼                                                                     │
//! │  UPDATE orders SET status='processed', stock_processed=1               │
//! │   WHERE gateway_order_id=? AND stock_processed=0  RETURNING id, items  │
//! │   │                                                                     │
//! │   ├── row returned → Claimed(Settlement)   ← this delivery won         │
//! │   │        │                                                            │
//! │   │        ├── per item: read qty, conditional decrement, movement     │
//! │   │        ▼                                                            │
//! │   │     COMMIT (flag + all decrements become visible together)         │
//! │   │                                                                     │
//! │   └── no row → NotFound | AlreadyProcessed (ROLLBACK, nothing written) │
//! │                                                                         │
//! │  A concurrent delivery blocks on SQLite's write lock and then sees     │
//! │  stock_processed=1, so stock is decremented at most once per order.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::stock::{decrement_with_movement, read_stock_level};
use kiosk_core::stock::{read_item_snapshot, readable_items, SnapshotEntry, StockLevel};
use kiosk_core::{NewOrder, Order, OrderStatus, OrderStatusView};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    gateway_order_id: String,
    user_id: String,
    status: OrderStatus,
    total_cents: i64,
    payment_method: String,
    items: String,
    stock_processed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            items: readable_items(&row.items),
            id: row.id,
            gateway_order_id: row.gateway_order_id,
            user_id: row.user_id,
            status: row.status,
            total_cents: row.total_cents,
            payment_method: row.payment_method,
            stock_processed: row.stock_processed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, gateway_order_id, user_id, status, total_cents, \
                             payment_method, items, stock_processed, created_at, updated_at";

/// Result of a plain status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    /// The row now holds `view.status`; `previous` is what it replaced.
    Updated {
        previous: OrderStatus,
        view: OrderStatusView,
    },
    NotFound,
}

/// Result of trying to claim an order's stock settlement.
#[derive(Debug)]
pub enum SettlementClaim {
    /// This caller flipped `stock_processed`; it must settle and commit.
    Claimed(Settlement),
    /// No order with that gateway id.
    NotFound,
    /// Another delivery already settled the order.
    AlreadyProcessed,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a new order in `pending` with `stock_processed = false`.
    ///
    /// ## Returns
    /// * `Ok(Order)` - Persisted order
    /// * `Err(DbError::UniqueViolation)` - gateway order id already registered
    pub async fn insert(&self, new_order: &NewOrder) -> DbResult<Order> {
        debug!(gateway_order_id = %new_order.gateway_order_id, "Inserting order");

        let items = serde_json::to_string(&new_order.items).map_err(|e| DbError::Corrupt {
            entity: "Order items".to_string(),
            message: e.to_string(),
        })?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, gateway_order_id, user_id, status, total_cents,
                payment_method, items, stock_processed, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(new_order.gateway_order_id.trim())
        .bind(new_order.user_id.trim())
        .bind(OrderStatus::Pending)
        .bind(new_order.total.cents())
        .bind(new_order.payment_method.trim())
        .bind(&items)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, new_order.gateway_order_id.trim())
            }
            other => other,
        })?;

        Ok(Order {
            id,
            gateway_order_id: new_order.gateway_order_id.trim().to_string(),
            user_id: new_order.user_id.trim().to_string(),
            status: OrderStatus::Pending,
            total_cents: new_order.total.cents(),
            payment_method: new_order.payment_method.trim().to_string(),
            items: new_order.items.clone(),
            stock_processed: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets an order by its gateway order id.
    pub async fn get_by_gateway_id(&self, gateway_order_id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE gateway_order_id = ?1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(gateway_order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    /// Returns the status and creation time of an order.
    pub async fn status_view(&self, gateway_order_id: &str) -> DbResult<Option<OrderStatusView>> {
        let row: Option<(OrderStatus, DateTime<Utc>)> = sqlx::query_as(
            "SELECT status, created_at FROM orders WHERE gateway_order_id = ?1",
        )
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(status, created_at)| OrderStatusView {
            gateway_order_id: gateway_order_id.to_string(),
            status,
            created_at,
        }))
    }

    /// Lists a user's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Overwrites an order's status without touching stock.
    ///
    /// The previous status is reported so callers can flag suspicious
    /// transitions (e.g. `processed` → `canceled`).
    pub async fn update_status(
        &self,
        gateway_order_id: &str,
        status: OrderStatus,
    ) -> DbResult<StatusWrite> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Write first: the transaction must own SQLite's write lock before it
        // reads, or a concurrent writer makes the later upgrade fail.
        let touched = sqlx::query("UPDATE orders SET updated_at = ?2 WHERE gateway_order_id = ?1")
            .bind(gateway_order_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Ok(StatusWrite::NotFound);
        }

        let (previous, created_at): (OrderStatus, DateTime<Utc>) = sqlx::query_as(
            "SELECT status, created_at FROM orders WHERE gateway_order_id = ?1",
        )
        .bind(gateway_order_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE orders SET status = ?2 WHERE gateway_order_id = ?1")
            .bind(gateway_order_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(gateway_order_id = %gateway_order_id, %previous, %status, "Order status updated");
        Ok(StatusWrite::Updated {
            previous,
            view: OrderStatusView {
                gateway_order_id: gateway_order_id.to_string(),
                status,
                created_at,
            },
        })
    }

    /// Claims the one-time stock settlement of an order.
    ///
    /// See the module docs for the gate. The returned [`Settlement`] holds an
    /// open transaction: dropping it without [`Settlement::commit`] rolls back
    /// the claim as well as every decrement.
    pub async fn begin_settlement(&self, gateway_order_id: &str) -> DbResult<SettlementClaim> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<(String, String)> = sqlx::query_as(
            r#"
            UPDATE orders
            SET status = ?2, stock_processed = 1, updated_at = ?3
            WHERE gateway_order_id = ?1 AND stock_processed = 0
            RETURNING id, items
            "#,
        )
        .bind(gateway_order_id)
        .bind(OrderStatus::Processed)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((order_id, items_json)) = claimed {
            info!(gateway_order_id = %gateway_order_id, "Stock settlement claimed");
            return Ok(SettlementClaim::Claimed(Settlement {
                tx,
                order_id,
                gateway_order_id: gateway_order_id.to_string(),
                items_json,
            }));
        }

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM orders WHERE gateway_order_id = ?1")
                .bind(gateway_order_id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.rollback().await?;

        Ok(match exists {
            Some(_) => SettlementClaim::AlreadyProcessed,
            None => SettlementClaim::NotFound,
        })
    }
}

// =============================================================================
// Settlement
// =============================================================================

/// An open settlement transaction for one order.
///
/// All reads and writes go through the transaction's connection; nothing is
/// visible to other connections until [`Settlement::commit`].
pub struct Settlement {
    tx: Transaction<'static, Sqlite>,
    order_id: String,
    gateway_order_id: String,
    items_json: String,
}

impl std::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settlement")
            .field("order_id", &self.order_id)
            .field("gateway_order_id", &self.gateway_order_id)
            .finish_non_exhaustive()
    }
}

impl Settlement {
    /// Internal id of the order being settled.
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Gateway id of the order being settled.
    pub fn gateway_order_id(&self) -> &str {
        &self.gateway_order_id
    }

    /// The order's item snapshot, read leniently.
    pub fn items(&self) -> Vec<SnapshotEntry> {
        read_item_snapshot(&self.items_json)
    }

    /// Reads a product's stock record inside the transaction.
    pub async fn stock_level(&mut self, product_id: &str) -> DbResult<StockLevel> {
        read_stock_level(&mut self.tx, product_id).await
    }

    /// Conditionally decrements and records a movement inside the transaction.
    pub async fn decrement(&mut self, product_id: &str, quantity: i64, reason: &str) -> DbResult<bool> {
        decrement_with_movement(&mut self.tx, product_id, quantity, reason).await
    }

    /// Commits the claim together with all decrements.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use kiosk_core::{CatalogProduct, Money, OrderItem};

    const USER: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn new_order(gateway_order_id: &str, items: Vec<OrderItem>) -> NewOrder {
        NewOrder {
            user_id: USER.to_string(),
            gateway_order_id: gateway_order_id.to_string(),
            total: Money::from_cents(2500),
            payment_method: "credit_card".to_string(),
            items,
        }
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for id in ["p1", "p2"] {
            db.catalog()
                .insert(&CatalogProduct {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    price_cents: 1000,
                    is_active: true,
                })
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_insert_starts_pending() {
        let db = setup().await;
        let order = db
            .orders()
            .insert(&new_order("mp-1", vec![OrderItem::new("p1", 2)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.stock_processed);

        let stored = db.orders().get_by_gateway_id("mp-1").await.unwrap().unwrap();
        assert_eq!(stored.id, order.id);
        assert_eq!(stored.items, vec![OrderItem::new("p1", 2)]);
        assert_eq!(stored.total_cents, 2500);
    }

    #[tokio::test]
    async fn test_duplicate_gateway_id_is_unique_violation() {
        let db = setup().await;
        let orders = db.orders();
        orders.insert(&new_order("mp-1", vec![OrderItem::new("p1", 1)])).await.unwrap();

        let err = orders
            .insert(&new_order("mp-1", vec![OrderItem::new("p1", 1)]))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("orders.gateway_order_id"));
    }

    #[tokio::test]
    async fn test_status_view_and_update() {
        let db = setup().await;
        let orders = db.orders();
        orders.insert(&new_order("mp-9", vec![OrderItem::new("p1", 1)])).await.unwrap();

        let view = orders.status_view("mp-9").await.unwrap().unwrap();
        assert_eq!(view.status, OrderStatus::Pending);

        let write = orders.update_status("mp-9", OrderStatus::Canceled).await.unwrap();
        let StatusWrite::Updated { previous, view: updated } = write else {
            panic!("expected update");
        };
        assert_eq!(previous, OrderStatus::Pending);
        assert_eq!(updated.status, OrderStatus::Canceled);
        assert_eq!(updated.created_at, view.created_at);
        assert_eq!(
            orders.status_view("mp-9").await.unwrap().unwrap().status,
            OrderStatus::Canceled
        );

        assert_eq!(
            orders.update_status("nope", OrderStatus::Canceled).await.unwrap(),
            StatusWrite::NotFound
        );
        assert!(orders.status_view("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settlement_claim_is_one_shot() {
        let db = setup().await;
        db.stock().set_quantity("p1", 5).await.unwrap();
        db.orders()
            .insert(&new_order("mp-2", vec![OrderItem::new("p1", 2)]))
            .await
            .unwrap();

        let SettlementClaim::Claimed(mut settlement) =
            db.orders().begin_settlement("mp-2").await.unwrap()
        else {
            panic!("first claim must win");
        };
        assert_eq!(settlement.items().len(), 1);
        assert!(settlement.decrement("p1", 2, "Sale - order mp-2").await.unwrap());
        settlement.commit().await.unwrap();

        assert!(matches!(
            db.orders().begin_settlement("mp-2").await.unwrap(),
            SettlementClaim::AlreadyProcessed
        ));
        assert!(matches!(
            db.orders().begin_settlement("missing").await.unwrap(),
            SettlementClaim::NotFound
        ));

        let order = db.orders().get_by_gateway_id("mp-2").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert!(order.stock_processed);
        assert_eq!(db.stock().current_quantity("p1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_dropped_settlement_rolls_back() {
        let db = setup().await;
        db.stock().set_quantity("p1", 5).await.unwrap();
        db.orders()
            .insert(&new_order("mp-3", vec![OrderItem::new("p1", 1)]))
            .await
            .unwrap();

        {
            let SettlementClaim::Claimed(mut settlement) =
                db.orders().begin_settlement("mp-3").await.unwrap()
            else {
                panic!("claim expected");
            };
            settlement.decrement("p1", 1, "x").await.unwrap();
        }

        let order = db.orders().get_by_gateway_id("mp-3").await.unwrap().unwrap();
        assert!(!order.stock_processed);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(db.stock().current_quantity("p1").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let db = setup().await;
        let orders = db.orders();
        orders.insert(&new_order("mp-a", vec![OrderItem::new("p1", 1)])).await.unwrap();
        orders.insert(&new_order("mp-b", vec![OrderItem::new("p2", 3)])).await.unwrap();

        let listed = orders.list_by_user(USER).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].gateway_order_id, "mp-b");
        assert_eq!(listed[0].item_count(), 3);
        assert!(orders.list_by_user("someone-else").await.unwrap().is_empty());
    }
}
