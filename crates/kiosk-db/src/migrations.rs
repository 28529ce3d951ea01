//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary,
//! so a kiosk server brings its schema along and upgrades the store file in
//! place on start.
//!
//! ```text
//! 001_initial_schema.sql
//!   products          catalog collaborator (read-only at runtime)
//!   product_stock     one row per product, CHECK (quantity >= 0)
//!   stock_movements   insert-only audit of decrements
//!   orders            UNIQUE gateway_order_id, stock_processed flag
//!   devices           UNIQUE activation_code, UNIQUE device_identifier
//!   device_sessions   bearer tokens, FK → devices
//! ```
//!
//! Applied files are checksummed by sqlx; edit history by adding a new
//! numbered file, never by changing an applied one.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every embedded migration the store has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (total, applied_before) = migration_status(pool)
        .await
        .unwrap_or((MIGRATOR.migrations.len(), 0));
    debug!(total, applied = applied_before, "Checking schema version");

    MIGRATOR.run(pool).await?;

    if total > applied_before {
        info!(applied = total - applied_before, "Schema migrated");
    }
    Ok(())
}

/// `(embedded, applied)` migration counts.
///
/// Fails on a store that was never migrated, since sqlx creates its
/// bookkeeping table on the first run.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
