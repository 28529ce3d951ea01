//! # Connection Pool
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig ──► connect_options() ──► SqlitePool ──► migrations          │
//! │                  │                                                      │
//! │                  ├─ WAL journal (file stores only)                      │
//! │                  ├─ foreign_keys = ON                                   │
//! │                  └─ busy_timeout                                        │
//! │                                                                         │
//! │  webhook delivery ─┐                                                    │
//! │  activation ───────┼──► own pooled connection ──► conditional UPDATE    │
//! │  status poll ──────┘        (SQLite write lock orders the writers)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! WAL lets status polls keep reading while a settlement transaction holds
//! the write lock. An in-memory store is private to its one connection, so
//! its pool is pinned to a single connection.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::device::DeviceRepository;
use crate::repository::order::OrderRepository;
use crate::repository::session::SessionRepository;
use crate::repository::stock::InventoryLedger;

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives and how the pool behaves.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/kiosk/kiosk.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `None` for a private in-memory database.
    pub path: Option<PathBuf>,

    /// Default: 5. In-memory stores always use 1.
    pub max_connections: u32,

    /// Default: 1.
    pub min_connections: u32,

    /// How long a caller waits for a free pooled connection.
    pub acquire_timeout: Duration,

    /// How long a writer waits for SQLite's write lock. Default: 5 s.
    pub busy_timeout: Duration,

    /// Apply embedded migrations on connect. Default: true.
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: Some(path.into()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A throwaway database that lives as long as its single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(":memory:")
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }

    /// Per-connection SQLite settings.
    ///
    /// Foreign keys are off by default in SQLite and must be enabled on
    /// every connection.
    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let base = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            None => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?,
        };

        Ok(base
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }

    fn pool_size(&self) -> (u32, u32) {
        match self.path {
            Some(_) => (self.min_connections.min(self.max_connections), self.max_connections),
            None => (1, 1),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the store. Clones share one pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("kiosk.db")).await?;
/// let view = db.orders().status_view("mp-123").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the store and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let target = config.describe();
        info!(path = %target, "Opening database");

        let (min, max) = config.pool_size();
        let pool = SqlitePoolOptions::new()
            .min_connections(min)
            .max_connections(max)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(path = %target, max_connections = max, "Pool ready");

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Order store.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    /// Inventory ledger.
    pub fn stock(&self) -> InventoryLedger {
        InventoryLedger::new(self.pool.clone())
    }

    /// Device registry.
    pub fn devices(&self) -> DeviceRepository {
        DeviceRepository::new(self.pool.clone())
    }

    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.pool.clone())
    }

    /// Read-only product catalog used for re-pricing.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections, then closes the pool.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[test]
    fn test_in_memory_pool_is_single_connection() {
        let config = DbConfig::in_memory().max_connections(8);
        assert_eq!(config.pool_size(), (1, 1));
        assert_eq!(config.describe(), ":memory:");

        let file = DbConfig::new("/tmp/kiosk.db").min_connections(9).max_connections(4);
        assert_eq!(file.pool_size(), (4, 4));
    }

    #[tokio::test]
    async fn test_file_database_enforces_foreign_keys() {
        let path = std::env::temp_dir().join(format!("kiosk-pool-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(2)).await.unwrap();

        let err = db
            .sessions()
            .issue("no-such-device", chrono::Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }
}
