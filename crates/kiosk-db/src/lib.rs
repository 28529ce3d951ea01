//! # kiosk-db: Database Layer for the Kiosk Backend
//!
//! SQLite persistence for orders, stock, devices and sessions, using sqlx
//! for async access.
//!
//! ## Layout
//! ```text
//! kiosk-engine ──► Database (pool.rs)
//!                    │  SqlitePool, WAL, busy_timeout, foreign_keys
//!                    │
//!                    ├── orders()   OrderRepository   status writes, settlement claim
//!                    ├── stock()    InventoryLedger   guarded decrements, movements
//!                    ├── devices()  DeviceRepository  activation, heartbeat touch
//!                    ├── sessions() SessionRepository bearer tokens
//!                    └── catalog()  CatalogRepository product lookups
//!
//! migrations/sqlite/*.sql are embedded and applied on open.
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiosk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("kiosk.db")).await?;
//! let order = db.orders().get_by_gateway_id("mp-123").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::device::{ActivationWrite, DeviceRepository};
pub use repository::order::{OrderRepository, Settlement, SettlementClaim, StatusWrite};
pub use repository::session::SessionRepository;
pub use repository::stock::InventoryLedger;
