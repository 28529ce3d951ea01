//! # Repository Module
//!
//! Database repository implementations for the kiosk backend.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Engine operation                                                      │
//! │       │                                                                 │
//! │       │  db.orders().begin_settlement("mp-123")                        │
//! │       ▼                                                                 │
//! │  OrderRepository / DeviceRepository / InventoryLedger / ...            │
//! │       │                                                                 │
//! │       │  Conditional SQL (WHERE guards + rows_affected)                │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Repositories never hold application locks. Every "exactly once"      │
//! │  guarantee is a guarded UPDATE checked by its affected row count.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`](order::OrderRepository) - Orders and stock settlement
//! - [`InventoryLedger`](stock::InventoryLedger) - Stock quantities and movements
//! - [`DeviceRepository`](device::DeviceRepository) - Devices and activation
//! - [`SessionRepository`](session::SessionRepository) - Device bearer sessions
//! - [`CatalogRepository`](catalog::CatalogRepository) - Product prices

pub mod catalog;
pub mod device;
pub mod order;
pub mod session;
pub mod stock;
