//! # kiosk-core: Pure Domain Logic for the Kiosk Backend
//!
//! This crate holds the rules of the kiosk ordering backend as pure
//! functions and types, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kiosk Backend Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Kiosk client / payment gateway webhooks (HTTP)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             kiosk-engine (reconciliation, activation)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kiosk-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  webhook  │  │   stock   │  │   │
//! │  │   │  Order    │  │   Money   │  │  events   │  │ decisions │  │   │
//! │  │   │  Device   │  │ "12.50"   │  │  status   │  │ snapshot  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kiosk-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Device, DeviceSession, ...)
//! - [`money`] - Integer money with two-decimal gateway formatting
//! - [`status`] - Gateway action/status → [`OrderStatus`] tables
//! - [`webhook`] - Tagged union over webhook payloads
//! - [`stock`] - Item snapshot reading and per-item stock decisions
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use kiosk_core::webhook::GatewayEvent;
//! use kiosk_core::OrderStatus;
//!
//! let event = GatewayEvent::parse(br#"{"action":"order.processed","data":{"id":"mp-1"}}"#);
//! assert!(matches!(
//!     event,
//!     GatewayEvent::StatusChanged { status: OrderStatus::Processed, .. }
//! ));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod status;
pub mod stock;
pub mod types;
pub mod validation;
pub mod webhook;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{MoneyParseError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single order.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typing 1000 instead of 10 on the kiosk keypad.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Default lifetime of a device session, in days.
pub const DEFAULT_SESSION_DAYS: i64 = 30;
