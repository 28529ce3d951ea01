//! # kiosk-engine: Order Reconciliation and Device Activation
//!
//! Business rules of the kiosk backend. Everything here is transport
//! agnostic: handlers in `kiosk-api` translate HTTP into these calls and
//! [`EngineError`] back into status codes.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         kiosk-engine                                    │
//! │                                                                         │
//! │  ┌──────────────────────────────┐     ┌──────────────────────────────┐ │
//! │  │    ReconciliationEngine      │     │      DeviceActivation        │ │
//! │  │                              │     │                              │ │
//! │  │ checkout / register_order    │     │ activate (one-shot codes)    │ │
//! │  │ process_webhook_event        │     │ validate_heartbeat           │ │
//! │  │ get_status (cached)          │     │ issue / renew / validate     │ │
//! │  │ cancel / reconcile           │     │   sessions                   │ │
//! │  └──────┬───────────────┬───────┘     └──────────────┬───────────────┘ │
//! │         │               │                            │                 │
//! │         ▼               ▼                            ▼                 │
//! │  ┌──────────────┐ ┌──────────────┐          ┌──────────────────────┐   │
//! │  │PaymentGateway│ │ StatusCache  │          │  kiosk-db Database   │   │
//! │  │ (HTTP/fake)  │ │ (TTL, local) │          │  orders, stock,      │   │
//! │  └──────────────┘ └──────────────┘          │  devices, sessions   │   │
//! │                                             └──────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`reconcile`] - Order registration, webhooks, stock settlement
//! - [`activation`] - Device activation state machine and sessions
//! - [`gateway`] - Payment gateway trait and HTTP adapter
//! - [`cache`] - Order status TTL cache
//! - [`error`] - Engine error type and HTTP status mapping

// =============================================================================
// Module Declarations
// =============================================================================

pub mod activation;
pub mod cache;
pub mod error;
pub mod gateway;
pub mod reconcile;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use activation::{Activation, DeviceActivation, ValidatedSession};
pub use cache::StatusCache;
pub use error::{EngineError, EngineResult};
pub use gateway::{
    GatewayError, GatewayOrder, GatewayOrderDetails, HttpGateway, HttpGatewayConfig,
    PaymentGateway, TerminalOrderRequest,
};
pub use reconcile::{
    Checkout, CreatedGatewayOrder, DiscardReason, GatewayOrderRequest, ReconcileReport,
    ReconciliationEngine, SettlementReport, SkippedItem, WebhookAck, WebhookOutcome,
};
