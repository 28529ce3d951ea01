//! # Order Reconciliation Engine
//!
//! Creates terminal orders, registers them locally and reconciles their
//! status from webhook deliveries and client-triggered gateway lookups.
//!
//! ## Webhook Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  body bytes                                                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  GatewayEvent::parse ──► Unparseable / Incomplete / Unknown ──► discard│
//! │      │                                                                  │
//! │      ▼ StatusChanged                                                    │
//! │  ┌──────────────────────┐        ┌──────────────────────────────────┐  │
//! │  │ status == processed  │──yes──►│ begin_settlement (CAS on flag)   │  │
//! │  └──────────┬───────────┘        │  ├─ NotFound / AlreadyProcessed  │  │
//! │             │ no                 │  │     → discard                 │  │
//! │             ▼                    │  └─ Claimed → per-item decrement │  │
//! │  update_status (overwrite)       │        (skip, never negative)    │  │
//! │                                  │        → COMMIT                  │  │
//! │                                  └──────────────────────────────────┘  │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  WebhookAck { ok: true }   ← always, errors are logged only            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::StatusCache;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{
    idempotency_key, GatewayError, PaymentGateway, TerminalOrderRequest,
    ALREADY_QUEUED_ON_TERMINAL,
};
use kiosk_core::status::status_for_gateway_order;
use kiosk_core::stock::{decide, SkipReason, SnapshotEntry, StockDecision};
use kiosk_core::validation::{require_text, validate_items, validate_new_order, validate_uuid};
use kiosk_core::webhook::GatewayEvent;
use kiosk_core::{
    sale_movement_reason, Money, NewOrder, Order, OrderItem, OrderStatus, OrderStatusView,
    UserOrder,
};
use kiosk_db::{Database, SettlementClaim, StatusWrite};

// =============================================================================
// Requests & Results
// =============================================================================

/// Input for opening a terminal order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrderRequest {
    pub external_reference: String,
    pub description: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
}

/// A terminal order accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedGatewayOrder {
    pub gateway_order_id: String,
    pub status: String,
    pub external_reference: String,
    /// Server-computed total.
    pub total: Money,
}

/// Result of [`ReconciliationEngine::checkout`].
#[derive(Debug, Clone)]
pub struct Checkout {
    pub gateway_order: CreatedGatewayOrder,
    pub order: Order,
}

/// Acknowledgement returned for every webhook delivery.
///
/// Only `ok` goes on the wire; `outcome` is for logs and tests.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip)]
    pub outcome: WebhookOutcome,
}

/// What a delivery actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Discarded(DiscardReason),
    StatusUpdated {
        previous: OrderStatus,
        current: OrderStatus,
    },
    StockSettled(SettlementReport),
    /// An internal error was captured and logged.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    Unparseable(String),
    /// No action or no order id.
    Incomplete,
    UnknownAction(String),
    OrderNotFound,
    AlreadyProcessed,
}

/// Per-item result of a stock settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementReport {
    pub decremented: Vec<OrderItem>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    /// Position in the item snapshot.
    pub index: usize,
    /// `None` when the entry was unreadable.
    pub product_id: Option<String>,
    pub reason: SkipReason,
}

/// Result of [`ReconciliationEngine::reconcile_with_gateway`].
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// Raw status reported by the gateway.
    pub gateway_status: String,
    pub outcome: Option<WebhookOutcome>,
    /// Local status after reconciling.
    pub view: OrderStatusView,
}

// =============================================================================
// Engine
// =============================================================================

/// Order/payment reconciliation over the store and the payment gateway.
///
/// Stateless apart from the status cache; safe to share behind an `Arc`.
pub struct ReconciliationEngine {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    cache: StatusCache,
    terminal_id: String,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("terminal_id", &self.terminal_id)
            .field("cache_ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        terminal_id: impl Into<String>,
        status_ttl: Duration,
    ) -> Self {
        ReconciliationEngine {
            db,
            gateway,
            cache: StatusCache::new(status_ttl),
            terminal_id: terminal_id.into(),
        }
    }

    // =========================================================================
    // Order Creation
    // =========================================================================

    /// Persists a new `pending` order.
    ///
    /// ## Errors
    /// * `Validation` - malformed fields
    /// * `Conflict` - the gateway order id is already registered
    pub async fn register_order(&self, new_order: NewOrder) -> EngineResult<Order> {
        validate_new_order(&new_order)?;

        let order = self.db.orders().insert(&new_order).await.map_err(|e| {
            if e.is_unique_violation_on("orders.gateway_order_id") {
                EngineError::Conflict(format!(
                    "order already registered for gateway order {}",
                    new_order.gateway_order_id.trim()
                ))
            } else {
                EngineError::from(e)
            }
        })?;

        info!(
            gateway_order_id = %order.gateway_order_id,
            total = %order.total(),
            "Order registered"
        );

        self.cache.invalidate(&order.gateway_order_id).await;

        Ok(order)
    }

    /// Re-prices the items from the catalog. Client prices are never used.
    async fn price_items(&self, items: &[OrderItem]) -> EngineResult<Money> {
        let catalog = self.db.catalog();
        let mut total = Money::zero();

        for item in items {
            let product_id = item.product_id.trim();
            let product = catalog
                .get_product(product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| EngineError::InvalidProduct {
                    product_id: product_id.to_string(),
                })?;

            let line = product
                .price()
                .checked_multiply(item.quantity)
                .ok_or_else(|| EngineError::Validation("order total out of range".into()))?;
            total = Money::from_cents(
                total
                    .cents()
                    .checked_add(line.cents())
                    .ok_or_else(|| EngineError::Validation("order total out of range".into()))?,
            );
        }

        if !total.is_positive() {
            return Err(EngineError::Validation("order total must be positive".into()));
        }

        Ok(total)
    }

    /// Opens a terminal order for server-priced items.
    ///
    /// Retries of the same `external_reference` reuse the idempotency key,
    /// so the gateway never opens two terminal orders for one checkout.
    pub async fn create_gateway_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> EngineResult<CreatedGatewayOrder> {
        let external_reference = require_text("external_reference", &request.external_reference)?;
        let description = require_text("description", &request.description)?;
        validate_items(&request.items)?;

        let total = self.price_items(&request.items).await?;

        let payload = TerminalOrderRequest::new(
            external_reference,
            description,
            total,
            &self.terminal_id,
            request.payment_method_id.as_deref(),
        );

        let created = self
            .gateway
            .create_order(&payload, &idempotency_key(external_reference))
            .await
            .map_err(|e| {
                if e.code() == Some(ALREADY_QUEUED_ON_TERMINAL) {
                    EngineError::Conflict(
                        "an order is already queued on the terminal; clear it at the terminal and retry"
                            .into(),
                    )
                } else {
                    error!(external_reference = %external_reference, error = %e, "Terminal order creation failed");
                    EngineError::Gateway(e)
                }
            })?;

        info!(
            gateway_order_id = %created.id,
            external_reference = %external_reference,
            total = %total,
            "Terminal order created"
        );

        Ok(CreatedGatewayOrder {
            gateway_order_id: created.id,
            status: created.status,
            external_reference: created
                .external_reference
                .unwrap_or_else(|| external_reference.to_string()),
            total,
        })
    }

    /// Opens the terminal order, then registers it locally.
    ///
    /// The local row is written only after the gateway accepted the order.
    /// If registration fails the terminal order is canceled best-effort.
    pub async fn checkout(
        &self,
        user_id: &str,
        request: &GatewayOrderRequest,
    ) -> EngineResult<Checkout> {
        validate_uuid("user_id", user_id)?;
        let payment_method = request
            .payment_method_id
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| EngineError::Validation("payment_method_id is required".into()))?
            .to_string();

        let gateway_order = self.create_gateway_order(request).await?;

        let registered = self
            .register_order(NewOrder {
                user_id: user_id.trim().to_string(),
                gateway_order_id: gateway_order.gateway_order_id.clone(),
                total: gateway_order.total,
                payment_method,
                items: request.items.clone(),
            })
            .await;

        match registered {
            Ok(order) => Ok(Checkout {
                gateway_order,
                order,
            }),
            Err(e) => {
                error!(
                    gateway_order_id = %gateway_order.gateway_order_id,
                    error = %e,
                    "Registration failed after terminal order creation"
                );
                if let Err(cancel_err) = self
                    .gateway
                    .cancel_order(&gateway_order.gateway_order_id)
                    .await
                {
                    warn!(
                        gateway_order_id = %gateway_order.gateway_order_id,
                        error = %cancel_err,
                        "Could not cancel orphaned terminal order"
                    );
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Webhook
    // =========================================================================

    /// Handles one webhook delivery. Never fails.
    pub async fn process_webhook_event(&self, body: &[u8]) -> WebhookAck {
        let outcome = match GatewayEvent::parse(body) {
            GatewayEvent::Unparseable { reason } => {
                debug!(reason = %reason, "Discarding unparseable webhook");
                WebhookOutcome::Discarded(DiscardReason::Unparseable(reason))
            }
            GatewayEvent::Incomplete => {
                debug!("Discarding webhook without action or order id");
                WebhookOutcome::Discarded(DiscardReason::Incomplete)
            }
            GatewayEvent::Unknown {
                gateway_order_id,
                action,
            } => {
                debug!(gateway_order_id = %gateway_order_id, action = %action, "Ignoring webhook action");
                WebhookOutcome::Discarded(DiscardReason::UnknownAction(action))
            }
            GatewayEvent::StatusChanged {
                gateway_order_id,
                action,
                status,
            } => {
                debug!(gateway_order_id = %gateway_order_id, action = %action, "Webhook received");
                match self.apply_status(&gateway_order_id, status).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(
                            gateway_order_id = %gateway_order_id,
                            action = %action,
                            error = %e,
                            "Webhook processing failed"
                        );
                        WebhookOutcome::Failed(e.to_string())
                    }
                }
            }
        };

        WebhookAck { ok: true, outcome }
    }

    /// Applies a gateway-announced status to a local order.
    ///
    /// `processed` goes through the one-shot stock settlement; every other
    /// status overwrites the stored one.
    async fn apply_status(
        &self,
        gateway_order_id: &str,
        status: OrderStatus,
    ) -> EngineResult<WebhookOutcome> {
        if status == OrderStatus::Processed {
            return self.settle(gateway_order_id).await;
        }

        match self.db.orders().update_status(gateway_order_id, status).await? {
            StatusWrite::NotFound => {
                info!(gateway_order_id = %gateway_order_id, "Status event for unknown order");
                Ok(WebhookOutcome::Discarded(DiscardReason::OrderNotFound))
            }
            StatusWrite::Updated { previous, view } => {
                self.cache.invalidate(gateway_order_id).await;
                if previous == OrderStatus::Processed {
                    // Stock stays decremented; reversal needs a product decision.
                    warn!(
                        gateway_order_id = %gateway_order_id,
                        %previous,
                        current = %view.status,
                        "Processed order overwritten without stock reversal"
                    );
                }
                Ok(WebhookOutcome::StatusUpdated {
                    previous,
                    current: view.status,
                })
            }
        }
    }

    /// Claims the settlement and decrements stock for each readable item.
    async fn settle(&self, gateway_order_id: &str) -> EngineResult<WebhookOutcome> {
        let mut settlement = match self.db.orders().begin_settlement(gateway_order_id).await? {
            SettlementClaim::Claimed(settlement) => settlement,
            SettlementClaim::NotFound => {
                info!(gateway_order_id = %gateway_order_id, "Processed event for unknown order");
                return Ok(WebhookOutcome::Discarded(DiscardReason::OrderNotFound));
            }
            SettlementClaim::AlreadyProcessed => {
                debug!(gateway_order_id = %gateway_order_id, "Stock already processed");
                return Ok(WebhookOutcome::Discarded(DiscardReason::AlreadyProcessed));
            }
        };

        let reason = sale_movement_reason(gateway_order_id);
        let mut report = SettlementReport::default();

        for (position, entry) in settlement.items().into_iter().enumerate() {
            let item = match entry {
                SnapshotEntry::Item(item) => item,
                SnapshotEntry::Unreadable { index, reason } => {
                    let skip = SkipReason::UnreadableEntry { index, reason };
                    warn!(gateway_order_id = %gateway_order_id, reason = %skip, "Skipping item");
                    report.skipped.push(SkippedItem {
                        index,
                        product_id: None,
                        reason: skip,
                    });
                    continue;
                }
            };

            let current = settlement.stock_level(&item.product_id).await?;
            let skip = match decide(&current, item.quantity) {
                StockDecision::Skip(skip) => Some(skip),
                StockDecision::Decrement { new_quantity } => {
                    let applied = settlement
                        .decrement(&item.product_id, item.quantity, &reason)
                        .await?;
                    if applied {
                        debug!(
                            gateway_order_id = %gateway_order_id,
                            product_id = %item.product_id,
                            quantity = item.quantity,
                            remaining = new_quantity,
                            "Item settled"
                        );
                        None
                    } else {
                        Some(SkipReason::Insufficient {
                            available: current.quantity().unwrap_or(0),
                            requested: item.quantity,
                        })
                    }
                }
            };

            match skip {
                None => report.decremented.push(item),
                Some(skip) => {
                    warn!(
                        gateway_order_id = %gateway_order_id,
                        product_id = %item.product_id,
                        reason = %skip,
                        "Skipping item"
                    );
                    report.skipped.push(SkippedItem {
                        index: position,
                        product_id: Some(item.product_id),
                        reason: skip,
                    });
                }
            }
        }

        settlement.commit().await?;
        self.cache.invalidate(gateway_order_id).await;

        info!(
            gateway_order_id = %gateway_order_id,
            decremented = report.decremented.len(),
            skipped = report.skipped.len(),
            "Order processed"
        );

        Ok(WebhookOutcome::StockSettled(report))
    }

    // =========================================================================
    // Queries & Cancellation
    // =========================================================================

    /// Current status and creation time of an order.
    ///
    /// ## Errors
    /// * `NotFound` - unknown gateway order id
    pub async fn get_status(&self, gateway_order_id: &str) -> EngineResult<OrderStatusView> {
        let gateway_order_id = require_text("order_id", gateway_order_id)?;

        if let Some(view) = self.cache.get(gateway_order_id).await {
            return Ok(view);
        }

        let view = self
            .db
            .orders()
            .status_view(gateway_order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", gateway_order_id))?;

        self.cache.put(view.clone()).await;
        Ok(view)
    }

    /// Asks the gateway to cancel a terminal order.
    ///
    /// The local status follows through the `order.canceled` webhook.
    ///
    /// ## Errors
    /// * `CancelRejected` - the gateway answered 5xx (likely in progress
    ///   at the terminal; cancel there)
    /// * `Gateway` - any other failure
    pub async fn cancel_order(&self, gateway_order_id: &str) -> EngineResult<()> {
        let gateway_order_id = require_text("order_id", gateway_order_id)?;

        match self.gateway.cancel_order(gateway_order_id).await {
            Ok(()) => {
                info!(gateway_order_id = %gateway_order_id, "Terminal order canceled");
                Ok(())
            }
            Err(e) if e.is_server_error() => {
                warn!(gateway_order_id = %gateway_order_id, error = %e, "Cancellation rejected");
                let (status, details) = match e {
                    GatewayError::Rejected {
                        status, details, ..
                    } => (status, details),
                    _ => (502, None),
                };
                Err(EngineError::CancelRejected { status, details })
            }
            Err(e) => {
                error!(gateway_order_id = %gateway_order_id, error = %e, "Cancellation failed");
                Err(EngineError::Gateway(e))
            }
        }
    }

    /// Pulls the order's status from the gateway and applies it.
    ///
    /// `created` and unrecognized gateway statuses leave the order as is.
    pub async fn reconcile_with_gateway(
        &self,
        gateway_order_id: &str,
    ) -> EngineResult<ReconcileReport> {
        let gateway_order_id = require_text("order_id", gateway_order_id)?;

        let orders = self.db.orders();
        if orders.status_view(gateway_order_id).await?.is_none() {
            return Err(EngineError::not_found("Order", gateway_order_id));
        }

        let details = self.gateway.get_order(gateway_order_id).await?;
        let outcome = match status_for_gateway_order(&details.status) {
            Some(status) => Some(self.apply_status(gateway_order_id, status).await?),
            None => None,
        };

        let view = orders
            .status_view(gateway_order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", gateway_order_id))?;
        self.cache.invalidate(gateway_order_id).await;

        debug!(
            gateway_order_id = %gateway_order_id,
            gateway_status = %details.status,
            status = %view.status,
            "Reconciled with gateway"
        );

        Ok(ReconcileReport {
            gateway_status: details.status,
            outcome,
            view,
        })
    }

    /// A user's orders, newest first.
    pub async fn list_user_orders(&self, user_id: &str) -> EngineResult<Vec<UserOrder>> {
        validate_uuid("user_id", user_id)?;
        let orders = self.db.orders().list_by_user(user_id.trim()).await?;
        Ok(orders.into_iter().map(UserOrder::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
