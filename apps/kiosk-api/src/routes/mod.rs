//! # HTTP Routes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /health                           liveness + database check           │
//! │  /api/payments/...                 terminal orders and webhook         │
//! │  /api/orders/...                   registration, checkout, status      │
//! │  /api/users/{user_id}/orders       order history                       │
//! │  /api/devices/...                  activation, heartbeat, sessions     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod devices;
pub mod health;
pub mod orders;
pub mod payments;

/// All routes, no middleware.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(payments::router())
        .merge(orders::router())
        .merge(devices::router())
}

/// The application as served: routes, middleware and state.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
