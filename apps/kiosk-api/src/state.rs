//! Shared application state handed to every handler.

use std::sync::Arc;

use kiosk_db::Database;
use kiosk_engine::{DeviceActivation, PaymentGateway, ReconciliationEngine};

use crate::config::KioskConfig;

/// Cheap to clone; everything heavy sits behind an `Arc` or a pool.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub orders: Arc<ReconciliationEngine>,
    pub devices: DeviceActivation,
}

impl AppState {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, config: &KioskConfig) -> Self {
        let orders = ReconciliationEngine::new(
            db.clone(),
            gateway,
            config.gateway.terminal_id.clone(),
            config.status_ttl(),
        );
        let devices = DeviceActivation::new(db.clone(), config.session_validity());

        AppState {
            db,
            orders: Arc::new(orders),
            devices,
        }
    }
}
