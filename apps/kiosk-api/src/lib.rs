//! # kiosk-api: HTTP Server for Kiosk Terminals
//!
//! Library half of the server binary, so integration tests can drive the
//! router in-process.
//!
//! ## Module Organization
//! - [`config`] - TOML + environment configuration
//! - [`error`] - JSON error bodies
//! - [`routes`] - Route handlers
//! - [`state`] - Shared handler state

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigError, KioskConfig};
pub use error::{ApiError, ApiResult};
pub use routes::{build_app, build_router};
pub use state::AppState;
