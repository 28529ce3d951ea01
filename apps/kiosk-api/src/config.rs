//! # Server Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KIOSK_PORT=3001                                                    │
//! │     KIOSK_GATEWAY_ACCESS_TOKEN=APP_USR-...                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $KIOSK_CONFIG, or ./kiosk.toml                                     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3001
//!
//! [database]
//! path = "kiosk.db"
//! max_connections = 5
//!
//! [gateway]
//! base_url = "https://api.mercadopago.com"
//! access_token = "APP_USR-..."
//! terminal_id = "PAX_A910__SMARTPOS1234"
//! timeout_secs = 15
//!
//! [sessions]
//! validity_days = 30
//!
//! [cache]
//! status_ttl_secs = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kiosk_core::DEFAULT_SESSION_DAYS;
use kiosk_db::DbConfig;
use kiosk_engine::HttpGatewayConfig;

/// Env var naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "KIOSK_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "kiosk.toml";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, created on first start.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kiosk.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Payment gateway credentials and the point-of-sale terminal to drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    /// Bearer token. Required.
    #[serde(default)]
    pub access_token: String,

    /// Terminal that receives orders. Required.
    #[serde(default)]
    pub terminal_id: String,

    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_gateway_url() -> String {
    "https://api.mercadopago.com".to_string()
}

fn default_gateway_timeout() -> u64 {
    15
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            base_url: default_gateway_url(),
            access_token: String::new(),
            terminal_id: String::new(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
}

fn default_validity_days() -> i64 {
    DEFAULT_SESSION_DAYS
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            validity_days: default_validity_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How long a status poll may be answered from memory. 0 disables.
    #[serde(default = "default_status_ttl")]
    pub status_ttl_secs: u64,
}

fn default_status_ttl() -> u64 {
    5
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            status_ttl_secs: default_status_ttl(),
        }
    }
}

// =============================================================================
// Kiosk Config
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KioskConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub sessions: SessionSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl KioskConfig {
    /// Loads file, then environment, then validates.
    ///
    /// A missing file is not an error; defaults plus environment may be
    /// enough.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            info!(?path, "Loading config from file");
            Self::from_file(&path)?
        } else {
            debug!(?path, "Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `KIOSK_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("KIOSK_PORT") {
            self.server.port = parse_var("KIOSK_PORT", &port)?;
            debug!(port = self.server.port, "Overriding port from environment");
        }

        if let Some(path) = lookup("KIOSK_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Some(url) = lookup("KIOSK_GATEWAY_BASE_URL") {
            debug!(url = %url, "Overriding gateway URL from environment");
            self.gateway.base_url = url;
        }

        if let Some(token) = lookup("KIOSK_GATEWAY_ACCESS_TOKEN") {
            self.gateway.access_token = token;
        }

        if let Some(terminal) = lookup("KIOSK_GATEWAY_TERMINAL_ID") {
            self.gateway.terminal_id = terminal;
        }

        if let Some(timeout) = lookup("KIOSK_GATEWAY_TIMEOUT_SECS") {
            self.gateway.timeout_secs = parse_var("KIOSK_GATEWAY_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(days) = lookup("KIOSK_SESSION_VALIDITY_DAYS") {
            self.sessions.validity_days = parse_var("KIOSK_SESSION_VALIDITY_DAYS", &days)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue("server.port".into()));
        }
        if self.gateway.access_token.trim().is_empty() {
            return Err(ConfigError::MissingRequired("gateway.access_token".into()));
        }
        if self.gateway.terminal_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("gateway.terminal_id".into()));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("gateway.timeout_secs".into()));
        }
        if self.sessions.validity_days <= 0 {
            return Err(ConfigError::InvalidValue("sessions.validity_days".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    pub fn gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            base_url: self.gateway.base_url.clone(),
            access_token: self.gateway.access_token.clone(),
            timeout: Duration::from_secs(self.gateway.timeout_secs),
        }
    }

    pub fn session_validity(&self) -> chrono::Duration {
        chrono::Duration::days(self.sessions.validity_days)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.status_ttl_secs)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = KioskConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.gateway.timeout_secs, 15);
        assert_eq!(config.sessions.validity_days, 30);
        assert_eq!(config.status_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = KioskConfig::from_toml(
            r#"
            [gateway]
            access_token = "tok"
            terminal_id = "TERM-1"

            [cache]
            status_ttl_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.access_token, "tok");
        assert_eq!(config.gateway.base_url, "https://api.mercadopago.com");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.status_ttl(), Duration::ZERO);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = KioskConfig::from_toml("[server]\nport = 8080\n").unwrap();
        config
            .apply_overrides(env(&[
                ("KIOSK_PORT", "9090"),
                ("KIOSK_GATEWAY_ACCESS_TOKEN", "secret"),
                ("KIOSK_GATEWAY_TERMINAL_ID", "TERM-9"),
                ("KIOSK_SESSION_VALIDITY_DAYS", "7"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.gateway.terminal_id, "TERM-9");
        assert_eq!(config.session_validity(), chrono::Duration::days(7));
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut config = KioskConfig::default();
        let err = config
            .apply_overrides(env(&[("KIOSK_GATEWAY_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "KIOSK_GATEWAY_TIMEOUT_SECS"));
    }

    #[test]
    fn test_validation_requires_credentials() {
        let mut config = KioskConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(field)) if field == "gateway.access_token"
        ));

        config.gateway.access_token = "tok".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(field)) if field == "gateway.terminal_id"
        ));

        config.gateway.terminal_id = "TERM-1".into();
        config.gateway.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
