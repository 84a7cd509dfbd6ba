//! # Back-Office Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERCADO_DB_PATH=./data/mercado.db                                  │
//! │     MERCADO_STOCK_RETRIES=3                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     path from MERCADO_CONFIG, otherwise ./mercado.toml if present      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./mercado.db"
//! max_connections = 5
//!
//! [engine]
//! stock_write_retries = 5
//! operation_timeout_secs = 30   # 0 disables the deadline
//!
//! [delivery]
//! origin_lat = -17.7833
//! origin_lng = -63.1821
//! base_fee_cents = 200
//! per_km_cents = 50
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use mercado_core::delivery::DeliveryRates;
use mercado_core::validation::validate_coordinates;
use mercado_db::DbConfig;
use mercado_sales::EngineConfig;

const DEFAULT_CONFIG_FILE: &str = "mercado.toml";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mercado.db")
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Conditional stock write retries after a conflict.
    #[serde(default = "default_stock_retries")]
    pub stock_write_retries: u32,

    /// Deadline per sale operation. 0 disables it.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_stock_retries() -> u32 {
    5
}

fn default_operation_timeout() -> u64 {
    30
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            stock_write_retries: default_stock_retries(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub base_fee_cents: i64,
    pub per_km_cents: i64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        let rates = DeliveryRates::default();
        DeliverySettings {
            origin_lat: rates.origin_lat,
            origin_lng: rates.origin_lng,
            base_fee_cents: rates.base_fee_cents,
            per_km_cents: rates.per_km_cents,
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub delivery: DeliverySettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("MERCADO_CONFIG").ok().map(PathBuf::from);
        Self::load_with(explicit.as_deref(), |key| std::env::var(key).ok())
    }

    /// [`AppConfig::load`] with the config path and variable lookup supplied
    /// by the caller.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_overrides(lookup)?;
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MERCADO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(v) = parse_var(&lookup, "MERCADO_MAX_CONNECTIONS")? {
            self.database.max_connections = v;
        }
        if let Some(v) = parse_var(&lookup, "MERCADO_STOCK_RETRIES")? {
            self.engine.stock_write_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "MERCADO_OPERATION_TIMEOUT_SECS")? {
            self.engine.operation_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "MERCADO_DELIVERY_ORIGIN_LAT")? {
            self.delivery.origin_lat = v;
        }
        if let Some(v) = parse_var(&lookup, "MERCADO_DELIVERY_ORIGIN_LNG")? {
            self.delivery.origin_lng = v;
        }
        if let Some(v) = parse_var(&lookup, "MERCADO_DELIVERY_BASE_FEE_CENTS")? {
            self.delivery.base_fee_cents = v;
        }
        if let Some(v) = parse_var(&lookup, "MERCADO_DELIVERY_PER_KM_CENTS")? {
            self.delivery.per_km_cents = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.delivery.base_fee_cents < 0 || self.delivery.per_km_cents < 0 {
            return Err(ConfigError::Invalid(
                "delivery fees must not be negative".into(),
            ));
        }
        validate_coordinates(self.delivery.origin_lat, self.delivery.origin_lng)
            .map_err(|e| ConfigError::Invalid(format!("delivery origin: {e}")))?;
        Ok(())
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let timeout = match self.engine.operation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        EngineConfig::default()
            .stock_write_retries(self.engine.stock_write_retries)
            .operation_timeout(timeout)
    }

    pub fn delivery_rates(&self) -> DeliveryRates {
        DeliveryRates {
            origin_lat: self.delivery.origin_lat,
            origin_lng: self.delivery.origin_lng,
            base_fee_cents: self.delivery.base_fee_cents,
            per_km_cents: self.delivery.per_km_cents,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.stock_write_retries, 5);
        assert_eq!(
            config.engine_config().operation_timeout,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.delivery_rates(), DeliveryRates::default());
    }

    #[test]
    fn test_file_then_env() {
        let path = std::env::temp_dir().join(format!("mercado-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[database]\npath = \"/tmp/shop.db\"\n\n[engine]\nstock_write_retries = 2\n",
        )
        .unwrap();

        let config = AppConfig::load_with(
            Some(&path),
            vars(&[
                ("MERCADO_STOCK_RETRIES", "7"),
                ("MERCADO_OPERATION_TIMEOUT_SECS", "0"),
            ]),
        )
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.database.path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.engine.stock_write_retries, 7);
        assert_eq!(config.engine_config().operation_timeout, None);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(vars(&[("MERCADO_MAX_CONNECTIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MERCADO_MAX_CONNECTIONS"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = AppConfig::load_with(Some(Path::new("/nonexistent/mercado.toml")), vars(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.delivery.origin_lat = 120.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
