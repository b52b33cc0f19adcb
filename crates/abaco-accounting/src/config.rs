//! # Engine Configuration
//!
//! Installation-wide settings shared by the calculator and the accounting
//! engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ABACO_DECIMALS=2                                                   │
//! │     ABACO_SUBACCOUNT_LENGTH=10                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/abaco/engine.toml (Linux)                                │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     2 decimals, 10-digit sub-accounts, PGC closing groups              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! decimal_places = 2
//! subaccount_length = 10
//!
//! [closing]
//! result_prefixes = ["6", "7"]
//! balance_prefixes = ["1", "2", "3", "4", "5"]
//! ```
//!
//! The precision is read once; contexts copy it and it never changes for
//! the lifetime of the engine.

use abaco_core::accounting::MAX_SUBACCOUNT_LENGTH;
use abaco_core::{Precision, DEFAULT_DECIMALS, DEFAULT_SUBACCOUNT_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Largest supported number of decimal places.
pub const MAX_DECIMALS: u32 = 6;

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting has a value outside its allowed range.
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// The config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    fn invalid(key: &str, value: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Closing Settings
// =============================================================================

/// Account groups the period-end pipeline works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingConfig {
    /// Income and expense code prefixes, zeroed by regularization.
    #[serde(default = "default_result_prefixes")]
    pub result_prefixes: Vec<String>,

    /// Balance-sheet code prefixes, zeroed by closing and carried forward.
    #[serde(default = "default_balance_prefixes")]
    pub balance_prefixes: Vec<String>,
}

fn default_result_prefixes() -> Vec<String> {
    vec!["6".to_string(), "7".to_string()]
}

fn default_balance_prefixes() -> Vec<String> {
    ["1", "2", "3", "4", "5"].iter().map(|p| p.to_string()).collect()
}

impl Default for ClosingConfig {
    fn default() -> Self {
        ClosingConfig {
            result_prefixes: default_result_prefixes(),
            balance_prefixes: default_balance_prefixes(),
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Decimal places every rounded amount uses.
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,

    /// Length of sub-account codes in new fiscal periods.
    #[serde(default = "default_subaccount_length")]
    pub subaccount_length: usize,

    #[serde(default)]
    pub closing: ClosingConfig,
}

fn default_decimal_places() -> u32 {
    DEFAULT_DECIMALS
}

fn default_subaccount_length() -> usize {
    DEFAULT_SUBACCOUNT_LENGTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            decimal_places: default_decimal_places(),
            subaccount_length: default_subaccount_length(),
            closing: ClosingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, no file.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.decimal_places > MAX_DECIMALS {
            return Err(ConfigError::invalid("decimal_places", self.decimal_places));
        }
        if self.subaccount_length == 0 || self.subaccount_length > MAX_SUBACCOUNT_LENGTH {
            return Err(ConfigError::invalid("subaccount_length", self.subaccount_length));
        }
        let prefixes = self
            .closing
            .result_prefixes
            .iter()
            .chain(&self.closing.balance_prefixes);
        for prefix in prefixes {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::invalid("closing prefix", prefix));
            }
        }
        Ok(())
    }

    /// Rounding precision derived from `decimal_places`.
    #[inline]
    pub fn precision(&self) -> Precision {
        Precision::new(self.decimal_places)
    }

    fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a variable lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(value) = lookup("ABACO_DECIMALS") {
            self.decimal_places = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("ABACO_DECIMALS", &value))?;
            debug!(decimals = self.decimal_places, "Overriding decimals from environment");
        }

        if let Some(value) = lookup("ABACO_SUBACCOUNT_LENGTH") {
            self.subaccount_length = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("ABACO_SUBACCOUNT_LENGTH", &value))?;
            debug!(
                length = self.subaccount_length,
                "Overriding sub-account length from environment"
            );
        }
        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "abaco", "abaco")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.decimal_places, 2);
        assert_eq!(config.subaccount_length, 10);
        assert_eq!(config.precision(), Precision::new(2));
        assert_eq!(config.closing.result_prefixes, vec!["6", "7"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides(lookup(&[("ABACO_DECIMALS", "4"), ("ABACO_SUBACCOUNT_LENGTH", " 12 ")]))
            .unwrap();
        assert_eq!(config.decimal_places, 4);
        assert_eq!(config.subaccount_length, 12);

        let err = config
            .apply_overrides(lookup(&[("ABACO_DECIMALS", "two")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ABACO_DECIMALS"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.decimal_places = 9;
        assert!(config.validate().is_err());

        config.decimal_places = 2;
        config.subaccount_length = 0;
        assert!(config.validate().is_err());

        config.subaccount_length = 10;
        config.closing.result_prefixes.push("6a".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_parsing() {
        let config: EngineConfig = toml::from_str(
            r#"
            decimal_places = 3

            [closing]
            result_prefixes = ["6", "7", "8"]
            "#,
        )
        .unwrap();
        assert_eq!(config.decimal_places, 3);
        assert_eq!(config.subaccount_length, 10);
        assert_eq!(config.closing.result_prefixes.len(), 3);
        assert_eq!(config.closing.balance_prefixes.len(), 5);

        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[closing]"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("abaco-engine-does-not-exist.toml");
        let config = EngineConfig::load_or_default(Some(path));
        assert_eq!(config.subaccount_length, EngineConfig::default().subaccount_length);
    }
}
