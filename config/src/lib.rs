//! # Configuration Management for rowbind
//!
//! This crate provides the configuration structures shared by the rowbind
//! crates: metadata caching and identifier quoting, and value coercion.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{AppConfig, CoercionConfig, MetadataConfig};
//!
//! let config = AppConfig {
//!     metadata: MetadataConfig::new(64),
//!     coercion: CoercionConfig::new(true, "%Y-%m-%d %H:%M:%S".to_string()),
//! };
//! assert!(config.coercion.strict);
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [metadata]
//! initial_capacity = 64
//! start_delimiter = "["
//! end_delimiter = "]"
//!
//! [coercion]
//! strict = false
//! string_date_format = "%Y-%m-%d %H:%M:%S"
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from ROWBIND_CONFIG, ./rowbind.toml, or defaults
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./rowbind.toml";
const CONFIG_PATH_VAR: &str = "ROWBIND_CONFIG";

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub metadata: MetadataConfig,
    pub coercion: CoercionConfig,
}

/// Metadata cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Initial capacity of each per-type cache map
    pub initial_capacity: usize,
    /// Identifier delimiters overriding the ones derived from the endpoint
    pub start_delimiter: Option<String>,
    pub end_delimiter: Option<String>,
}

/// Value coercion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoercionConfig {
    /// Fail on truncation and numeric narrowing instead of logging a warning
    pub strict: bool,
    /// chrono format used when a string column is read into a date/time field
    pub string_date_format: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 32,
            start_delimiter: None,
            end_delimiter: None,
        }
    }
}

impl Default for CoercionConfig {
    fn default() -> Self {
        Self {
            strict: false,
            string_date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the TOML file named in the environment or .env,
    /// then ./rowbind.toml, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is not an error
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let config = if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
            Self::from_file(&config_path)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Metadata validations
        if self.metadata.initial_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Metadata initial_capacity must be greater than 0".to_string(),
            ));
        }
        match (&self.metadata.start_delimiter, &self.metadata.end_delimiter) {
            (Some(start), Some(end)) => {
                if start.is_empty() || end.is_empty() {
                    return Err(ConfigError::Invalid(
                        "Metadata delimiters cannot be empty".to_string(),
                    ));
                }
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "Metadata start_delimiter and end_delimiter must be set together".to_string(),
                ));
            }
        }

        // Coercion validations
        if self.coercion.string_date_format.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Coercion string_date_format cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl MetadataConfig {
    /// Create a new metadata configuration using endpoint-derived delimiters
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            start_delimiter: None,
            end_delimiter: None,
        }
    }

    /// Override identifier delimiters
    pub fn with_delimiters(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_delimiter = Some(start.into());
        self.end_delimiter = Some(end.into());
        self
    }

    /// Configured delimiter pair, when both halves are set
    pub fn delimiters(&self) -> Option<(&str, &str)> {
        match (&self.start_delimiter, &self.end_delimiter) {
            (Some(start), Some(end)) => Some((start.as_str(), end.as_str())),
            _ => None,
        }
    }
}

impl CoercionConfig {
    /// Create a new coercion configuration
    pub fn new(strict: bool, string_date_format: String) -> Self {
        Self {
            strict,
            string_date_format,
        }
    }
}
