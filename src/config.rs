//! Application Configuration
//!
//! The configuration file is YAML keyed by environment name, for example:
//!
//! ```yaml
//! production:
//!   storage:
//!     backend: sqlite
//!     db_path: ./data/resources.db
//!   tokens:
//!     backend: sqlite
//!     db_path: ./data/tokens.db
//! ```
//!
//! One environment is selected at startup and validated before anything is
//! opened; every problem surfaces as `CabinetError::InvalidConfiguration`.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::auth::DEFAULT_PUBLIC_SUFFIX;
use crate::error::CabinetError;
pub use crate::storage::config::{StorageBackend, StorageConfig};
pub use crate::token::config::{TokenBackend, TokenConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Environment variable naming the config file
pub const CONFIG_PATH_VAR: &str = "CABINET_CONFIG";
/// Environment variable selecting the section of the config file
pub const ENVIRONMENT_VAR: &str = "CABINET_ENV";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tokens: TokenConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum PUT body size in bytes
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9710,
            workers: 4,
            max_payload_size: 64 * 1024 * 1024,
        }
    }
}

/// Authorization and login settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Categories ending with this suffix are world-readable
    pub public_suffix: String,
    /// user -> hex SHA-256 of the password
    pub users: HashMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_suffix: DEFAULT_PUBLIC_SUFFIX.to_string(),
            users: HashMap::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to the log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load and validate one environment from a config file
    pub fn load(path: impl AsRef<Path>, environment: &str) -> Result<Self, CabinetError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CabinetError::invalid_config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content, environment)?;
        info!("Loaded configuration for environment {} from {}", environment, path.display());
        Ok(config)
    }

    /// Load using `CABINET_CONFIG` and `CABINET_ENV`, falling back to defaults
    pub fn load_from_env() -> Result<Self, CabinetError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let environment = std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        Self::load(path, &environment)
    }

    pub fn from_yaml(content: &str, environment: &str) -> Result<Self, CabinetError> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| CabinetError::invalid_config(format!("config is not valid YAML: {}", e)))?;
        let section = document
            .get(environment)
            .cloned()
            .ok_or_else(|| CabinetError::invalid_config(format!("no configuration for environment {}", environment)))?;

        let config: AppConfig = serde_yaml::from_value(section).map_err(|e| {
            CabinetError::invalid_config(format!("configuration for environment {}: {}", environment, e))
        })?;
        config.validate().map_err(|e| match e {
            CabinetError::InvalidConfiguration(msg) => {
                CabinetError::invalid_config(format!("{} (environment {})", msg, environment))
            }
            other => other,
        })?;
        Ok(config)
    }

    /// Check everything that can be checked without touching backends
    pub fn validate(&self) -> Result<(), CabinetError> {
        self.storage.validate()?;
        self.tokens.validate()?;
        if self.server.workers == 0 {
            return Err(CabinetError::invalid_config("server.workers must be positive"));
        }
        Ok(())
    }

    /// In-memory backends everywhere; used by tests
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::with_backend("mock"),
            tokens: TokenConfig::with_backend("mock"),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
