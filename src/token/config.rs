//! Configuration for token store backends

use crate::error::CabinetError;
use crate::token::{TokenStore, mock_store::MockTokenStore, sqlite_store::SQLiteTokenStore};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Available token store backends
#[derive(Debug, Clone, PartialEq)]
pub enum TokenBackend {
    SQLite,
    Mock,
}

impl TokenBackend {
    pub const VALID_NAMES: &'static [&'static str] = &["sqlite", "mock"];
}

impl std::str::FromStr for TokenBackend {
    type Err = CabinetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(TokenBackend::SQLite),
            "mock" | "memory" => Ok(TokenBackend::Mock),
            _ => Err(CabinetError::invalid_config(format!(
                "Invalid token backend: {}. Valid options are: {}",
                s,
                Self::VALID_NAMES.join(", ")
            ))),
        }
    }
}

/// Token store section of the application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub backend: Option<String>,
    #[serde(default)]
    pub db_path: Option<String>,
}

impl TokenConfig {
    pub fn with_backend(backend: &str) -> Self {
        Self {
            backend: Some(backend.to_string()),
            db_path: None,
        }
    }

    pub fn validate(&self) -> Result<TokenBackend, CabinetError> {
        let backend: TokenBackend = match &self.backend {
            Some(name) => name.parse()?,
            None => return Err(CabinetError::invalid_config("token backend not given")),
        };
        if backend == TokenBackend::SQLite && self.db_path.is_none() {
            return Err(CabinetError::invalid_config("tokens.db_path is required for the sqlite backend"));
        }
        Ok(backend)
    }

    /// Create a token store instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn TokenStore>, CabinetError> {
        let store: Arc<dyn TokenStore> = match self.validate()? {
            TokenBackend::SQLite => {
                let db_path = self.db_path.as_deref().unwrap_or_default();
                info!("Using SQLite token store with db_path: {}", db_path);
                Arc::new(SQLiteTokenStore::open(db_path)?)
            }
            TokenBackend::Mock => {
                info!("Using in-memory token store");
                Arc::new(MockTokenStore::new())
            }
        };
        Ok(store)
    }
}
