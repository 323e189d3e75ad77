//! Configuration for resource storage backends

use crate::error::CabinetError;
use crate::storage::{Storage, local_store::LocalResourceStore, mock_store::MockResourceStore, sqlite_store::SQLiteResourceStore};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Available resource storage backends
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    SQLite,
    Local,
    Mock,
}

impl StorageBackend {
    pub const VALID_NAMES: &'static [&'static str] = &["sqlite", "local", "mock"];
}

impl std::str::FromStr for StorageBackend {
    type Err = CabinetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::SQLite),
            "local" | "localfs" | "fs" => Ok(StorageBackend::Local),
            "mock" | "memory" => Ok(StorageBackend::Mock),
            _ => Err(CabinetError::invalid_config(format!(
                "Invalid storage backend: {}. Valid options are: {}",
                s,
                Self::VALID_NAMES.join(", ")
            ))),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_wal_mode() -> bool {
    true
}

/// Storage section of the application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend name, see `StorageBackend::VALID_NAMES`
    pub backend: Option<String>,
    /// Database file for the sqlite backend
    #[serde(default)]
    pub db_path: Option<String>,
    /// Root directory for the local backend
    #[serde(default)]
    pub base_path: Option<String>,
    /// Enable WAL journaling for the sqlite backend
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
    /// Upper bound for a single backend call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl StorageConfig {
    pub fn with_backend(backend: &str) -> Self {
        Self {
            backend: Some(backend.to_string()),
            db_path: None,
            base_path: None,
            wal_mode: default_wal_mode(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Resolve the configured backend name
    pub fn backend(&self) -> Result<StorageBackend, CabinetError> {
        match &self.backend {
            Some(name) => name.parse(),
            None => Err(CabinetError::invalid_config("storage backend not given")),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check backend name and backend-specific settings without opening anything
    pub fn validate(&self) -> Result<StorageBackend, CabinetError> {
        let backend = self.backend()?;
        match backend {
            StorageBackend::SQLite if self.db_path.is_none() => {
                Err(CabinetError::invalid_config("storage.db_path is required for the sqlite backend"))
            }
            StorageBackend::Local if self.base_path.is_none() => {
                Err(CabinetError::invalid_config("storage.base_path is required for the local backend"))
            }
            _ if self.timeout_ms == 0 => Err(CabinetError::invalid_config("storage.timeout_ms must be positive")),
            _ => Ok(backend),
        }
    }

    /// Create a storage instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn Storage>, CabinetError> {
        let store: Arc<dyn Storage> = match self.validate()? {
            StorageBackend::SQLite => {
                let db_path = self.db_path.as_deref().unwrap_or_default();
                info!("Using SQLite storage backend with db_path: {}, wal_mode: {}", db_path, self.wal_mode);
                Arc::new(SQLiteResourceStore::open(db_path, self.wal_mode)?)
            }
            StorageBackend::Local => {
                let base_path = self.base_path.as_deref().unwrap_or_default();
                info!("Using local storage backend with base_path: {}", base_path);
                Arc::new(LocalResourceStore::open(base_path)?)
            }
            StorageBackend::Mock => {
                info!("Using in-memory storage backend");
                Arc::new(MockResourceStore::new())
            }
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("sqlite".parse::<StorageBackend>().unwrap(), StorageBackend::SQLite);
        assert_eq!("SQLite".parse::<StorageBackend>().unwrap(), StorageBackend::SQLite);
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("mock".parse::<StorageBackend>().unwrap(), StorageBackend::Mock);
        assert_eq!("MEMORY".parse::<StorageBackend>().unwrap(), StorageBackend::Mock);

        let err = "riak".parse::<StorageBackend>().unwrap_err();
        assert!(matches!(err, CabinetError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("sqlite, local, mock"));
    }

    #[test]
    fn test_missing_backend_is_invalid() {
        let config = StorageConfig { backend: None, ..StorageConfig::with_backend("mock") };
        assert!(matches!(config.create_store(), Err(CabinetError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_backend_specific_settings_required() {
        assert!(StorageConfig::with_backend("sqlite").validate().is_err());
        assert!(StorageConfig::with_backend("local").validate().is_err());
        assert_eq!(StorageConfig::with_backend("mock").validate().unwrap(), StorageBackend::Mock);
    }

    #[test]
    fn test_create_store() {
        let dir = tempfile::tempdir().unwrap();

        let mut sqlite = StorageConfig::with_backend("sqlite");
        sqlite.db_path = Some(dir.path().join("resources.db").to_string_lossy().into_owned());
        let store = sqlite.create_store().unwrap();
        assert!(store.list_objects("test_user", "notes", "").unwrap().is_empty());

        let mut local = StorageConfig::with_backend("local");
        local.base_path = Some(dir.path().join("records").to_string_lossy().into_owned());
        let store = local.create_store().unwrap();
        assert!(!store.object_exists("test_user", "notes", "missing").unwrap());

        let store = StorageConfig::with_backend("mock").create_store().unwrap();
        assert!(store.get_object("test_user", "notes", "missing").unwrap().is_none());
    }
}
