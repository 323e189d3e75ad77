//! Storage service: runs backend calls off the async workers under a timeout

use actix_web::web;
use log::{error, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CabinetError;
use crate::service::resource_path::ResourcePath;
use crate::storage::{DeleteOutcome, ObjectSummary, Storage, StoredObject, Version};

/// Storage service wrapping an injected backend
pub struct StorageService {
    storage: Arc<dyn Storage>,
    timeout: Duration,
}

impl StorageService {
    pub fn new(storage: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { storage, timeout }
    }

    /// Run a backend call on the blocking pool; a call that outlives the
    /// timeout is reported as unavailable
    async fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T, CabinetError>
    where
        F: FnOnce(&dyn Storage) -> Result<T, CabinetError> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let task = web::block(move || f(storage.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => {
                if let Err(e) = &result {
                    error!("Storage {} failed: {}", operation, e);
                }
                result
            }
            Ok(Err(e)) => {
                error!("Storage {} task failed: {}", operation, e);
                Err(CabinetError::unavailable(format!("{} did not complete", operation)))
            }
            Err(_) => {
                warn!("Storage {} timed out after {:?}", operation, self.timeout);
                Err(CabinetError::unavailable(format!("{} timed out", operation)))
            }
        }
    }

    pub async fn get(&self, path: &ResourcePath) -> Result<Option<StoredObject>, CabinetError> {
        let path = path.clone();
        self.call("get", move |storage| storage.get_object(&path.user, &path.category, &path.key))
            .await
    }

    pub async fn put(&self, path: &ResourcePath, data: Vec<u8>, content_type: String) -> Result<Version, CabinetError> {
        let path = path.clone();
        self.call("put", move |storage| {
            storage.put_object(&path.user, &path.category, &path.key, &data, &content_type)
        })
        .await
    }

    pub async fn delete(&self, path: &ResourcePath) -> Result<DeleteOutcome, CabinetError> {
        let path = path.clone();
        self.call("delete", move |storage| storage.delete_object(&path.user, &path.category, &path.key))
            .await
    }

    /// List a folder: every resource whose key starts with the folder key
    pub async fn list(&self, path: &ResourcePath) -> Result<Vec<ObjectSummary>, CabinetError> {
        let path = path.clone();
        self.call("list", move |storage| storage.list_objects(&path.user, &path.category, &path.key))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock_store::MockResourceStore;

    /// Backend that sleeps before answering, or always fails
    struct StubStorage {
        delay: Duration,
        fail: bool,
    }

    impl Storage for StubStorage {
        fn get_object(&self, _: &str, _: &str, _: &str) -> Result<Option<StoredObject>, CabinetError> {
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(CabinetError::unavailable("engine down"));
            }
            Ok(None)
        }
        fn put_object(&self, _: &str, _: &str, _: &str, data: &[u8], content_type: &str) -> Result<Version, CabinetError> {
            std::thread::sleep(self.delay);
            Ok(Version::new(1, data, content_type))
        }
        fn delete_object(&self, _: &str, _: &str, _: &str) -> Result<DeleteOutcome, CabinetError> {
            Ok(DeleteOutcome::NotFound)
        }
        fn object_exists(&self, _: &str, _: &str, _: &str) -> Result<bool, CabinetError> {
            Ok(false)
        }
        fn list_objects(&self, _: &str, _: &str, _: &str) -> Result<Vec<ObjectSummary>, CabinetError> {
            Ok(Vec::new())
        }
    }

    fn path() -> ResourcePath {
        ResourcePath::parse("/alice/notes/todo").unwrap()
    }

    #[actix_web::test]
    async fn test_round_trip_through_service() {
        let service = StorageService::new(Arc::new(MockResourceStore::new()), Duration::from_secs(5));
        let version = service.put(&path(), b"buy milk".to_vec(), "text/plain".to_string()).await.unwrap();
        let object = service.get(&path()).await.unwrap().unwrap();
        assert_eq!(object.data, b"buy milk");
        assert_eq!(object.version, version);
        assert_eq!(service.delete(&path()).await.unwrap(), DeleteOutcome::Deleted);
    }

    #[actix_web::test]
    async fn test_slow_backend_times_out_as_unavailable() {
        let stub = StubStorage { delay: Duration::from_millis(500), fail: false };
        let service = StorageService::new(Arc::new(stub), Duration::from_millis(50));

        let result = service.get(&path()).await;
        assert!(matches!(result, Err(CabinetError::BackendUnavailable(_))));
    }

    #[actix_web::test]
    async fn test_backend_failure_is_not_not_found() {
        let stub = StubStorage { delay: Duration::ZERO, fail: true };
        let service = StorageService::new(Arc::new(stub), Duration::from_secs(1));

        let result = service.get(&path()).await;
        assert!(matches!(result, Err(CabinetError::BackendUnavailable(_))));
    }
}
