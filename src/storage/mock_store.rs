//! In-memory implementation of Storage, used by tests and ephemeral deployments

use crate::error::CabinetError;
use crate::storage::{DeleteOutcome, ObjectSummary, Storage, StoredObject, Version};
use chrono::Utc;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type CategoryMap = HashMap<String, HashMap<String, StoredObject>>;

#[derive(Default)]
struct MemoryState {
    // user -> category -> key -> object
    objects: HashMap<String, CategoryMap>,
    // last revision per triple, kept across deletes
    revisions: HashMap<(String, String, String), u64>,
}

/// Mock implementation of Storage keeping everything in process memory
pub struct MockResourceStore {
    data: Arc<Mutex<MemoryState>>,
}

impl MockResourceStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, CabinetError> {
        self.data
            .lock()
            .map_err(|_| CabinetError::unavailable("in-memory store lock poisoned"))
    }

    /// Get the number of objects stored for a user across all categories
    pub fn object_count(&self, user: &str) -> usize {
        match self.lock() {
            Ok(data) => data
                .objects
                .get(user)
                .map(|categories| categories.values().map(|keys| keys.len()).sum())
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Clear all data from the store
    pub fn clear(&self) {
        if let Ok(mut data) = self.lock() {
            data.objects.clear();
            data.revisions.clear();
        }
    }
}

impl Default for MockResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MockResourceStore {
    fn get_object(&self, user: &str, category: &str, key: &str) -> Result<Option<StoredObject>, CabinetError> {
        let data = self.lock()?;
        Ok(data
            .objects
            .get(user)
            .and_then(|categories| categories.get(category))
            .and_then(|keys| keys.get(key))
            .cloned())
    }

    fn put_object(&self, user: &str, category: &str, key: &str, payload: &[u8], content_type: &str) -> Result<Version, CabinetError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let last = state
            .revisions
            .entry((user.to_string(), category.to_string(), key.to_string()))
            .or_insert(0);
        *last += 1;
        let revision = *last;

        let version = Version::new(revision, payload, content_type);
        let keys = state
            .objects
            .entry(user.to_string())
            .or_default()
            .entry(category.to_string())
            .or_default();
        keys.insert(
            key.to_string(),
            StoredObject {
                data: payload.to_vec(),
                content_type: content_type.to_string(),
                version: version.clone(),
                last_modified: Utc::now(),
            },
        );
        debug!("Stored {} bytes in memory for {}/{}/{} at revision {}", payload.len(), user, category, key, revision);
        Ok(version)
    }

    fn delete_object(&self, user: &str, category: &str, key: &str) -> Result<DeleteOutcome, CabinetError> {
        let mut data = self.lock()?;
        let removed = data
            .objects
            .get_mut(user)
            .and_then(|categories| categories.get_mut(category))
            .and_then(|keys| keys.remove(key));

        Ok(match removed {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    fn object_exists(&self, user: &str, category: &str, key: &str) -> Result<bool, CabinetError> {
        let data = self.lock()?;
        Ok(data
            .objects
            .get(user)
            .and_then(|categories| categories.get(category))
            .map(|keys| keys.contains_key(key))
            .unwrap_or(false))
    }

    fn list_objects(&self, user: &str, category: &str, prefix: &str) -> Result<Vec<ObjectSummary>, CabinetError> {
        let data = self.lock()?;
        let mut summaries: Vec<ObjectSummary> = data
            .objects
            .get(user)
            .and_then(|categories| categories.get(category))
            .map(|keys| {
                keys.iter()
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(key, object)| ObjectSummary {
                        key: key.clone(),
                        content_type: object.content_type.clone(),
                        size: object.data.len() as u64,
                        version: object.version.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(summaries)
    }
}
